//! 코인(자산) 식별 타입.

use serde::{Deserialize, Serialize};

/// 종목 수 초과로 요청 목록이 잘렸을 때의 경고 코드.
pub const WARNING_UNIVERSE_TRUNCATED: &str = "instrument_universe_truncated";

/// 개별 심볼을 해석하지 못했을 때의 경고 코드 접두사.
pub const WARNING_INSTRUMENT_UNRESOLVED: &str = "instrument_unresolved";

/// 코인 카탈로그의 정규 자산 식별자.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx-support", derive(sqlx::FromRow))]
pub struct Coin {
    /// 카탈로그 ID
    pub id: String,
    /// 심볼 (예: BTC)
    pub symbol: String,
    /// 표시 이름
    pub name: String,
}

impl Coin {
    pub fn new(id: impl Into<String>, symbol: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            symbol: symbol.into(),
            name: name.into(),
        }
    }

    /// 거래 불가능한 장부용 자리표시자인지 확인합니다.
    ///
    /// ID에 `virtual`이 포함되거나 `USD-`로 시작하면 가상 자산입니다.
    /// 가상 자산은 호가 통화로 사용할 수 없습니다.
    pub fn is_virtual(&self) -> bool {
        self.id.to_lowercase().contains("virtual") || self.id.starts_with("USD-")
    }
}

/// 요청 심볼 목록을 해석한 결과.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResolvedInstrumentSet {
    /// 요청 순서를 유지한 정규 코인 목록
    pub coins: Vec<Coin>,
    /// 치명적이지 않은 실패 표시
    pub warnings: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_virtual_coin_detection() {
        assert!(Coin::new("usdt-virtual", "USDT", "Tether (virtual)").is_virtual());
        assert!(Coin::new("VIRTUAL_USD", "USD", "Virtual").is_virtual());
        assert!(Coin::new("USD-CASH", "USDT", "Cash").is_virtual());
        assert!(!Coin::new("tether", "USDT", "Tether").is_virtual());
        assert!(!Coin::new("usd-coin", "USDC", "USD Coin").is_virtual());
    }
}

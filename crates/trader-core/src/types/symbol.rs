//! 거래쌍 심볼 정의.
//!
//! 데이터셋 메타데이터의 심볼은 형식이 제각각입니다
//! (`BTC/USDT`, `ETH-USDT`, `SOL_USD`, `ETHUSDT`). 이 모듈은 이를
//! 기준 자산과 호가 자산으로 분리합니다.

use serde::{Deserialize, Serialize};
use std::fmt;

/// 구분자 없는 심볼에서 인식하는 호가 자산 접미사.
///
/// 긴 접미사가 먼저 와야 합니다 (`USDT`가 `USD`보다 먼저 검사되어야
/// `ETHUSDT`가 `ETHU` + `SDT`로 잘못 분리되지 않음).
pub const KNOWN_QUOTE_SUFFIXES: &[&str] = &[
    "FDUSD", "USDT", "USDC", "BUSD", "TUSD", "USD", "EUR", "KRW", "DAI", "BTC", "ETH", "BNB",
];

const PAIR_SEPARATORS: &[char] = &['/', '-', '_'];

/// 기준 자산과 호가 자산으로 구성된 거래쌍.
///
/// 예: `BTC/USDT`의 기준 자산은 BTC, 호가 자산은 USDT.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TradingPair {
    /// 기준 자산 (예: BTC)
    pub base: String,
    /// 호가 자산 (예: USDT)
    pub quote: String,
}

impl TradingPair {
    /// 새 거래쌍을 생성합니다. 두 자산 모두 대문자로 정규화됩니다.
    pub fn new(base: impl Into<String>, quote: impl Into<String>) -> Self {
        Self {
            base: base.into().to_uppercase(),
            quote: quote.into().to_uppercase(),
        }
    }

    /// 거래쌍 형태의 심볼을 분리합니다.
    ///
    /// 구분자(`/`, `-`, `_`)가 있으면 구분자로, 없으면 알려진 호가 접미사로
    /// 분리합니다. 거래쌍으로 보이지 않으면 `None`.
    pub fn parse(s: &str) -> Option<Self> {
        let s = s.trim();

        if let Some(idx) = s.find(PAIR_SEPARATORS) {
            let (base, rest) = s.split_at(idx);
            let quote = &rest[1..];
            if base.is_empty() || quote.is_empty() || quote.contains(PAIR_SEPARATORS) {
                return None;
            }
            return Some(Self::new(base, quote));
        }

        let upper = s.to_uppercase();
        KNOWN_QUOTE_SUFFIXES.iter().find_map(|suffix| {
            upper
                .strip_suffix(suffix)
                .filter(|base| !base.is_empty())
                .map(|base| Self::new(base, *suffix))
        })
    }

    /// 구분자 없는 거래소 심볼 형식 (예: `BTCUSDT`).
    pub fn to_exchange_symbol(&self) -> String {
        format!("{}{}", self.base, self.quote)
    }
}

impl fmt::Display for TradingPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.base, self.quote)
    }
}

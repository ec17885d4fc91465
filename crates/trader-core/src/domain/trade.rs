//! 시뮬레이션 거래 기록.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// 거래 방향.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TradeType {
    Buy,
    Sell,
}

/// 시뮬레이션 거래 원장의 한 항목.
///
/// 실현 손익은 포지션을 청산하는 SELL 거래에만 의미가 있습니다.
/// BUY 거래의 `realized_pnl`은 지표 계산에서 사용되지 않습니다.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeRecord {
    /// 거래 방향
    pub trade_type: TradeType,
    /// 실현 손익 (호가 통화 단위)
    pub realized_pnl: f64,
    /// 코인 식별자
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub coin_id: Option<String>,
    /// 체결 가격
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub price: Option<Decimal>,
    /// 체결 수량
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quantity: Option<Decimal>,
    /// 체결 시각
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub executed_at: Option<DateTime<Utc>>,
}

impl TradeRecord {
    pub fn new(trade_type: TradeType, realized_pnl: f64) -> Self {
        Self {
            trade_type,
            realized_pnl,
            coin_id: None,
            price: None,
            quantity: None,
            executed_at: None,
        }
    }

    pub fn buy() -> Self {
        Self::new(TradeType::Buy, 0.0)
    }

    pub fn sell(realized_pnl: f64) -> Self {
        Self::new(TradeType::Sell, realized_pnl)
    }

    /// 체결 정보를 설정합니다.
    pub fn with_fill(
        mut self,
        coin_id: impl Into<String>,
        price: Decimal,
        quantity: Decimal,
        executed_at: DateTime<Utc>,
    ) -> Self {
        self.coin_id = Some(coin_id.into());
        self.price = Some(price);
        self.quantity = Some(quantity);
        self.executed_at = Some(executed_at);
        self
    }

    pub fn is_sell(&self) -> bool {
        self.trade_type == TradeType::Sell
    }
}

//! 시뮬레이터 인터페이스 및 바이앤홀드 기준 구현.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;
use trader_core::{Candle, Coin, TradeRecord, TradeType, TradingPair};

/// 시뮬레이션 오류
#[derive(Debug, Error)]
pub enum SimulationError {
    /// 전략 파라미터 오류
    #[error("시뮬레이션 파라미터 오류: {0}")]
    InvalidParameters(String),

    /// 시뮬레이션할 데이터 없음
    #[error("시뮬레이션 데이터 없음: {0}")]
    NoData(String),

    /// 실행 오류
    #[error("시뮬레이션 실행 오류: {0}")]
    Failed(String),
}

/// 시뮬레이션 결과 타입
pub type SimulationResult<T> = Result<T, SimulationError>;

/// 시뮬레이션 입력.
#[derive(Debug, Clone, Copy)]
pub struct SimulationRequest<'a> {
    /// 타임스탬프 오름차순 캔들
    pub candles: &'a [Candle],
    /// 해석된 종목 (요청 순서)
    pub coins: &'a [Coin],
    /// 호가 통화
    pub quote: &'a Coin,
    /// 초기 자본 (호가 통화 단위)
    pub initial_capital: Decimal,
    /// 전략 파라미터 (구현체별 JSON)
    pub parameters: &'a serde_json::Value,
}

/// 시뮬레이션 결과: 포트폴리오 가치 시계열과 거래 원장.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SimulationOutcome {
    /// 포트폴리오 가치의 시각
    pub timestamps: Vec<DateTime<Utc>>,
    /// 시간순 포트폴리오 가치
    pub portfolio_values: Vec<f64>,
    /// 거래 원장
    pub trades: Vec<TradeRecord>,
}

/// 전략 시뮬레이터.
#[async_trait]
pub trait Simulator: Send + Sync {
    /// 시뮬레이터 이름
    fn name(&self) -> &str;

    /// 캔들 시퀀스에 전략을 적용합니다.
    async fn simulate(&self, request: SimulationRequest<'_>) -> SimulationResult<SimulationOutcome>;
}

/// 바이앤홀드 파라미터.
#[derive(Debug, Clone, Deserialize)]
struct BuyAndHoldParams {
    /// 체결당 수수료율 (0.001 = 0.1%)
    #[serde(default)]
    fee_rate: f64,
    /// 마지막 캔들에서 청산할지 여부
    #[serde(default = "default_exit_at_end")]
    exit_at_end: bool,
}

fn default_exit_at_end() -> bool {
    true
}

/// 첫 캔들 종가에 전액 매수하고 마지막 캔들에서 청산하는 기준 전략.
///
/// 같은 타임스탬프의 캔들이 여럿이면 마지막 캔들을 사용합니다.
#[derive(Debug, Default, Clone)]
pub struct BuyAndHoldSimulator;

impl BuyAndHoldSimulator {
    pub fn new() -> Self {
        Self
    }

    /// 첫 번째 종목의 캔들만 고릅니다. 파일에 종목이 하나뿐이면 전체를 사용합니다.
    fn select_series<'a>(candles: &'a [Candle], coins: &[Coin]) -> Vec<&'a Candle> {
        let single_series = candles
            .first()
            .map(|first| candles.iter().all(|c| c.coin_id == first.coin_id))
            .unwrap_or(true);
        if single_series {
            return candles.iter().collect();
        }

        let Some(target) = coins.first() else {
            return candles.iter().collect();
        };
        candles
            .iter()
            .filter(|c| {
                c.coin_id.eq_ignore_ascii_case(&target.symbol)
                    || c.coin_id.eq_ignore_ascii_case(&target.id)
                    || TradingPair::parse(&c.coin_id)
                        .map(|pair| pair.base.eq_ignore_ascii_case(&target.symbol))
                        .unwrap_or(false)
            })
            .collect()
    }

    /// 같은 타임스탬프는 마지막 캔들만 남깁니다. 입력은 정렬되어 있어야 합니다.
    fn last_per_timestamp<'a>(series: Vec<&'a Candle>) -> Vec<&'a Candle> {
        let mut out: Vec<&Candle> = Vec::with_capacity(series.len());
        for candle in series {
            match out.last_mut() {
                Some(prev) if prev.timestamp == candle.timestamp => *prev = candle,
                _ => out.push(candle),
            }
        }
        out
    }
}

#[async_trait]
impl Simulator for BuyAndHoldSimulator {
    fn name(&self) -> &str {
        "buy_and_hold"
    }

    async fn simulate(&self, request: SimulationRequest<'_>) -> SimulationResult<SimulationOutcome> {
        let params: BuyAndHoldParams = if request.parameters.is_null() {
            serde_json::from_value(serde_json::json!({}))
        } else {
            serde_json::from_value(request.parameters.clone())
        }
        .map_err(|e| SimulationError::InvalidParameters(e.to_string()))?;

        if !(0.0..1.0).contains(&params.fee_rate) {
            return Err(SimulationError::InvalidParameters(format!(
                "fee_rate must be in [0, 1): {}",
                params.fee_rate
            )));
        }

        let capital = request
            .initial_capital
            .to_f64()
            .ok_or_else(|| SimulationError::InvalidParameters("initial_capital".to_string()))?;
        if capital <= 0.0 {
            return Err(SimulationError::InvalidParameters(format!(
                "initial_capital must be positive: {capital}"
            )));
        }

        let series = Self::last_per_timestamp(Self::select_series(request.candles, request.coins));
        let (Some(first), Some(last)) = (series.first(), series.last()) else {
            return Err(SimulationError::NoData("no candles for selected instrument".to_string()));
        };

        let entry_price = first.close.to_f64().unwrap_or(0.0);
        if entry_price <= 0.0 {
            return Err(SimulationError::Failed(format!(
                "non-positive entry price at {}",
                first.timestamp
            )));
        }

        let invested = capital * (1.0 - params.fee_rate);
        let quantity = invested / entry_price;

        let mut outcome = SimulationOutcome::default();
        outcome.trades.push(
            TradeRecord::new(TradeType::Buy, 0.0).with_fill(
                first.coin_id.clone(),
                first.close,
                Decimal::from_f64_retain(quantity).unwrap_or_default(),
                first.timestamp,
            ),
        );

        for candle in &series {
            let price = candle.close.to_f64().unwrap_or(0.0);
            outcome.timestamps.push(candle.timestamp);
            outcome.portfolio_values.push(quantity * price);
        }

        if params.exit_at_end {
            let exit_price = last.close.to_f64().unwrap_or(0.0);
            let proceeds = quantity * exit_price * (1.0 - params.fee_rate);
            if let Some(final_value) = outcome.portfolio_values.last_mut() {
                *final_value = proceeds;
            }
            outcome.trades.push(
                TradeRecord::new(TradeType::Sell, proceeds - capital).with_fill(
                    last.coin_id.clone(),
                    last.close,
                    Decimal::from_f64_retain(quantity).unwrap_or_default(),
                    last.timestamp,
                ),
            );
        }

        debug!(
            coin = %first.coin_id,
            candles = series.len(),
            quantity,
            final_value = outcome.portfolio_values.last().copied().unwrap_or_default(),
            "Buy-and-hold simulation finished"
        );
        Ok(outcome)
    }
}

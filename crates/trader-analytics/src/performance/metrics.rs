//! 성과 지표 계산 모듈
//!
//! 포트폴리오 가치 시계열과 거래 원장을 받아 고정된 13개 지표를 계산합니다.
//! 모든 함수는 순수 함수이며 I/O나 공유 상태가 없습니다.
//!
//! - 총 수익률 / 연율화 수익률
//! - 변동성, 하방 편차
//! - 샤프 비율 (Sharpe Ratio), 소르티노 비율 (Sortino Ratio)
//! - 최대 낙폭 (Maximum Drawdown)
//! - 승률 (Win Rate), 프로핏 팩터 (Profit Factor)
//!
//! 연율화에 쓰는 연간 기간 수는 `MetricsConfig`의 샘플링 주기와 달력에서
//! 한 번 정해지고 모든 비율에 동일하게 적용됩니다.
//!
//! # 사용 예시
//!
//! ```rust
//! use trader_analytics::performance::{calculate_metrics, MetricsConfig, MetricsInput};
//! use trader_core::TradeRecord;
//!
//! let input = MetricsInput {
//!     portfolio_values: vec![10_000.0, 10_500.0, 10_200.0, 11_000.0],
//!     initial_capital: 10_000.0,
//!     trades: vec![TradeRecord::buy(), TradeRecord::sell(1_000.0)],
//! };
//!
//! let result = calculate_metrics(&input, &MetricsConfig::default());
//! assert_eq!(result.total_trades, 2);
//! assert_eq!(result.win_rate, 1.0);
//! ```

use serde::{Deserialize, Serialize};
use tracing::debug;
use trader_core::{MetricsSettings, SamplingFrequency, TradeRecord};

use super::ratios;

/// 기본 무위험 이자율 (연간)
pub const DEFAULT_RISK_FREE_RATE: f64 = 0.02;

/// 지표 계산 설정.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MetricsConfig {
    /// 포트폴리오 가치 샘플링 주기
    #[serde(default)]
    pub timeframe: SamplingFrequency,
    /// 연간 무위험 수익률
    #[serde(default = "default_risk_free_rate")]
    pub risk_free_rate: f64,
    /// 24/7 암호화폐 달력 사용 여부 (false면 전통 시장 달력)
    #[serde(default = "default_use_crypto_calendar")]
    pub use_crypto_calendar: bool,
}

fn default_risk_free_rate() -> f64 {
    DEFAULT_RISK_FREE_RATE
}

fn default_use_crypto_calendar() -> bool {
    true
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            timeframe: SamplingFrequency::Daily,
            risk_free_rate: DEFAULT_RISK_FREE_RATE,
            use_crypto_calendar: true,
        }
    }
}

impl From<&MetricsSettings> for MetricsConfig {
    fn from(settings: &MetricsSettings) -> Self {
        Self {
            timeframe: settings.timeframe,
            risk_free_rate: settings.risk_free_rate,
            use_crypto_calendar: settings.use_crypto_calendar,
        }
    }
}

impl MetricsConfig {
    pub fn new(timeframe: SamplingFrequency) -> Self {
        Self {
            timeframe,
            ..Default::default()
        }
    }

    pub fn with_risk_free_rate(mut self, rate: f64) -> Self {
        self.risk_free_rate = rate;
        self
    }

    pub fn with_crypto_calendar(mut self, enabled: bool) -> Self {
        self.use_crypto_calendar = enabled;
        self
    }

    /// 연간 기간 수.
    pub fn periods_per_year(&self) -> f64 {
        self.timeframe.periods_per_year(self.use_crypto_calendar)
    }
}

/// 지표 계산 입력.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MetricsInput {
    /// 시간순 포트폴리오 가치
    pub portfolio_values: Vec<f64>,
    /// 초기 자본
    pub initial_capital: f64,
    /// 거래 원장
    #[serde(default)]
    pub trades: Vec<TradeRecord>,
}

/// 지표 계산 결과 (13개 필드 고정).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricsResult {
    /// 총 수익률 `(최종 - 초기) / 초기`
    pub total_return: f64,
    /// 연율화 수익률
    pub annualized_return: f64,
    /// 연율화 변동성
    pub volatility: f64,
    /// 연율화 하방 편차
    pub downside_deviation: f64,
    /// 샤프 비율
    pub sharpe_ratio: f64,
    /// 소르티노 비율
    pub sortino_ratio: f64,
    /// 최대 낙폭 (비율, 0.1667 = 16.67%)
    pub max_drawdown: f64,
    /// 승률 (SELL 거래 기준)
    pub win_rate: f64,
    /// 프로핏 팩터 (SELL 거래 기준, 손실 없이 수익만 있으면 무한대)
    #[serde(with = "non_finite_f64")]
    pub profit_factor: f64,
    /// 원장 전체 거래 수 (BUY 포함)
    pub total_trades: usize,
    /// 수익 SELL 거래 수
    pub winning_trades: usize,
    /// 손실 SELL 거래 수
    pub losing_trades: usize,
    /// 최종 포트폴리오 가치
    pub final_value: f64,
}

impl MetricsResult {
    /// 모든 지표가 중립값인 결과.
    pub fn neutral(initial_capital: f64) -> Self {
        Self {
            total_return: 0.0,
            annualized_return: 0.0,
            volatility: 0.0,
            downside_deviation: 0.0,
            sharpe_ratio: 0.0,
            sortino_ratio: 0.0,
            max_drawdown: 0.0,
            win_rate: 0.0,
            profit_factor: 1.0,
            total_trades: 0,
            winning_trades: 0,
            losing_trades: 0,
            final_value: initial_capital,
        }
    }
}

/// 성과 지표 계산기.
#[derive(Debug, Clone, Copy, Default)]
pub struct MetricsCalculator {
    config: MetricsConfig,
}

impl MetricsCalculator {
    pub fn new(config: MetricsConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &MetricsConfig {
        &self.config
    }

    /// 기간 수익률 `(v[i] - v[i-1]) / v[i-1]`.
    ///
    /// 이전 값이 0이면 NaN 대신 0을 사용합니다. 길이는 `n - 1`이며, 값이
    /// 하나 이하면 빈 벡터입니다.
    pub fn calculate_returns(values: &[f64]) -> Vec<f64> {
        values
            .windows(2)
            .map(|w| if w[0] == 0.0 { 0.0 } else { (w[1] - w[0]) / w[0] })
            .collect()
    }

    /// 연율화 변동성 (모표준편차 × √연간 기간 수).
    pub fn calculate_volatility(&self, returns: &[f64]) -> f64 {
        ratios::population_std_dev(returns) * self.config.periods_per_year().sqrt()
    }

    /// 연율화 하방 편차.
    ///
    /// 기간 무위험 수익률 미만인 수익률만 분산에 포함하되, 분모는 전체 표본
    /// 수입니다. 소르티노 비율과 같은 규칙입니다.
    pub fn calculate_downside_deviation(&self, returns: &[f64]) -> f64 {
        let ppy = self.config.periods_per_year();
        let period_rf = ratios::period_risk_free_rate(self.config.risk_free_rate, ppy);
        ratios::period_downside_deviation(returns, period_rf) * ppy.sqrt()
    }

    /// 샤프 비율. 빈 입력은 0.
    pub fn calculate_sharpe_ratio(&self, returns: &[f64]) -> f64 {
        ratios::sharpe_ratio(
            returns,
            self.config.risk_free_rate,
            self.config.periods_per_year(),
        )
    }

    /// 소르티노 비율. 빈 입력은 0.
    pub fn calculate_sortino_ratio(&self, returns: &[f64]) -> f64 {
        ratios::sortino_ratio(
            returns,
            self.config.risk_free_rate,
            self.config.periods_per_year(),
        )
    }

    /// 최대 낙폭을 비율로 계산합니다.
    ///
    /// 빈 시계열이나 하락이 없는 시계열은 0입니다.
    pub fn calculate_max_drawdown(values: &[f64]) -> f64 {
        let Some(&first) = values.first() else {
            return 0.0;
        };

        let mut peak = first;
        let mut max_drawdown: f64 = 0.0;

        for &value in values {
            // 새로운 고점 갱신
            if value > peak {
                peak = value;
            }

            if peak > 0.0 {
                let drawdown = (peak - value) / peak;
                max_drawdown = max_drawdown.max(drawdown);
            }
        }

        max_drawdown
    }

    /// 승률. SELL 거래만 대상으로 하며, SELL이 없으면 0.
    pub fn calculate_win_rate(trades: &[TradeRecord]) -> f64 {
        let stats = SellStats::from_trades(trades);
        if stats.count == 0 {
            return 0.0;
        }
        stats.winning as f64 / stats.count as f64
    }

    /// 프로핏 팩터 (총 수익 / 총 손실). SELL 거래만 대상입니다.
    ///
    /// - 손실 없이 수익만 있으면 `f64::INFINITY`
    /// - 거래가 없거나 수익/손실이 모두 0이면 1
    pub fn calculate_profit_factor(trades: &[TradeRecord]) -> f64 {
        let stats = SellStats::from_trades(trades);
        if stats.gross_loss == 0.0 {
            return if stats.gross_profit > 0.0 { f64::INFINITY } else { 1.0 };
        }
        stats.gross_profit / stats.gross_loss
    }

    /// 연율화 수익률 `(1 + 총 수익률)^(연간 기간 수 / 기간 수) - 1`.
    ///
    /// 기간 수가 0이면 0, 원금 전액 손실 이하이면 -1.
    pub fn calculate_annualized_return(&self, total_return: f64, period_count: usize) -> f64 {
        if period_count == 0 {
            return 0.0;
        }
        let growth = 1.0 + total_return;
        if growth <= 0.0 {
            return -1.0;
        }
        growth.powf(self.config.periods_per_year() / period_count as f64) - 1.0
    }

    /// 전체 지표를 계산합니다.
    pub fn calculate_metrics(&self, input: &MetricsInput) -> MetricsResult {
        let values = &input.portfolio_values;
        let Some(&final_value) = values.last() else {
            debug!(
                initial_capital = input.initial_capital,
                trades = input.trades.len(),
                "Empty portfolio series, returning neutral metrics"
            );
            return MetricsResult::neutral(input.initial_capital);
        };

        let returns = Self::calculate_returns(values);

        let total_return = if input.initial_capital == 0.0 {
            0.0
        } else {
            (final_value - input.initial_capital) / input.initial_capital
        };

        let sells = SellStats::from_trades(&input.trades);

        MetricsResult {
            total_return,
            annualized_return: self.calculate_annualized_return(total_return, returns.len()),
            volatility: self.calculate_volatility(&returns),
            downside_deviation: self.calculate_downside_deviation(&returns),
            sharpe_ratio: self.calculate_sharpe_ratio(&returns),
            sortino_ratio: self.calculate_sortino_ratio(&returns),
            max_drawdown: Self::calculate_max_drawdown(values),
            win_rate: Self::calculate_win_rate(&input.trades),
            profit_factor: Self::calculate_profit_factor(&input.trades),
            total_trades: input.trades.len(),
            winning_trades: sells.winning,
            losing_trades: sells.losing,
            final_value,
        }
    }
}

/// 주어진 설정으로 전체 지표를 계산합니다.
pub fn calculate_metrics(input: &MetricsInput, config: &MetricsConfig) -> MetricsResult {
    MetricsCalculator::new(*config).calculate_metrics(input)
}

/// SELL 거래 집계.
#[derive(Debug, Default)]
struct SellStats {
    count: usize,
    winning: usize,
    losing: usize,
    gross_profit: f64,
    gross_loss: f64,
}

impl SellStats {
    fn from_trades(trades: &[TradeRecord]) -> Self {
        trades
            .iter()
            .filter(|t| t.is_sell())
            .fold(Self::default(), |mut acc, t| {
                acc.count += 1;
                if t.realized_pnl > 0.0 {
                    acc.winning += 1;
                    acc.gross_profit += t.realized_pnl;
                } else if t.realized_pnl < 0.0 {
                    acc.losing += 1;
                    acc.gross_loss += -t.realized_pnl;
                }
                acc
            })
    }
}

/// 무한대/NaN을 문자열로 직렬화합니다. JSON은 비유한 실수를 표현하지 못합니다.
mod non_finite_f64 {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &f64, serializer: S) -> Result<S::Ok, S::Error> {
        if value.is_nan() {
            serializer.serialize_str("NaN")
        } else if value.is_infinite() {
            serializer.serialize_str(if *value > 0.0 { "Infinity" } else { "-Infinity" })
        } else {
            serializer.serialize_f64(*value)
        }
    }

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Repr {
        Number(f64),
        Text(String),
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
        match Repr::deserialize(deserializer)? {
            Repr::Number(v) => Ok(v),
            Repr::Text(s) => match s.as_str() {
                "Infinity" => Ok(f64::INFINITY),
                "-Infinity" => Ok(f64::NEG_INFINITY),
                "NaN" => Ok(f64::NAN),
                other => Err(serde::de::Error::custom(format!("invalid number: {other}"))),
            },
        }
    }
}

//! 백테스트 요청, 단계 산출물, 최종 리포트.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use trader_analytics::{MetricsConfig, MetricsResult, SimulationOutcome};
use trader_core::{Coin, MarketDataSet, ParsedMarketData, PipelineStage, ResolvedInstrumentSet, Timeframe};
use uuid::Uuid;

use crate::error::{PipelineError, Result};

/// 기본 라이브 조회 캔들 수.
pub const DEFAULT_LIVE_LIMIT: u32 = 500;

/// 거래소에서 직접 캔들을 가져오는 데이터 소스.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LiveSource {
    /// 거래쌍 심볼 (예: "BTC/USDT")
    pub symbol: String,
    /// 캔들 주기
    pub timeframe: Timeframe,
    /// 조회할 캔들 수
    #[serde(default = "default_live_limit")]
    pub limit: u32,
}

fn default_live_limit() -> u32 {
    DEFAULT_LIVE_LIMIT
}

/// 백테스트 요청.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BacktestRequest {
    /// 입력 데이터셋
    pub dataset: MarketDataSet,
    /// 시작 시각 (포함)
    #[serde(default)]
    pub start_date: Option<DateTime<Utc>>,
    /// 종료 시각 (포함)
    #[serde(default)]
    pub end_date: Option<DateTime<Utc>>,
    /// 초기 자본 (호가 통화 단위)
    #[serde(with = "rust_decimal::serde::str")]
    pub initial_capital: Decimal,
    /// 선호 호가 통화
    #[serde(default)]
    pub preferred_quote: Option<String>,
    /// 지정 시 오브젝트 스토리지 대신 거래소에서 조회
    #[serde(default)]
    pub live_source: Option<LiveSource>,
    /// 지표 계산 설정
    #[serde(default)]
    pub metrics: MetricsConfig,
    /// 시뮬레이터 파라미터
    #[serde(default)]
    pub strategy_parameters: serde_json::Value,
}

impl BacktestRequest {
    pub fn new(dataset: MarketDataSet, initial_capital: Decimal) -> Self {
        Self {
            dataset,
            start_date: None,
            end_date: None,
            initial_capital,
            preferred_quote: None,
            live_source: None,
            metrics: MetricsConfig::default(),
            strategy_parameters: serde_json::Value::Null,
        }
    }

    pub fn with_date_range(
        mut self,
        start: Option<DateTime<Utc>>,
        end: Option<DateTime<Utc>>,
    ) -> Self {
        self.start_date = start;
        self.end_date = end;
        self
    }

    pub fn with_preferred_quote(mut self, quote: impl Into<String>) -> Self {
        self.preferred_quote = Some(quote.into());
        self
    }

    pub fn with_live_source(mut self, source: LiveSource) -> Self {
        self.live_source = Some(source);
        self
    }

    pub fn with_metrics(mut self, metrics: MetricsConfig) -> Self {
        self.metrics = metrics;
        self
    }

    pub fn with_parameters(mut self, parameters: serde_json::Value) -> Self {
        self.strategy_parameters = parameters;
        self
    }

    /// 제출 전 요청을 검증합니다.
    pub fn validate(&self) -> Result<()> {
        if self.initial_capital <= Decimal::ZERO {
            return Err(PipelineError::InvalidRequest(format!(
                "initial_capital must be positive: {}",
                self.initial_capital
            )));
        }
        if let (Some(start), Some(end)) = (self.start_date, self.end_date) {
            if start > end {
                return Err(PipelineError::InvalidRequest(format!(
                    "start_date {start} is after end_date {end}"
                )));
            }
        }
        if self.dataset.instrument_universe.is_empty() {
            return Err(PipelineError::InvalidRequest(
                "instrument universe is empty".to_string(),
            ));
        }
        Ok(())
    }
}

/// 단계 하나의 직렬화된 산출물.
///
/// `(pipeline_id, stage)` 단위로 저장되어 다른 워커가 다음 단계를 이어받습니다.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StageArtifact {
    /// LOAD: 캔들 시퀀스
    Loaded { market_data: ParsedMarketData },
    /// RESOLVE: 정규 종목과 호가 통화
    Resolved {
        instruments: ResolvedInstrumentSet,
        quote: Coin,
    },
    /// SIMULATE: 포트폴리오 가치와 거래 원장
    Simulated { outcome: SimulationOutcome },
    /// SCORE: 지표
    Scored { metrics: MetricsResult },
}

impl StageArtifact {
    /// 이 산출물을 만드는 단계.
    pub fn stage(&self) -> PipelineStage {
        match self {
            StageArtifact::Loaded { .. } => PipelineStage::Load,
            StageArtifact::Resolved { .. } => PipelineStage::Resolve,
            StageArtifact::Simulated { .. } => PipelineStage::Simulate,
            StageArtifact::Scored { .. } => PipelineStage::Score,
        }
    }
}

/// COMPLETED 시점에 한 번 기록되는 요약 리포트.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineReport {
    pub pipeline_id: Uuid,
    pub metrics: MetricsResult,
    pub coins: Vec<Coin>,
    pub quote_currency: Coin,
    pub candle_count: usize,
    pub warnings: Vec<String>,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn dataset() -> MarketDataSet {
        MarketDataSet::new("prices/btc.csv").with_universe(["BTC"])
    }

    #[test]
    fn test_validate_rejects_non_positive_capital() {
        let request = BacktestRequest::new(dataset(), dec!(0));
        assert!(matches!(
            request.validate(),
            Err(PipelineError::InvalidRequest(_))
        ));
    }

    #[test]
    fn test_validate_rejects_inverted_range() {
        let start = Utc::now();
        let end = start - chrono::Duration::days(1);
        let request = BacktestRequest::new(dataset(), dec!(1000)).with_date_range(Some(start), Some(end));
        assert!(request.validate().is_err());
    }

    #[test]
    fn test_request_json_defaults() {
        let request: BacktestRequest = serde_json::from_value(serde_json::json!({
            "dataset": { "storage_location": "s3://market-data/btc.csv", "instrument_universe": ["BTC"] },
            "initial_capital": "10000"
        }))
        .unwrap();

        assert_eq!(request.initial_capital, dec!(10000));
        assert_eq!(request.dataset.max_instruments, 50);
        assert!(request.live_source.is_none());
        assert!(request.strategy_parameters.is_null());
        assert!(request.validate().is_ok());
    }

    #[test]
    fn test_artifact_tagging() {
        let artifact = StageArtifact::Loaded {
            market_data: ParsedMarketData::from_candles(vec![], "test"),
        };
        let json = serde_json::to_value(&artifact).unwrap();
        assert_eq!(json["kind"], "loaded");
        assert_eq!(artifact.stage(), PipelineStage::Load);

        let back: StageArtifact = serde_json::from_value(json).unwrap();
        assert_eq!(back.stage(), PipelineStage::Load);
    }
}

//! 단계별 실행기.
//!
//! 각 단계는 이전 단계의 산출물을 저장소에서 읽고 자기 산출물을 저장합니다.
//! 같은 파이프라인의 단계가 서로 다른 워커에서 실행되어도 동작합니다.

use std::sync::Arc;

use chrono::Utc;
use rust_decimal::prelude::ToPrimitive;
use tracing::{debug, info, warn};
use trader_analytics::{calculate_metrics, MetricsInput, SimulationRequest, Simulator};
use trader_core::{Coin, ParsedMarketData, PipelineStage, ResolvedInstrumentSet};
use trader_data::{InstrumentResolver, MarketDataReader};
use trader_exchange::{ExchangeError, MultiExchangeFetcher};
use uuid::Uuid;

use crate::error::{PipelineError, Result};
use crate::model::{BacktestRequest, LiveSource, PipelineReport, StageArtifact};
use crate::store::PipelineStore;

/// 단계 실행에 필요한 구성 요소 묶음.
pub struct StageRunner {
    reader: Arc<MarketDataReader>,
    resolver: Arc<InstrumentResolver>,
    simulator: Arc<dyn Simulator>,
    exchanges: Option<Arc<MultiExchangeFetcher>>,
    store: Arc<dyn PipelineStore>,
}

impl StageRunner {
    pub fn new(
        reader: Arc<MarketDataReader>,
        resolver: Arc<InstrumentResolver>,
        simulator: Arc<dyn Simulator>,
        store: Arc<dyn PipelineStore>,
    ) -> Self {
        Self {
            reader,
            resolver,
            simulator,
            exchanges: None,
            store,
        }
    }

    /// 라이브 데이터 소스용 거래소 조회기를 설정합니다.
    pub fn with_exchanges(mut self, exchanges: Arc<MultiExchangeFetcher>) -> Self {
        self.exchanges = Some(exchanges);
        self
    }

    /// 단계 하나를 실행합니다.
    pub async fn run(
        &self,
        pipeline_id: Uuid,
        stage: PipelineStage,
        request: &BacktestRequest,
    ) -> Result<()> {
        match stage {
            PipelineStage::Load => self.load(pipeline_id, request).await,
            PipelineStage::Resolve => self.resolve(pipeline_id, request).await,
            PipelineStage::Simulate => self.simulate(pipeline_id, request).await,
            PipelineStage::Score => self.score(pipeline_id, request).await,
            PipelineStage::Report => self.report(pipeline_id).await,
        }
    }

    async fn load(&self, pipeline_id: Uuid, request: &BacktestRequest) -> Result<()> {
        let market_data = match &request.live_source {
            Some(source) => self.fetch_live(source, request).await?,
            None => {
                self.reader
                    .read_market_data(&request.dataset, request.start_date, request.end_date)
                    .await?
            }
        };

        info!(
            pipeline_id = %pipeline_id,
            source = %market_data.source,
            candles = market_data.record_count,
            skipped_rows = market_data.skipped_rows,
            "시장 데이터 로드 완료"
        );

        self.store
            .save_artifact(pipeline_id, &StageArtifact::Loaded { market_data })
            .await
    }

    async fn fetch_live(
        &self,
        source: &LiveSource,
        request: &BacktestRequest,
    ) -> Result<ParsedMarketData> {
        let exchanges = self
            .exchanges
            .as_ref()
            .ok_or(ExchangeError::NoExchangeConfigured)?;

        let candles = exchanges
            .fetch_ohlcv(&source.symbol, source.timeframe, source.limit)
            .await?;

        let candles = candles
            .into_iter()
            .filter(|c| request.start_date.map_or(true, |start| c.timestamp >= start))
            .filter(|c| request.end_date.map_or(true, |end| c.timestamp <= end))
            .collect();

        Ok(ParsedMarketData::from_candles(
            candles,
            format!("live:{}", source.symbol),
        ))
    }

    async fn resolve(&self, pipeline_id: Uuid, request: &BacktestRequest) -> Result<()> {
        let instruments = self.resolver.resolve_coins(&request.dataset).await?;
        let quote = self
            .resolver
            .resolve_quote_currency(request.preferred_quote.as_deref(), None)
            .await?;

        for warning in &instruments.warnings {
            warn!(pipeline_id = %pipeline_id, warning = %warning, "종목 해석 경고");
        }
        info!(
            pipeline_id = %pipeline_id,
            coins = instruments.coins.len(),
            quote = %quote.symbol,
            "종목 해석 완료"
        );

        self.store
            .save_artifact(pipeline_id, &StageArtifact::Resolved { instruments, quote })
            .await
    }

    async fn simulate(&self, pipeline_id: Uuid, request: &BacktestRequest) -> Result<()> {
        let market_data = self.loaded(pipeline_id).await?;
        let (instruments, quote) = self.resolved(pipeline_id).await?;

        let outcome = self
            .simulator
            .simulate(SimulationRequest {
                candles: &market_data.data,
                coins: &instruments.coins,
                quote: &quote,
                initial_capital: request.initial_capital,
                parameters: &request.strategy_parameters,
            })
            .await?;

        info!(
            pipeline_id = %pipeline_id,
            simulator = self.simulator.name(),
            points = outcome.portfolio_values.len(),
            trades = outcome.trades.len(),
            "시뮬레이션 완료"
        );

        self.store
            .save_artifact(pipeline_id, &StageArtifact::Simulated { outcome })
            .await
    }

    async fn score(&self, pipeline_id: Uuid, request: &BacktestRequest) -> Result<()> {
        let outcome = match self.artifact(pipeline_id, PipelineStage::Simulate).await? {
            StageArtifact::Simulated { outcome } => outcome,
            _ => return Err(missing(pipeline_id, PipelineStage::Simulate)),
        };

        let input = MetricsInput {
            portfolio_values: outcome.portfolio_values,
            initial_capital: request.initial_capital.to_f64().unwrap_or(0.0),
            trades: outcome.trades,
        };
        let metrics = calculate_metrics(&input, &request.metrics);

        debug!(
            pipeline_id = %pipeline_id,
            total_return = metrics.total_return,
            sharpe = metrics.sharpe_ratio,
            max_drawdown = metrics.max_drawdown,
            "지표 계산 완료"
        );

        self.store
            .save_artifact(pipeline_id, &StageArtifact::Scored { metrics })
            .await
    }

    async fn report(&self, pipeline_id: Uuid) -> Result<()> {
        let metrics = match self.artifact(pipeline_id, PipelineStage::Score).await? {
            StageArtifact::Scored { metrics } => metrics,
            _ => return Err(missing(pipeline_id, PipelineStage::Score)),
        };
        let market_data = self.loaded(pipeline_id).await?;
        let (instruments, quote) = self.resolved(pipeline_id).await?;

        let report = PipelineReport {
            pipeline_id,
            metrics,
            coins: instruments.coins,
            quote_currency: quote,
            candle_count: market_data.record_count,
            warnings: instruments.warnings,
            created_at: Utc::now(),
        };

        self.store.save_report(&report).await?;
        info!(pipeline_id = %pipeline_id, "리포트 저장 완료");
        Ok(())
    }

    async fn artifact(&self, pipeline_id: Uuid, stage: PipelineStage) -> Result<StageArtifact> {
        self.store
            .load_artifact(pipeline_id, stage)
            .await?
            .ok_or_else(|| missing(pipeline_id, stage))
    }

    async fn loaded(&self, pipeline_id: Uuid) -> Result<ParsedMarketData> {
        match self.artifact(pipeline_id, PipelineStage::Load).await? {
            StageArtifact::Loaded { market_data } => Ok(market_data),
            _ => Err(missing(pipeline_id, PipelineStage::Load)),
        }
    }

    async fn resolved(&self, pipeline_id: Uuid) -> Result<(ResolvedInstrumentSet, Coin)> {
        match self.artifact(pipeline_id, PipelineStage::Resolve).await? {
            StageArtifact::Resolved { instruments, quote } => Ok((instruments, quote)),
            _ => Err(missing(pipeline_id, PipelineStage::Resolve)),
        }
    }
}

fn missing(pipeline_id: Uuid, stage: PipelineStage) -> PipelineError {
    PipelineError::MissingArtifact { pipeline_id, stage }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::InMemoryPipelineStore;
    use rust_decimal_macros::dec;
    use trader_analytics::BuyAndHoldSimulator;
    use trader_core::MarketDataSet;
    use trader_data::{InMemoryCoinCatalog, InMemoryObjectStorage, ReaderConfig};

    const CSV: &str = "timestamp,close\n\
        2024-01-01,100\n\
        2024-01-02,110\n\
        2024-01-03,105\n\
        2024-01-04,115\n";

    fn runner(store: Arc<InMemoryPipelineStore>) -> StageRunner {
        let storage = Arc::new(InMemoryObjectStorage::new());
        storage.insert("btc.csv", CSV);
        let reader = MarketDataReader::new(storage, ReaderConfig::default());
        let catalog = InMemoryCoinCatalog::new(vec![
            Coin::new("bitcoin", "BTC", "Bitcoin"),
            Coin::new("tether", "USDT", "Tether"),
        ]);
        let resolver = InstrumentResolver::new(Arc::new(catalog));
        StageRunner::new(
            Arc::new(reader),
            Arc::new(resolver),
            Arc::new(BuyAndHoldSimulator::new()),
            store,
        )
    }

    fn request() -> BacktestRequest {
        BacktestRequest::new(
            MarketDataSet::new("market-data/btc.csv").with_universe(["BTC"]),
            dec!(1000),
        )
    }

    #[tokio::test]
    async fn test_stages_chain_through_artifacts() {
        let store = Arc::new(InMemoryPipelineStore::new());
        let runner = runner(store.clone());
        let request = request();
        let pipeline = store.create(&request).await.unwrap();

        for stage in PipelineStage::ALL {
            runner.run(pipeline.id, stage, &request).await.unwrap();
        }

        let report = store.get_report(pipeline.id).await.unwrap().unwrap();
        assert_eq!(report.candle_count, 4);
        assert_eq!(report.coins[0].id, "bitcoin");
        assert_eq!(report.quote_currency.symbol, "USDT");
        assert!((report.metrics.total_return - 0.15).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_simulate_without_load_reports_missing_artifact() {
        let store = Arc::new(InMemoryPipelineStore::new());
        let runner = runner(store.clone());
        let request = request();
        let pipeline = store.create(&request).await.unwrap();

        let err = runner
            .run(pipeline.id, PipelineStage::Simulate, &request)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            PipelineError::MissingArtifact {
                stage: PipelineStage::Load,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_live_source_without_exchanges_fails() {
        let store = Arc::new(InMemoryPipelineStore::new());
        let runner = runner(store.clone());
        let request = request().with_live_source(LiveSource {
            symbol: "BTC/USDT".to_string(),
            timeframe: trader_core::Timeframe::D1,
            limit: 10,
        });
        let pipeline = store.create(&request).await.unwrap();

        let err = runner
            .run(pipeline.id, PipelineStage::Load, &request)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            PipelineError::Exchange(ExchangeError::NoExchangeConfigured)
        ));
    }
}

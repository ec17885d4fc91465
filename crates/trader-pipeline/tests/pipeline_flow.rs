//! 파이프라인 전체 흐름 통합 테스트.
//!
//! 인메모리 스토리지, 카탈로그, 저장소로 런타임을 조립하여 제출부터 리포트까지
//! 검증합니다.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use mockito::Matcher;
use rust_decimal_macros::dec;
use trader_analytics::BuyAndHoldSimulator;
use trader_core::{
    AppConfig, Coin, MarketDataSet, Pipeline, PipelineStage, PipelineStatus, StageJob, Timeframe,
};
use trader_data::{
    InMemoryCoinCatalog, InMemoryObjectStorage, InstrumentResolver, MarketDataReader, ReaderConfig,
};
use trader_exchange::ExchangeClient;
use trader_pipeline::{
    exchanges_from_config, BacktestRequest, InMemoryPipelineStore, JobId, JobOptions, LiveSource,
    Orchestrator, PipelineError, PipelineReport, PipelineRuntime, PipelineStore, RuntimeComponents,
    StageArtifact, StageOutcome, StageProcessor, StageRunner, TaskQueue,
};
use uuid::Uuid;

const BTC_CSV: &str = "timestamp,open,high,low,close,volume\n\
    2024-01-01,100,101,99,100,10\n\
    2024-01-02,100,111,99,110,12\n\
    2024-01-03,110,112,104,105,9\n\
    2024-01-04,105,116,104,115,14\n";

fn config() -> AppConfig {
    let mut config = AppConfig::default();
    config.pipeline.backoff_ms = 10;
    config.pipeline.concurrency = 2;
    config
}

fn storage() -> Arc<InMemoryObjectStorage> {
    let storage = Arc::new(InMemoryObjectStorage::new());
    storage.insert("crypto/btc.csv", BTC_CSV);
    storage
}

fn catalog() -> Arc<InMemoryCoinCatalog> {
    Arc::new(InMemoryCoinCatalog::new(vec![
        Coin::new("bitcoin", "BTC", "Bitcoin"),
        Coin::new("tether", "USDT", "Tether"),
        Coin::new("usd-coin", "USDC", "USD Coin"),
    ]))
}

fn runtime_with_store(
    config: &AppConfig,
    store: Arc<dyn PipelineStore>,
    exchanges: Vec<Arc<dyn ExchangeClient>>,
) -> PipelineRuntime {
    PipelineRuntime::build(
        config,
        RuntimeComponents {
            storage: storage(),
            catalog: catalog(),
            store,
            exchanges,
        },
    )
}

fn runtime_with(config: &AppConfig, exchanges: Vec<Arc<dyn ExchangeClient>>) -> PipelineRuntime {
    runtime_with_store(config, Arc::new(InMemoryPipelineStore::new()), exchanges)
}

/// 리포트를 저장하는 순간 파이프라인을 취소시키는 저장소.
///
/// REPORT 단계 실행 중에 취소 요청이 들어온 상황을 재현합니다.
struct CancelOnReportStore {
    inner: InMemoryPipelineStore,
}

#[async_trait]
impl PipelineStore for CancelOnReportStore {
    async fn create(&self, request: &BacktestRequest) -> trader_pipeline::Result<Pipeline> {
        self.inner.create(request).await
    }

    async fn get(&self, id: Uuid) -> trader_pipeline::Result<Option<Pipeline>> {
        self.inner.get(id).await
    }

    async fn list(
        &self,
        status: Option<PipelineStatus>,
        limit: usize,
    ) -> trader_pipeline::Result<Vec<Pipeline>> {
        self.inner.list(status, limit).await
    }

    async fn get_request(&self, id: Uuid) -> trader_pipeline::Result<Option<BacktestRequest>> {
        self.inner.get_request(id).await
    }

    async fn transition(
        &self,
        id: Uuid,
        to: PipelineStatus,
        failure_reason: Option<String>,
    ) -> trader_pipeline::Result<bool> {
        self.inner.transition(id, to, failure_reason).await
    }

    async fn advance_stage(
        &self,
        id: Uuid,
        from: PipelineStage,
        to: PipelineStage,
    ) -> trader_pipeline::Result<bool> {
        self.inner.advance_stage(id, from, to).await
    }

    async fn save_artifact(&self, id: Uuid, artifact: &StageArtifact) -> trader_pipeline::Result<()> {
        self.inner.save_artifact(id, artifact).await
    }

    async fn load_artifact(
        &self,
        id: Uuid,
        stage: PipelineStage,
    ) -> trader_pipeline::Result<Option<StageArtifact>> {
        self.inner.load_artifact(id, stage).await
    }

    async fn save_report(&self, report: &PipelineReport) -> trader_pipeline::Result<()> {
        self.inner
            .transition(report.pipeline_id, PipelineStatus::Cancelled, None)
            .await?;
        self.inner.save_report(report).await
    }

    async fn get_report(&self, id: Uuid) -> trader_pipeline::Result<Option<PipelineReport>> {
        self.inner.get_report(id).await
    }
}

/// 처음 `accept`개 작업만 받고 이후 등록은 거부하는 큐.
struct LimitedQueue {
    accept: usize,
    jobs: Mutex<Vec<StageJob>>,
}

#[async_trait]
impl TaskQueue for LimitedQueue {
    async fn enqueue(&self, job: StageJob, _options: JobOptions) -> trader_pipeline::Result<JobId> {
        let mut jobs = self.jobs.lock().unwrap();
        if jobs.len() >= self.accept {
            return Err(PipelineError::Queue("broker unreachable".to_string()));
        }
        jobs.push(job);
        Ok(jobs.len() as JobId)
    }
}

fn runtime() -> PipelineRuntime {
    runtime_with(&config(), Vec::new())
}

fn btc_request() -> BacktestRequest {
    BacktestRequest::new(
        MarketDataSet::new("s3://market-data/crypto/btc.csv").with_universe(["BTC"]),
        dec!(1000),
    )
}

#[tokio::test]
async fn test_backtest_runs_to_completion() {
    let runtime = runtime();
    runtime.start();

    let pipeline = runtime.run_to_completion(btc_request()).await.unwrap();
    assert_eq!(pipeline.status, PipelineStatus::Completed);
    assert_eq!(pipeline.current_stage, PipelineStage::Report);
    assert!(pipeline.completed_at.is_some());

    let report = runtime
        .orchestrator()
        .report(pipeline.id)
        .await
        .unwrap()
        .expect("report written at completion");
    assert_eq!(report.candle_count, 4);
    assert_eq!(report.quote_currency.id, "tether");
    assert!((report.metrics.total_return - 0.15).abs() < 1e-9);
    assert!((report.metrics.max_drawdown - 5.0 / 110.0).abs() < 1e-9);
    assert!((report.metrics.final_value - 1150.0).abs() < 1e-9);
    assert_eq!(report.metrics.total_trades, 2);

    runtime.shutdown().await;
}

#[tokio::test]
async fn test_stale_job_is_skipped_without_mutation() {
    let runtime = runtime();
    // 워커 없이 처리기를 직접 호출
    let pipeline = runtime.orchestrator().submit(btc_request()).await.unwrap();
    let processor = runtime.processor();

    let outcome = processor
        .process(&StageJob::new(pipeline.id, PipelineStage::Simulate))
        .await
        .unwrap();
    assert_eq!(outcome, StageOutcome::Skipped);

    let after = runtime.orchestrator().find(pipeline.id).await.unwrap();
    assert_eq!(after.current_stage, PipelineStage::Load);
    assert_eq!(after.status, PipelineStatus::Running);
    assert_eq!(after.updated_at, pipeline.updated_at);

    let outcome = processor
        .process(&StageJob::new(pipeline.id, PipelineStage::Load))
        .await
        .unwrap();
    assert_eq!(outcome, StageOutcome::Advanced(PipelineStage::Resolve));

    // 같은 LOAD 작업이 중복 전달되어도 건너뜀
    let outcome = processor
        .process(&StageJob::new(pipeline.id, PipelineStage::Load))
        .await
        .unwrap();
    assert_eq!(outcome, StageOutcome::Skipped);
}

#[tokio::test]
async fn test_cancelled_pipeline_stops_advancing() {
    let runtime = runtime();
    let orchestrator = runtime.orchestrator();
    let processor = runtime.processor();
    let pipeline = orchestrator.submit(btc_request()).await.unwrap();

    let outcome = processor
        .process(&StageJob::new(pipeline.id, PipelineStage::Load))
        .await
        .unwrap();
    assert_eq!(outcome, StageOutcome::Advanced(PipelineStage::Resolve));

    assert!(orchestrator.cancel(pipeline.id).await.unwrap());

    let outcome = processor
        .process(&StageJob::new(pipeline.id, PipelineStage::Resolve))
        .await
        .unwrap();
    assert_eq!(outcome, StageOutcome::Skipped);

    let after = orchestrator.find(pipeline.id).await.unwrap();
    assert_eq!(after.status, PipelineStatus::Cancelled);
    assert_eq!(after.current_stage, PipelineStage::Resolve);
    assert!(orchestrator.report(pipeline.id).await.unwrap().is_none());
}

#[tokio::test]
async fn test_missing_pipeline_job_is_dropped() {
    let runtime = runtime();
    let outcome = runtime
        .processor()
        .process(&StageJob::new(Uuid::new_v4(), PipelineStage::Load))
        .await
        .unwrap();
    assert_eq!(outcome, StageOutcome::Dropped);
}

#[tokio::test]
async fn test_stage_failure_marks_pipeline_failed() {
    let runtime = runtime();
    runtime.start();

    let request = BacktestRequest::new(
        MarketDataSet::new("crypto/missing.csv").with_universe(["BTC"]),
        dec!(1000),
    );
    let pipeline = runtime.run_to_completion(request).await.unwrap();

    assert_eq!(pipeline.status, PipelineStatus::Failed);
    assert_eq!(pipeline.current_stage, PipelineStage::Load);
    assert!(pipeline.completed_at.is_some());
    let reason = pipeline.failure_reason.unwrap();
    assert!(reason.starts_with("LOAD:"), "reason: {reason}");
    assert!(reason.contains("missing.csv"), "reason: {reason}");

    // 재시도된 작업은 FAILED 파이프라인을 보고 건너뛰므로 큐에 실패 기록이 남지 않음
    let stats = runtime.queue().stats();
    assert_eq!(stats.retried, 1);
    assert_eq!(stats.failed, 0);

    runtime.shutdown().await;
}

#[tokio::test]
async fn test_unknown_preferred_quote_falls_back() {
    let runtime = runtime();
    runtime.start();

    let pipeline = runtime
        .run_to_completion(btc_request().with_preferred_quote("EUR"))
        .await
        .unwrap();
    // EUR이 없어도 대체 순서의 USDT로 해석됨
    assert_eq!(pipeline.status, PipelineStatus::Completed);

    let report = runtime
        .orchestrator()
        .report(pipeline.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(report.quote_currency.symbol, "USDT");

    runtime.shutdown().await;
}

#[tokio::test]
async fn test_live_source_fetches_from_exchange() {
    let mut server = mockito::Server::new_async().await;
    let _klines = server
        .mock("GET", "/api/v3/klines")
        .match_query(Matcher::AllOf(vec![
            Matcher::UrlEncoded("symbol".into(), "BTCUSDT".into()),
            Matcher::UrlEncoded("interval".into(), "1d".into()),
        ]))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(
            r#"[
                [1704067200000,"100","101","99","100","10",1704153599999,"0",5,"0","0","0"],
                [1704153600000,"100","121","99","120","10",1704239999999,"0",5,"0","0","0"]
            ]"#,
        )
        .create_async()
        .await;

    let mut config = config();
    config.exchanges = vec![trader_core::ExchangeConfig {
        name: "binance".to_string(),
        enabled: true,
        rest_base_url: server.url(),
        timeout_secs: 5,
    }];
    let exchanges = exchanges_from_config(&config.exchanges).unwrap();
    let runtime = runtime_with(&config, exchanges);
    runtime.start();

    let request = BacktestRequest::new(MarketDataSet::default().with_universe(["BTC"]), dec!(1000))
        .with_live_source(LiveSource {
            symbol: "BTC/USDT".to_string(),
            timeframe: Timeframe::D1,
            limit: 2,
        });
    let pipeline = runtime.run_to_completion(request).await.unwrap();
    assert_eq!(pipeline.status, PipelineStatus::Completed);

    let report = runtime
        .orchestrator()
        .report(pipeline.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(report.candle_count, 2);
    assert!((report.metrics.total_return - 0.2).abs() < 1e-9);
    assert_eq!(
        runtime.breaker().get_state("exchange:binance"),
        trader_exchange::CircuitState::Closed
    );

    runtime.shutdown().await;
}

#[tokio::test]
async fn test_cancel_during_report_stage_hides_report() {
    let store = Arc::new(CancelOnReportStore {
        inner: InMemoryPipelineStore::new(),
    });
    let runtime = runtime_with_store(&config(), store, Vec::new());
    runtime.start();

    let pipeline = runtime.run_to_completion(btc_request()).await.unwrap();
    assert_eq!(pipeline.status, PipelineStatus::Cancelled);
    assert_eq!(pipeline.current_stage, PipelineStage::Report);
    assert!(runtime.orchestrator().report(pipeline.id).await.unwrap().is_none());

    runtime.shutdown().await;
}

#[tokio::test]
async fn test_enqueue_failure_after_advance_fails_pipeline() {
    let store: Arc<dyn PipelineStore> = Arc::new(InMemoryPipelineStore::new());
    let queue = Arc::new(LimitedQueue {
        accept: 1,
        jobs: Mutex::new(Vec::new()),
    });
    let orchestrator = Arc::new(Orchestrator::new(Arc::clone(&store), queue.clone()));
    let runner = StageRunner::new(
        Arc::new(MarketDataReader::new(storage(), ReaderConfig::default())),
        Arc::new(InstrumentResolver::new(catalog())),
        Arc::new(BuyAndHoldSimulator::new()),
        Arc::clone(&store),
    );
    let processor = StageProcessor::new(Arc::clone(&orchestrator), runner);

    let pipeline = orchestrator.submit(btc_request()).await.unwrap();
    let load = StageJob::new(pipeline.id, PipelineStage::Load);

    // LOAD는 성공했지만 RESOLVE 작업 등록이 거부됨
    let err = processor.process(&load).await.unwrap_err();
    assert!(matches!(err, PipelineError::Queue(_)));

    let failed = orchestrator.find(pipeline.id).await.unwrap();
    assert_eq!(failed.status, PipelineStatus::Failed);
    assert_eq!(failed.current_stage, PipelineStage::Resolve);
    assert!(failed.completed_at.is_some());
    assert!(failed
        .failure_reason
        .as_deref()
        .unwrap()
        .starts_with("RESOLVE:"));

    // 큐가 LOAD 작업을 재시도해도 종료 상태는 그대로
    assert_eq!(processor.process(&load).await.unwrap(), StageOutcome::Skipped);
    assert_eq!(
        orchestrator.find(pipeline.id).await.unwrap().status,
        PipelineStatus::Failed
    );
    assert_eq!(queue.jobs.lock().unwrap().len(), 1);
}

//! 설정으로부터 파이프라인 구성 요소를 조립합니다.

use std::path::Path;
use std::sync::Arc;

use sqlx::postgres::PgPoolOptions;
use tracing::{info, warn};
use trader_analytics::BuyAndHoldSimulator;
use trader_core::{AppConfig, ExchangeConfig, Pipeline};
use trader_data::{
    CoinCatalog, InMemoryCoinCatalog, InstrumentResolver, LocalObjectStorage, MarketDataReader,
    ObjectStorage, PgCoinCatalog, ReaderConfig,
};
use trader_exchange::{
    BinanceClient, BinanceConfig, CircuitBreaker, CircuitBreakerConfig, ExchangeClient,
    MultiExchangeFetcher,
};

use crate::error::Result;
use crate::model::BacktestRequest;
use crate::orchestrator::Orchestrator;
use crate::pg_store::PgPipelineStore;
use crate::processor::StageProcessor;
use crate::queue::{JobOptions, LocalTaskQueue};
use crate::store::{InMemoryPipelineStore, PipelineStore};

/// 외부 의존 구성 요소.
pub struct RuntimeComponents {
    pub storage: Arc<dyn ObjectStorage>,
    pub catalog: Arc<dyn CoinCatalog>,
    pub store: Arc<dyn PipelineStore>,
    pub exchanges: Vec<Arc<dyn ExchangeClient>>,
}

/// 조립된 파이프라인 실행 환경.
pub struct PipelineRuntime {
    orchestrator: Arc<Orchestrator>,
    processor: Arc<StageProcessor>,
    queue: LocalTaskQueue,
    breaker: Arc<CircuitBreaker>,
    concurrency: usize,
}

impl PipelineRuntime {
    pub fn build(config: &AppConfig, components: RuntimeComponents) -> Self {
        let RuntimeComponents {
            storage,
            catalog,
            store,
            exchanges,
        } = components;

        let queue = LocalTaskQueue::new();
        let orchestrator = Arc::new(
            Orchestrator::new(Arc::clone(&store), Arc::new(queue.clone()))
                .with_job_options(JobOptions::from(&config.pipeline)),
        );

        let reader = MarketDataReader::new(storage, ReaderConfig::from(&config.storage));
        let resolver = InstrumentResolver::new(catalog)
            .with_quote_fallback_chain(config.resolver.quote_fallback_chain.clone());
        let breaker = Arc::new(CircuitBreaker::new(CircuitBreakerConfig::from(
            &config.circuit_breaker,
        )));

        let mut runner = crate::stages::StageRunner::new(
            Arc::new(reader),
            Arc::new(resolver),
            Arc::new(BuyAndHoldSimulator::new()),
            store,
        );
        if !exchanges.is_empty() {
            runner = runner.with_exchanges(Arc::new(MultiExchangeFetcher::new(
                exchanges,
                Arc::clone(&breaker),
            )));
        }

        let processor = Arc::new(StageProcessor::new(Arc::clone(&orchestrator), runner));

        Self {
            orchestrator,
            processor,
            queue,
            breaker,
            concurrency: config.pipeline.concurrency,
        }
    }

    /// 설정에 따라 저장소와 카탈로그를 연결합니다.
    ///
    /// `database.url`이 있으면 PostgreSQL, 없으면 인메모리 저장소와
    /// `coins_file`(JSON) 카탈로그를 사용합니다.
    pub async fn connect(config: &AppConfig, coins_file: Option<&Path>) -> Result<Self> {
        let storage: Arc<dyn ObjectStorage> =
            Arc::new(LocalObjectStorage::from_config(&config.storage));
        let exchanges = exchanges_from_config(&config.exchanges)?;

        let (catalog, store): (Arc<dyn CoinCatalog>, Arc<dyn PipelineStore>) =
            match &config.database.url {
                Some(url) => {
                    let pool = PgPoolOptions::new()
                        .max_connections(config.database.max_connections)
                        .connect(url)
                        .await?;
                    let store = PgPipelineStore::new(pool.clone());
                    store.ensure_schema().await?;
                    info!("PostgreSQL 저장소 연결");
                    (Arc::new(PgCoinCatalog::new(pool)), Arc::new(store))
                }
                None => {
                    let catalog = match coins_file {
                        Some(path) => InMemoryCoinCatalog::from_json_file(path).await?,
                        None => {
                            warn!("코인 카탈로그 파일이 없어 빈 카탈로그 사용");
                            InMemoryCoinCatalog::new(Vec::new())
                        }
                    };
                    info!(coins = catalog.len(), "인메모리 저장소 사용");
                    (Arc::new(catalog), Arc::new(InMemoryPipelineStore::new()))
                }
            };

        Ok(Self::build(
            config,
            RuntimeComponents {
                storage,
                catalog,
                store,
                exchanges,
            },
        ))
    }

    /// 큐 워커를 시작합니다.
    pub fn start(&self) {
        let handler = Arc::clone(&self.processor);
        self.queue.start(handler, self.concurrency);
    }

    pub fn orchestrator(&self) -> &Arc<Orchestrator> {
        &self.orchestrator
    }

    pub fn processor(&self) -> &Arc<StageProcessor> {
        &self.processor
    }

    pub fn queue(&self) -> &LocalTaskQueue {
        &self.queue
    }

    pub fn breaker(&self) -> &Arc<CircuitBreaker> {
        &self.breaker
    }

    /// 제출하고 큐가 빌 때까지 기다린 뒤 최종 파이프라인을 반환합니다.
    pub async fn run_to_completion(&self, request: BacktestRequest) -> Result<Pipeline> {
        let pipeline = self.orchestrator.submit(request).await?;
        self.queue.wait_idle().await;
        self.orchestrator.find(pipeline.id).await
    }

    pub async fn shutdown(&self) {
        self.queue.shutdown().await;
    }
}

/// 활성화된 거래소 설정으로 클라이언트를 만듭니다. 지원하지 않는 거래소는 건너뜁니다.
pub fn exchanges_from_config(configs: &[ExchangeConfig]) -> Result<Vec<Arc<dyn ExchangeClient>>> {
    let mut exchanges: Vec<Arc<dyn ExchangeClient>> = Vec::new();
    for cfg in configs.iter().filter(|c| c.enabled) {
        match cfg.name.to_lowercase().as_str() {
            "binance" => {
                let client = BinanceClient::new(BinanceConfig::from(cfg))?;
                exchanges.push(Arc::new(client));
            }
            other => warn!(exchange = other, "지원하지 않는 거래소, 건너뜀"),
        }
    }
    Ok(exchanges)
}

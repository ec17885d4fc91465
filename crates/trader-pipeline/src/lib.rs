//! 백테스트 파이프라인.
//!
//! 백테스트 요청을 `LOAD -> RESOLVE -> SIMULATE -> SCORE -> REPORT` 단계 작업으로
//! 나누어 작업 큐로 실행합니다.
//!
//! - [`Orchestrator`]: 제출, 조회, 취소, 단계 전진 (상태를 바꾸는 유일한 주체)
//! - [`StageProcessor`]: 큐 작업 하나를 실행하고 [`StageOutcome`]을 반환
//! - [`PipelineStore`]: 조건부 갱신을 제공하는 저장소 (인메모리, PostgreSQL)
//! - [`LocalTaskQueue`]: 재시도와 지수 백오프를 지원하는 프로세스 내 작업 큐

pub mod error;
pub mod model;
pub mod orchestrator;
pub mod pg_store;
pub mod processor;
pub mod queue;
pub mod runtime;
pub mod stages;
pub mod stats;
pub mod store;

pub use error::{PipelineError, Result};
pub use model::{BacktestRequest, LiveSource, PipelineReport, StageArtifact, DEFAULT_LIVE_LIMIT};
pub use orchestrator::{Orchestrator, StageOutcome};
pub use pg_store::PgPipelineStore;
pub use processor::StageProcessor;
pub use queue::{JobHandler, JobId, JobOptions, JobRecord, JobState, LocalTaskQueue, TaskQueue};
pub use runtime::{exchanges_from_config, PipelineRuntime, RuntimeComponents};
pub use stages::StageRunner;
pub use stats::WorkerStats;
pub use store::{InMemoryPipelineStore, PipelineStore};

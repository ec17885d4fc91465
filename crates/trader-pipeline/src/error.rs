//! 파이프라인 에러 타입.

use thiserror::Error;
use trader_analytics::SimulationError;
use trader_core::{PipelineStage, PipelineStatus, TraderError};
use trader_data::DataError;
use trader_exchange::ExchangeError;
use uuid::Uuid;

/// 파이프라인 관련 에러.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// 파이프라인 없음
    #[error("Pipeline not found: {0}")]
    NotFound(Uuid),

    /// 허용되지 않는 상태 전이
    #[error("Invalid transition for {id}: {from} -> {to}")]
    InvalidTransition {
        id: Uuid,
        from: PipelineStatus,
        to: PipelineStatus,
    },

    /// 이전 단계 산출물 없음
    #[error("Missing {stage} artifact for pipeline {pipeline_id}")]
    MissingArtifact {
        pipeline_id: Uuid,
        stage: PipelineStage,
    },

    /// 잘못된 요청
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// 코어 타입 에러 (저장된 값 파싱 실패 등)
    #[error(transparent)]
    Core(#[from] TraderError),

    /// 시장 데이터/종목 해석 에러
    #[error(transparent)]
    Data(#[from] DataError),

    /// 거래소 에러
    #[error(transparent)]
    Exchange(#[from] ExchangeError),

    /// 시뮬레이션 에러
    #[error(transparent)]
    Simulation(#[from] SimulationError),

    /// 작업 큐 에러
    #[error("Queue error: {0}")]
    Queue(String),

    /// 데이터베이스 에러
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// 직렬화 에러
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl PipelineError {
    /// 실패 사유로 저장할 문자열.
    pub fn failure_reason(&self) -> String {
        self.to_string()
    }
}

/// Result 타입 별칭
pub type Result<T> = std::result::Result<T, PipelineError>;

//! 백테스트 파이프라인 상태 모델.
//!
//! 파이프라인은 `PENDING -> RUNNING -> {COMPLETED | FAILED | CANCELLED}`
//! 순서로 전이하며, RUNNING 동안 `current_stage`가 고정된 단계 목록을 따라
//! 전진합니다. 종료 상태의 파이프라인은 어떤 단계 작업도 받지 않습니다.

use crate::error::TraderError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// 파이프라인 상태.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PipelineStatus {
    Pending,
    Running,
    Completed,
    Failed,
    Cancelled,
}

impl PipelineStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PipelineStatus::Pending => "PENDING",
            PipelineStatus::Running => "RUNNING",
            PipelineStatus::Completed => "COMPLETED",
            PipelineStatus::Failed => "FAILED",
            PipelineStatus::Cancelled => "CANCELLED",
        }
    }

    /// 종료 상태 여부.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            PipelineStatus::Completed | PipelineStatus::Failed | PipelineStatus::Cancelled
        )
    }

    /// 허용된 상태 전이인지 확인합니다.
    pub fn can_transition_to(&self, next: PipelineStatus) -> bool {
        use PipelineStatus::*;
        matches!(
            (self, next),
            (Pending, Running)
                | (Pending, Failed)
                | (Pending, Cancelled)
                | (Running, Completed)
                | (Running, Failed)
                | (Running, Cancelled)
        )
    }
}

impl fmt::Display for PipelineStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PipelineStatus {
    type Err = TraderError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "PENDING" => Ok(PipelineStatus::Pending),
            "RUNNING" => Ok(PipelineStatus::Running),
            "COMPLETED" => Ok(PipelineStatus::Completed),
            "FAILED" => Ok(PipelineStatus::Failed),
            "CANCELLED" => Ok(PipelineStatus::Cancelled),
            _ => Err(TraderError::InvalidInput(format!("unknown pipeline status: {s}"))),
        }
    }
}

/// 파이프라인 단계. 선언 순서가 실행 순서입니다.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PipelineStage {
    /// 시장 데이터 로드
    Load,
    /// 종목/호가 통화 해석
    Resolve,
    /// 전략 시뮬레이션
    Simulate,
    /// 성과 지표 계산
    Score,
    /// 요약 리포트 저장
    Report,
}

impl PipelineStage {
    /// 실행 순서대로 나열한 전체 단계.
    pub const ALL: [PipelineStage; 5] = [
        PipelineStage::Load,
        PipelineStage::Resolve,
        PipelineStage::Simulate,
        PipelineStage::Score,
        PipelineStage::Report,
    ];

    pub fn first() -> Self {
        PipelineStage::Load
    }

    /// 다음 단계. 마지막 단계면 `None`.
    pub fn next(&self) -> Option<Self> {
        let idx = Self::ALL.iter().position(|s| s == self)?;
        Self::ALL.get(idx + 1).copied()
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PipelineStage::Load => "LOAD",
            PipelineStage::Resolve => "RESOLVE",
            PipelineStage::Simulate => "SIMULATE",
            PipelineStage::Score => "SCORE",
            PipelineStage::Report => "REPORT",
        }
    }
}

impl fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PipelineStage {
    type Err = TraderError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|stage| stage.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| TraderError::InvalidInput(format!("unknown pipeline stage: {s}")))
    }
}

/// 영속화되는 파이프라인 레코드.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Pipeline {
    pub id: Uuid,
    pub status: PipelineStatus,
    pub current_stage: PipelineStage,
    pub failure_reason: Option<String>,
    pub completed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Pipeline {
    /// PENDING 상태의 새 파이프라인을 생성합니다.
    pub fn new() -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            status: PipelineStatus::Pending,
            current_stage: PipelineStage::first(),
            failure_reason: None,
            completed_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_running(&self) -> bool {
        self.status == PipelineStatus::Running
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }
}

impl Default for Pipeline {
    fn default() -> Self {
        Self::new()
    }
}

/// 작업 큐에 들어가는 단계 작업.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StageJob {
    pub pipeline_id: Uuid,
    pub stage: PipelineStage,
}

impl StageJob {
    pub fn new(pipeline_id: Uuid, stage: PipelineStage) -> Self {
        Self { pipeline_id, stage }
    }
}

impl fmt::Display for StageJob {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.pipeline_id, self.stage)
    }
}

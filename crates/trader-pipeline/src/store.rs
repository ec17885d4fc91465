//! 파이프라인 저장소.
//!
//! 상태 변경은 모두 조건부 갱신입니다. `transition`은 현재 상태에서 목표
//! 상태로의 전이가 허용될 때만, `advance_stage`는 RUNNING이고 현재 단계가
//! 기대값과 같을 때만 반영됩니다. 조건이 맞지 않으면 `false`를 반환합니다.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;
use trader_core::{Pipeline, PipelineStage, PipelineStatus};
use uuid::Uuid;

use crate::error::Result;
use crate::model::{BacktestRequest, PipelineReport, StageArtifact};

/// 파이프라인 영속화 인터페이스.
#[async_trait]
pub trait PipelineStore: Send + Sync {
    /// PENDING 파이프라인을 생성합니다.
    async fn create(&self, request: &BacktestRequest) -> Result<Pipeline>;

    async fn get(&self, id: Uuid) -> Result<Option<Pipeline>>;

    /// 최신순 목록. `status`가 있으면 해당 상태만.
    async fn list(&self, status: Option<PipelineStatus>, limit: usize) -> Result<Vec<Pipeline>>;

    async fn get_request(&self, id: Uuid) -> Result<Option<BacktestRequest>>;

    /// 조건부 상태 전이. 종료 상태로 갈 때 `completed_at`을 기록합니다.
    async fn transition(
        &self,
        id: Uuid,
        to: PipelineStatus,
        failure_reason: Option<String>,
    ) -> Result<bool>;

    /// 조건부 단계 전진 (RUNNING이고 현재 단계가 `from`일 때만).
    async fn advance_stage(&self, id: Uuid, from: PipelineStage, to: PipelineStage)
        -> Result<bool>;

    async fn save_artifact(&self, id: Uuid, artifact: &StageArtifact) -> Result<()>;

    async fn load_artifact(&self, id: Uuid, stage: PipelineStage) -> Result<Option<StageArtifact>>;

    async fn save_report(&self, report: &PipelineReport) -> Result<()>;

    async fn get_report(&self, id: Uuid) -> Result<Option<PipelineReport>>;
}

/// 목표 상태로 전이할 수 있는 현재 상태 목록.
pub fn allowed_sources(to: PipelineStatus) -> Vec<PipelineStatus> {
    [
        PipelineStatus::Pending,
        PipelineStatus::Running,
        PipelineStatus::Completed,
        PipelineStatus::Failed,
        PipelineStatus::Cancelled,
    ]
    .into_iter()
    .filter(|from| from.can_transition_to(to))
    .collect()
}

struct Entry {
    pipeline: Pipeline,
    request: BacktestRequest,
    artifacts: HashMap<PipelineStage, StageArtifact>,
    report: Option<PipelineReport>,
}

/// 프로세스 내 저장소 (단일 프로세스 실행, 테스트용).
#[derive(Default)]
pub struct InMemoryPipelineStore {
    entries: RwLock<HashMap<Uuid, Entry>>,
}

impl InMemoryPipelineStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PipelineStore for InMemoryPipelineStore {
    async fn create(&self, request: &BacktestRequest) -> Result<Pipeline> {
        let pipeline = Pipeline::new();
        self.entries.write().await.insert(
            pipeline.id,
            Entry {
                pipeline: pipeline.clone(),
                request: request.clone(),
                artifacts: HashMap::new(),
                report: None,
            },
        );
        Ok(pipeline)
    }

    async fn get(&self, id: Uuid) -> Result<Option<Pipeline>> {
        Ok(self.entries.read().await.get(&id).map(|e| e.pipeline.clone()))
    }

    async fn list(&self, status: Option<PipelineStatus>, limit: usize) -> Result<Vec<Pipeline>> {
        let entries = self.entries.read().await;
        let mut pipelines: Vec<Pipeline> = entries
            .values()
            .map(|e| e.pipeline.clone())
            .filter(|p| status.map_or(true, |s| p.status == s))
            .collect();
        pipelines.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        pipelines.truncate(limit);
        Ok(pipelines)
    }

    async fn get_request(&self, id: Uuid) -> Result<Option<BacktestRequest>> {
        Ok(self.entries.read().await.get(&id).map(|e| e.request.clone()))
    }

    async fn transition(
        &self,
        id: Uuid,
        to: PipelineStatus,
        failure_reason: Option<String>,
    ) -> Result<bool> {
        let mut entries = self.entries.write().await;
        let Some(entry) = entries.get_mut(&id) else {
            return Ok(false);
        };
        let pipeline = &mut entry.pipeline;
        if !pipeline.status.can_transition_to(to) {
            return Ok(false);
        }

        let now = Utc::now();
        pipeline.status = to;
        pipeline.updated_at = now;
        if to.is_terminal() {
            pipeline.completed_at = Some(now);
        }
        if failure_reason.is_some() {
            pipeline.failure_reason = failure_reason;
        }
        Ok(true)
    }

    async fn advance_stage(
        &self,
        id: Uuid,
        from: PipelineStage,
        to: PipelineStage,
    ) -> Result<bool> {
        let mut entries = self.entries.write().await;
        let Some(entry) = entries.get_mut(&id) else {
            return Ok(false);
        };
        let pipeline = &mut entry.pipeline;
        if pipeline.status != PipelineStatus::Running || pipeline.current_stage != from {
            return Ok(false);
        }
        pipeline.current_stage = to;
        pipeline.updated_at = Utc::now();
        Ok(true)
    }

    async fn save_artifact(&self, id: Uuid, artifact: &StageArtifact) -> Result<()> {
        if let Some(entry) = self.entries.write().await.get_mut(&id) {
            entry.artifacts.insert(artifact.stage(), artifact.clone());
        }
        Ok(())
    }

    async fn load_artifact(&self, id: Uuid, stage: PipelineStage) -> Result<Option<StageArtifact>> {
        Ok(self
            .entries
            .read()
            .await
            .get(&id)
            .and_then(|e| e.artifacts.get(&stage).cloned()))
    }

    async fn save_report(&self, report: &PipelineReport) -> Result<()> {
        if let Some(entry) = self.entries.write().await.get_mut(&report.pipeline_id) {
            // 리포트는 한 번만 기록
            if entry.report.is_none() {
                entry.report = Some(report.clone());
            }
        }
        Ok(())
    }

    async fn get_report(&self, id: Uuid) -> Result<Option<PipelineReport>> {
        Ok(self.entries.read().await.get(&id).and_then(|e| e.report.clone()))
    }
}

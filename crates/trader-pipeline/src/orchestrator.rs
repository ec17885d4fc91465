//! 파이프라인 오케스트레이터.
//!
//! 파이프라인 상태(`status`)를 바꾸는 유일한 주체입니다. 모든 변경은 저장소의
//! 조건부 갱신으로 이루어지므로, 취소와 단계 완료가 경쟁해도 종료 상태는
//! 다시 바뀌지 않습니다.

use std::sync::Arc;

use tracing::{debug, info, warn};
use trader_core::{Pipeline, PipelineStage, PipelineStatus, StageJob};
use uuid::Uuid;

use crate::error::{PipelineError, Result};
use crate::model::{BacktestRequest, PipelineReport};
use crate::queue::{JobOptions, TaskQueue};
use crate::store::PipelineStore;

/// 단계 작업 처리 결과.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StageOutcome {
    /// 다음 단계가 큐에 들어감
    Advanced(PipelineStage),
    /// 마지막 단계 완료, COMPLETED
    Completed,
    /// 단계는 끝났지만 파이프라인이 더 이상 RUNNING이 아님 (취소 등)
    Halted,
    /// 실행하지 않음 (RUNNING이 아니거나 현재 단계가 아님)
    Skipped,
    /// 파이프라인이 없어 작업을 버림
    Dropped,
}

/// 파이프라인 제출, 조회, 취소와 단계 전진을 담당합니다.
pub struct Orchestrator {
    store: Arc<dyn PipelineStore>,
    queue: Arc<dyn TaskQueue>,
    job_options: JobOptions,
}

impl Orchestrator {
    pub fn new(store: Arc<dyn PipelineStore>, queue: Arc<dyn TaskQueue>) -> Self {
        Self {
            store,
            queue,
            job_options: JobOptions::default(),
        }
    }

    pub fn with_job_options(mut self, options: JobOptions) -> Self {
        self.job_options = options;
        self
    }

    pub fn store(&self) -> &Arc<dyn PipelineStore> {
        &self.store
    }

    /// 백테스트를 제출합니다.
    ///
    /// 요청을 검증하고 파이프라인을 만든 뒤 RUNNING으로 바꾸고 첫 단계를 큐에
    /// 넣습니다.
    pub async fn submit(&self, request: BacktestRequest) -> Result<Pipeline> {
        request.validate()?;

        let pipeline = self.store.create(&request).await?;
        if !self
            .store
            .transition(pipeline.id, PipelineStatus::Running, None)
            .await?
        {
            let current = self.find(pipeline.id).await?;
            return Err(PipelineError::InvalidTransition {
                id: pipeline.id,
                from: current.status,
                to: PipelineStatus::Running,
            });
        }

        let first = PipelineStage::first();
        self.enqueue_stage(pipeline.id, first).await?;

        info!(pipeline_id = %pipeline.id, stage = %first, "파이프라인 제출");
        self.find(pipeline.id).await
    }

    /// 파이프라인 조회.
    pub async fn find(&self, id: Uuid) -> Result<Pipeline> {
        self.store
            .get(id)
            .await?
            .ok_or(PipelineError::NotFound(id))
    }

    /// 최신순 목록.
    pub async fn list(&self, status: Option<PipelineStatus>, limit: usize) -> Result<Vec<Pipeline>> {
        self.store.list(status, limit).await
    }

    /// 파이프라인을 취소합니다.
    ///
    /// 이미 종료된 파이프라인이면 `false`. 실행 중인 단계는 끝까지 실행되지만
    /// 다음 단계로 넘어가지 않습니다.
    pub async fn cancel(&self, id: Uuid) -> Result<bool> {
        let pipeline = self.find(id).await?;
        let cancelled = self
            .store
            .transition(id, PipelineStatus::Cancelled, None)
            .await?;

        if cancelled {
            info!(pipeline_id = %id, stage = %pipeline.current_stage, "파이프라인 취소");
        } else {
            debug!(pipeline_id = %id, status = %pipeline.status, "이미 종료된 파이프라인, 취소 무시");
        }
        Ok(cancelled)
    }

    /// 완료 리포트 조회. COMPLETED가 아니면 `None`.
    ///
    /// REPORT 단계 실행 중 취소되면 리포트가 저장되어 있어도 노출하지 않습니다.
    pub async fn report(&self, id: Uuid) -> Result<Option<PipelineReport>> {
        let pipeline = self.find(id).await?;
        if pipeline.status != PipelineStatus::Completed {
            return Ok(None);
        }
        self.store.get_report(id).await
    }

    /// 단계 완료 처리.
    ///
    /// 다음 단계가 있으면 조건부로 전진하고 큐에 넣습니다. 마지막 단계면
    /// COMPLETED로 전이합니다. 조건이 맞지 않으면(취소됨) `Halted`.
    pub async fn complete_stage(&self, id: Uuid, stage: PipelineStage) -> Result<StageOutcome> {
        match stage.next() {
            Some(next) => {
                if !self.store.advance_stage(id, stage, next).await? {
                    info!(pipeline_id = %id, stage = %stage, "파이프라인이 RUNNING이 아님, 전진 중단");
                    return Ok(StageOutcome::Halted);
                }
                self.enqueue_stage(id, next).await?;
                debug!(pipeline_id = %id, from = %stage, to = %next, "다음 단계 등록");
                Ok(StageOutcome::Advanced(next))
            }
            None => {
                if self
                    .store
                    .transition(id, PipelineStatus::Completed, None)
                    .await?
                {
                    info!(pipeline_id = %id, "파이프라인 완료");
                    Ok(StageOutcome::Completed)
                } else {
                    info!(pipeline_id = %id, "파이프라인이 RUNNING이 아님, 완료 처리 생략");
                    Ok(StageOutcome::Halted)
                }
            }
        }
    }

    /// 단계 작업을 큐에 넣습니다.
    ///
    /// 저장소에는 이미 `stage`가 현재 단계로 기록된 상태이므로, 등록에 실패하면
    /// 실행될 작업이 없는 RUNNING 파이프라인이 남지 않도록 FAILED로 기록합니다.
    async fn enqueue_stage(&self, id: Uuid, stage: PipelineStage) -> Result<()> {
        match self
            .queue
            .enqueue(StageJob::new(id, stage), self.job_options)
            .await
        {
            Ok(_) => Ok(()),
            Err(e) => {
                self.fail_stage(id, stage, &e).await?;
                Err(e)
            }
        }
    }

    /// 단계 실패 처리: FAILED + 실패 사유 + 완료 시각을 한 번에 기록합니다.
    pub async fn fail_stage(
        &self,
        id: Uuid,
        stage: PipelineStage,
        error: &PipelineError,
    ) -> Result<bool> {
        let reason = format!("{stage}: {}", error.failure_reason());
        let failed = self
            .store
            .transition(id, PipelineStatus::Failed, Some(reason))
            .await?;

        if failed {
            warn!(pipeline_id = %id, stage = %stage, error = %error, "파이프라인 실패");
        }
        Ok(failed)
    }
}

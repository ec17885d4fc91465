//! 단계 작업 처리기.
//!
//! 큐에서 꺼낸 `{pipeline_id, stage}` 작업을 실행합니다. 실행 전에 파이프라인이
//! RUNNING이고 현재 단계가 작업의 단계와 같은지 확인하며, 아니면 아무것도
//! 바꾸지 않고 건너뜁니다.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, error, warn, Instrument};
use trader_core::{pipeline_span, StageJob};

use crate::error::Result;
use crate::orchestrator::{Orchestrator, StageOutcome};
use crate::queue::JobHandler;
use crate::stages::StageRunner;

pub struct StageProcessor {
    orchestrator: Arc<Orchestrator>,
    runner: StageRunner,
}

impl StageProcessor {
    pub fn new(orchestrator: Arc<Orchestrator>, runner: StageRunner) -> Self {
        Self {
            orchestrator,
            runner,
        }
    }

    /// 작업 하나를 처리합니다.
    ///
    /// 단계가 실패하면 파이프라인을 FAILED로 기록한 뒤 에러를 그대로 반환합니다.
    /// 작업 재시도는 큐가 결정합니다.
    pub async fn process(&self, job: &StageJob) -> Result<StageOutcome> {
        let span = pipeline_span!("stage_job", job.pipeline_id, job.stage);
        self.process_inner(job).instrument(span).await
    }

    async fn process_inner(&self, job: &StageJob) -> Result<StageOutcome> {
        let store = self.orchestrator.store();

        let Some(pipeline) = store.get(job.pipeline_id).await? else {
            warn!("파이프라인 없음, 작업 폐기");
            return Ok(StageOutcome::Dropped);
        };

        if !pipeline.is_running() {
            debug!(status = %pipeline.status, "RUNNING이 아닌 파이프라인, 건너뜀");
            return Ok(StageOutcome::Skipped);
        }
        if pipeline.current_stage != job.stage {
            debug!(current_stage = %pipeline.current_stage, "현재 단계가 아닌 작업, 건너뜀");
            return Ok(StageOutcome::Skipped);
        }

        let Some(request) = store.get_request(job.pipeline_id).await? else {
            warn!("요청 정보 없음, 작업 폐기");
            return Ok(StageOutcome::Dropped);
        };

        match self.runner.run(job.pipeline_id, job.stage, &request).await {
            Ok(()) => {
                self.orchestrator
                    .complete_stage(job.pipeline_id, job.stage)
                    .await
            }
            Err(e) => {
                error!(error = %e, "단계 실행 실패");
                if let Err(record_err) = self
                    .orchestrator
                    .fail_stage(job.pipeline_id, job.stage, &e)
                    .await
                {
                    error!(error = %record_err, "실패 상태 기록 실패");
                }
                Err(e)
            }
        }
    }
}

#[async_trait]
impl JobHandler for StageProcessor {
    async fn handle(&self, job: &StageJob) -> Result<()> {
        let outcome = self.process(job).await?;
        debug!(job = %job, outcome = ?outcome, "작업 처리 완료");
        Ok(())
    }
}

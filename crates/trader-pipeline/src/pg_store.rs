//! PostgreSQL 파이프라인 저장소.
//!
//! 테이블:
//! - `pipelines` - 상태, 현재 단계, 요청(jsonb)
//! - `pipeline_artifacts` - `(pipeline_id, stage)` 단위 산출물
//! - `pipeline_reports` - 완료 리포트 (파이프라인당 1건)

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgPool;
use sqlx::types::Json;
use sqlx::FromRow;
use tracing::{debug, info};
use trader_core::{Pipeline, PipelineStage, PipelineStatus};
use uuid::Uuid;

use crate::error::Result;
use crate::model::{BacktestRequest, PipelineReport, StageArtifact};
use crate::store::{allowed_sources, PipelineStore};

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS pipelines (
    id UUID PRIMARY KEY,
    status TEXT NOT NULL,
    current_stage TEXT NOT NULL,
    failure_reason TEXT,
    request JSONB NOT NULL,
    completed_at TIMESTAMPTZ,
    created_at TIMESTAMPTZ NOT NULL,
    updated_at TIMESTAMPTZ NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_pipelines_status ON pipelines (status, created_at DESC);
CREATE TABLE IF NOT EXISTS pipeline_artifacts (
    pipeline_id UUID NOT NULL REFERENCES pipelines(id) ON DELETE CASCADE,
    stage TEXT NOT NULL,
    payload JSONB NOT NULL,
    created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
    PRIMARY KEY (pipeline_id, stage)
);
CREATE TABLE IF NOT EXISTS pipeline_reports (
    pipeline_id UUID PRIMARY KEY REFERENCES pipelines(id) ON DELETE CASCADE,
    payload JSONB NOT NULL,
    created_at TIMESTAMPTZ NOT NULL
);
"#;

#[derive(Debug, FromRow)]
struct PipelineRow {
    id: Uuid,
    status: String,
    current_stage: String,
    failure_reason: Option<String>,
    completed_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl PipelineRow {
    fn into_pipeline(self) -> Result<Pipeline> {
        Ok(Pipeline {
            id: self.id,
            status: self.status.parse()?,
            current_stage: self.current_stage.parse()?,
            failure_reason: self.failure_reason,
            completed_at: self.completed_at,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

const PIPELINE_COLUMNS: &str =
    "id, status, current_stage, failure_reason, completed_at, created_at, updated_at";

/// `sqlx` 기반 저장소.
pub struct PgPipelineStore {
    pool: PgPool,
}

impl PgPipelineStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// 테이블이 없으면 생성합니다.
    pub async fn ensure_schema(&self) -> Result<()> {
        sqlx::raw_sql(SCHEMA).execute(&self.pool).await?;
        info!("파이프라인 스키마 확인 완료");
        Ok(())
    }
}

#[async_trait]
impl PipelineStore for PgPipelineStore {
    async fn create(&self, request: &BacktestRequest) -> Result<Pipeline> {
        let pipeline = Pipeline::new();
        sqlx::query(
            r#"
            INSERT INTO pipelines (id, status, current_stage, request, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(pipeline.id)
        .bind(pipeline.status.as_str())
        .bind(pipeline.current_stage.as_str())
        .bind(Json(request))
        .bind(pipeline.created_at)
        .bind(pipeline.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(pipeline)
    }

    async fn get(&self, id: Uuid) -> Result<Option<Pipeline>> {
        let row = sqlx::query_as::<_, PipelineRow>(&format!(
            "SELECT {PIPELINE_COLUMNS} FROM pipelines WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(PipelineRow::into_pipeline).transpose()
    }

    async fn list(&self, status: Option<PipelineStatus>, limit: usize) -> Result<Vec<Pipeline>> {
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let rows = match status {
            Some(status) => {
                sqlx::query_as::<_, PipelineRow>(&format!(
                    "SELECT {PIPELINE_COLUMNS} FROM pipelines WHERE status = $1 \
                     ORDER BY created_at DESC LIMIT $2"
                ))
                .bind(status.as_str())
                .bind(limit)
                .fetch_all(&self.pool)
                .await?
            }
            None => {
                sqlx::query_as::<_, PipelineRow>(&format!(
                    "SELECT {PIPELINE_COLUMNS} FROM pipelines ORDER BY created_at DESC LIMIT $1"
                ))
                .bind(limit)
                .fetch_all(&self.pool)
                .await?
            }
        };

        rows.into_iter().map(PipelineRow::into_pipeline).collect()
    }

    async fn get_request(&self, id: Uuid) -> Result<Option<BacktestRequest>> {
        let row: Option<(Json<BacktestRequest>,)> =
            sqlx::query_as("SELECT request FROM pipelines WHERE id = $1")
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;

        Ok(row.map(|(Json(request),)| request))
    }

    async fn transition(
        &self,
        id: Uuid,
        to: PipelineStatus,
        failure_reason: Option<String>,
    ) -> Result<bool> {
        let sources: Vec<String> = allowed_sources(to)
            .iter()
            .map(|s| s.as_str().to_string())
            .collect();
        if sources.is_empty() {
            return Ok(false);
        }

        let result = sqlx::query(
            r#"
            UPDATE pipelines
            SET status = $2,
                failure_reason = COALESCE($3, failure_reason),
                completed_at = CASE WHEN $4 THEN NOW() ELSE completed_at END,
                updated_at = NOW()
            WHERE id = $1 AND status = ANY($5)
            "#,
        )
        .bind(id)
        .bind(to.as_str())
        .bind(failure_reason)
        .bind(to.is_terminal())
        .bind(&sources)
        .execute(&self.pool)
        .await?;

        let applied = result.rows_affected() == 1;
        debug!(pipeline_id = %id, to = %to, applied, "조건부 상태 전이");
        Ok(applied)
    }

    async fn advance_stage(
        &self,
        id: Uuid,
        from: PipelineStage,
        to: PipelineStage,
    ) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE pipelines
            SET current_stage = $3, updated_at = NOW()
            WHERE id = $1 AND status = 'RUNNING' AND current_stage = $2
            "#,
        )
        .bind(id)
        .bind(from.as_str())
        .bind(to.as_str())
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn save_artifact(&self, id: Uuid, artifact: &StageArtifact) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO pipeline_artifacts (pipeline_id, stage, payload)
            VALUES ($1, $2, $3)
            ON CONFLICT (pipeline_id, stage) DO UPDATE SET payload = EXCLUDED.payload
            "#,
        )
        .bind(id)
        .bind(artifact.stage().as_str())
        .bind(Json(artifact))
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn load_artifact(&self, id: Uuid, stage: PipelineStage) -> Result<Option<StageArtifact>> {
        let row: Option<(Json<StageArtifact>,)> = sqlx::query_as(
            "SELECT payload FROM pipeline_artifacts WHERE pipeline_id = $1 AND stage = $2",
        )
        .bind(id)
        .bind(stage.as_str())
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|(Json(artifact),)| artifact))
    }

    async fn save_report(&self, report: &PipelineReport) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO pipeline_reports (pipeline_id, payload, created_at)
            VALUES ($1, $2, $3)
            ON CONFLICT (pipeline_id) DO NOTHING
            "#,
        )
        .bind(report.pipeline_id)
        .bind(Json(report))
        .bind(report.created_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn get_report(&self, id: Uuid) -> Result<Option<PipelineReport>> {
        let row: Option<(Json<PipelineReport>,)> =
            sqlx::query_as("SELECT payload FROM pipeline_reports WHERE pipeline_id = $1")
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;

        Ok(row.map(|(Json(report),)| report))
    }
}

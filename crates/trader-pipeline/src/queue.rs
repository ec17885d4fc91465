//! 단계 작업 큐.
//!
//! `LocalTaskQueue`는 프로세스 내 큐입니다. 워커 여러 개가 하나의 수신자를
//! 공유하며, 실패한 작업은 `backoff_ms * 2^(attempt-1)` 만큼 기다린 뒤 다시
//! 큐에 들어갑니다. `attempts`를 모두 소진하면 FAILED로 남습니다.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, watch, Notify};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};
use trader_core::{PipelineConfig, StageJob};

use crate::error::{PipelineError, Result};
use crate::stats::WorkerStats;

/// 큐가 부여하는 작업 ID.
pub type JobId = u64;

/// 작업별 실행 옵션.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobOptions {
    /// 최대 시도 횟수 (최초 실행 포함)
    pub attempts: u32,
    /// 지수 백오프 기본 지연 (밀리초)
    pub backoff_ms: u64,
    /// 성공한 작업 기록 삭제
    pub remove_on_complete: bool,
    /// 실패한 작업 기록 삭제
    pub remove_on_fail: bool,
}

impl Default for JobOptions {
    fn default() -> Self {
        Self::from(&PipelineConfig::default())
    }
}

impl From<&PipelineConfig> for JobOptions {
    fn from(cfg: &PipelineConfig) -> Self {
        Self {
            attempts: cfg.attempts.max(1),
            backoff_ms: cfg.backoff_ms,
            remove_on_complete: cfg.remove_on_complete,
            remove_on_fail: cfg.remove_on_fail,
        }
    }
}

impl JobOptions {
    /// `attempt`번째 시도가 실패한 뒤의 대기 시간.
    pub fn backoff_for(&self, attempt: u32) -> Duration {
        let factor = 2u64.saturating_pow(attempt.saturating_sub(1));
        Duration::from_millis(self.backoff_ms.saturating_mul(factor))
    }
}

/// 작업 큐 인터페이스.
#[async_trait]
pub trait TaskQueue: Send + Sync {
    async fn enqueue(&self, job: StageJob, options: JobOptions) -> Result<JobId>;
}

/// 작업 처리기. 에러를 반환하면 큐의 재시도 정책이 적용됩니다.
#[async_trait]
pub trait JobHandler: Send + Sync {
    async fn handle(&self, job: &StageJob) -> Result<()>;
}

/// 작업 상태.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobState {
    Waiting,
    Active,
    Delayed,
    Completed,
    Failed,
}

/// 작업 기록.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobRecord {
    pub id: JobId,
    pub job: StageJob,
    pub state: JobState,
    pub attempts_made: u32,
    pub last_error: Option<String>,
}

#[derive(Debug, Clone, Copy)]
struct Envelope {
    id: JobId,
    job: StageJob,
    options: JobOptions,
    attempt: u32,
}

struct Inner {
    sender: mpsc::UnboundedSender<Envelope>,
    receiver: tokio::sync::Mutex<mpsc::UnboundedReceiver<Envelope>>,
    next_id: AtomicU64,
    records: Mutex<HashMap<JobId, JobRecord>>,
    /// 최종 결과가 나오지 않은 작업 수 (대기 + 실행 중 + 백오프 중)
    pending: AtomicUsize,
    idle: Notify,
    shutdown: watch::Sender<bool>,
    workers: Mutex<Vec<JoinHandle<()>>>,
    /// 백오프 대기 중인 재시도 태스크
    retries: Mutex<Vec<JoinHandle<()>>>,
    stats: Mutex<WorkerStats>,
    started_at: Instant,
}

impl Inner {
    fn update_record(&self, id: JobId, f: impl FnOnce(&mut JobRecord)) {
        let mut records = self.records.lock().unwrap_or_else(|p| p.into_inner());
        if let Some(record) = records.get_mut(&id) {
            f(record);
        }
    }

    fn remove_record(&self, id: JobId) {
        self.records
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .remove(&id);
    }

    fn with_stats(&self, f: impl FnOnce(&mut WorkerStats)) {
        f(&mut self.stats.lock().unwrap_or_else(|p| p.into_inner()));
    }

    fn finish(&self) {
        if self.pending.fetch_sub(1, Ordering::SeqCst) == 1 {
            self.idle.notify_waiters();
        }
    }

    fn is_shut_down(&self) -> bool {
        *self.shutdown.borrow()
    }

    /// 종료로 실행되지 못한 작업을 정리합니다.
    fn abandon(&self, envelope: Envelope) {
        warn!(job_id = envelope.id, job = %envelope.job, "큐 종료로 작업 폐기");
        if envelope.options.remove_on_fail {
            self.remove_record(envelope.id);
        } else {
            self.update_record(envelope.id, |r| {
                r.state = JobState::Failed;
                r.last_error = Some("queue shut down".to_string());
            });
        }
        self.with_stats(|s| s.abandoned += 1);
        self.finish();
    }
}

/// 프로세스 내 작업 큐.
#[derive(Clone)]
pub struct LocalTaskQueue {
    inner: Arc<Inner>,
}

impl Default for LocalTaskQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl LocalTaskQueue {
    pub fn new() -> Self {
        let (sender, receiver) = mpsc::unbounded_channel();
        let (shutdown, _) = watch::channel(false);
        Self {
            inner: Arc::new(Inner {
                sender,
                receiver: tokio::sync::Mutex::new(receiver),
                next_id: AtomicU64::new(1),
                records: Mutex::new(HashMap::new()),
                pending: AtomicUsize::new(0),
                idle: Notify::new(),
                shutdown,
                workers: Mutex::new(Vec::new()),
                retries: Mutex::new(Vec::new()),
                stats: Mutex::new(WorkerStats::new()),
                started_at: Instant::now(),
            }),
        }
    }

    /// 워커 `concurrency`개를 띄웁니다.
    pub fn start(&self, handler: Arc<dyn JobHandler>, concurrency: usize) {
        let concurrency = concurrency.max(1);
        let mut workers = self.inner.workers.lock().unwrap_or_else(|p| p.into_inner());
        for worker_id in 0..concurrency {
            let inner = Arc::clone(&self.inner);
            let handler = Arc::clone(&handler);
            workers.push(tokio::spawn(run_worker(worker_id, inner, handler)));
        }
        info!(concurrency, "작업 큐 워커 시작");
    }

    /// 최종 결과가 나오지 않은 작업 수.
    pub fn pending(&self) -> usize {
        self.inner.pending.load(Ordering::SeqCst)
    }

    /// 모든 작업이 완료 또는 최종 실패할 때까지 기다립니다.
    pub async fn wait_idle(&self) {
        loop {
            let notified = self.inner.idle.notified();
            if self.pending() == 0 {
                return;
            }
            notified.await;
        }
    }

    /// 작업 기록 조회.
    pub fn job(&self, id: JobId) -> Option<JobRecord> {
        self.inner
            .records
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .get(&id)
            .cloned()
    }

    /// 남아 있는 작업 기록 (ID 순).
    pub fn jobs(&self) -> Vec<JobRecord> {
        let records = self.inner.records.lock().unwrap_or_else(|p| p.into_inner());
        let mut jobs: Vec<JobRecord> = records.values().cloned().collect();
        jobs.sort_by_key(|r| r.id);
        jobs
    }

    pub fn stats(&self) -> WorkerStats {
        let mut stats = self
            .inner
            .stats
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .clone();
        stats.elapsed = self.inner.started_at.elapsed();
        stats
    }

    /// 워커를 멈추고 종료를 기다립니다.
    ///
    /// 백오프 중이거나 채널에 남은 작업은 FAILED로 폐기되어 `pending`에서
    /// 빠지므로, 종료 후에도 `wait_idle`이 반환됩니다.
    pub async fn shutdown(&self) {
        self.inner.shutdown.send_replace(true);
        let workers: Vec<JoinHandle<()>> = std::mem::take(
            &mut *self.inner.workers.lock().unwrap_or_else(|p| p.into_inner()),
        );
        for worker in workers {
            if let Err(e) = worker.await {
                error!(error = %e, "워커 종료 실패");
            }
        }

        let retries: Vec<JoinHandle<()>> = std::mem::take(
            &mut *self.inner.retries.lock().unwrap_or_else(|p| p.into_inner()),
        );
        for retry in retries {
            if let Err(e) = retry.await {
                error!(error = %e, "재시도 태스크 종료 실패");
            }
        }

        let mut receiver = self.inner.receiver.lock().await;
        while let Ok(envelope) = receiver.try_recv() {
            self.inner.abandon(envelope);
        }
        drop(receiver);

        self.stats().log_summary("stage-jobs");
    }
}

#[async_trait]
impl TaskQueue for LocalTaskQueue {
    async fn enqueue(&self, job: StageJob, options: JobOptions) -> Result<JobId> {
        if self.inner.is_shut_down() {
            return Err(PipelineError::Queue("queue is shut down".to_string()));
        }

        let id = self.inner.next_id.fetch_add(1, Ordering::SeqCst);
        self.inner
            .records
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .insert(
                id,
                JobRecord {
                    id,
                    job,
                    state: JobState::Waiting,
                    attempts_made: 0,
                    last_error: None,
                },
            );
        self.inner.pending.fetch_add(1, Ordering::SeqCst);
        self.inner.with_stats(|s| s.enqueued += 1);

        let envelope = Envelope {
            id,
            job,
            options,
            attempt: 1,
        };
        if self.inner.sender.send(envelope).is_err() {
            self.inner.remove_record(id);
            self.inner.finish();
            return Err(PipelineError::Queue("queue channel closed".to_string()));
        }

        debug!(job_id = id, job = %job, "작업 등록");
        Ok(id)
    }
}

async fn run_worker(worker_id: usize, inner: Arc<Inner>, handler: Arc<dyn JobHandler>) {
    let mut shutdown = inner.shutdown.subscribe();

    loop {
        if *shutdown.borrow() {
            break;
        }

        let next = tokio::select! {
            _ = shutdown.changed() => None,
            envelope = async { inner.receiver.lock().await.recv().await } => envelope,
        };
        let Some(envelope) = next else {
            break;
        };

        execute(&inner, handler.as_ref(), envelope).await;
    }

    debug!(worker_id, "워커 종료");
}

async fn execute(inner: &Arc<Inner>, handler: &dyn JobHandler, envelope: Envelope) {
    let Envelope {
        id,
        job,
        options,
        attempt,
    } = envelope;

    inner.update_record(id, |r| {
        r.state = JobState::Active;
        r.attempts_made = attempt;
    });
    inner.with_stats(|s| s.attempts += 1);

    match handler.handle(&job).await {
        Ok(()) => {
            if options.remove_on_complete {
                inner.remove_record(id);
            } else {
                inner.update_record(id, |r| r.state = JobState::Completed);
            }
            inner.with_stats(|s| s.completed += 1);
            inner.finish();
        }
        Err(e) if attempt < options.attempts => {
            let delay = options.backoff_for(attempt);
            warn!(
                job_id = id,
                job = %job,
                attempt,
                max_attempts = options.attempts,
                delay_ms = delay.as_millis() as u64,
                error = %e,
                "작업 실패, 재시도 예약"
            );
            let reason = e.to_string();
            inner.update_record(id, |r| {
                r.state = JobState::Delayed;
                r.last_error = Some(reason);
            });
            inner.with_stats(|s| s.retried += 1);

            let retry = Envelope {
                attempt: attempt + 1,
                ..envelope
            };
            let task_inner = Arc::clone(inner);
            let handle = tokio::spawn(async move {
                let inner = task_inner;
                let mut shutdown = inner.shutdown.subscribe();
                tokio::select! {
                    _ = tokio::time::sleep(delay) => {}
                    _ = shutdown.wait_for(|stopped| *stopped) => {}
                }
                if inner.is_shut_down() {
                    inner.abandon(retry);
                    return;
                }
                inner.update_record(id, |r| r.state = JobState::Waiting);
                if let Err(mpsc::error::SendError(retry)) = inner.sender.send(retry) {
                    inner.abandon(retry);
                }
            });

            let mut retries = inner.retries.lock().unwrap_or_else(|p| p.into_inner());
            retries.retain(|task| !task.is_finished());
            retries.push(handle);
        }
        Err(e) => {
            error!(
                job_id = id,
                job = %job,
                attempts = attempt,
                error = %e,
                "작업 최종 실패"
            );
            if options.remove_on_fail {
                inner.remove_record(id);
            } else {
                let reason = e.to_string();
                inner.update_record(id, |r| {
                    r.state = JobState::Failed;
                    r.last_error = Some(reason);
                });
            }
            inner.with_stats(|s| s.failed += 1);
            inner.finish();
        }
    }
}

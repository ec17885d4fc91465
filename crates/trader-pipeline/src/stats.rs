//! 워커 처리 통계.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// 작업 큐 워커 통계
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WorkerStats {
    /// 큐에 들어온 작업 수
    pub enqueued: usize,
    /// 실행 시도 횟수 (재시도 포함)
    pub attempts: usize,
    /// 성공한 작업 수
    pub completed: usize,
    /// 재시도 예약 횟수
    pub retried: usize,
    /// 시도 횟수를 모두 소진하고 실패한 작업 수
    pub failed: usize,
    /// 큐 종료로 실행되지 못하고 폐기된 작업 수
    pub abandoned: usize,
    /// 워커 가동 시간
    #[serde(skip)]
    pub elapsed: Duration,
}

impl WorkerStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// 최종 결과가 나온 작업 중 성공 비율 (%)
    pub fn success_rate(&self) -> f64 {
        let finished = self.completed + self.failed;
        if finished == 0 {
            0.0
        } else {
            (self.completed as f64 / finished as f64) * 100.0
        }
    }

    /// 통계 요약 로그 출력
    pub fn log_summary(&self, queue: &str) {
        tracing::info!(
            queue = queue,
            enqueued = self.enqueued,
            attempts = self.attempts,
            completed = self.completed,
            retried = self.retried,
            failed = self.failed,
            abandoned = self.abandoned,
            success_rate = format!("{:.1}%", self.success_rate()),
            elapsed = format!("{:.1}s", self.elapsed.as_secs_f64()),
            "작업 큐 종료"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_success_rate_ignores_in_flight_jobs() {
        let stats = WorkerStats {
            enqueued: 10,
            completed: 3,
            failed: 1,
            ..Default::default()
        };
        assert!((stats.success_rate() - 75.0).abs() < 1e-9);
        assert_eq!(WorkerStats::new().success_rate(), 0.0);
    }
}

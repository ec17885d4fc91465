//! 지수 백오프 재시도.
//!
//! 재시도 가능한 `ExchangeError`만 재시도하며, 회로 차단기와 함께 사용할 때는
//! 거래소 시도 하나 안에서 동작합니다.

use std::future::Future;
use std::time::Duration;

use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::ExchangeError;

/// 재시도 설정.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    /// 최대 재시도 횟수 (최초 시도 제외)
    pub max_retries: u32,
    /// 첫 재시도 전 대기 (밀리초)
    pub initial_delay_ms: u64,
    /// 최대 대기 (밀리초)
    pub max_delay_ms: u64,
    /// 지수 배수
    pub multiplier: f64,
    /// 대기 시간에 ±20% 지터 적용
    #[serde(default)]
    pub jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_delay_ms: 200,
            max_delay_ms: 10_000,
            multiplier: 2.0,
            jitter: true,
        }
    }
}

impl RetryConfig {
    /// 재시도 없음.
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            ..Default::default()
        }
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn with_initial_delay_ms(mut self, delay_ms: u64) -> Self {
        self.initial_delay_ms = delay_ms;
        self
    }

    pub fn with_jitter(mut self, jitter: bool) -> Self {
        self.jitter = jitter;
        self
    }

    /// `attempt`번째 재시도 전 대기 시간 (1부터 시작).
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1) as i32;
        let base = self.initial_delay_ms as f64 * self.multiplier.powi(exponent);
        let capped = base.min(self.max_delay_ms as f64).max(0.0);

        let millis = if self.jitter && capped > 0.0 {
            let factor = rand::thread_rng().gen_range(0.8..=1.2);
            (capped * factor).min(self.max_delay_ms as f64)
        } else {
            capped
        };
        Duration::from_millis(millis as u64)
    }
}

/// 재시도 가능한 에러에 대해 지수 백오프로 재시도합니다.
///
/// 재시도 불가능한 에러는 즉시 반환하고, 재시도를 모두 소진하면 마지막 에러를
/// 반환합니다.
pub async fn with_retry<T, F, Fut>(
    config: &RetryConfig,
    operation: &str,
    mut f: F,
) -> Result<T, ExchangeError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, ExchangeError>>,
{
    let mut attempt: u32 = 0;
    loop {
        match f().await {
            Ok(value) => {
                if attempt > 0 {
                    debug!(operation, attempt, "Retry succeeded");
                }
                return Ok(value);
            }
            Err(e) if e.is_retryable() && attempt < config.max_retries => {
                attempt += 1;
                let delay = config.delay_for(attempt);
                warn!(
                    operation,
                    attempt,
                    max_retries = config.max_retries,
                    delay_ms = delay.as_millis() as u64,
                    error = %e,
                    "Retryable error, backing off"
                );
                tokio::time::sleep(delay).await;
            }
            Err(e) => return Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[test]
    fn test_delay_grows_exponentially_and_caps() {
        let config = RetryConfig {
            max_retries: 5,
            initial_delay_ms: 100,
            max_delay_ms: 300,
            multiplier: 2.0,
            jitter: false,
        };
        assert_eq!(config.delay_for(1), Duration::from_millis(100));
        assert_eq!(config.delay_for(2), Duration::from_millis(200));
        assert_eq!(config.delay_for(3), Duration::from_millis(300));
        assert_eq!(config.delay_for(10), Duration::from_millis(300));
    }

    #[test]
    fn test_jitter_stays_within_bounds() {
        let config = RetryConfig::default().with_initial_delay_ms(1000);
        for _ in 0..50 {
            let delay = config.delay_for(1).as_millis();
            assert!((800..=1200).contains(&delay));
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_retries_transient_errors() {
        let calls = AtomicU32::new(0);
        let config = RetryConfig::default().with_max_retries(3);

        let result = with_retry(&config, "fetch", || {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if n < 2 {
                    Err(ExchangeError::NetworkError("reset".into()))
                } else {
                    Ok(n)
                }
            }
        })
        .await;

        assert_eq!(result.unwrap(), 2);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_permanent_error_not_retried() {
        let calls = AtomicU32::new(0);
        let result: Result<(), _> = with_retry(&RetryConfig::default(), "fetch", || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(ExchangeError::SymbolNotFound("FOO".into())) }
        })
        .await;

        assert!(matches!(result, Err(ExchangeError::SymbolNotFound(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhausted_retries_return_last_error() {
        let calls = AtomicU32::new(0);
        let result: Result<(), _> = with_retry(&RetryConfig::default().with_max_retries(2), "fetch", || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(ExchangeError::Timeout("slow".into())) }
        })
        .await;

        assert!(matches!(result, Err(ExchangeError::Timeout(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }
}

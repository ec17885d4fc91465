//! Circuit Breaker pattern implementation.
//!
//! 불안정한 외부 서비스 호출을 키별로 보호합니다. 회로는 키마다 독립적이며
//! 처음 사용할 때 생성됩니다. 차단기는 보호 대상에 대한 참조를 갖지 않으며,
//! 호출자가 호출 전 `check_circuit`, 호출 후 `record_success`/`record_failure`를
//! 호출합니다.
//!
//! # 상태 전이
//!
//! ```text
//! Closed ──[구간 내 실패 임계치 도달]──> Open
//!    ↑                                    │
//!    │                  [check_circuit 시 타임아웃 경과]
//!    │                                    ↓
//!    └──[연속 성공 임계치]── HalfOpen ──[실패]──> Open
//! ```

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use trader_core::CircuitBreakerSettings;

/// Circuit Breaker 상태.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CircuitState {
    /// 정상 상태 - 모든 요청 허용
    Closed,
    /// 장애 상태 - 모든 요청 즉시 거부
    Open,
    /// 복구 테스트 상태 - 탐색 요청 허용
    HalfOpen,
}

impl std::fmt::Display for CircuitState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CircuitState::Closed => write!(f, "closed"),
            CircuitState::Open => write!(f, "open"),
            CircuitState::HalfOpen => write!(f, "half_open"),
        }
    }
}

/// Circuit Breaker 설정.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CircuitBreakerConfig {
    /// 회로를 여는 실패 횟수
    #[serde(default = "default_failure_threshold")]
    pub failure_threshold: u32,
    /// 실패를 집계하는 구간 (밀리초)
    #[serde(default = "default_failure_window_ms")]
    pub failure_window_ms: u64,
    /// Open 상태 유지 시간 (밀리초, 이후 HalfOpen으로 전이 가능)
    #[serde(default = "default_reset_timeout_ms")]
    pub reset_timeout_ms: u64,
    /// HalfOpen에서 Closed로 전이하기 위한 연속 성공 횟수
    #[serde(default = "default_success_threshold")]
    pub success_threshold: u32,
}

fn default_failure_threshold() -> u32 {
    5
}
fn default_failure_window_ms() -> u64 {
    60_000
}
fn default_reset_timeout_ms() -> u64 {
    30_000
}
fn default_success_threshold() -> u32 {
    2
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: default_failure_threshold(),
            failure_window_ms: default_failure_window_ms(),
            reset_timeout_ms: default_reset_timeout_ms(),
            success_threshold: default_success_threshold(),
        }
    }
}

impl From<&CircuitBreakerSettings> for CircuitBreakerConfig {
    fn from(settings: &CircuitBreakerSettings) -> Self {
        Self {
            failure_threshold: settings.failure_threshold,
            failure_window_ms: settings.failure_window_ms,
            reset_timeout_ms: settings.reset_timeout_ms,
            success_threshold: settings.success_threshold,
        }
    }
}

impl CircuitBreakerConfig {
    pub fn failure_window(&self) -> Duration {
        Duration::from_millis(self.failure_window_ms)
    }

    pub fn reset_timeout(&self) -> Duration {
        Duration::from_millis(self.reset_timeout_ms)
    }
}

/// 키 하나의 회로 상태.
#[derive(Debug)]
struct Circuit {
    state: CircuitState,
    /// 구간 내 실패 시각 (오래된 것부터)
    failures: VecDeque<Instant>,
    consecutive_successes: u32,
    opened_at: Option<Instant>,
}

impl Circuit {
    fn new() -> Self {
        Self {
            state: CircuitState::Closed,
            failures: VecDeque::new(),
            consecutive_successes: 0,
            opened_at: None,
        }
    }

    /// 집계 구간을 벗어난 실패를 제거합니다.
    fn prune(&mut self, now: Instant, window: Duration) {
        while let Some(&oldest) = self.failures.front() {
            if now.duration_since(oldest) > window {
                self.failures.pop_front();
            } else {
                break;
            }
        }
    }

    fn open(&mut self, now: Instant) {
        self.state = CircuitState::Open;
        self.opened_at = Some(now);
        self.consecutive_successes = 0;
    }

    fn close(&mut self) {
        self.state = CircuitState::Closed;
        self.failures.clear();
        self.consecutive_successes = 0;
        self.opened_at = None;
    }

    fn remaining_cooldown(&self, now: Instant, reset_timeout: Duration) -> Duration {
        self.opened_at
            .map(|opened| reset_timeout.saturating_sub(now.duration_since(opened)))
            .unwrap_or_default()
    }
}

/// 회로 상태 스냅샷.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CircuitStats {
    /// 보호 키
    pub key: String,
    /// 현재 상태
    pub state: CircuitState,
    /// 집계 구간 내 실패 횟수
    pub recent_failures: usize,
    /// HalfOpen 연속 성공 횟수
    pub consecutive_successes: u32,
    /// Open 이후 남은 대기 시간
    pub retry_after: Option<Duration>,
}

/// 전체 차단기 메트릭.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CircuitBreakerMetrics {
    /// 총 실패 기록 수
    pub total_failures: u64,
    /// 총 성공 기록 수
    pub total_successes: u64,
    /// Open 전이 횟수
    pub open_count: u64,
    /// 추적 중인 키 수
    pub tracked_circuits: usize,
}

/// Circuit이 열려있을 때 반환되는 에러.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CircuitOpenError {
    /// 보호 키
    pub key: String,
    /// 남은 대기 시간
    pub retry_after: Duration,
}

impl std::fmt::Display for CircuitOpenError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Circuit breaker '{}' is open (retry after {}ms)",
            self.key,
            self.retry_after.as_millis()
        )
    }
}

impl std::error::Error for CircuitOpenError {}

/// 키별 Circuit Breaker 레지스트리.
///
/// 프로세스 전체에서 하나를 공유합니다 (`Arc<CircuitBreaker>`).
///
/// # Example
///
/// ```ignore
/// let cb = CircuitBreaker::new(CircuitBreakerConfig::default());
///
/// cb.check_circuit("exchange:binance")?;
/// match client.fetch_ohlcv(&symbol, timeframe, 500).await {
///     Ok(candles) => {
///         cb.record_success("exchange:binance");
///         Ok(candles)
///     }
///     Err(e) => {
///         cb.record_failure("exchange:binance");
///         Err(e)
///     }
/// }
/// ```
pub struct CircuitBreaker {
    config: CircuitBreakerConfig,
    circuits: Mutex<HashMap<String, Circuit>>,
    total_failures: AtomicU64,
    total_successes: AtomicU64,
    open_count: AtomicU64,
}

impl Default for CircuitBreaker {
    fn default() -> Self {
        Self::new(CircuitBreakerConfig::default())
    }
}

impl CircuitBreaker {
    /// 새 Circuit Breaker 생성.
    pub fn new(config: CircuitBreakerConfig) -> Self {
        Self {
            config,
            circuits: Mutex::new(HashMap::new()),
            total_failures: AtomicU64::new(0),
            total_successes: AtomicU64::new(0),
            open_count: AtomicU64::new(0),
        }
    }

    pub fn config(&self) -> &CircuitBreakerConfig {
        &self.config
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, Circuit>> {
        // 잠금 보유 중 패닉이 나도 상태 자체는 항상 일관적임
        self.circuits.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// 호출 전 회로를 확인합니다.
    ///
    /// - Closed: 통과
    /// - Open, 대기 시간 미경과: `CircuitOpenError` (남은 대기 시간 포함)
    /// - Open, 대기 시간 경과: HalfOpen으로 전이 후 통과
    /// - HalfOpen: 탐색 요청으로 통과
    pub fn check_circuit(&self, key: &str) -> Result<(), CircuitOpenError> {
        let mut circuits = self.lock();
        let Some(circuit) = circuits.get_mut(key) else {
            return Ok(());
        };

        match circuit.state {
            CircuitState::Closed | CircuitState::HalfOpen => Ok(()),
            CircuitState::Open => {
                let now = Instant::now();
                let remaining = circuit.remaining_cooldown(now, self.config.reset_timeout());
                if remaining.is_zero() {
                    circuit.state = CircuitState::HalfOpen;
                    circuit.consecutive_successes = 0;
                    tracing::info!(circuit = %key, "Circuit breaker timeout: Open -> HalfOpen");
                    Ok(())
                } else {
                    Err(CircuitOpenError {
                        key: key.to_string(),
                        retry_after: remaining,
                    })
                }
            }
        }
    }

    /// 현재 Open 상태인지 확인합니다. 상태를 전이시키지 않습니다.
    pub fn is_open(&self, key: &str) -> bool {
        self.get_state(key) == CircuitState::Open
    }

    /// 현재 상태. 추적하지 않는 키는 Closed.
    pub fn get_state(&self, key: &str) -> CircuitState {
        self.lock()
            .get(key)
            .map(|c| c.state)
            .unwrap_or(CircuitState::Closed)
    }

    /// 성공 기록.
    ///
    /// HalfOpen에서 연속 성공이 임계치에 도달하면 Closed로 전이합니다.
    /// Closed 상태의 집계 구간 내 실패는 성공으로 지워지지 않습니다.
    pub fn record_success(&self, key: &str) {
        self.total_successes.fetch_add(1, Ordering::Relaxed);

        let mut circuits = self.lock();
        let Some(circuit) = circuits.get_mut(key) else {
            return;
        };

        if circuit.state == CircuitState::HalfOpen {
            circuit.consecutive_successes += 1;
            if circuit.consecutive_successes >= self.config.success_threshold {
                circuit.close();
                tracing::info!(circuit = %key, "Circuit breaker recovered: HalfOpen -> Closed");
            }
        }
    }

    /// 실패 기록.
    ///
    /// - Closed: 구간 내 실패가 임계치에 도달하면 Open
    /// - HalfOpen: 즉시 Open
    /// - Open: `opened_at` 갱신 (대기 시간 재시작)
    pub fn record_failure(&self, key: &str) {
        self.total_failures.fetch_add(1, Ordering::Relaxed);

        let now = Instant::now();
        let window = self.config.failure_window();
        let mut circuits = self.lock();
        let circuit = circuits.entry(key.to_string()).or_insert_with(Circuit::new);

        match circuit.state {
            CircuitState::Closed => {
                circuit.prune(now, window);
                circuit.failures.push_back(now);
                if circuit.failures.len() >= self.config.failure_threshold as usize {
                    circuit.open(now);
                    self.open_count.fetch_add(1, Ordering::Relaxed);
                    tracing::warn!(
                        circuit = %key,
                        failures = circuit.failures.len(),
                        window_ms = self.config.failure_window_ms,
                        "Circuit breaker opened: Closed -> Open"
                    );
                }
            }
            CircuitState::HalfOpen => {
                circuit.open(now);
                self.open_count.fetch_add(1, Ordering::Relaxed);
                tracing::warn!(circuit = %key, "Circuit breaker probe failed: HalfOpen -> Open");
            }
            CircuitState::Open => {
                circuit.opened_at = Some(now);
                tracing::debug!(circuit = %key, "Circuit breaker still failing, cooldown refreshed");
            }
        }
    }

    /// 회로 상태 스냅샷.
    pub fn get_stats(&self, key: &str) -> CircuitStats {
        let now = Instant::now();
        let window = self.config.failure_window();
        let mut circuits = self.lock();

        match circuits.get_mut(key) {
            Some(circuit) => {
                circuit.prune(now, window);
                CircuitStats {
                    key: key.to_string(),
                    state: circuit.state,
                    recent_failures: circuit.failures.len(),
                    consecutive_successes: circuit.consecutive_successes,
                    retry_after: (circuit.state == CircuitState::Open)
                        .then(|| circuit.remaining_cooldown(now, self.config.reset_timeout())),
                }
            }
            None => CircuitStats {
                key: key.to_string(),
                state: CircuitState::Closed,
                recent_failures: 0,
                consecutive_successes: 0,
                retry_after: None,
            },
        }
    }

    /// 회로를 초기화합니다 (Closed, 실패 기록 삭제).
    pub fn reset(&self, key: &str) {
        if self.lock().remove(key).is_some() {
            tracing::info!(circuit = %key, "Circuit breaker manually reset");
        }
    }

    /// 회로를 강제로 엽니다.
    pub fn trip(&self, key: &str) {
        let mut circuits = self.lock();
        let circuit = circuits.entry(key.to_string()).or_insert_with(Circuit::new);
        circuit.open(Instant::now());
        self.open_count.fetch_add(1, Ordering::Relaxed);
        tracing::warn!(circuit = %key, "Circuit breaker manually tripped");
    }

    /// 전체 메트릭.
    pub fn metrics(&self) -> CircuitBreakerMetrics {
        CircuitBreakerMetrics {
            total_failures: self.total_failures.load(Ordering::Relaxed),
            total_successes: self.total_successes.load(Ordering::Relaxed),
            open_count: self.open_count.load(Ordering::Relaxed),
            tracked_circuits: self.lock().len(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    fn fast_config() -> CircuitBreakerConfig {
        CircuitBreakerConfig {
            failure_threshold: 3,
            failure_window_ms: 60_000,
            reset_timeout_ms: 50,
            success_threshold: 2,
        }
    }

    #[test]
    fn test_unknown_key_is_closed() {
        let cb = CircuitBreaker::default();
        assert_eq!(cb.get_state("exchange:binance"), CircuitState::Closed);
        assert!(cb.check_circuit("exchange:binance").is_ok());
        assert_eq!(cb.metrics().tracked_circuits, 0);
    }

    #[test]
    fn test_fifth_failure_trips_default_config() {
        let cb = CircuitBreaker::default();
        for _ in 0..4 {
            cb.record_failure("k");
        }
        assert_eq!(cb.get_state("k"), CircuitState::Closed);

        cb.record_failure("k");
        assert_eq!(cb.get_state("k"), CircuitState::Open);

        let err = cb.check_circuit("k").unwrap_err();
        assert_eq!(err.key, "k");
        assert!(err.retry_after > Duration::ZERO);
        assert!(err.retry_after <= Duration::from_millis(30_000));
    }

    #[test]
    fn test_keys_are_independent() {
        let cb = CircuitBreaker::new(fast_config());
        for _ in 0..3 {
            cb.record_failure("exchange:a");
        }
        assert!(cb.is_open("exchange:a"));
        assert!(!cb.is_open("exchange:b"));
        assert!(cb.check_circuit("exchange:b").is_ok());
    }

    #[test]
    fn test_success_in_closed_keeps_window() {
        let cb = CircuitBreaker::new(fast_config());
        cb.record_failure("k");
        cb.record_failure("k");
        cb.record_success("k");
        assert_eq!(cb.get_stats("k").recent_failures, 2);

        cb.record_failure("k");
        assert_eq!(cb.get_state("k"), CircuitState::Open);
    }

    #[test]
    fn test_stale_failures_pruned() {
        let cb = CircuitBreaker::new(CircuitBreakerConfig {
            failure_window_ms: 30,
            ..fast_config()
        });
        cb.record_failure("k");
        cb.record_failure("k");
        thread::sleep(Duration::from_millis(50));

        cb.record_failure("k");
        assert_eq!(cb.get_state("k"), CircuitState::Closed);
        assert_eq!(cb.get_stats("k").recent_failures, 1);
    }

    #[test]
    fn test_check_drives_open_to_half_open() {
        let cb = CircuitBreaker::new(fast_config());
        cb.trip("k");
        assert!(cb.check_circuit("k").is_err());

        thread::sleep(Duration::from_millis(60));

        // 조회만으로는 전이하지 않음
        assert_eq!(cb.get_state("k"), CircuitState::Open);
        assert!(cb.check_circuit("k").is_ok());
        assert_eq!(cb.get_state("k"), CircuitState::HalfOpen);
    }

    #[test]
    fn test_half_open_recovers_after_success_threshold() {
        let cb = CircuitBreaker::new(fast_config());
        cb.trip("k");
        thread::sleep(Duration::from_millis(60));
        cb.check_circuit("k").unwrap();

        cb.record_success("k");
        assert_eq!(cb.get_state("k"), CircuitState::HalfOpen);
        cb.record_success("k");
        assert_eq!(cb.get_state("k"), CircuitState::Closed);
        assert_eq!(cb.get_stats("k").recent_failures, 0);
    }

    #[test]
    fn test_half_open_failure_reopens() {
        let cb = CircuitBreaker::new(fast_config());
        cb.trip("k");
        thread::sleep(Duration::from_millis(60));
        cb.check_circuit("k").unwrap();
        cb.record_success("k");

        cb.record_failure("k");
        assert_eq!(cb.get_state("k"), CircuitState::Open);
        assert_eq!(cb.get_stats("k").consecutive_successes, 0);
        assert!(cb.check_circuit("k").is_err());
    }

    #[test]
    fn test_failure_while_open_refreshes_cooldown() {
        let cb = CircuitBreaker::new(CircuitBreakerConfig {
            reset_timeout_ms: 100,
            ..fast_config()
        });
        cb.trip("k");
        thread::sleep(Duration::from_millis(70));
        cb.record_failure("k");
        thread::sleep(Duration::from_millis(50));

        // 최초 trip 기준이면 경과했지만 갱신된 시각 기준으로는 아직 대기 중
        assert!(cb.check_circuit("k").is_err());
    }

    #[test]
    fn test_reset_and_metrics() {
        let cb = CircuitBreaker::new(fast_config());
        for _ in 0..3 {
            cb.record_failure("k");
        }
        cb.record_success("other");

        let metrics = cb.metrics();
        assert_eq!(metrics.total_failures, 3);
        assert_eq!(metrics.total_successes, 1);
        assert_eq!(metrics.open_count, 1);

        cb.reset("k");
        assert_eq!(cb.get_state("k"), CircuitState::Closed);
        assert!(cb.check_circuit("k").is_ok());
    }

    #[test]
    fn test_config_from_settings() {
        let settings = CircuitBreakerSettings::default();
        let config = CircuitBreakerConfig::from(&settings);
        assert_eq!(config.failure_threshold, 5);
        assert_eq!(config.failure_window(), Duration::from_secs(60));
        assert_eq!(config.reset_timeout(), Duration::from_secs(30));
        assert_eq!(config.success_threshold, 2);
    }
}

//! 거래소 연결 및 장애 허용.
//!
//! 이 크레이트는 다음을 제공합니다:
//! - ExchangeClient trait: 시장 데이터 조회 인터페이스
//! - Binance REST 커넥터
//! - Circuit breaker: 키별 회로 차단기
//! - 지수 백오프 재시도
//! - 다중 거래소 대체 조회

pub mod circuit_breaker;
pub mod connector;
pub mod error;
pub mod fallback;
pub mod retry;
pub mod traits;

pub use circuit_breaker::{
    CircuitBreaker, CircuitBreakerConfig, CircuitBreakerMetrics, CircuitOpenError, CircuitState,
    CircuitStats,
};
pub use connector::{BinanceClient, BinanceConfig};
pub use error::*;
pub use fallback::{exchange_circuit_key, MultiExchangeFetcher};
pub use retry::{with_retry, RetryConfig};
pub use traits::*;

//! 성과 분석 및 백테스트 시뮬레이션.
//!
//! 이 크레이트는 다음을 제공합니다:
//! - 성과 지표 계산 (수익률, 변동성, 샤프/소르티노, 낙폭, 승률)
//! - 시뮬레이터 인터페이스와 바이앤홀드 기준 구현
//!
//! # Re-exports
//!
//! - [`performance`]: 지표 계산 (MetricsCalculator, MetricsResult 등)
//! - [`backtest`]: 시뮬레이션 (Simulator, BuyAndHoldSimulator 등)

pub mod backtest;
pub mod performance;

// Performance 모듈 re-exports
pub use performance::{
    calculate_metrics, MetricsCalculator, MetricsConfig, MetricsInput, MetricsResult,
    DEFAULT_RISK_FREE_RATE,
};

// Backtest 모듈 re-exports
pub use backtest::{
    BuyAndHoldSimulator, SimulationError, SimulationOutcome, SimulationRequest, SimulationResult,
    Simulator,
};

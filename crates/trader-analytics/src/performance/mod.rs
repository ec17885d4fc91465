//! 성과 분석 모듈
//!
//! - [`ratios`]: 샤프/소르티노 비율 기본 함수
//! - [`metrics`]: 시계열/원장 기반 성과 지표 계산기

pub mod metrics;
pub mod ratios;

pub use metrics::{
    calculate_metrics, MetricsCalculator, MetricsConfig, MetricsInput, MetricsResult,
    DEFAULT_RISK_FREE_RATE,
};

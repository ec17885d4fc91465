//! # Trader Core
//!
//! 백테스트 파이프라인의 핵심 도메인 모델 및 타입을 제공합니다.
//!
//! 이 크레이트는 파이프라인 전반에서 사용되는 기본 타입을 제공합니다:
//! - 캔들 및 시장 데이터셋 구조체
//! - 코인(자산) 식별 타입
//! - 파이프라인 상태/단계 모델
//! - 백테스트 거래 기록
//! - 타임프레임 및 샘플링 주기
//! - 설정 관리
//! - 로깅 인프라

pub mod config;
pub mod domain;
pub mod error;
pub mod logging;
pub mod types;

pub use config::*;
pub use domain::*;
pub use error::*;
pub use logging::*;
pub use types::*;

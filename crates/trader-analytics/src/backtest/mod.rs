//! 백테스트 시뮬레이션 모듈
//!
//! 전략 시뮬레이션 자체는 외부 구현체가 담당하며, 이 모듈은 파이프라인이
//! 의존하는 `Simulator` 인터페이스와 기준 구현체(바이앤홀드)를 제공합니다.

pub mod simulator;

pub use simulator::{
    BuyAndHoldSimulator, SimulationError, SimulationOutcome, SimulationRequest, SimulationResult,
    Simulator,
};

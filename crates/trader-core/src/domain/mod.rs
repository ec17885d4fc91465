//! 백테스트 파이프라인의 도메인 모델.

mod coin;
mod market_data;
mod pipeline;
mod trade;

pub use coin::*;
pub use market_data::*;
pub use pipeline::*;
pub use trade::*;

//! 거래소 커넥터 구현.

pub mod binance;

pub use binance::{BinanceClient, BinanceConfig};

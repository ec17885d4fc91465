//! 시장 데이터 수집 및 종목 해석.
//!
//! 이 crate는 다음을 제공합니다:
//! - 오브젝트 스토리지 추상화 (로컬, 인메모리)
//! - 스트리밍 CSV 시장 데이터 리더
//! - 코인 카탈로그 (인메모리, PostgreSQL)
//! - 종목 및 호가 통화 해석기

pub mod catalog;
pub mod error;
pub mod reader;
pub mod resolver;
pub mod storage;

pub use error::{DataError, Result};

pub use catalog::{CoinCatalog, InMemoryCoinCatalog, PgCoinCatalog};
pub use reader::{MarketDataReader, ReaderConfig, DEFAULT_MAX_FILE_SIZE};
pub use resolver::{InstrumentResolver, DEFAULT_QUOTE_FALLBACK, MIN_BASE_SYMBOL_LEN};
pub use storage::{
    FileStats, InMemoryObjectStorage, LocalObjectStorage, ObjectStorage, SanitizedPath,
};

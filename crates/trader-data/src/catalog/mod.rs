//! 코인 카탈로그.
//!
//! 정규 자산 식별자를 조회하는 외부 저장소 인터페이스와 구현체입니다.
//! - `InMemoryCoinCatalog` - 고정 목록 (JSON 파일 로드 지원)
//! - `PgCoinCatalog` - PostgreSQL `coins` 테이블

mod memory;
mod postgres;

pub use memory::InMemoryCoinCatalog;
pub use postgres::PgCoinCatalog;

use async_trait::async_trait;
use trader_core::Coin;

use crate::error::Result;

/// 코인 카탈로그 조회 인터페이스.
///
/// 심볼 비교는 대소문자를 구분하지 않습니다. 같은 심볼에 실제 자산과
/// 가상 자산이 함께 있으면 실제 자산을 우선합니다.
#[async_trait]
pub trait CoinCatalog: Send + Sync {
    /// 심볼로 코인 하나를 조회합니다.
    async fn get_coin_by_symbol(&self, symbol: &str) -> Result<Option<Coin>>;

    /// 여러 심볼을 한 번에 조회합니다. 결과 순서는 보장하지 않습니다.
    async fn get_multiple_coins_by_symbol(&self, symbols: &[String]) -> Result<Vec<Coin>>;
}

use async_trait::async_trait;
use sqlx::PgPool;
use trader_core::Coin;

use super::CoinCatalog;
use crate::error::Result;

/// 가상 자산을 뒤로 보내는 정렬 조건.
const REAL_FIRST: &str = "(id ILIKE '%virtual%' OR id LIKE 'USD-%'), id";

/// PostgreSQL `coins(id, symbol, name)` 테이블 기반 카탈로그.
#[derive(Clone)]
pub struct PgCoinCatalog {
    pool: PgPool,
}

impl PgCoinCatalog {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CoinCatalog for PgCoinCatalog {
    async fn get_coin_by_symbol(&self, symbol: &str) -> Result<Option<Coin>> {
        let coin = sqlx::query_as::<_, Coin>(&format!(
            "SELECT id, symbol, name FROM coins WHERE UPPER(symbol) = UPPER($1) ORDER BY {REAL_FIRST} LIMIT 1"
        ))
        .bind(symbol)
        .fetch_optional(&self.pool)
        .await?;

        Ok(coin)
    }

    async fn get_multiple_coins_by_symbol(&self, symbols: &[String]) -> Result<Vec<Coin>> {
        if symbols.is_empty() {
            return Ok(Vec::new());
        }

        let upper: Vec<String> = symbols.iter().map(|s| s.to_uppercase()).collect();
        let coins = sqlx::query_as::<_, Coin>(&format!(
            "SELECT id, symbol, name FROM coins WHERE UPPER(symbol) = ANY($1) ORDER BY {REAL_FIRST}"
        ))
        .bind(&upper)
        .fetch_all(&self.pool)
        .await?;

        Ok(coins)
    }
}

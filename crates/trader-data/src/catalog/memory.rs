use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use trader_core::Coin;

use super::CoinCatalog;
use crate::error::Result;

/// 고정된 코인 목록을 사용하는 카탈로그.
#[derive(Debug, Default)]
pub struct InMemoryCoinCatalog {
    coins: Vec<Coin>,
    batch_calls: AtomicUsize,
}

impl InMemoryCoinCatalog {
    pub fn new(coins: Vec<Coin>) -> Self {
        Self {
            coins,
            batch_calls: AtomicUsize::new(0),
        }
    }

    /// `[{"id": .., "symbol": .., "name": ..}]` 형식의 JSON 파일에서 로드합니다.
    pub async fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let raw = tokio::fs::read(path).await?;
        let coins: Vec<Coin> = serde_json::from_slice(&raw)?;
        Ok(Self::new(coins))
    }

    pub fn len(&self) -> usize {
        self.coins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.coins.is_empty()
    }

    /// `get_multiple_coins_by_symbol` 호출 횟수.
    pub fn batch_call_count(&self) -> usize {
        self.batch_calls.load(Ordering::Relaxed)
    }

    fn find(&self, symbol: &str) -> Option<&Coin> {
        let mut matches = self
            .coins
            .iter()
            .filter(|c| c.symbol.eq_ignore_ascii_case(symbol));
        let first = matches.next()?;
        if !first.is_virtual() {
            return Some(first);
        }
        matches.find(|c| !c.is_virtual()).or(Some(first))
    }
}

#[async_trait]
impl CoinCatalog for InMemoryCoinCatalog {
    async fn get_coin_by_symbol(&self, symbol: &str) -> Result<Option<Coin>> {
        Ok(self.find(symbol).cloned())
    }

    async fn get_multiple_coins_by_symbol(&self, symbols: &[String]) -> Result<Vec<Coin>> {
        self.batch_calls.fetch_add(1, Ordering::Relaxed);
        Ok(self
            .coins
            .iter()
            .filter(|c| symbols.iter().any(|s| c.symbol.eq_ignore_ascii_case(s)))
            .cloned()
            .collect())
    }
}

//! 종목 및 호가 통화 해석기.
//!
//! 사용자가 입력한 자유 형식 심볼(`ETHUSDT`, `BTC`, `sol/usd`)을 코인
//! 카탈로그의 정규 자산으로 변환합니다. 카탈로그 조회는 해석 한 번당
//! 배치 호출 한 번입니다.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use tracing::{debug, info, warn};
use trader_core::{
    Coin, MarketDataSet, ResolvedInstrumentSet, TradingPair, WARNING_INSTRUMENT_UNRESOLVED,
    WARNING_UNIVERSE_TRUNCATED,
};

use crate::catalog::CoinCatalog;
use crate::error::{DataError, Result};

/// 거래쌍에서 분리한 기준 자산의 최소 길이.
pub const MIN_BASE_SYMBOL_LEN: usize = 3;

/// 기본 호가 통화 대체 순서.
pub const DEFAULT_QUOTE_FALLBACK: [&str; 4] = ["USDT", "USDC", "BUSD", "DAI"];

/// 종목/호가 통화 해석기.
pub struct InstrumentResolver {
    catalog: Arc<dyn CoinCatalog>,
    quote_fallback_chain: Vec<String>,
}

impl InstrumentResolver {
    pub fn new(catalog: Arc<dyn CoinCatalog>) -> Self {
        Self {
            catalog,
            quote_fallback_chain: DEFAULT_QUOTE_FALLBACK.iter().map(|s| s.to_string()).collect(),
        }
    }

    /// 호가 통화 대체 순서를 설정합니다.
    pub fn with_quote_fallback_chain(mut self, chain: Vec<String>) -> Self {
        self.quote_fallback_chain = chain;
        self
    }

    /// 데이터셋의 요청 종목을 정규 코인 목록으로 해석합니다.
    ///
    /// - 정확히 일치하는 심볼은 그대로 사용
    /// - 거래쌍 형태의 심볼은 기준 자산으로 해석 (3자 미만 기준 자산은 거부)
    /// - 요청 순서 유지, 같은 코인은 처음 한 번만 포함
    /// - `max_instruments` 초과 시 잘라내고 `instrument_universe_truncated` 경고
    ///
    /// # Errors
    /// 하나도 해석하지 못하면 시도한 심볼 목록과 함께 `UnresolvedUniverse`.
    pub async fn resolve_coins(&self, dataset: &MarketDataSet) -> Result<ResolvedInstrumentSet> {
        let mut warnings = Vec::new();

        let mut requested: Vec<String> = dataset
            .instrument_universe
            .iter()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        if requested.len() > dataset.max_instruments {
            warn!(
                requested = requested.len(),
                max = dataset.max_instruments,
                "Instrument universe truncated"
            );
            requested.truncate(dataset.max_instruments);
            warnings.push(WARNING_UNIVERSE_TRUNCATED.to_string());
        }

        let candidates: Vec<SymbolCandidates> =
            requested.iter().map(|s| SymbolCandidates::from_requested(s)).collect();

        let mut lookups: Vec<String> = Vec::new();
        let mut seen = HashSet::new();
        for symbol in candidates.iter().flat_map(|c| c.lookups()) {
            if seen.insert(symbol.clone()) {
                lookups.push(symbol);
            }
        }

        let by_symbol = if lookups.is_empty() {
            HashMap::new()
        } else {
            index_by_symbol(self.catalog.get_multiple_coins_by_symbol(&lookups).await?)
        };

        let mut coins: Vec<Coin> = Vec::new();
        for candidate in &candidates {
            match candidate.lookups().find_map(|s| by_symbol.get(&s)) {
                Some(coin) => {
                    if coins.iter().any(|c| c.id == coin.id) {
                        debug!(symbol = %candidate.requested, coin = %coin.id, "Duplicate instrument ignored");
                    } else {
                        coins.push(coin.clone());
                    }
                }
                None => {
                    debug!(symbol = %candidate.requested, "Instrument not found in catalog");
                    warnings.push(format!(
                        "{WARNING_INSTRUMENT_UNRESOLVED}:{}",
                        candidate.requested.to_uppercase()
                    ));
                }
            }
        }

        if coins.is_empty() {
            return Err(DataError::UnresolvedUniverse { attempted: requested });
        }

        info!(
            requested = requested.len(),
            resolved = coins.len(),
            warnings = warnings.len(),
            "Instrument universe resolved"
        );

        Ok(ResolvedInstrumentSet { coins, warnings })
    }

    /// 호가 통화를 해석합니다.
    ///
    /// `preferred`를 먼저 시도하고, 이후 대체 순서대로 시도합니다 (이미 시도한
    /// 심볼은 건너뜀). 가상 자산은 절대 반환하지 않습니다.
    /// `fallback_chain`이 `None`이면 설정된 기본 순서를 사용합니다.
    ///
    /// # Errors
    /// 모든 후보가 실패하면 시도한 모든 심볼과 함께 `QuoteCurrencyNotFound`.
    pub async fn resolve_quote_currency(
        &self,
        preferred: Option<&str>,
        fallback_chain: Option<&[String]>,
    ) -> Result<Coin> {
        let chain = fallback_chain.unwrap_or(self.quote_fallback_chain.as_slice());

        let mut attempted: Vec<String> = Vec::new();
        let preferred = preferred.map(str::trim).filter(|s| !s.is_empty());
        let candidates = preferred.into_iter().chain(chain.iter().map(String::as_str));

        for candidate in candidates {
            let symbol = candidate.to_uppercase();
            if attempted.contains(&symbol) {
                continue;
            }
            attempted.push(symbol.clone());

            match self.catalog.get_coin_by_symbol(&symbol).await? {
                Some(coin) if coin.is_virtual() => {
                    debug!(symbol = %symbol, coin = %coin.id, "Skipping virtual quote currency");
                }
                Some(coin) => {
                    debug!(symbol = %symbol, coin = %coin.id, "Quote currency resolved");
                    return Ok(coin);
                }
                None => {}
            }
        }

        warn!(attempted = ?attempted, "Quote currency not found");
        Err(DataError::QuoteCurrencyNotFound { attempted })
    }
}

/// 요청 심볼 하나에 대한 카탈로그 조회 후보.
struct SymbolCandidates {
    requested: String,
    exact: String,
    base: Option<String>,
}

impl SymbolCandidates {
    fn from_requested(requested: &str) -> Self {
        let exact = requested.to_uppercase();
        let base = TradingPair::parse(requested)
            .map(|pair| pair.base)
            .filter(|base| base.len() >= MIN_BASE_SYMBOL_LEN && *base != exact);
        Self {
            requested: requested.to_string(),
            exact,
            base,
        }
    }

    /// 우선순위 순서의 조회 심볼.
    fn lookups(&self) -> impl Iterator<Item = String> + '_ {
        std::iter::once(self.exact.clone()).chain(self.base.clone())
    }
}

/// 심볼(대문자) -> 코인. 같은 심볼이 여럿이면 실제 자산을 우선합니다.
fn index_by_symbol(coins: Vec<Coin>) -> HashMap<String, Coin> {
    let mut index: HashMap<String, Coin> = HashMap::new();
    for coin in coins {
        let key = coin.symbol.to_uppercase();
        let replace = index
            .get(&key)
            .map_or(true, |existing| existing.is_virtual() && !coin.is_virtual());
        if replace {
            index.insert(key, coin);
        }
    }
    index
}

//! 다중 거래소 대체 조회.
//!
//! 설정된 순서대로 거래소를 시도합니다. 거래소마다 독립된 회로(`exchange:{name}`)로
//! 보호되며, 회로 안쪽에서 재시도가 적용됩니다. 모든 거래소가 실패해야 에러를
//! 반환합니다. 회로에는 네트워크, 타임아웃, 5xx 에러만 실패로 기록됩니다.

use std::future::Future;
use std::sync::Arc;

use tracing::{info, warn};
use trader_core::{Candle, Ticker, Timeframe};

use crate::circuit_breaker::CircuitBreaker;
use crate::error::ExchangeError;
use crate::retry::{with_retry, RetryConfig};
use crate::traits::{ExchangeClient, ExchangeResult, MarketInfo};

/// 거래소 회로 차단기 키.
pub fn exchange_circuit_key(name: &str) -> String {
    format!("exchange:{name}")
}

/// 회로 차단기로 보호되는 다중 거래소 조회기.
pub struct MultiExchangeFetcher {
    exchanges: Vec<Arc<dyn ExchangeClient>>,
    breaker: Arc<CircuitBreaker>,
    retry: RetryConfig,
}

impl MultiExchangeFetcher {
    pub fn new(exchanges: Vec<Arc<dyn ExchangeClient>>, breaker: Arc<CircuitBreaker>) -> Self {
        Self {
            exchanges,
            breaker,
            retry: RetryConfig::default(),
        }
    }

    pub fn with_retry_config(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    pub fn breaker(&self) -> &Arc<CircuitBreaker> {
        &self.breaker
    }

    /// 첫 번째로 성공한 거래소의 캔들을 반환합니다.
    pub async fn fetch_ohlcv(
        &self,
        symbol: &str,
        timeframe: Timeframe,
        limit: u32,
    ) -> ExchangeResult<Vec<Candle>> {
        self.first_success("fetch_ohlcv", |exchange| async move {
            exchange.fetch_ohlcv(symbol, timeframe, limit).await
        })
        .await
    }

    /// 첫 번째로 성공한 거래소의 마켓 목록을 반환합니다.
    pub async fn load_markets(&self) -> ExchangeResult<Vec<MarketInfo>> {
        self.first_success("load_markets", |exchange| async move {
            exchange.load_markets().await
        })
        .await
    }

    /// 첫 번째로 성공한 거래소의 시세를 반환합니다.
    pub async fn fetch_ticker(&self, symbol: &str) -> ExchangeResult<Ticker> {
        self.first_success("fetch_ticker", |exchange| async move {
            exchange.fetch_ticker(symbol).await
        })
        .await
    }

    async fn first_success<T, F, Fut>(&self, operation: &str, call: F) -> ExchangeResult<T>
    where
        F: Fn(Arc<dyn ExchangeClient>) -> Fut,
        Fut: Future<Output = ExchangeResult<T>>,
    {
        if self.exchanges.is_empty() {
            return Err(ExchangeError::NoExchangeConfigured);
        }

        let mut attempted = Vec::with_capacity(self.exchanges.len());
        let mut last_error = String::new();

        for exchange in &self.exchanges {
            let name = exchange.name().to_string();
            let key = exchange_circuit_key(&name);
            attempted.push(name.clone());

            if let Err(open) = self.breaker.check_circuit(&key) {
                warn!(
                    circuit = %key,
                    retry_after_ms = open.retry_after.as_millis() as u64,
                    "Skipping exchange with open circuit"
                );
                last_error = open.to_string();
                continue;
            }

            let result = with_retry(&self.retry, operation, || call(Arc::clone(exchange))).await;
            match result {
                Ok(value) => {
                    self.breaker.record_success(&key);
                    if attempted.len() > 1 {
                        info!(exchange = %name, operation, "Fallback exchange succeeded");
                    }
                    return Ok(value);
                }
                Err(e) => {
                    if e.is_exchange_fault() {
                        self.breaker.record_failure(&key);
                    }
                    warn!(exchange = %name, operation, error = %e, "Exchange attempt failed");
                    last_error = e.to_string();
                }
            }
        }

        Err(ExchangeError::AllExchangesFailed {
            attempted,
            last_error,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::circuit_breaker::{CircuitBreakerConfig, CircuitState};
    use async_trait::async_trait;
    use chrono::Utc;
    use rust_decimal_macros::dec;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Clone, Copy)]
    enum Failure {
        None,
        Network,
        UnknownSymbol,
    }

    struct StubExchange {
        name: String,
        failure: Failure,
        calls: AtomicUsize,
    }

    impl StubExchange {
        fn new(name: &str, fail: bool) -> Arc<Self> {
            Self::failing_with(name, if fail { Failure::Network } else { Failure::None })
        }

        fn failing_with(name: &str, failure: Failure) -> Arc<Self> {
            Arc::new(Self {
                name: name.to_string(),
                failure,
                calls: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl ExchangeClient for StubExchange {
        fn name(&self) -> &str {
            &self.name
        }

        async fn fetch_ohlcv(
            &self,
            symbol: &str,
            _timeframe: Timeframe,
            _limit: u32,
        ) -> ExchangeResult<Vec<Candle>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match self.failure {
                Failure::None => Ok(vec![Candle::from_close(Utc::now(), dec!(100), symbol)]),
                Failure::Network => Err(ExchangeError::NetworkError("connection reset".into())),
                Failure::UnknownSymbol => Err(ExchangeError::SymbolNotFound(symbol.to_string())),
            }
        }

        async fn load_markets(&self) -> ExchangeResult<Vec<MarketInfo>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(vec![MarketInfo {
                symbol: format!("{}-BTCUSDT", self.name),
                base: "BTC".into(),
                quote: "USDT".into(),
                active: true,
            }])
        }

        async fn fetch_ticker(&self, _symbol: &str) -> ExchangeResult<Ticker> {
            Err(ExchangeError::Unknown("unsupported".into()))
        }
    }

    fn fetcher(exchanges: Vec<Arc<dyn ExchangeClient>>) -> MultiExchangeFetcher {
        let breaker = Arc::new(CircuitBreaker::new(CircuitBreakerConfig {
            failure_threshold: 2,
            ..Default::default()
        }));
        MultiExchangeFetcher::new(exchanges, breaker).with_retry_config(RetryConfig::none())
    }

    #[tokio::test]
    async fn test_falls_back_to_next_exchange() {
        let primary = StubExchange::new("primary", true);
        let backup = StubExchange::new("backup", false);
        let fetcher = fetcher(vec![
            primary.clone() as Arc<dyn ExchangeClient>,
            backup.clone() as Arc<dyn ExchangeClient>,
        ]);

        let candles = fetcher.fetch_ohlcv("BTC/USDT", Timeframe::D1, 10).await.unwrap();
        assert_eq!(candles.len(), 1);
        assert_eq!(primary.calls.load(Ordering::SeqCst), 1);
        assert_eq!(backup.calls.load(Ordering::SeqCst), 1);
        assert_eq!(fetcher.breaker().get_stats("exchange:primary").recent_failures, 1);
    }

    #[tokio::test]
    async fn test_open_circuit_skips_exchange() {
        let primary = StubExchange::new("primary", true);
        let backup = StubExchange::new("backup", false);
        let fetcher = fetcher(vec![
            primary.clone() as Arc<dyn ExchangeClient>,
            backup.clone() as Arc<dyn ExchangeClient>,
        ]);
        fetcher.breaker().trip("exchange:primary");

        fetcher.fetch_ohlcv("BTC/USDT", Timeframe::D1, 10).await.unwrap();
        assert_eq!(primary.calls.load(Ordering::SeqCst), 0);
        assert_eq!(
            fetcher.breaker().get_state("exchange:backup"),
            CircuitState::Closed
        );
    }

    #[tokio::test]
    async fn test_unknown_symbol_does_not_count_against_exchange() {
        let primary = StubExchange::failing_with("primary", Failure::UnknownSymbol);
        let backup = StubExchange::new("backup", false);
        let fetcher = fetcher(vec![
            primary.clone() as Arc<dyn ExchangeClient>,
            backup.clone() as Arc<dyn ExchangeClient>,
        ]);

        for _ in 0..3 {
            fetcher.fetch_ohlcv("NOPE/USDT", Timeframe::D1, 10).await.unwrap();
        }
        assert_eq!(primary.calls.load(Ordering::SeqCst), 3);
        assert_eq!(fetcher.breaker().get_stats("exchange:primary").recent_failures, 0);
        assert_eq!(
            fetcher.breaker().get_state("exchange:primary"),
            CircuitState::Closed
        );
    }

    #[tokio::test]
    async fn test_load_markets_skips_open_circuit() {
        let primary = StubExchange::new("primary", false);
        let backup = StubExchange::new("backup", false);
        let fetcher = fetcher(vec![
            primary.clone() as Arc<dyn ExchangeClient>,
            backup.clone() as Arc<dyn ExchangeClient>,
        ]);
        fetcher.breaker().trip("exchange:primary");

        let markets = fetcher.load_markets().await.unwrap();
        assert_eq!(markets[0].symbol, "backup-BTCUSDT");
        assert_eq!(primary.calls.load(Ordering::SeqCst), 0);
        assert_eq!(backup.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_all_failed_names_every_exchange() {
        let fetcher = fetcher(vec![
            StubExchange::new("a", true) as Arc<dyn ExchangeClient>,
            StubExchange::new("b", true) as Arc<dyn ExchangeClient>,
        ]);

        let err = fetcher.fetch_ohlcv("ETH/USDT", Timeframe::H1, 5).await.unwrap_err();
        match err {
            ExchangeError::AllExchangesFailed { attempted, .. } => {
                assert_eq!(attempted, vec!["a", "b"]);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_no_exchanges() {
        let fetcher = fetcher(vec![]);
        let err = fetcher.fetch_ticker("BTCUSDT").await.unwrap_err();
        assert!(matches!(err, ExchangeError::NoExchangeConfigured));
    }
}

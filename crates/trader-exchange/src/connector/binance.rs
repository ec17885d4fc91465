//! Binance 거래소 커넥터.
//!
//! Binance Spot 공개 REST API로 캔들, 마켓, 시세를 조회합니다.
//! 인증이 필요한 엔드포인트는 사용하지 않습니다.

use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use rust_decimal::Decimal;
use serde::Deserialize;
use tracing::{debug, error};
use trader_core::{Candle, ExchangeConfig, Ticker, Timeframe, TradingPair};

use crate::traits::{ExchangeClient, ExchangeResult, MarketInfo};
use crate::ExchangeError;

/// 메인넷 REST 기본 URL.
pub const BINANCE_REST_URL: &str = "https://api.binance.com";

/// 한 번에 요청 가능한 최대 캔들 수.
pub const MAX_KLINE_LIMIT: u32 = 1000;

// ============================================================================
// 설정
// ============================================================================

/// Binance 클라이언트 설정.
#[derive(Debug, Clone)]
pub struct BinanceConfig {
    /// 거래소 이름 (회로 차단기 키에 사용)
    pub name: String,
    /// REST API 기본 URL
    pub rest_base_url: String,
    /// 요청 타임아웃 (초)
    pub timeout_secs: u64,
}

impl Default for BinanceConfig {
    fn default() -> Self {
        Self {
            name: "binance".to_string(),
            rest_base_url: BINANCE_REST_URL.to_string(),
            timeout_secs: 10,
        }
    }
}

impl BinanceConfig {
    /// 기본 URL을 지정합니다 (테스트넷, 목 서버 등).
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.rest_base_url = url.into();
        self
    }
}

impl From<&ExchangeConfig> for BinanceConfig {
    fn from(config: &ExchangeConfig) -> Self {
        Self {
            name: config.name.clone(),
            rest_base_url: config.rest_base_url.clone(),
            timeout_secs: config.timeout_secs,
        }
    }
}

// ============================================================================
// API 응답 타입
// ============================================================================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BinanceTicker {
    symbol: String,
    price_change_percent: String,
    last_price: String,
    high_price: String,
    low_price: String,
    volume: String,
    close_time: i64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BinanceExchangeInfo {
    symbols: Vec<BinanceSymbolInfo>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BinanceSymbolInfo {
    symbol: String,
    status: String,
    base_asset: String,
    quote_asset: String,
}

/// 배열 형태의 kline 응답. 앞 6개 필드만 사용합니다.
#[derive(Debug, Deserialize)]
#[allow(dead_code)]
struct BinanceKline(
    i64,               // 0: Open time
    String,            // 1: Open
    String,            // 2: High
    String,            // 3: Low
    String,            // 4: Close
    String,            // 5: Volume
    i64,               // 6: Close time
    String,            // 7: Quote asset volume
    i64,               // 8: Number of trades
    String,            // 9: Taker buy base asset volume
    String,            // 10: Taker buy quote asset volume
    serde_json::Value, // 11: Ignore
);

#[derive(Debug, Deserialize)]
struct BinanceError {
    code: i32,
    msg: String,
}

// ============================================================================
// Binance 클라이언트
// ============================================================================

/// Binance 거래소 클라이언트.
pub struct BinanceClient {
    config: BinanceConfig,
    client: Client,
}

impl BinanceClient {
    /// 새 Binance 클라이언트 생성.
    ///
    /// # Errors
    /// HTTP 클라이언트 생성에 실패하면 `ExchangeError::NetworkError`를 반환합니다.
    pub fn new(config: BinanceConfig) -> Result<Self, ExchangeError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| ExchangeError::NetworkError(format!("HTTP 클라이언트 생성 실패: {}", e)))?;

        Ok(Self { config, client })
    }

    pub fn config(&self) -> &BinanceConfig {
        &self.config
    }

    /// "BTC/USDT", "btc-usdt", "BTCUSDT" -> "BTCUSDT"
    fn to_exchange_symbol(symbol: &str) -> String {
        TradingPair::parse(symbol)
            .map(|pair| pair.to_exchange_symbol())
            .unwrap_or_else(|| symbol.replace(['/', '-', '_'], "").to_uppercase())
    }

    fn parse_decimal(field: &str, value: &str) -> ExchangeResult<Decimal> {
        Decimal::from_str(value)
            .map_err(|e| ExchangeError::ParseError(format!("{field}: '{value}' ({e})")))
    }

    fn parse_millis(ms: i64) -> ExchangeResult<DateTime<Utc>> {
        DateTime::from_timestamp_millis(ms)
            .ok_or_else(|| ExchangeError::ParseError(format!("invalid timestamp: {ms}")))
    }

    /// 공개 API 요청.
    async fn public_get<T: for<'de> Deserialize<'de>>(
        &self,
        endpoint: &str,
        params: &[(&str, String)],
    ) -> ExchangeResult<T> {
        let url = format!("{}{}", self.config.rest_base_url.trim_end_matches('/'), endpoint);
        debug!(exchange = %self.config.name, endpoint, "GET");

        let response = self.client.get(&url).query(params).send().await?;
        self.handle_response(response).await
    }

    async fn handle_response<T: for<'de> Deserialize<'de>>(
        &self,
        response: reqwest::Response,
    ) -> ExchangeResult<T> {
        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| ExchangeError::NetworkError(e.to_string()))?;

        if status.is_success() {
            return serde_json::from_str(&body).map_err(|e| {
                error!(exchange = %self.config.name, error = %e, "Failed to parse response");
                ExchangeError::ParseError(e.to_string())
            });
        }

        if status.as_u16() == 429 || status.as_u16() == 418 {
            return Err(ExchangeError::RateLimited);
        }

        // 5xx는 바디와 무관하게 HTTP 상태 코드를 사용 (재시도 판단용)
        if status.is_server_error() {
            return Err(ExchangeError::ApiError {
                code: status.as_u16() as i32,
                message: body,
            });
        }

        match serde_json::from_str::<BinanceError>(&body) {
            Ok(error) => Err(Self::map_error_code(error.code, &error.msg)),
            Err(_) => Err(ExchangeError::ApiError {
                code: status.as_u16() as i32,
                message: body,
            }),
        }
    }

    /// Binance 에러 코드를 ExchangeError로 매핑.
    fn map_error_code(code: i32, msg: &str) -> ExchangeError {
        match code {
            -1003 => ExchangeError::RateLimited,
            -1001 => ExchangeError::NetworkError(msg.to_string()),
            -1121 => ExchangeError::SymbolNotFound(msg.to_string()),
            _ => ExchangeError::ApiError {
                code,
                message: msg.to_string(),
            },
        }
    }
}

#[async_trait]
impl ExchangeClient for BinanceClient {
    fn name(&self) -> &str {
        &self.config.name
    }

    async fn fetch_ohlcv(
        &self,
        symbol: &str,
        timeframe: Timeframe,
        limit: u32,
    ) -> ExchangeResult<Vec<Candle>> {
        let limit = limit.clamp(1, MAX_KLINE_LIMIT);
        let resp: Vec<BinanceKline> = self
            .public_get(
                "/api/v3/klines",
                &[
                    ("symbol", Self::to_exchange_symbol(symbol)),
                    ("interval", timeframe.to_binance_interval().to_string()),
                    ("limit", limit.to_string()),
                ],
            )
            .await?;

        let mut candles = resp
            .into_iter()
            .map(|k| {
                Ok(Candle {
                    timestamp: Self::parse_millis(k.0)?,
                    open: Self::parse_decimal("open", &k.1)?,
                    high: Self::parse_decimal("high", &k.2)?,
                    low: Self::parse_decimal("low", &k.3)?,
                    close: Self::parse_decimal("close", &k.4)?,
                    volume: Self::parse_decimal("volume", &k.5)?,
                    coin_id: symbol.to_string(),
                })
            })
            .collect::<ExchangeResult<Vec<_>>>()?;
        candles.sort_by_key(|c| c.timestamp);

        debug!(exchange = %self.config.name, symbol, count = candles.len(), "Fetched OHLCV");
        Ok(candles)
    }

    async fn load_markets(&self) -> ExchangeResult<Vec<MarketInfo>> {
        let info: BinanceExchangeInfo = self.public_get("/api/v3/exchangeInfo", &[]).await?;
        Ok(info
            .symbols
            .into_iter()
            .map(|s| MarketInfo {
                active: s.status == "TRADING",
                symbol: s.symbol,
                base: s.base_asset,
                quote: s.quote_asset,
            })
            .collect())
    }

    async fn fetch_ticker(&self, symbol: &str) -> ExchangeResult<Ticker> {
        let resp: BinanceTicker = self
            .public_get(
                "/api/v3/ticker/24hr",
                &[("symbol", Self::to_exchange_symbol(symbol))],
            )
            .await?;

        Ok(Ticker {
            symbol: resp.symbol,
            last: Self::parse_decimal("lastPrice", &resp.last_price)?,
            high_24h: Self::parse_decimal("highPrice", &resp.high_price)?,
            low_24h: Self::parse_decimal("lowPrice", &resp.low_price)?,
            volume_24h: Self::parse_decimal("volume", &resp.volume)?,
            change_24h_pct: Self::parse_decimal("priceChangePercent", &resp.price_change_percent)?,
            timestamp: Self::parse_millis(resp.close_time).unwrap_or_else(|_| Utc::now()),
        })
    }
}

//! 거래소 trait 정의.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use trader_core::{Candle, Ticker, Timeframe};

use crate::ExchangeError;

/// 거래소 작업을 위한 Result 타입.
pub type ExchangeResult<T> = Result<T, ExchangeError>;

/// 거래 가능한 마켓 정보.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarketInfo {
    /// 거래소 심볼 (예: "BTCUSDT")
    pub symbol: String,
    /// 기준 자산
    pub base: String,
    /// 호가 자산
    pub quote: String,
    /// 거래 가능 여부
    pub active: bool,
}

/// 시장 데이터 조회용 거래소 인터페이스.
///
/// 회로 차단기와 재시도는 구현체 바깥(`MultiExchangeFetcher`)에서 적용됩니다.
#[async_trait]
pub trait ExchangeClient: Send + Sync {
    /// 거래소 이름 반환.
    fn name(&self) -> &str;

    /// OHLCV 캔들 조회 (시간 오름차순).
    ///
    /// `symbol`은 `BTC/USDT`, `BTCUSDT` 형식 모두 허용합니다.
    async fn fetch_ohlcv(
        &self,
        symbol: &str,
        timeframe: Timeframe,
        limit: u32,
    ) -> ExchangeResult<Vec<Candle>>;

    /// 마켓 목록 조회.
    async fn load_markets(&self) -> ExchangeResult<Vec<MarketInfo>>;

    /// 24시간 시세 조회.
    async fn fetch_ticker(&self, symbol: &str) -> ExchangeResult<Ticker>;
}

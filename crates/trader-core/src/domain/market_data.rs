//! 시장 데이터 타입 및 구조체.
//!
//! 이 모듈은 시장 데이터 관련 타입을 정의합니다:
//! - `Candle` - 코인 단위 OHLCV 캔들
//! - `MarketDataSet` - 백테스트 입력 데이터셋 메타데이터
//! - `ParsedMarketData` - 파싱 결과와 범위 정보
//! - `Ticker` - 현재 시세 요약

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// 코인 식별자를 알 수 없을 때 사용하는 값.
pub const UNKNOWN_COIN_ID: &str = "UNKNOWN";

/// 데이터셋당 기본 최대 종목 수.
pub const DEFAULT_MAX_INSTRUMENTS: usize = 50;

/// 하나의 시간 버킷에 대한 OHLCV 캔들.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candle {
    /// 캔들 시작 시간
    pub timestamp: DateTime<Utc>,
    /// 시가
    pub open: Decimal,
    /// 고가
    pub high: Decimal,
    /// 저가
    pub low: Decimal,
    /// 종가
    pub close: Decimal,
    /// 거래량
    pub volume: Decimal,
    /// 코인 식별자
    pub coin_id: String,
}

impl Candle {
    /// 종가만으로 캔들을 생성합니다. OHLC는 모두 종가, 거래량은 0입니다.
    pub fn from_close(timestamp: DateTime<Utc>, close: Decimal, coin_id: impl Into<String>) -> Self {
        Self {
            timestamp,
            open: close,
            high: close,
            low: close,
            close,
            volume: Decimal::ZERO,
            coin_id: coin_id.into(),
        }
    }
}

/// 백테스트 입력 데이터셋.
///
/// 생성 후에는 변경되지 않습니다. 리더와 종목 해석기가 함께 사용합니다.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketDataSet {
    /// 오브젝트 스토리지 내 원본 파일 위치 (URI, 버킷 경로, 상대 경로)
    #[serde(default)]
    pub storage_location: Option<String>,
    /// 요청된 종목 심볼 (순서 유지)
    #[serde(default)]
    pub instrument_universe: Vec<String>,
    /// 최대 종목 수
    #[serde(default = "default_max_instruments")]
    pub max_instruments: usize,
}

fn default_max_instruments() -> usize {
    DEFAULT_MAX_INSTRUMENTS
}

impl Default for MarketDataSet {
    /// 스토리지 위치가 없는 데이터셋 (거래소 라이브 조회용).
    fn default() -> Self {
        Self {
            storage_location: None,
            instrument_universe: Vec::new(),
            max_instruments: DEFAULT_MAX_INSTRUMENTS,
        }
    }
}

impl MarketDataSet {
    /// 스토리지 위치를 가진 데이터셋을 생성합니다.
    pub fn new(storage_location: impl Into<String>) -> Self {
        Self {
            storage_location: Some(storage_location.into()),
            instrument_universe: Vec::new(),
            max_instruments: DEFAULT_MAX_INSTRUMENTS,
        }
    }

    /// 요청 종목 목록을 설정합니다.
    pub fn with_universe<I, S>(mut self, symbols: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.instrument_universe = symbols.into_iter().map(Into::into).collect();
        self
    }

    /// 최대 종목 수를 설정합니다.
    pub fn with_max_instruments(mut self, max: usize) -> Self {
        self.max_instruments = max;
        self
    }

    /// 심볼 컬럼이 없을 때 캔들에 부여할 코인 식별자.
    pub fn default_coin_id(&self) -> &str {
        self.instrument_universe
            .first()
            .map(String::as_str)
            .filter(|s| !s.trim().is_empty())
            .unwrap_or(UNKNOWN_COIN_ID)
    }
}

/// 닫힌 시간 구간 `[start, end]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl DateRange {
    /// 두 경계를 포함하여 구간 안에 있는지 확인합니다.
    pub fn contains(&self, ts: DateTime<Utc>) -> bool {
        ts >= self.start && ts <= self.end
    }
}

/// 시장 데이터 파싱 결과.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParsedMarketData {
    /// 타임스탬프 오름차순 캔들
    pub data: Vec<Candle>,
    /// 유지된 캔들 수
    pub record_count: usize,
    /// 유지된 캔들의 최소/최대 타임스탬프 (캔들이 없으면 `None`)
    pub date_range: Option<DateRange>,
    /// 데이터 출처 (정규화된 스토리지 경로 또는 거래소 이름)
    pub source: String,
    /// 파싱 실패로 건너뛴 행 수
    #[serde(default)]
    pub skipped_rows: usize,
}

impl ParsedMarketData {
    /// 캔들 목록으로 결과를 만듭니다. 캔들은 타임스탬프 기준 안정 정렬됩니다.
    pub fn from_candles(mut data: Vec<Candle>, source: impl Into<String>) -> Self {
        data.sort_by_key(|c| c.timestamp);
        let date_range = match (data.first(), data.last()) {
            (Some(first), Some(last)) => Some(DateRange {
                start: first.timestamp,
                end: last.timestamp,
            }),
            _ => None,
        };
        Self {
            record_count: data.len(),
            data,
            date_range,
            source: source.into(),
            skipped_rows: 0,
        }
    }

    /// 건너뛴 행 수를 설정합니다.
    pub fn with_skipped_rows(mut self, skipped: usize) -> Self {
        self.skipped_rows = skipped;
        self
    }

    /// 데이터가 비었는지 확인합니다.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// 24시간 시세 요약.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Ticker {
    /// 거래소 심볼
    pub symbol: String,
    /// 최근 체결가
    pub last: Decimal,
    /// 24시간 고가
    pub high_24h: Decimal,
    /// 24시간 저가
    pub low_24h: Decimal,
    /// 24시간 거래량
    pub volume_24h: Decimal,
    /// 24시간 변동률 (%)
    pub change_24h_pct: Decimal,
    /// 조회 시각
    pub timestamp: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use rust_decimal_macros::dec;

    fn ts(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(secs, 0).unwrap()
    }

    #[test]
    fn test_candle_from_close_defaults() {
        let candle = Candle::from_close(ts(0), dec!(101.5), "BTC");
        assert_eq!(candle.open, dec!(101.5));
        assert_eq!(candle.high, dec!(101.5));
        assert_eq!(candle.low, dec!(101.5));
        assert_eq!(candle.volume, Decimal::ZERO);
    }

    #[test]
    fn test_default_coin_id() {
        let ds = MarketDataSet::new("bucket/a.csv");
        assert_eq!(ds.default_coin_id(), UNKNOWN_COIN_ID);
        assert_eq!(ds.max_instruments, 50);

        let ds = ds.with_universe(["ETH", "BTC"]);
        assert_eq!(ds.default_coin_id(), "ETH");
    }

    #[test]
    fn test_dataset_deserialize_defaults_max_instruments() {
        let ds: MarketDataSet =
            serde_json::from_str(r#"{"storage_location":"s3://data/x.csv"}"#).unwrap();
        assert_eq!(ds.max_instruments, DEFAULT_MAX_INSTRUMENTS);
        assert!(ds.instrument_universe.is_empty());
    }

    #[test]
    fn test_parsed_market_data_sorts_stably() {
        let mut a = Candle::from_close(ts(20), dec!(1), "A");
        a.volume = dec!(1);
        let mut b = Candle::from_close(ts(10), dec!(2), "A");
        b.volume = dec!(2);
        let mut c = Candle::from_close(ts(20), dec!(3), "A");
        c.volume = dec!(3);

        let parsed = ParsedMarketData::from_candles(vec![a, b, c], "x.csv");
        let closes: Vec<_> = parsed.data.iter().map(|c| c.close).collect();
        assert_eq!(closes, vec![dec!(2), dec!(1), dec!(3)]);

        let range = parsed.date_range.unwrap();
        assert_eq!(range.start, ts(10));
        assert_eq!(range.end, ts(20));
        assert_eq!(parsed.record_count, 3);
    }

    #[test]
    fn test_empty_parsed_market_data_has_no_range() {
        let parsed = ParsedMarketData::from_candles(Vec::new(), "x.csv");
        assert!(parsed.is_empty());
        assert!(parsed.date_range.is_none());
    }
}

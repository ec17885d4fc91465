//! 시장 데이터 리더.
//!
//! 오브젝트 스토리지의 CSV 파일을 한 줄씩 스트리밍하여 검증된 캔들
//! 시퀀스로 변환합니다. 파일 전체를 메모리에 올리지 않으며, 날짜 범위
//! 필터도 스트리밍 중에 적용합니다.
//!
//! # 동일 타임스탬프 처리
//!
//! 같은 타임스탬프의 행은 병합하지도 거부하지도 않습니다. 출력은 안정
//! 정렬이므로 같은 타임스탬프의 행은 파일 순서를 유지하며, 하위 단계는
//! 마지막 행을 유효한 값으로 취급합니다.

mod columns;
mod timestamp;

pub use columns::{CandleField, ColumnMap};
pub use timestamp::parse_timestamp;

use std::str::FromStr;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{debug, info, warn};
use trader_core::{Candle, MarketDataSet, ParsedMarketData};

use crate::error::{DataError, Result};
use crate::storage::{resolve_location, ObjectStorage, SanitizedPath};

/// 기본 파일 크기 제한 (500MB).
pub const DEFAULT_MAX_FILE_SIZE: u64 = 500 * 1024 * 1024;

/// 리더 설정.
#[derive(Debug, Clone)]
pub struct ReaderConfig {
    /// 스토리지 버킷 이름 (위치 정규화에 사용)
    pub bucket: String,
    /// 원본 파일 최대 크기 (바이트)
    pub max_file_size: u64,
}

impl Default for ReaderConfig {
    fn default() -> Self {
        Self {
            bucket: "market-data".to_string(),
            max_file_size: DEFAULT_MAX_FILE_SIZE,
        }
    }
}

impl From<&trader_core::StorageConfig> for ReaderConfig {
    fn from(config: &trader_core::StorageConfig) -> Self {
        Self {
            bucket: config.bucket.clone(),
            max_file_size: config.max_file_size_bytes(),
        }
    }
}

/// 행 단위 파싱 실패 사유.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RowError {
    Csv,
    Timestamp,
    Close,
    Numeric(CandleField),
}

/// 오브젝트 스토리지 기반 시장 데이터 리더.
pub struct MarketDataReader {
    storage: Arc<dyn ObjectStorage>,
    config: ReaderConfig,
}

impl MarketDataReader {
    pub fn new(storage: Arc<dyn ObjectStorage>, config: ReaderConfig) -> Self {
        Self { storage, config }
    }

    pub fn config(&self) -> &ReaderConfig {
        &self.config
    }

    /// 데이터셋의 원본 파일을 읽어 캔들 시퀀스를 반환합니다.
    ///
    /// `start`/`end`는 양 끝을 포함합니다. 유효한 행이 있지만 모두 범위
    /// 밖이면 빈 결과(`date_range = None`)를 반환합니다.
    ///
    /// # Errors
    /// - `NoStorageLocation` - 데이터셋에 스토리지 위치가 없음
    /// - 경로 보안 오류 - 스토리지 접근 전에 반환
    /// - `FileNotFound`, `FileTooLarge` - 스트리밍 전에 반환
    /// - `MissingColumn` - timestamp 또는 close/price 컬럼 없음
    /// - `NoValidDataRows` - 파싱 가능한 데이터 행이 하나도 없음
    pub async fn read_market_data(
        &self,
        dataset: &MarketDataSet,
        start: Option<DateTime<Utc>>,
        end: Option<DateTime<Utc>>,
    ) -> Result<ParsedMarketData> {
        let raw = dataset
            .storage_location
            .as_deref()
            .filter(|s| !s.trim().is_empty())
            .ok_or(DataError::NoStorageLocation)?;

        let path = resolve_location(raw, &self.config.bucket)?;

        let stats = self
            .storage
            .file_stats(&path)
            .await?
            .ok_or_else(|| DataError::FileNotFound(path.to_string()))?;

        if stats.size > self.config.max_file_size {
            warn!(
                path = %path,
                size = stats.size,
                limit = self.config.max_file_size,
                "Market data file exceeds size limit, rejected unread"
            );
            return Err(DataError::FileTooLarge {
                path: path.to_string(),
                size: stats.size,
                limit: self.config.max_file_size,
            });
        }

        let (candles, skipped) = self
            .stream_candles(&path, dataset.default_coin_id(), start, end)
            .await?;

        let parsed = ParsedMarketData::from_candles(candles, path.as_str()).with_skipped_rows(skipped);

        info!(
            path = %path,
            records = parsed.record_count,
            skipped = skipped,
            start = ?parsed.date_range.map(|r| r.start),
            end = ?parsed.date_range.map(|r| r.end),
            "Market data loaded"
        );

        Ok(parsed)
    }

    /// 파일을 줄 단위로 스트리밍하며 범위 안의 캔들만 수집합니다.
    ///
    /// 따옴표가 닫히지 않은 줄은 다음 줄과 이어 붙여 한 레코드로 처리합니다.
    /// 반환값은 (범위 내 캔들, 건너뛴 행 수).
    async fn stream_candles(
        &self,
        path: &SanitizedPath,
        default_coin_id: &str,
        start: Option<DateTime<Utc>>,
        end: Option<DateTime<Utc>>,
    ) -> Result<(Vec<Candle>, usize)> {
        let stream = self.storage.file_stream(path).await?;
        let mut lines = BufReader::new(stream).lines();

        let mut columns: Option<ColumnMap> = None;
        let mut retained = Vec::new();
        let mut valid_rows = 0usize;
        let mut skipped = 0usize;
        let mut line_no = 0usize;
        let mut open_record: Option<String> = None;

        while let Some(line) = lines.next_line().await? {
            line_no += 1;
            let line = match open_record.take() {
                Some(mut head) => {
                    head.push('\n');
                    head.push_str(&line);
                    head
                }
                None => line,
            };
            if has_open_quote(&line) {
                open_record = Some(line);
                continue;
            }
            if line.trim().is_empty() {
                continue;
            }

            if columns.is_none() {
                let header = split_record(&line).map_err(|_| DataError::MissingColumn {
                    column: CandleField::Timestamp.display_name().to_string(),
                    path: path.to_string(),
                })?;
                columns = Some(ColumnMap::resolve(header.iter(), path.as_str())?);
                continue;
            }
            let Some(map) = columns.as_ref() else {
                continue;
            };

            match parse_row(&line, map, default_coin_id) {
                Ok(candle) => {
                    valid_rows += 1;
                    let after_start = start.map_or(true, |s| candle.timestamp >= s);
                    let before_end = end.map_or(true, |e| candle.timestamp <= e);
                    if after_start && before_end {
                        retained.push(candle);
                    }
                }
                Err(reason) => {
                    skipped += 1;
                    debug!(path = %path, line = line_no, reason = ?reason, "Skipping invalid row");
                }
            }
        }

        if open_record.is_some() && columns.is_some() {
            skipped += 1;
            debug!(path = %path, line = line_no, "Skipping record with unterminated quote");
        }

        if columns.is_none() {
            return Err(DataError::EmptySource(path.to_string()));
        }

        if valid_rows == 0 {
            return Err(DataError::NoValidDataRows {
                path: path.to_string(),
                skipped,
            });
        }

        if skipped > 0 {
            warn!(path = %path, skipped, valid = valid_rows, "Skipped unparsable rows");
        }

        Ok((retained, skipped))
    }
}

/// 짝이 맞지 않는 따옴표가 있으면 레코드가 다음 줄로 이어집니다.
/// 이스케이프된 따옴표(`""`)는 짝수 개라 영향을 주지 않습니다.
fn has_open_quote(line: &str) -> bool {
    line.bytes().filter(|&b| b == b'"').count() % 2 == 1
}

/// CSV 레코드 하나를 필드로 분리합니다. 따옴표 안의 구분자를 처리합니다.
fn split_record(line: &str) -> std::result::Result<csv::StringRecord, csv::Error> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(line.as_bytes());

    let mut record = csv::StringRecord::new();
    reader.read_record(&mut record)?;
    Ok(record)
}

fn parse_row(
    line: &str,
    map: &ColumnMap,
    default_coin_id: &str,
) -> std::result::Result<Candle, RowError> {
    let record = split_record(line).map_err(|_| RowError::Csv)?;
    let field = |idx: Option<usize>| idx.and_then(|i| record.get(i)).filter(|s| !s.is_empty());

    let timestamp = field(Some(map.timestamp))
        .and_then(parse_timestamp)
        .ok_or(RowError::Timestamp)?;
    let close = field(Some(map.close))
        .and_then(parse_decimal)
        .ok_or(RowError::Close)?;

    let optional = |idx: Option<usize>, name: CandleField, default: Decimal| match field(idx) {
        Some(raw) => parse_decimal(raw).ok_or(RowError::Numeric(name)),
        None => Ok(default),
    };

    let open = optional(map.open, CandleField::Open, close)?;
    let high = optional(map.high, CandleField::High, close)?;
    let low = optional(map.low, CandleField::Low, close)?;
    let volume = optional(map.volume, CandleField::Volume, Decimal::ZERO)?;

    let coin_id = field(map.symbol).unwrap_or(default_coin_id).to_string();

    Ok(Candle {
        timestamp,
        open,
        high,
        low,
        close,
        volume,
        coin_id,
    })
}

fn parse_decimal(raw: &str) -> Option<Decimal> {
    let s = raw.trim();
    Decimal::from_str(s)
        .or_else(|_| Decimal::from_scientific(s))
        .ok()
}

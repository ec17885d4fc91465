//! 헤더 이름과 캔들 필드 매핑.

use crate::error::{DataError, Result};

/// 캔들 필드.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CandleField {
    Timestamp,
    Open,
    High,
    Low,
    Close,
    Volume,
    Symbol,
}

impl CandleField {
    pub const ALL: [CandleField; 7] = [
        CandleField::Timestamp,
        CandleField::Open,
        CandleField::High,
        CandleField::Low,
        CandleField::Close,
        CandleField::Volume,
        CandleField::Symbol,
    ];

    /// 허용하는 헤더 이름 (소문자).
    pub fn aliases(&self) -> &'static [&'static str] {
        match self {
            CandleField::Timestamp => &["timestamp", "time"],
            CandleField::Open => &["open", "o"],
            CandleField::High => &["high", "h"],
            CandleField::Low => &["low", "l"],
            CandleField::Close => &["close", "price"],
            CandleField::Volume => &["volume", "vol"],
            CandleField::Symbol => &["symbol", "ticker"],
        }
    }

    /// 오류 메시지에 쓰는 이름.
    pub fn display_name(&self) -> &'static str {
        match self {
            CandleField::Timestamp => "timestamp",
            CandleField::Open => "open",
            CandleField::High => "high",
            CandleField::Low => "low",
            CandleField::Close => "close/price",
            CandleField::Volume => "volume",
            CandleField::Symbol => "symbol",
        }
    }

    /// 헤더 이름에 해당하는 필드를 찾습니다. 대소문자를 구분하지 않습니다.
    pub fn from_header(header: &str) -> Option<Self> {
        let normalized = header.trim().trim_start_matches('\u{feff}').to_lowercase();
        Self::ALL
            .iter()
            .copied()
            .find(|field| field.aliases().contains(&normalized.as_str()))
    }
}

/// 필드별 컬럼 인덱스. 헤더에서 한 번만 계산합니다.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnMap {
    pub timestamp: usize,
    pub close: usize,
    pub open: Option<usize>,
    pub high: Option<usize>,
    pub low: Option<usize>,
    pub volume: Option<usize>,
    pub symbol: Option<usize>,
}

impl ColumnMap {
    /// 헤더 행을 해석합니다. 같은 필드가 여러 번 나오면 첫 컬럼을 사용합니다.
    pub fn resolve<'a, I>(headers: I, source: &str) -> Result<Self>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut found: [Option<usize>; 7] = [None; 7];
        for (idx, header) in headers.into_iter().enumerate() {
            if let Some(field) = CandleField::from_header(header) {
                let slot = &mut found[field as usize];
                if slot.is_none() {
                    *slot = Some(idx);
                }
            }
        }

        let required = |field: CandleField| {
            found[field as usize].ok_or_else(|| DataError::MissingColumn {
                column: field.display_name().to_string(),
                path: source.to_string(),
            })
        };

        Ok(Self {
            timestamp: required(CandleField::Timestamp)?,
            close: required(CandleField::Close)?,
            open: found[CandleField::Open as usize],
            high: found[CandleField::High as usize],
            low: found[CandleField::Low as usize],
            volume: found[CandleField::Volume as usize],
            symbol: found[CandleField::Symbol as usize],
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_header_aliases() {
        assert_eq!(CandleField::from_header("Time"), Some(CandleField::Timestamp));
        assert_eq!(CandleField::from_header(" PRICE "), Some(CandleField::Close));
        assert_eq!(CandleField::from_header("vol"), Some(CandleField::Volume));
        assert_eq!(CandleField::from_header("Ticker"), Some(CandleField::Symbol));
        assert_eq!(CandleField::from_header("\u{feff}timestamp"), Some(CandleField::Timestamp));
        assert_eq!(CandleField::from_header("adj_close"), None);
    }

    #[test]
    fn test_resolve_column_map() {
        let map = ColumnMap::resolve(["Symbol", "TIME", "o", "h", "l", "Price", "Vol"], "x.csv").unwrap();
        assert_eq!(map.timestamp, 1);
        assert_eq!(map.close, 5);
        assert_eq!(map.open, Some(2));
        assert_eq!(map.volume, Some(6));
        assert_eq!(map.symbol, Some(0));
    }

    #[test]
    fn test_first_duplicate_wins() {
        let map = ColumnMap::resolve(["time", "close", "price"], "x.csv").unwrap();
        assert_eq!(map.close, 1);
    }

    #[test]
    fn test_missing_required_columns() {
        let err = ColumnMap::resolve(["time", "open"], "x.csv").unwrap_err();
        assert!(matches!(err, DataError::MissingColumn { ref column, .. } if column == "close/price"));

        let err = ColumnMap::resolve(["close"], "x.csv").unwrap_err();
        assert!(matches!(err, DataError::MissingColumn { ref column, .. } if column == "timestamp"));
    }
}

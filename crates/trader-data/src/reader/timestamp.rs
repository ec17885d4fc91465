//! 타임스탬프 형식 추론.
//!
//! 숫자는 크기로 단위를 구분합니다. 절대값이 1e11 이상이면 Unix 밀리초,
//! 미만이면 Unix 초입니다 (1e11초는 서기 5138년, 1e11밀리초는 1973년).

use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};

const MILLIS_THRESHOLD: f64 = 1e11;

const NAIVE_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
    "%Y/%m/%d %H:%M:%S",
];

/// 타임스탬프 문자열을 UTC 시각으로 파싱합니다. 실패하면 `None`.
///
/// 시간대가 없는 ISO-8601 값은 UTC로 간주합니다.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let s = raw.trim();
    if s.is_empty() {
        return None;
    }

    if let Ok(n) = s.parse::<i64>() {
        return from_epoch_number(n as f64);
    }
    if let Ok(f) = s.parse::<f64>() {
        return from_epoch_number(f);
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }

    for fmt in NAIVE_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(Utc.from_utc_datetime(&naive));
        }
    }

    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| Utc.from_utc_datetime(&naive))
}

fn from_epoch_number(value: f64) -> Option<DateTime<Utc>> {
    if !value.is_finite() {
        return None;
    }
    let millis = if value.abs() >= MILLIS_THRESHOLD {
        value
    } else {
        value * 1000.0
    };
    Utc.timestamp_millis_opt(millis.round() as i64).single()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn utc(y: i32, m: u32, d: u32, h: u32, min: u32, s: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, min, s).unwrap()
    }

    #[test]
    fn test_unix_seconds_and_millis() {
        let expected = utc(2024, 1, 1, 0, 0, 0);
        assert_eq!(parse_timestamp("1704067200"), Some(expected));
        assert_eq!(parse_timestamp("1704067200000"), Some(expected));
        assert_eq!(parse_timestamp("1704067200.5").unwrap().timestamp_millis(), 1704067200500);
    }

    #[test]
    fn test_iso_forms() {
        let expected = utc(2024, 3, 15, 12, 30, 0);
        assert_eq!(parse_timestamp("2024-03-15T12:30:00Z"), Some(expected));
        assert_eq!(parse_timestamp("2024-03-15T21:30:00+09:00"), Some(expected));
        assert_eq!(parse_timestamp("2024-03-15T12:30:00"), Some(expected));
        assert_eq!(parse_timestamp("2024-03-15 12:30:00.000"), Some(expected));
        assert_eq!(parse_timestamp("2024-03-15 12:30"), Some(expected));
        assert_eq!(parse_timestamp("2024-03-15"), Some(utc(2024, 3, 15, 0, 0, 0)));
    }

    #[test]
    fn test_unparsable() {
        assert_eq!(parse_timestamp(""), None);
        assert_eq!(parse_timestamp("yesterday"), None);
        assert_eq!(parse_timestamp("2024-13-45"), None);
        assert_eq!(parse_timestamp("NaN"), None);
    }
}

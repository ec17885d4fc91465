//! 스토리지 위치 정규화 및 경로 보안 검사.
//!
//! 데이터셋의 스토리지 위치는 사용자 메타데이터에서 오므로 그대로 믿을 수
//! 없습니다. 허용하는 입력 형식:
//! - `scheme://bucket/path` (예: `s3://market-data/btc.csv`)
//! - `http(s)://host/bucket/path`
//! - `bucket/path` 또는 `path`
//!
//! 정규화 후 모든 검사를 스토리지 접근 전에 수행합니다.

use std::fmt;

use tracing::warn;

use crate::error::{DataError, Result};

/// 보안 검사를 통과한 버킷 기준 상대 경로.
///
/// `sanitize_path`로만 생성할 수 있습니다.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SanitizedPath(String);

impl SanitizedPath {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SanitizedPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for SanitizedPath {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// 스토리지 위치를 버킷 기준 상대 경로로 정규화합니다.
///
/// 보안 검사는 하지 않습니다. `sanitize_path`와 함께 사용하세요.
pub fn normalize_location(raw: &str, bucket: &str) -> Result<String> {
    let raw = raw.trim();

    if let Some((scheme, rest)) = raw.split_once("://") {
        let scheme = scheme.to_lowercase();
        if scheme.is_empty() {
            return Err(DataError::InvalidLocation(raw.to_string()));
        }

        let rest = if scheme == "http" || scheme == "https" {
            // 호스트 제거, 쿼리/프래그먼트 제거
            let rest = rest.split(['?', '#']).next().unwrap_or_default();
            match rest.split_once('/') {
                Some((_host, path)) => path,
                None => "",
            }
        } else {
            rest
        };

        // 첫 세그먼트는 버킷
        return Ok(match rest.split_once('/') {
            Some((_bucket, path)) => path.to_string(),
            None => String::new(),
        });
    }

    let prefix = format!("{bucket}/");
    Ok(match raw.strip_prefix(&prefix) {
        Some(path) if !bucket.is_empty() => path.to_string(),
        _ => raw.to_string(),
    })
}

/// 상대 경로의 보안 검사를 수행합니다.
///
/// 검사 순서: NUL 바이트, 빈 경로, 절대 경로, 상위 디렉토리 참조.
/// 거부된 경로는 모두 경고 로그를 남깁니다.
pub fn sanitize_path(path: &str) -> Result<SanitizedPath> {
    let result = check_path(path);
    if let Err(e) = &result {
        warn!(path = ?path, error = %e, "Rejected dataset storage path");
    }
    result
}

fn check_path(path: &str) -> Result<SanitizedPath> {
    if path.contains('\0') {
        return Err(DataError::NullByte(path.replace('\0', "\\0")));
    }

    let trimmed = path.trim();
    if trimmed.is_empty() {
        return Err(DataError::EmptyPath);
    }

    if is_absolute(trimmed) {
        return Err(DataError::AbsolutePath(trimmed.to_string()));
    }

    if trimmed.contains("..") {
        return Err(DataError::PathTraversal(trimmed.to_string()));
    }

    Ok(SanitizedPath(trimmed.to_string()))
}

fn is_absolute(path: &str) -> bool {
    if path.starts_with('/') || path.starts_with('\\') {
        return true;
    }
    // Windows 드라이브 경로 (C:\, C:/)
    let bytes = path.as_bytes();
    bytes.len() >= 2 && bytes[0].is_ascii_alphabetic() && bytes[1] == b':'
}

/// 정규화와 보안 검사를 한 번에 수행합니다.
pub fn resolve_location(raw: &str, bucket: &str) -> Result<SanitizedPath> {
    let normalized = normalize_location(raw, bucket)?;
    sanitize_path(&normalized)
}

#[cfg(test)]
mod tests {
    use super::*;

    const BUCKET: &str = "market-data";

    #[test]
    fn test_normalize_forms() {
        assert_eq!(
            normalize_location("s3://market-data/crypto/btc.csv", BUCKET).unwrap(),
            "crypto/btc.csv"
        );
        assert_eq!(
            normalize_location("minio://other-bucket/btc.csv", BUCKET).unwrap(),
            "btc.csv"
        );
        assert_eq!(
            normalize_location("https://storage.local:9000/market-data/btc.csv?sig=1", BUCKET)
                .unwrap(),
            "btc.csv"
        );
        assert_eq!(normalize_location("market-data/btc.csv", BUCKET).unwrap(), "btc.csv");
        assert_eq!(normalize_location("daily/btc.csv", BUCKET).unwrap(), "daily/btc.csv");
        assert_eq!(normalize_location("s3://market-data", BUCKET).unwrap(), "");
    }

    #[test]
    fn test_each_rejection_is_distinct() {
        assert!(matches!(sanitize_path("a/../../etc/passwd"), Err(DataError::PathTraversal(_))));
        assert!(matches!(sanitize_path("/etc/passwd"), Err(DataError::AbsolutePath(_))));
        assert!(matches!(sanitize_path("C:\\data\\x.csv"), Err(DataError::AbsolutePath(_))));
        assert!(matches!(sanitize_path("btc\0.csv"), Err(DataError::NullByte(_))));
        assert!(matches!(sanitize_path("   "), Err(DataError::EmptyPath)));
    }

    #[test]
    fn test_uri_forms_are_sanitized_after_normalizing() {
        assert!(matches!(
            resolve_location("s3://market-data//etc/passwd", BUCKET),
            Err(DataError::AbsolutePath(_))
        ));
        assert!(matches!(
            resolve_location("https://host/market-data/../secrets.csv", BUCKET),
            Err(DataError::PathTraversal(_))
        ));
        assert!(matches!(resolve_location("s3://market-data/", BUCKET), Err(DataError::EmptyPath)));
        assert_eq!(
            resolve_location("s3://market-data/crypto/eth.csv", BUCKET).unwrap().as_str(),
            "crypto/eth.csv"
        );
    }
}

//! 데이터 모듈 오류 타입.
//!
//! 치명적인 조건마다 별도 변형을 두어, 로그 없이도 원인(경로, 누락 컬럼,
//! 시도한 심볼)을 알 수 있게 합니다.

use thiserror::Error;

/// 데이터 관련 오류.
#[derive(Debug, Error)]
pub enum DataError {
    /// 데이터셋에 스토리지 위치가 없음
    #[error("no_storage_location: dataset has no storage location configured")]
    NoStorageLocation,

    /// 경로에 상위 디렉토리 참조(`..`)가 포함됨
    #[error("path traversal rejected: {0}")]
    PathTraversal(String),

    /// 절대 경로
    #[error("absolute path rejected: {0}")]
    AbsolutePath(String),

    /// 경로에 NUL 바이트가 포함됨
    #[error("null byte in path rejected: {0:?}")]
    NullByte(String),

    /// 정규화 후 빈 경로
    #[error("empty path rejected")]
    EmptyPath,

    /// 스토리지 위치 형식을 해석할 수 없음
    #[error("Invalid storage location: {0}")]
    InvalidLocation(String),

    /// 파일을 찾을 수 없음
    #[error("file_not_found: {0}")]
    FileNotFound(String),

    /// 파일 크기 제한 초과
    #[error("file too large: {path} is {size} bytes (limit {limit} bytes)")]
    FileTooLarge { path: String, size: u64, limit: u64 },

    /// 필수 컬럼 누락
    #[error("missing required column '{column}' in {path}")]
    MissingColumn { column: String, path: String },

    /// 유효한 데이터 행이 하나도 없음
    #[error("no valid data rows in {path} ({skipped} rows skipped)")]
    NoValidDataRows { path: String, skipped: usize },

    /// 헤더조차 없는 빈 원본
    #[error("empty source: {0}")]
    EmptySource(String),

    /// 요청 종목을 하나도 해석하지 못함
    #[error("unresolved instrument universe: attempted [{}]", attempted.join(", "))]
    UnresolvedUniverse { attempted: Vec<String> },

    /// 호가 통화를 찾지 못함
    #[error("quote currency not found: attempted [{}]", attempted.join(", "))]
    QuoteCurrencyNotFound { attempted: Vec<String> },

    /// 스토리지 I/O 오류
    #[error("Storage I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// 쿼리 실행 오류
    #[error("Query error: {0}")]
    QueryError(String),

    /// 직렬화/역직렬화 오류
    #[error("Serialization error: {0}")]
    SerializationError(String),
}

impl DataError {
    /// 경로 보안 검사에서 거부된 오류인지 확인합니다.
    pub fn is_security_rejection(&self) -> bool {
        matches!(
            self,
            DataError::PathTraversal(_)
                | DataError::AbsolutePath(_)
                | DataError::NullByte(_)
                | DataError::EmptyPath
        )
    }

    /// 일시적인 오류인지 확인합니다. 설정/입력 오류는 재시도해도 같은 결과입니다.
    pub fn is_transient(&self) -> bool {
        matches!(self, DataError::Io(_) | DataError::QueryError(_))
    }
}

impl From<sqlx::Error> for DataError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::Database(db_err) => DataError::QueryError(db_err.message().to_string()),
            _ => DataError::QueryError(err.to_string()),
        }
    }
}

impl From<serde_json::Error> for DataError {
    fn from(err: serde_json::Error) -> Self {
        DataError::SerializationError(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, DataError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages_carry_context() {
        let err = DataError::UnresolvedUniverse {
            attempted: vec!["XX".to_string(), "FOO/BAR".to_string()],
        };
        assert_eq!(err.to_string(), "unresolved instrument universe: attempted [XX, FOO/BAR]");

        let err = DataError::MissingColumn {
            column: "close".to_string(),
            path: "btc.csv".to_string(),
        };
        assert!(err.to_string().contains("'close'"));
        assert!(err.to_string().contains("btc.csv"));
    }

    #[test]
    fn test_security_rejections() {
        assert!(DataError::EmptyPath.is_security_rejection());
        assert!(DataError::PathTraversal("../x".into()).is_security_rejection());
        assert!(!DataError::NoStorageLocation.is_security_rejection());
        assert!(!DataError::EmptyPath.is_transient());
    }
}

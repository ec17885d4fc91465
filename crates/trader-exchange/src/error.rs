//! 거래소 에러 타입.

use thiserror::Error;

use crate::circuit_breaker::CircuitOpenError;

/// 거래소 관련 에러.
#[derive(Debug, Error)]
pub enum ExchangeError {
    /// 네트워크/연결 에러
    #[error("Network error: {0}")]
    NetworkError(String),

    /// 요청 한도 초과
    #[error("Rate limit exceeded")]
    RateLimited,

    /// API 에러 코드
    #[error("API error {code}: {message}")]
    ApiError { code: i32, message: String },

    /// 파싱/역직렬화 에러
    #[error("Parse error: {0}")]
    ParseError(String),

    /// 심볼을 찾을 수 없음
    #[error("Symbol not found: {0}")]
    SymbolNotFound(String),

    /// 타임아웃
    #[error("Request timeout: {0}")]
    Timeout(String),

    /// 회로 차단기가 열려 있음
    #[error(transparent)]
    CircuitOpen(#[from] CircuitOpenError),

    /// 모든 거래소 시도 실패
    #[error("All exchanges failed (tried: {}): {last_error}", attempted.join(", "))]
    AllExchangesFailed {
        /// 시도한 거래소 (순서대로)
        attempted: Vec<String>,
        /// 마지막 에러 메시지
        last_error: String,
    },

    /// 사용 가능한 거래소 없음
    #[error("No exchange configured")]
    NoExchangeConfigured,

    /// 알 수 없는 에러
    #[error("Unknown error: {0}")]
    Unknown(String),
}

impl ExchangeError {
    /// 재시도 가능한 에러인지 확인.
    pub fn is_retryable(&self) -> bool {
        match self {
            ExchangeError::NetworkError(_)
            | ExchangeError::RateLimited
            | ExchangeError::Timeout(_) => true,
            // 5xx는 일시적 장애로 간주
            ExchangeError::ApiError { code, .. } => (500..600).contains(code),
            _ => false,
        }
    }

    /// 거래소 자체의 장애로 볼 수 있는 에러인지 확인.
    ///
    /// 회로 차단기는 이 에러만 실패로 기록합니다. 없는 심볼이나 잘못된 요청은
    /// 거래소가 정상 응답한 것입니다.
    pub fn is_exchange_fault(&self) -> bool {
        match self {
            ExchangeError::NetworkError(_) | ExchangeError::Timeout(_) => true,
            ExchangeError::ApiError { code, .. } => (500..600).contains(code),
            _ => false,
        }
    }

    /// 권장 재시도 대기 시간(밀리초) 반환.
    pub fn retry_delay_ms(&self) -> Option<u64> {
        match self {
            ExchangeError::RateLimited => Some(60_000),
            ExchangeError::NetworkError(_) => Some(1000),
            ExchangeError::Timeout(_) => Some(500),
            ExchangeError::CircuitOpen(e) => Some(e.retry_after.as_millis() as u64),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for ExchangeError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            ExchangeError::Timeout(err.to_string())
        } else if err.is_connect() || err.is_request() {
            ExchangeError::NetworkError(err.to_string())
        } else if err.is_decode() {
            ExchangeError::ParseError(err.to_string())
        } else {
            ExchangeError::Unknown(err.to_string())
        }
    }
}

impl From<serde_json::Error> for ExchangeError {
    fn from(err: serde_json::Error) -> Self {
        ExchangeError::ParseError(err.to_string())
    }
}

//! 설정 관리.
//!
//! 기본값, TOML 파일, `TRADER__` 접두사 환경 변수 순으로 설정을 겹쳐
//! 로드합니다. 예: `TRADER__STORAGE__BUCKET=market-data`.

use crate::types::SamplingFrequency;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// 애플리케이션 설정.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct AppConfig {
    /// 오브젝트 스토리지 설정
    pub storage: StorageConfig,
    /// 파이프라인/작업 큐 설정
    pub pipeline: PipelineConfig,
    /// 서킷 브레이커 설정
    pub circuit_breaker: CircuitBreakerSettings,
    /// 성과 지표 설정
    pub metrics: MetricsSettings,
    /// 종목 해석 설정
    pub resolver: ResolverConfig,
    /// 거래소 설정
    pub exchanges: Vec<ExchangeConfig>,
    /// 데이터베이스 설정
    pub database: DatabaseConfig,
    /// 로깅 설정
    pub logging: LoggingConfig,
}

/// 오브젝트 스토리지 설정.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct StorageConfig {
    /// 로컬 스토리지 루트 디렉토리
    pub root: String,
    /// 버킷 이름
    pub bucket: String,
    /// 원본 파일 최대 크기 (MB)
    pub max_file_size_mb: u64,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            root: "./data".to_string(),
            bucket: "market-data".to_string(),
            max_file_size_mb: 500,
        }
    }
}

impl StorageConfig {
    /// 최대 파일 크기 (바이트).
    pub fn max_file_size_bytes(&self) -> u64 {
        self.max_file_size_mb * 1024 * 1024
    }
}

/// 파이프라인/작업 큐 설정.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// 작업당 최대 시도 횟수
    pub attempts: u32,
    /// 지수 백오프 기본 지연 (밀리초)
    pub backoff_ms: u64,
    /// 동시 워커 수
    pub concurrency: usize,
    /// 성공한 작업 기록 삭제 여부
    pub remove_on_complete: bool,
    /// 실패한 작업 기록 삭제 여부
    pub remove_on_fail: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            attempts: 3,
            backoff_ms: 1_000,
            concurrency: 4,
            remove_on_complete: true,
            remove_on_fail: false,
        }
    }
}

/// 서킷 브레이커 설정.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CircuitBreakerSettings {
    /// 회로를 여는 실패 횟수
    pub failure_threshold: u32,
    /// 실패를 집계하는 구간 (밀리초)
    pub failure_window_ms: u64,
    /// OPEN 유지 시간 (밀리초)
    pub reset_timeout_ms: u64,
    /// HALF_OPEN에서 CLOSED로 복귀하는 연속 성공 횟수
    pub success_threshold: u32,
}

impl Default for CircuitBreakerSettings {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            failure_window_ms: 60_000,
            reset_timeout_ms: 30_000,
            success_threshold: 2,
        }
    }
}

/// 성과 지표 설정.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct MetricsSettings {
    /// 포트폴리오 가치 샘플링 주기
    pub timeframe: SamplingFrequency,
    /// 연간 무위험 수익률
    pub risk_free_rate: f64,
    /// 24/7 암호화폐 달력 사용 여부
    pub use_crypto_calendar: bool,
}

impl Default for MetricsSettings {
    fn default() -> Self {
        Self {
            timeframe: SamplingFrequency::Daily,
            risk_free_rate: 0.02,
            use_crypto_calendar: true,
        }
    }
}

/// 종목 해석 설정.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ResolverConfig {
    /// 호가 통화 대체 순서
    pub quote_fallback_chain: Vec<String>,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            quote_fallback_chain: ["USDT", "USDC", "BUSD", "DAI"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
        }
    }
}

/// 거래소 설정.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ExchangeConfig {
    /// 거래소 이름
    pub name: String,
    /// 이 거래소 활성화 여부
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// REST API 기본 URL
    pub rest_base_url: String,
    /// 요청 타임아웃 (초)
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_true() -> bool {
    true
}

fn default_timeout_secs() -> u64 {
    10
}

/// 데이터베이스 설정.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// 연결 URL (없으면 인메모리 저장소 사용)
    pub url: Option<String>,
    /// 최대 연결 수
    pub max_connections: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: None,
            max_connections: 10,
        }
    }
}

/// 로깅 설정.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// 로그 레벨
    pub level: String,
    /// 로그 형식 (pretty, json, compact)
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
        }
    }
}

impl AppConfig {
    /// 파일과 환경 변수에서 설정을 로드합니다.
    ///
    /// 파일이 없으면 기본값과 환경 변수만 사용합니다.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, config::ConfigError> {
        let builder = config::Config::builder()
            // 파일에서 로드
            .add_source(config::File::from(path.as_ref()).required(false))
            // 환경 변수로 오버라이드
            .add_source(
                config::Environment::with_prefix("TRADER")
                    .separator("__")
                    .try_parsing(true),
            );

        let config = builder.build()?;
        config.try_deserialize()
    }

    /// 기본 경로에서 설정을 로드합니다.
    pub fn load_default() -> Result<Self, config::ConfigError> {
        Self::load("config/default.toml")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = AppConfig::default();
        assert_eq!(config.storage.max_file_size_bytes(), 500 * 1024 * 1024);
        assert_eq!(config.circuit_breaker.failure_threshold, 5);
        assert_eq!(config.circuit_breaker.success_threshold, 2);
        assert_eq!(config.metrics.risk_free_rate, 0.02);
        assert!(config.metrics.use_crypto_calendar);
        assert_eq!(
            config.resolver.quote_fallback_chain,
            vec!["USDT", "USDC", "BUSD", "DAI"]
        );
        assert!(config.database.url.is_none());
    }

    #[test]
    fn test_load_missing_file_falls_back_to_defaults() {
        let config = AppConfig::load("does/not/exist.toml").unwrap();
        assert_eq!(config.pipeline.attempts, 3);
        assert_eq!(config.storage.bucket, "market-data");
    }

    #[test]
    fn test_partial_section_keeps_defaults() {
        let config: AppConfig = serde_json::from_str(
            r#"{"metrics":{"timeframe":"hourly"},"exchanges":[{"name":"binance","rest_base_url":"https://api.binance.com"}]}"#,
        )
        .unwrap();
        assert_eq!(config.metrics.timeframe, SamplingFrequency::Hourly);
        assert_eq!(config.metrics.risk_free_rate, 0.02);
        assert!(config.exchanges[0].enabled);
        assert_eq!(config.exchanges[0].timeout_secs, 10);
    }
}

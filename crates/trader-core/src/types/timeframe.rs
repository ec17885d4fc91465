//! 캔들스틱 타임프레임 및 지표 샘플링 주기 정의.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// 캔들스틱 타임프레임.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Timeframe {
    /// 1분봉
    M1,
    /// 5분봉
    M5,
    /// 15분봉
    M15,
    /// 30분봉
    M30,
    /// 1시간봉
    H1,
    /// 4시간봉
    H4,
    /// 일봉
    D1,
    /// 주봉
    W1,
    /// 월봉
    MN1,
}

impl Timeframe {
    /// 이 타임프레임의 기간을 반환합니다.
    pub fn duration(&self) -> Duration {
        match self {
            Timeframe::M1 => Duration::from_secs(60),
            Timeframe::M5 => Duration::from_secs(5 * 60),
            Timeframe::M15 => Duration::from_secs(15 * 60),
            Timeframe::M30 => Duration::from_secs(30 * 60),
            Timeframe::H1 => Duration::from_secs(60 * 60),
            Timeframe::H4 => Duration::from_secs(4 * 60 * 60),
            Timeframe::D1 => Duration::from_secs(24 * 60 * 60),
            Timeframe::W1 => Duration::from_secs(7 * 24 * 60 * 60),
            Timeframe::MN1 => Duration::from_secs(30 * 24 * 60 * 60), // 근사값
        }
    }

    /// 이 타임프레임의 초 단위 값을 반환합니다.
    pub fn as_secs(&self) -> u64 {
        self.duration().as_secs()
    }

    /// 바이낸스 간격 문자열로 변환합니다.
    pub fn to_binance_interval(&self) -> &'static str {
        match self {
            Timeframe::M1 => "1m",
            Timeframe::M5 => "5m",
            Timeframe::M15 => "15m",
            Timeframe::M30 => "30m",
            Timeframe::H1 => "1h",
            Timeframe::H4 => "4h",
            Timeframe::D1 => "1d",
            Timeframe::W1 => "1w",
            Timeframe::MN1 => "1M",
        }
    }

    /// 바이낸스 간격 문자열에서 파싱합니다.
    pub fn from_binance_interval(s: &str) -> Option<Self> {
        match s {
            "1m" => Some(Timeframe::M1),
            "5m" => Some(Timeframe::M5),
            "15m" => Some(Timeframe::M15),
            "30m" => Some(Timeframe::M30),
            "1h" => Some(Timeframe::H1),
            "4h" => Some(Timeframe::H4),
            "1d" => Some(Timeframe::D1),
            "1w" => Some(Timeframe::W1),
            "1M" => Some(Timeframe::MN1),
            _ => None,
        }
    }
}

impl fmt::Display for Timeframe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_binance_interval())
    }
}

impl FromStr for Timeframe {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_binance_interval(s).ok_or_else(|| format!("Invalid timeframe: {}", s))
    }
}

/// 포트폴리오 가치 시계열의 샘플링 주기.
///
/// 연간 기간 수는 암호화폐(24/7) 달력과 전통 시장 달력에서 다릅니다.
/// 주봉/월봉은 두 달력이 같습니다.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SamplingFrequency {
    /// 시간 단위
    #[serde(alias = "HOURLY")]
    Hourly,
    /// 일 단위
    #[default]
    #[serde(alias = "DAILY")]
    Daily,
    /// 주 단위
    #[serde(alias = "WEEKLY")]
    Weekly,
    /// 월 단위
    #[serde(alias = "MONTHLY")]
    Monthly,
}

impl SamplingFrequency {
    /// 연간 기간 수.
    pub fn periods_per_year(&self, crypto_calendar: bool) -> f64 {
        match (self, crypto_calendar) {
            (SamplingFrequency::Hourly, true) => 8760.0,
            (SamplingFrequency::Hourly, false) => 6552.0,
            (SamplingFrequency::Daily, true) => 365.0,
            (SamplingFrequency::Daily, false) => 252.0,
            (SamplingFrequency::Weekly, _) => 52.0,
            (SamplingFrequency::Monthly, _) => 12.0,
        }
    }
}

impl fmt::Display for SamplingFrequency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SamplingFrequency::Hourly => "hourly",
            SamplingFrequency::Daily => "daily",
            SamplingFrequency::Weekly => "weekly",
            SamplingFrequency::Monthly => "monthly",
        };
        f.write_str(s)
    }
}

impl FromStr for SamplingFrequency {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "hourly" => Ok(SamplingFrequency::Hourly),
            "daily" => Ok(SamplingFrequency::Daily),
            "weekly" => Ok(SamplingFrequency::Weekly),
            "monthly" => Ok(SamplingFrequency::Monthly),
            _ => Err(format!("Invalid sampling frequency: {}", s)),
        }
    }
}

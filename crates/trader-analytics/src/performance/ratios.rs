//! 샤프/소르티노 비율 기본 함수.
//!
//! 모든 입력은 기간 수익률(비율, 0.01 = 1%)이며, 무위험 수익률은 연율로
//! 받아 `연율 / 연간 기간 수`로 기간 단위로 환산합니다. 결과는
//! `√연간 기간 수`로 연율화합니다.
//!
//! 하방 편차의 분모는 하방 수익률 개수가 아니라 **전체 표본 수**입니다.
//! 지표 계산기의 `calculate_downside_deviation`도 같은 규칙을 따르므로
//! 두 값은 항상 짝이 맞습니다.

/// 연 무위험 수익률을 기간 단위로 환산합니다.
pub fn period_risk_free_rate(annual_rate: f64, periods_per_year: f64) -> f64 {
    if periods_per_year <= 0.0 {
        return 0.0;
    }
    annual_rate / periods_per_year
}

/// 산술 평균. 빈 입력은 0.
pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// 모표준편차 (분모 n). 빈 입력은 0.
pub fn population_std_dev(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let m = mean(values);
    let variance = values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / values.len() as f64;
    variance.sqrt()
}

/// 기간 단위 하방 편차.
///
/// 기간 무위험 수익률 미만인 수익률만 제곱합에 포함하고, 전체 표본 수로
/// 나눕니다.
pub fn period_downside_deviation(returns: &[f64], period_rf: f64) -> f64 {
    if returns.is_empty() {
        return 0.0;
    }
    let sum_sq: f64 = returns
        .iter()
        .filter(|&&r| r < period_rf)
        .map(|r| (r - period_rf).powi(2))
        .sum();
    (sum_sq / returns.len() as f64).sqrt()
}

/// 연율화 샤프 비율.
///
/// `(평균 - 기간 무위험) / 표준편차 × √연간 기간 수`. 빈 입력이나
/// 변동성이 0이면 0을 반환합니다.
pub fn sharpe_ratio(returns: &[f64], annual_risk_free_rate: f64, periods_per_year: f64) -> f64 {
    if returns.is_empty() {
        return 0.0;
    }
    let std_dev = population_std_dev(returns);
    if std_dev == 0.0 || !std_dev.is_finite() {
        return 0.0;
    }
    let period_rf = period_risk_free_rate(annual_risk_free_rate, periods_per_year);
    (mean(returns) - period_rf) / std_dev * periods_per_year.sqrt()
}

/// 연율화 소르티노 비율.
///
/// `(평균 - 기간 무위험) / 하방 편차 × √연간 기간 수`. 빈 입력이나 하방
/// 편차가 0이면 0을 반환합니다.
pub fn sortino_ratio(returns: &[f64], annual_risk_free_rate: f64, periods_per_year: f64) -> f64 {
    if returns.is_empty() {
        return 0.0;
    }
    let period_rf = period_risk_free_rate(annual_risk_free_rate, periods_per_year);
    let downside = period_downside_deviation(returns, period_rf);
    if downside == 0.0 || !downside.is_finite() {
        return 0.0;
    }
    (mean(returns) - period_rf) / downside * periods_per_year.sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f64 = 1e-9;

    #[test]
    fn test_population_std_dev() {
        // 평균 5, 편차 제곱합 32, n = 8
        let values = [2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0];
        assert!((population_std_dev(&values) - 2.0).abs() < EPS);
        assert_eq!(population_std_dev(&[]), 0.0);
    }

    #[test]
    fn test_downside_uses_full_sample_divisor() {
        let returns = [0.02, -0.01, 0.03, -0.03];
        // 하방: (-0.01)^2 + (-0.03)^2 = 0.001, 전체 표본 4로 나눔
        let expected = (0.001f64 / 4.0).sqrt();
        assert!((period_downside_deviation(&returns, 0.0) - expected).abs() < EPS);
    }

    #[test]
    fn test_sharpe_ratio() {
        let returns = [0.01, 0.02, -0.01, 0.02];
        let m = 0.01;
        let sd = population_std_dev(&returns);
        let expected = (m - 0.0) / sd * 365f64.sqrt();
        assert!((sharpe_ratio(&returns, 0.0, 365.0) - expected).abs() < EPS);
    }

    #[test]
    fn test_zero_cases() {
        assert_eq!(sharpe_ratio(&[], 0.02, 365.0), 0.0);
        assert_eq!(sortino_ratio(&[], 0.02, 365.0), 0.0);
        // 변동성 0
        assert_eq!(sharpe_ratio(&[0.01, 0.01, 0.01], 0.02, 365.0), 0.0);
        // 하방 수익률 없음
        assert_eq!(sortino_ratio(&[0.05, 0.04], 0.0, 365.0), 0.0);
    }

    #[test]
    fn test_period_risk_free_rate() {
        assert!((period_risk_free_rate(0.0365, 365.0) - 0.0001).abs() < EPS);
        assert_eq!(period_risk_free_rate(0.02, 0.0), 0.0);
    }
}

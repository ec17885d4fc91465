//! 지표 계산기의 속성 기반 테스트.

use proptest::prelude::*;
use trader_analytics::{calculate_metrics, MetricsCalculator, MetricsConfig, MetricsInput};
use trader_core::{SamplingFrequency, TradeRecord};

fn positive_series() -> impl Strategy<Value = Vec<f64>> {
    prop::collection::vec(1.0f64..1_000_000.0, 0..64)
}

proptest! {
    #[test]
    fn max_drawdown_is_a_fraction(values in positive_series()) {
        let dd = MetricsCalculator::calculate_max_drawdown(&values);
        prop_assert!((0.0..=1.0).contains(&dd));
    }

    #[test]
    fn non_decreasing_series_has_no_drawdown(mut values in positive_series()) {
        values.sort_by(|a, b| a.partial_cmp(b).unwrap());
        prop_assert_eq!(MetricsCalculator::calculate_max_drawdown(&values), 0.0);
    }

    #[test]
    fn returns_are_one_shorter(values in positive_series()) {
        let returns = MetricsCalculator::calculate_returns(&values);
        prop_assert_eq!(returns.len(), values.len().saturating_sub(1));
    }

    #[test]
    fn win_rate_counts_sells_only(pnls in prop::collection::vec(-100.0f64..100.0, 0..32), buys in 0usize..8) {
        let mut trades: Vec<TradeRecord> = pnls.iter().map(|p| TradeRecord::sell(*p)).collect();
        trades.extend((0..buys).map(|_| TradeRecord::buy()));

        let rate = MetricsCalculator::calculate_win_rate(&trades);
        prop_assert!((0.0..=1.0).contains(&rate));

        let input = MetricsInput {
            portfolio_values: vec![100.0, 101.0],
            initial_capital: 100.0,
            trades,
        };
        let result = calculate_metrics(&input, &MetricsConfig::default());
        prop_assert_eq!(result.total_trades, pnls.len() + buys);
        prop_assert!(result.winning_trades + result.losing_trades <= pnls.len());
    }

    #[test]
    fn metrics_are_finite_except_profit_factor(values in positive_series()) {
        let input = MetricsInput {
            initial_capital: values.first().copied().unwrap_or(1.0),
            portfolio_values: values,
            trades: vec![],
        };
        let result = calculate_metrics(&input, &MetricsConfig::new(SamplingFrequency::Hourly));
        for metric in [
            result.total_return,
            result.annualized_return,
            result.volatility,
            result.downside_deviation,
            result.sharpe_ratio,
            result.sortino_ratio,
            result.max_drawdown,
            result.win_rate,
        ] {
            prop_assert!(!metric.is_nan());
        }
    }
}

#[test]
fn profit_factor_infinity_serializes_as_string() {
    let input = MetricsInput {
        portfolio_values: vec![100.0, 110.0],
        initial_capital: 100.0,
        trades: vec![TradeRecord::buy(), TradeRecord::sell(10.0)],
    };
    let result = calculate_metrics(&input, &MetricsConfig::default());
    assert!(result.profit_factor.is_infinite());

    let json = serde_json::to_value(&result).unwrap();
    assert_eq!(json["profit_factor"], "Infinity");
    assert_eq!(json.as_object().unwrap().len(), 13);
}

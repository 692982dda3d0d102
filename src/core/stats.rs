use super::types::{AggregateResult, InvestmentConfig, PERIODS_PER_YEAR, Trajectory, YearReturn};

/// Volatility below this is treated as zero when forming the risk ratio.
const MIN_VOLATILITY: f64 = 1e-12;

pub fn summarize(trajectory: &Trajectory, config: &InvestmentConfig) -> AggregateResult {
    let final_value = trajectory.final_value();
    let total_contributions = trajectory.total_contributions();
    let (total_taxes_paid, total_fees_paid) = trajectory
        .records
        .last()
        .map(|r| (r.cumulative_taxes, r.cumulative_fees))
        .unwrap_or((0.0, 0.0));
    let years = trajectory.len() as f64 / PERIODS_PER_YEAR as f64;

    let returns = period_returns(trajectory);
    let realized_volatility = population_std_dev(&returns)
        .map(|std| std * (PERIODS_PER_YEAR as f64).sqrt());

    let yearly = yearly_returns(trajectory);
    let average_annual_return = mean(&yearly.iter().map(|y| y.annual_return).collect::<Vec<_>>());

    let inflation = config.inflation_rate();
    let risk_adjusted_ratio = match (average_annual_return, realized_volatility) {
        (Some(avg), Some(vol)) if vol > MIN_VOLATILITY => Some((avg - inflation) / vol),
        _ => None,
    };

    let best_year = yearly
        .iter()
        .copied()
        .max_by(|a, b| a.annual_return.total_cmp(&b.annual_return));
    let worst_year = yearly
        .iter()
        .copied()
        .min_by(|a, b| a.annual_return.total_cmp(&b.annual_return));

    AggregateResult {
        final_value,
        total_contributions,
        total_taxes_paid,
        total_fees_paid,
        net_profit: final_value - total_contributions,
        inflation_adjusted_final_value: deflate(final_value, inflation, years),
        cagr: cagr(trajectory.initial_capital, final_value, years),
        average_annual_return,
        realized_volatility,
        max_drawdown: max_drawdown(&trajectory.values()),
        risk_adjusted_ratio,
        best_year,
        worst_year,
    }
}

/// Value in start-of-plan money after `years` of constant annual inflation.
pub fn deflate(value: f64, annual_inflation: f64, years: f64) -> f64 {
    value / (1.0 + annual_inflation).powf(years)
}

pub fn cagr(initial_value: f64, final_value: f64, years: f64) -> Option<f64> {
    if initial_value <= 0.0 || final_value <= 0.0 || years <= 0.0 {
        return None;
    }
    Some((final_value / initial_value).powf(1.0 / years) - 1.0)
}

/// Flow-adjusted return of every period: the contribution made at the start
/// of the period is part of the base it earns on.
pub fn period_returns(trajectory: &Trajectory) -> Vec<f64> {
    let mut prev = trajectory.initial_capital;
    let mut returns = Vec::with_capacity(trajectory.len());
    for record in &trajectory.records {
        let base = prev + record.contribution;
        if base > 0.0 {
            returns.push(record.value / base - 1.0);
        }
        prev = record.value;
    }
    returns
}

/// Time-weighted return of each completed year.
pub fn yearly_returns(trajectory: &Trajectory) -> Vec<YearReturn> {
    let per_year = PERIODS_PER_YEAR as usize;
    let mut result = Vec::with_capacity(trajectory.len() / per_year);

    for (idx, chunk) in trajectory.records.chunks(per_year).enumerate() {
        if chunk.len() < per_year {
            break;
        }
        let mut prev = if idx == 0 {
            trajectory.initial_capital
        } else {
            trajectory.records[idx * per_year - 1].value
        };
        let mut growth = 1.0;
        let mut observed = false;
        for record in chunk {
            let base = prev + record.contribution;
            if base > 0.0 {
                growth *= record.value / base;
                observed = true;
            }
            prev = record.value;
        }
        if observed {
            result.push(YearReturn {
                year: idx as u32 + 1,
                annual_return: growth - 1.0,
            });
        }
    }

    result
}

/// Largest peak-to-trough decline as a fraction of the peak, in [0, 1].
pub fn max_drawdown(values: &[f64]) -> f64 {
    let mut peak = 0.0_f64;
    let mut worst = 0.0_f64;
    for &value in values {
        if value > peak {
            peak = value;
        } else if peak > 0.0 {
            worst = worst.max((peak - value) / peak);
        }
    }
    worst.clamp(0.0, 1.0)
}

pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}

pub fn population_std_dev(values: &[f64]) -> Option<f64> {
    let avg = mean(values)?;
    let variance = values.iter().map(|v| (v - avg).powi(2)).sum::<f64>() / values.len() as f64;
    Some(variance.sqrt())
}

/// Linear interpolation between closest ranks. Sorts `values` in place.
pub fn percentile(values: &mut [f64], p: f64) -> f64 {
    values.sort_by(|a, b| a.total_cmp(b));
    percentile_of_sorted(values, p)
}

pub fn percentile_of_sorted(sorted: &[f64], p: f64) -> f64 {
    if sorted.is_empty() {
        return 0.0;
    }

    let n = sorted.len();
    if n == 1 {
        return sorted[0];
    }

    let rank = (p.clamp(0.0, 100.0) / 100.0) * (n as f64 - 1.0);
    let lower = rank.floor() as usize;
    let upper = rank.ceil() as usize;

    if lower == upper {
        sorted[lower]
    } else {
        let w = rank - lower as f64;
        let (lo, hi) = (sorted[lower], sorted[upper]);
        (lo + (hi - lo) * w).clamp(lo, hi)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::engine::run_projection;
    use crate::core::types::PeriodRecord;
    use chrono::NaiveDate;
    use proptest::prelude::{prop_assert, proptest};
    use proptest::collection::vec;

    const EPS: f64 = 1e-9;

    fn assert_approx(actual: f64, expected: f64) {
        assert!(
            (actual - expected).abs() <= EPS,
            "expected {expected}, got {actual}"
        );
    }

    fn config(years: u32) -> InvestmentConfig {
        InvestmentConfig {
            initial_capital: 10_000.0,
            monthly_contribution: 0.0,
            years,
            expected_annual_return: 12.0,
            volatility: 0.0,
            management_fee_annual: 0.0,
            tax_rate_on_gains: 0.0,
            inflation_rate_annual: 2.0,
            contribution_growth_annual: 0.0,
            enable_stochastic_returns: false,
            start_date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            seed: 1,
            stress_years: Vec::new(),
        }
    }

    fn trajectory_from_values(initial: f64, values: &[f64]) -> Trajectory {
        let records = values
            .iter()
            .enumerate()
            .map(|(idx, &value)| PeriodRecord {
                period: idx as u32 + 1,
                value,
                cumulative_contributions: initial,
                contribution: 0.0,
                period_return: 0.0,
                gain: 0.0,
                fee: 0.0,
                tax: 0.0,
                cumulative_gains: value - initial,
                cumulative_taxes: 0.0,
                cumulative_fees: 0.0,
            })
            .collect();
        Trajectory {
            start_date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            initial_capital: initial,
            records,
            resample_fallbacks: 0,
        }
    }

    #[test]
    fn cagr_round_trips_the_effective_annual_rate() {
        let config = config(5);
        let trajectory = run_projection(&config).expect("valid config");
        let summary = summarize(&trajectory, &config);
        let effective = 1.01_f64.powi(12) - 1.0;
        assert_approx(summary.cagr.expect("computable"), effective);
        assert_approx(summary.average_annual_return.expect("computable"), effective);
    }

    #[test]
    fn deterministic_path_has_no_risk_ratio() {
        let config = config(3);
        let trajectory = run_projection(&config).expect("valid config");
        let summary = summarize(&trajectory, &config);
        assert!(summary.realized_volatility.expect("computable") <= 1e-12);
        assert_eq!(summary.risk_adjusted_ratio, None);
        assert_eq!(summary.max_drawdown, 0.0);
    }

    #[test]
    fn cagr_is_undefined_without_starting_capital() {
        let mut config = config(2);
        config.initial_capital = 0.0;
        config.monthly_contribution = 100.0;
        let trajectory = run_projection(&config).expect("valid config");
        let summary = summarize(&trajectory, &config);
        assert_eq!(summary.cagr, None);
        assert!(summary.final_value > 0.0);
        assert_eq!(summary.max_drawdown, 0.0);
    }

    #[test]
    fn cagr_is_undefined_for_wiped_out_portfolio() {
        assert_eq!(cagr(1_000.0, 0.0, 3.0), None);
        assert_eq!(cagr(-5.0, 100.0, 3.0), None);
        assert_eq!(cagr(100.0, 100.0, 0.0), None);
    }

    #[test]
    fn stochastic_summary_reports_volatility_and_ratio() {
        let mut config = config(10);
        config.enable_stochastic_returns = true;
        config.volatility = 18.0;
        let trajectory = run_projection(&config).expect("valid config");
        let summary = summarize(&trajectory, &config);
        let vol = summary.realized_volatility.expect("computable");
        assert!(vol > 0.05 && vol < 0.4, "vol {vol}");
        assert!(summary.risk_adjusted_ratio.is_some());
        assert!(summary.max_drawdown > 0.0);
        let best = summary.best_year.expect("has years");
        let worst = summary.worst_year.expect("has years");
        assert!(best.annual_return >= worst.annual_return);
    }

    #[test]
    fn totals_and_inflation_adjustment() {
        let mut config = config(2);
        config.management_fee_annual = 0.5;
        config.tax_rate_on_gains = 26.0;
        let trajectory = run_projection(&config).expect("valid config");
        let summary = summarize(&trajectory, &config);
        let last = trajectory.records.last().unwrap();
        assert_approx(summary.total_taxes_paid, last.cumulative_taxes);
        assert_approx(summary.total_fees_paid, last.cumulative_fees);
        assert_approx(summary.net_profit, summary.final_value - 10_000.0);
        assert_approx(
            summary.inflation_adjusted_final_value,
            summary.final_value / 1.02_f64.powi(2),
        );
    }

    #[test]
    fn drawdown_tracks_running_peak() {
        assert_approx(max_drawdown(&[100.0, 120.0, 90.0, 130.0, 65.0]), 0.5);
        assert_eq!(max_drawdown(&[0.0, 0.0, 10.0, 20.0]), 0.0);
        assert_eq!(max_drawdown(&[]), 0.0);
        assert_approx(max_drawdown(&[50.0, 0.0]), 1.0);
    }

    #[test]
    fn summary_drawdown_includes_period_zero() {
        let trajectory = trajectory_from_values(100.0, &[80.0, 90.0, 120.0]);
        let summary = summarize(&trajectory, &config(1));
        assert_approx(summary.max_drawdown, 0.2);
    }

    #[test]
    fn percentile_interpolates_between_points() {
        let mut values = vec![4.0, 1.0, 3.0, 2.0];
        assert_approx(percentile(&mut values, 25.0), 1.75);
        assert_approx(percentile_of_sorted(&values, 50.0), 2.5);
        assert_approx(percentile_of_sorted(&values, 100.0), 4.0);
        assert_eq!(percentile_of_sorted(&[], 50.0), 0.0);
    }

    proptest! {
        #![proptest_config(proptest::test_runner::Config::with_cases(64))]

        #[test]
        fn prop_drawdown_stays_in_unit_interval(values in vec(0.0f64..1e7, 0..200)) {
            let dd = max_drawdown(&values);
            prop_assert!((0.0..=1.0).contains(&dd));
        }

        #[test]
        fn prop_non_decreasing_series_has_no_drawdown(mut values in vec(0.0f64..1e7, 0..200)) {
            values.sort_by(|a, b| a.total_cmp(b));
            prop_assert!(max_drawdown(&values) == 0.0);
        }
    }
}

use serde::Serialize;

use super::engine::{Ledger, period_return, project, step_period};
use super::error::EngineError;
use super::random::derive_seed;
use super::types::{InvestmentConfig, PERIODS_PER_YEAR};

pub const MAX_GOAL_MONTHS: u32 = 600;
pub const CONTRIBUTION_SEARCH_MAX: f64 = 10_000.0;
pub const CONTRIBUTION_ACHIEVABLE_LIMIT: f64 = 5_000.0;
pub const MAX_BISECTION_ITERATIONS: u32 = 50;
/// Relative distance from the target accepted as a solution.
pub const TARGET_TOLERANCE: f64 = 0.01;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GoalTimeline {
    pub target: f64,
    pub months: u32,
    pub years: u32,
    pub achievable: bool,
    pub final_value: f64,
    pub total_contributions: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ContributionIteration {
    pub iteration: u32,
    pub lower_bound: f64,
    pub upper_bound: f64,
    pub candidate: f64,
    pub final_value: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ContributionSolve {
    pub target: f64,
    pub required_contribution: f64,
    pub achievable: bool,
    pub converged: bool,
    pub final_value: f64,
    pub iterations: Vec<ContributionIteration>,
}

/// Months of deterministic growth needed before the value reaches `target`,
/// capped at fifty years.
pub fn time_to_goal(config: &InvestmentConfig, target: f64) -> Result<GoalTimeline, EngineError> {
    config.validate()?;
    validate_target(target)?;

    let mut ledger = Ledger::open(config);
    let mut months = 0_u32;
    while ledger.value < target && months < MAX_GOAL_MONTHS {
        months += 1;
        let rate = period_return(config, months, None);
        step_period(config, &mut ledger, months, rate);
    }

    Ok(GoalTimeline {
        target,
        months,
        years: months / PERIODS_PER_YEAR,
        achievable: ledger.value >= target,
        final_value: ledger.value,
        total_contributions: ledger.cumulative_contributions,
    })
}

/// Bisects the monthly contribution that lands the deterministic final value
/// within one percent of `target`.
pub fn required_contribution(
    config: &InvestmentConfig,
    target: f64,
) -> Result<ContributionSolve, EngineError> {
    config.validate()?;
    validate_target(target)?;

    let evaluate = |contribution: f64| {
        let mut candidate = config.clone();
        candidate.monthly_contribution = contribution;
        candidate.enable_stochastic_returns = false;
        project(&candidate, derive_seed(config.seed, 0)).final_value()
    };

    let mut lo = 0.0;
    let mut hi = CONTRIBUTION_SEARCH_MAX;
    let mut best = 0.0;
    let mut converged = false;
    let mut iterations = Vec::with_capacity(MAX_BISECTION_ITERATIONS as usize);

    for iteration in 1..=MAX_BISECTION_ITERATIONS {
        let mid = (lo + hi) * 0.5;
        let final_value = evaluate(mid);
        iterations.push(ContributionIteration {
            iteration,
            lower_bound: lo,
            upper_bound: hi,
            candidate: mid,
            final_value,
        });

        if (final_value - target).abs() < target * TARGET_TOLERANCE {
            best = mid;
            converged = true;
            break;
        }
        if final_value < target {
            lo = mid;
        } else {
            hi = mid;
            best = mid;
        }
    }

    let final_value = evaluate(best);
    let reaches_target = final_value >= target * (1.0 - TARGET_TOLERANCE);

    Ok(ContributionSolve {
        target,
        required_contribution: best,
        achievable: reaches_target && best <= CONTRIBUTION_ACHIEVABLE_LIMIT,
        converged,
        final_value,
        iterations,
    })
}

fn validate_target(target: f64) -> Result<(), EngineError> {
    if !target.is_finite() || target <= 0.0 {
        return Err(EngineError::invalid("targetAmount", "must be a finite number > 0"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn assert_close(actual: f64, expected: f64, tol: f64) {
        assert!(
            (actual - expected).abs() <= tol,
            "expected {expected}, got {actual}, tolerance {tol}"
        );
    }

    fn deterministic_config() -> InvestmentConfig {
        InvestmentConfig {
            initial_capital: 0.0,
            monthly_contribution: 100.0,
            years: 10,
            expected_annual_return: 0.0,
            volatility: 0.0,
            management_fee_annual: 0.0,
            tax_rate_on_gains: 0.0,
            inflation_rate_annual: 0.0,
            contribution_growth_annual: 0.0,
            enable_stochastic_returns: false,
            start_date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            seed: 7,
            stress_years: Vec::new(),
        }
    }

    #[test]
    fn time_to_goal_counts_contribution_months() {
        let timeline = time_to_goal(&deterministic_config(), 1_250.0).expect("valid");
        assert_eq!(timeline.months, 13);
        assert_eq!(timeline.years, 1);
        assert!(timeline.achievable);
        assert_close(timeline.final_value, 1_300.0, 1e-9);
        assert_close(timeline.total_contributions, 1_300.0, 1e-9);
    }

    #[test]
    fn time_to_goal_is_zero_when_capital_already_covers_target() {
        let mut config = deterministic_config();
        config.initial_capital = 5_000.0;
        let timeline = time_to_goal(&config, 4_000.0).expect("valid");
        assert_eq!(timeline.months, 0);
        assert!(timeline.achievable);
    }

    #[test]
    fn time_to_goal_gives_up_after_fifty_years() {
        let mut config = deterministic_config();
        config.monthly_contribution = 1.0;
        let timeline = time_to_goal(&config, 1_000_000.0).expect("valid");
        assert_eq!(timeline.months, MAX_GOAL_MONTHS);
        assert!(!timeline.achievable);
    }

    #[test]
    fn time_to_goal_rejects_bad_target() {
        assert!(time_to_goal(&deterministic_config(), 0.0).is_err());
        assert!(time_to_goal(&deterministic_config(), f64::NAN).is_err());
    }

    #[test]
    fn required_contribution_solves_zero_return_case() {
        // 120 months of contribution c must reach 60_000 -> c = 500.
        let solve = required_contribution(&deterministic_config(), 60_000.0).expect("valid");
        assert!(solve.converged);
        assert!(solve.achievable);
        assert_close(solve.final_value, 60_000.0, 600.0);
        assert_close(solve.required_contribution, 500.0, 5.0);
        assert!(!solve.iterations.is_empty());
    }

    #[test]
    fn required_contribution_reports_unreachable_target() {
        let solve = required_contribution(&deterministic_config(), 10_000_000.0).expect("valid");
        assert!(!solve.achievable);
        assert!(!solve.converged);
        assert_eq!(solve.iterations.len(), MAX_BISECTION_ITERATIONS as usize);
    }

    #[test]
    fn required_contribution_accounts_for_growth() {
        let mut config = deterministic_config();
        config.expected_annual_return = 6.0;
        let solve = required_contribution(&config, 60_000.0).expect("valid");
        assert!(solve.achievable);
        assert!(solve.required_contribution < 500.0);
    }
}

use tracing::debug;

use super::error::EngineError;
use super::random::{ReturnSampler, derive_seed};
use super::types::{
    CRISIS_ANNUAL_RETURN, InvestmentConfig, PERIODS_PER_YEAR, PeriodRecord, Trajectory,
};

/// Running totals carried from one period to the next.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Ledger {
    pub value: f64,
    pub cumulative_contributions: f64,
    pub cumulative_gains: f64,
    pub cumulative_taxes: f64,
    pub cumulative_fees: f64,
    pub monthly_contribution: f64,
}

impl Ledger {
    pub fn open(config: &InvestmentConfig) -> Self {
        Self {
            value: config.initial_capital,
            cumulative_contributions: config.initial_capital,
            cumulative_gains: 0.0,
            cumulative_taxes: 0.0,
            cumulative_fees: 0.0,
            monthly_contribution: config.monthly_contribution,
        }
    }
}

pub fn run_projection(config: &InvestmentConfig) -> Result<Trajectory, EngineError> {
    config.validate()?;
    Ok(project(config, derive_seed(config.seed, 0)))
}

/// Runs a projection without validating; callers check the config first.
pub(crate) fn project(config: &InvestmentConfig, seed: u64) -> Trajectory {
    let total_periods = config.total_periods();
    let mut sampler = config
        .enable_stochastic_returns
        .then(|| ReturnSampler::new(seed));
    let mut ledger = Ledger::open(config);
    let mut records = Vec::with_capacity(total_periods as usize);

    for period in 1..=total_periods {
        let period_return = period_return(config, period, sampler.as_mut());
        records.push(step_period(config, &mut ledger, period, period_return));
    }

    let resample_fallbacks = sampler.as_ref().map_or(0, ReturnSampler::fallbacks);
    debug!(
        periods = total_periods,
        final_value = ledger.value,
        stochastic = config.enable_stochastic_returns,
        resample_fallbacks,
        "projection complete"
    );

    Trajectory {
        start_date: config.start_date,
        initial_capital: config.initial_capital,
        records,
        resample_fallbacks,
    }
}

pub(crate) fn period_return(
    config: &InvestmentConfig,
    period: u32,
    sampler: Option<&mut ReturnSampler>,
) -> f64 {
    let year_index = (period - 1) / PERIODS_PER_YEAR;
    if config.is_stress_year(year_index) {
        return CRISIS_ANNUAL_RETURN / 100.0 / PERIODS_PER_YEAR as f64;
    }

    let mean = config.periodic_return();
    match sampler {
        Some(sampler) => sampler.sample(mean, config.periodic_volatility()),
        None => mean,
    }
}

/// Contribution, return, fee, tax, floor, then the yearly contribution raise.
pub(crate) fn step_period(
    config: &InvestmentConfig,
    ledger: &mut Ledger,
    period: u32,
    period_return: f64,
) -> PeriodRecord {
    let contribution = ledger.monthly_contribution;
    ledger.value += contribution;
    ledger.cumulative_contributions += contribution;

    let gain = ledger.value * period_return;
    ledger.value += gain;
    ledger.cumulative_gains += gain;

    let fee = ledger.value.max(0.0) * config.periodic_fee();
    ledger.value -= fee;
    ledger.cumulative_fees += fee;

    let tax_rate = config.tax_rate();
    let tax = if gain - fee > 0.0 && tax_rate > 0.0 {
        gain * tax_rate
    } else {
        0.0
    };
    ledger.value -= tax;
    ledger.cumulative_taxes += tax;

    ledger.value = ledger.value.max(0.0);

    let record = PeriodRecord {
        period,
        value: ledger.value,
        cumulative_contributions: ledger.cumulative_contributions,
        contribution,
        period_return,
        gain,
        fee,
        tax,
        cumulative_gains: ledger.cumulative_gains,
        cumulative_taxes: ledger.cumulative_taxes,
        cumulative_fees: ledger.cumulative_fees,
    };

    if period % PERIODS_PER_YEAR == 0 {
        ledger.monthly_contribution *= 1.0 + config.contribution_growth();
    }

    record
}

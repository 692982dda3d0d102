use std::sync::atomic::{AtomicBool, Ordering};

use rayon::iter::{IntoParallelIterator, ParallelIterator};
use serde::{Deserialize, Serialize};
use tracing::info;

use super::engine::project;
use super::error::EngineError;
use super::random::{Rng, derive_seed};
use super::stats::{deflate, max_drawdown, percentile, percentile_of_sorted};
use super::types::{
    EnsembleOutcome, InvestmentConfig, MonteCarloEnsemble, PERIODS_PER_YEAR, Percentiles,
    YearBand,
};

pub const DEFAULT_SIMULATIONS: u32 = 1_000;
pub const MAX_SIMULATIONS: u32 = 100_000;

/// Relative half-widths of the uniform jitter applied to macro parameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JitterFactors {
    pub expected_return: f64,
    pub volatility: f64,
    pub inflation: f64,
}

impl Default for JitterFactors {
    fn default() -> Self {
        Self {
            expected_return: 0.3,
            volatility: 0.2,
            inflation: 0.2,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EnsembleOptions {
    pub simulations: u32,
    pub jitter: Option<JitterFactors>,
    pub parallel: bool,
}

impl Default for EnsembleOptions {
    fn default() -> Self {
        Self {
            simulations: DEFAULT_SIMULATIONS,
            jitter: Some(JitterFactors::default()),
            parallel: false,
        }
    }
}

struct RunOutcome {
    run: u32,
    final_value: f64,
    total_contributions: f64,
    max_drawdown: f64,
    inflation_adjusted_final_value: f64,
    year_end_values: Vec<f64>,
    resample_fallbacks: u32,
}

pub fn run_ensemble(
    config: &InvestmentConfig,
    simulations: u32,
) -> Result<MonteCarloEnsemble, EngineError> {
    let options = EnsembleOptions {
        simulations,
        ..EnsembleOptions::default()
    };
    run_ensemble_with(config, &options, None)
}

/// Runs `options.simulations` independent stochastic projections. The cancel
/// flag is polled before every run.
pub fn run_ensemble_with(
    config: &InvestmentConfig,
    options: &EnsembleOptions,
    cancel: Option<&AtomicBool>,
) -> Result<MonteCarloEnsemble, EngineError> {
    config.validate()?;
    let requested = options.simulations;
    if requested == 0 || requested > MAX_SIMULATIONS {
        return Err(EngineError::invalid(
            "simulations",
            format!("must be between 1 and {MAX_SIMULATIONS}"),
        ));
    }

    info!(
        simulations = requested,
        parallel = options.parallel,
        jitter = options.jitter.is_some(),
        "starting monte carlo ensemble"
    );

    let is_cancelled = || cancel.is_some_and(|flag| flag.load(Ordering::Relaxed));
    let simulate = |run: u32| -> Option<RunOutcome> {
        if is_cancelled() {
            return None;
        }
        Some(simulate_run(config, options.jitter, run))
    };

    let results: Vec<Option<RunOutcome>> = if options.parallel {
        (0..requested).into_par_iter().map(simulate).collect()
    } else {
        let mut results = Vec::with_capacity(requested as usize);
        for run in 0..requested {
            let outcome = simulate(run);
            let stop = outcome.is_none();
            results.push(outcome);
            if stop {
                break;
            }
        }
        results
    };

    let completed = results.iter().filter(|r| r.is_some()).count() as u32;
    if completed < requested {
        info!(completed, requested, "monte carlo ensemble cancelled");
        return Err(EngineError::Cancelled {
            completed,
            requested,
        });
    }

    let runs = results.into_iter().flatten().collect::<Vec<_>>();
    let ensemble = build_ensemble(runs, config.years);
    info!(
        simulations = ensemble.simulations,
        median = ensemble.percentiles.p50,
        p10 = ensemble.percentiles.p10,
        p90 = ensemble.percentiles.p90,
        resample_fallbacks = ensemble.resample_fallbacks,
        "monte carlo ensemble complete"
    );
    Ok(ensemble)
}

fn simulate_run(base: &InvestmentConfig, jitter: Option<JitterFactors>, run: u32) -> RunOutcome {
    let seed = derive_seed(base.seed, run + 1);
    let mut config = base.clone();
    if let Some(factors) = jitter {
        let mut rng = Rng::new(seed ^ 0x5DEE_CE66_D1CE_4E5B);
        config.expected_annual_return =
            vary(&mut rng, base.expected_annual_return, factors.expected_return);
        config.volatility = vary(&mut rng, base.volatility, factors.volatility).max(0.0);
        config.inflation_rate_annual =
            vary(&mut rng, base.inflation_rate_annual, factors.inflation);
    }
    config.enable_stochastic_returns = true;

    let trajectory = project(&config, seed);
    let years = trajectory.len() as f64 / PERIODS_PER_YEAR as f64;
    let year_end_values = trajectory
        .records
        .iter()
        .filter(|r| r.period % PERIODS_PER_YEAR == 0)
        .map(|r| r.value)
        .collect();

    RunOutcome {
        run,
        final_value: trajectory.final_value(),
        total_contributions: trajectory.total_contributions(),
        max_drawdown: max_drawdown(&trajectory.values()),
        inflation_adjusted_final_value: deflate(
            trajectory.final_value(),
            config.inflation_rate(),
            years,
        ),
        year_end_values,
        resample_fallbacks: trajectory.resample_fallbacks,
    }
}

fn vary(rng: &mut Rng, base: f64, factor: f64) -> f64 {
    base * (1.0 + rng.uniform(-factor, factor))
}

fn percentiles_of_sorted(sorted: &[f64]) -> Percentiles {
    Percentiles {
        p5: percentile_of_sorted(sorted, 5.0),
        p10: percentile_of_sorted(sorted, 10.0),
        p25: percentile_of_sorted(sorted, 25.0),
        p50: percentile_of_sorted(sorted, 50.0),
        p75: percentile_of_sorted(sorted, 75.0),
        p90: percentile_of_sorted(sorted, 90.0),
        p95: percentile_of_sorted(sorted, 95.0),
    }
}

fn build_ensemble(runs: Vec<RunOutcome>, years: u32) -> MonteCarloEnsemble {
    let simulations = runs.len() as u32;
    let mut by_year = (0..years)
        .map(|_| Vec::with_capacity(runs.len()))
        .collect::<Vec<Vec<f64>>>();
    let mut outcomes = Vec::with_capacity(runs.len());
    let mut profitable = 0_u32;
    let mut resample_fallbacks = 0_u32;

    for run in &runs {
        for (idx, value) in run.year_end_values.iter().enumerate() {
            if let Some(bucket) = by_year.get_mut(idx) {
                bucket.push(*value);
            }
        }
        if run.final_value > run.total_contributions {
            profitable += 1;
        }
        resample_fallbacks += run.resample_fallbacks;
        outcomes.push(EnsembleOutcome {
            run: run.run,
            final_value: run.final_value,
            max_drawdown: run.max_drawdown,
            inflation_adjusted_final_value: run.inflation_adjusted_final_value,
        });
    }

    outcomes.sort_by(|a, b| {
        a.final_value
            .total_cmp(&b.final_value)
            .then(a.run.cmp(&b.run))
    });
    let sorted = outcomes.iter().map(|o| o.final_value).collect::<Vec<_>>();

    let percentiles = percentiles_of_sorted(&sorted);
    let mut real = outcomes
        .iter()
        .map(|o| o.inflation_adjusted_final_value)
        .collect::<Vec<_>>();
    real.sort_by(|a, b| a.total_cmp(b));
    let inflation_adjusted_percentiles = percentiles_of_sorted(&real);

    let yearly_bands = by_year
        .into_iter()
        .enumerate()
        .map(|(idx, mut values)| YearBand {
            year: idx as u32 + 1,
            p10: percentile(&mut values, 10.0),
            p25: percentile(&mut values, 25.0),
            p50: percentile(&mut values, 50.0),
            p75: percentile(&mut values, 75.0),
            p90: percentile(&mut values, 90.0),
        })
        .collect();

    let mean_final_value = if sorted.is_empty() {
        0.0
    } else {
        sorted.iter().sum::<f64>() / sorted.len() as f64
    };

    MonteCarloEnsemble {
        simulations,
        outcomes,
        percentiles,
        inflation_adjusted_percentiles,
        mean_final_value,
        probability_of_profit: if simulations == 0 {
            0.0
        } else {
            profitable as f64 / simulations as f64
        },
        yearly_bands,
        resample_fallbacks,
    }
}

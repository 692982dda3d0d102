mod engine;
mod error;
mod milestones;
mod monte_carlo;
mod presets;
mod random;
mod sensitivity;
mod solver;
mod stats;
mod types;

pub use engine::run_projection;
pub use error::EngineError;
pub use milestones::{find_milestone, standard_milestones};
pub use monte_carlo::{
    DEFAULT_SIMULATIONS, EnsembleOptions, JitterFactors, MAX_SIMULATIONS, run_ensemble,
    run_ensemble_with,
};
pub use presets::{
    ETF_PRESETS, EtfPreset, SCENARIO_PRESETS, ScenarioPreset, etf_preset, scenario_preset,
};
pub use random::{ReturnSampler, Rng, derive_seed};
pub use sensitivity::{SensitivityParameter, SensitivityPoint, SensitivitySeries, run_sensitivity};
pub use solver::{
    ContributionIteration, ContributionSolve, GoalTimeline, required_contribution, time_to_goal,
};
pub use stats::{cagr, max_drawdown, percentile, summarize};
pub use types::{
    AggregateResult, EnsembleOutcome, HistogramBin, InvestmentConfig, Milestone,
    MonteCarloEnsemble, PERIODS_PER_YEAR, PeriodRecord, Percentiles, Trajectory, YearBand,
    YearReturn, YearSnapshot,
};

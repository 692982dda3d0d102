use axum::{
    Router,
    extract::{Json, Query},
    http::{StatusCode, header},
    response::{IntoResponse, Response},
    routing::get,
};
use chrono::NaiveDate;
use clap::Parser;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::BufWriter;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::net::TcpListener;
use tracing::{error, info};

use crate::core::{
    AggregateResult, ContributionSolve, DEFAULT_SIMULATIONS, ETF_PRESETS, EngineError,
    EnsembleOptions, EtfPreset, GoalTimeline, HistogramBin, InvestmentConfig, Milestone,
    MonteCarloEnsemble, PeriodRecord, Percentiles, SCENARIO_PRESETS, ScenarioPreset,
    SensitivitySeries, Trajectory, YearBand, YearSnapshot, etf_preset, required_contribution,
    run_ensemble_with, run_projection, run_sensitivity, scenario_preset, standard_milestones,
    summarize, time_to_goal,
};
use crate::export::{
    ExportError, write_ensemble_csv, write_summary_csv, write_trajectory_csv, write_yearly_csv,
};
use crate::store::{StoreError, load_config, save_config};

const DEFAULT_HISTOGRAM_BINS: usize = 20;
const MAX_HISTOGRAM_BINS: usize = 200;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Engine(#[from] EngineError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Export(#[from] ExportError),

    #[error("unknown ETF preset '{0}'")]
    UnknownPreset(String),

    #[error("unknown scenario '{0}'")]
    UnknownScenario(String),

    #[error("invalid stress years '{0}' (expected comma-separated year indices)")]
    InvalidStressYears(String),

    #[error("histogram bins must be between 1 and {MAX_HISTOGRAM_BINS}")]
    InvalidBins,

    #[error("failed to create {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to encode report: {0}")]
    Json(#[from] serde_json::Error),
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            ApiError::Engine(EngineError::Cancelled { .. })
            | ApiError::Export(_)
            | ApiError::Io { .. }
            | ApiError::Json(_) => StatusCode::INTERNAL_SERVER_ERROR,
            _ => StatusCode::BAD_REQUEST,
        }
    }
}

/// Stress years arrive as a JSON array or, in query strings, as `"1,4"`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
enum StressYearsInput {
    List(Vec<u32>),
    Text(String),
}

impl StressYearsInput {
    fn into_years(self) -> Result<Vec<u32>, ApiError> {
        match self {
            StressYearsInput::List(years) => Ok(years),
            StressYearsInput::Text(text) => text
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(|s| {
                    s.parse::<u32>()
                        .map_err(|_| ApiError::InvalidStressYears(text.clone()))
                })
                .collect(),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct SimulatePayload {
    preset: Option<String>,
    scenario: Option<String>,

    initial_capital: Option<f64>,
    monthly_contribution: Option<f64>,
    years: Option<u32>,
    expected_annual_return: Option<f64>,
    volatility: Option<f64>,
    management_fee_annual: Option<f64>,
    tax_rate_on_gains: Option<f64>,
    inflation_rate_annual: Option<f64>,
    contribution_growth_annual: Option<f64>,
    enable_stochastic_returns: Option<bool>,
    start_date: Option<NaiveDate>,
    seed: Option<u64>,
    stress_years: Option<StressYearsInput>,

    include_monthly: Option<bool>,
    simulations: Option<u32>,
    parallel: Option<bool>,
    jitter: Option<bool>,
    bins: Option<usize>,
    target_amount: Option<f64>,
}

#[derive(Parser, Debug)]
#[command(
    name = "etfsim",
    about = "ETF savings plan projection with fees, taxes, inflation and Monte Carlo ranges"
)]
pub struct Cli {
    #[arg(long, help = "ETF preset key (world, sp500, europe, emerging, bonds, mixed)")]
    preset: Option<String>,
    #[arg(long, help = "Market scenario name, e.g. \"Moderate\" or \"2008 crisis\"")]
    scenario: Option<String>,
    #[arg(long, help = "Load the base configuration from a .toml or .json file")]
    config: Option<PathBuf>,
    #[arg(long, help = "Write the resolved configuration to a .toml or .json file")]
    save_config: Option<PathBuf>,

    #[arg(long)]
    initial_capital: Option<f64>,
    #[arg(long)]
    monthly_contribution: Option<f64>,
    #[arg(long)]
    years: Option<u32>,
    #[arg(long, help = "Expected annual return in percent")]
    expected_return: Option<f64>,
    #[arg(long, help = "Annual volatility in percent")]
    volatility: Option<f64>,
    #[arg(long, help = "Annual management fee (TER) in percent")]
    fee: Option<f64>,
    #[arg(long, help = "Tax rate on realised gains in percent")]
    tax_rate: Option<f64>,
    #[arg(long, help = "Annual inflation in percent")]
    inflation: Option<f64>,
    #[arg(long, help = "Yearly raise of the monthly contribution in percent")]
    contribution_growth: Option<f64>,
    #[arg(long, help = "Draw monthly returns from a normal distribution")]
    stochastic: bool,
    #[arg(long, help = "First month of the plan (YYYY-MM-DD)")]
    start_date: Option<NaiveDate>,
    #[arg(long)]
    seed: Option<u64>,
    #[arg(
        long,
        value_delimiter = ',',
        help = "Zero-based years forced to a crisis return"
    )]
    stress_years: Vec<u32>,

    #[arg(long, help = "Include every monthly record in the JSON report")]
    include_monthly: bool,
    #[arg(long, value_name = "N", help = "Run an ensemble of N stochastic projections")]
    monte_carlo: Option<u32>,
    #[arg(long, help = "Run ensemble members one after another")]
    sequential: bool,
    #[arg(long, help = "Keep market parameters fixed across ensemble members")]
    no_jitter: bool,
    #[arg(long, default_value_t = DEFAULT_HISTOGRAM_BINS)]
    bins: usize,
    #[arg(long, value_name = "AMOUNT", help = "Solve time-to-goal and required contribution")]
    target: Option<f64>,
    #[arg(long, help = "Sweep the main parameters around the base case")]
    sensitivity: bool,

    #[arg(long, value_name = "FILE", help = "Monthly trajectory CSV")]
    csv: Option<PathBuf>,
    #[arg(long, value_name = "FILE")]
    yearly_csv: Option<PathBuf>,
    #[arg(long, value_name = "FILE")]
    summary_csv: Option<PathBuf>,
    #[arg(long, value_name = "FILE", help = "Per-run ensemble outcomes CSV")]
    ensemble_csv: Option<PathBuf>,
}

#[derive(Copy, Clone, Debug, PartialEq)]
struct ApiOptions {
    include_monthly: bool,
    simulations: u32,
    parallel: bool,
    jitter: bool,
    bins: usize,
    target_amount: Option<f64>,
}

#[derive(Debug)]
struct ApiRequest {
    config: InvestmentConfig,
    options: ApiOptions,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ProjectReport {
    summary: AggregateResult,
    yearly: Vec<YearSnapshot>,
    milestones: Vec<Milestone>,
    resample_fallbacks: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    trajectory: Option<Vec<PeriodRecord>>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct MonteCarloReport {
    simulations: u32,
    percentiles: Percentiles,
    inflation_adjusted_percentiles: Percentiles,
    mean_final_value: f64,
    probability_of_profit: f64,
    yearly_bands: Vec<YearBand>,
    histogram: Vec<HistogramBin>,
    resample_fallbacks: u32,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GoalReport {
    timeline: GoalTimeline,
    contribution: ContributionSolve,
}

#[derive(Debug, Serialize)]
struct SensitivityReport {
    series: Vec<SensitivitySeries>,
}

#[derive(Debug, Serialize)]
struct PresetsReport {
    etfs: &'static [EtfPreset],
    scenarios: &'static [ScenarioPreset],
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct CliReport {
    config: InvestmentConfig,
    projection: ProjectReport,
    #[serde(skip_serializing_if = "Option::is_none")]
    monte_carlo: Option<MonteCarloReport>,
    #[serde(skip_serializing_if = "Option::is_none")]
    goal: Option<GoalReport>,
    #[serde(skip_serializing_if = "Option::is_none")]
    sensitivity: Option<SensitivityReport>,
}

#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: String,
}

fn build_config(cli: &Cli) -> Result<InvestmentConfig, ApiError> {
    let mut config = match &cli.config {
        Some(path) => load_config(path)?,
        None => InvestmentConfig::default(),
    };

    if let Some(key) = &cli.preset {
        let preset = etf_preset(key).ok_or_else(|| ApiError::UnknownPreset(key.clone()))?;
        config = config.with_etf_preset(preset);
    }
    if let Some(name) = &cli.scenario {
        let scenario =
            scenario_preset(name).ok_or_else(|| ApiError::UnknownScenario(name.clone()))?;
        config = config.with_scenario(scenario);
    }

    if let Some(v) = cli.initial_capital {
        config.initial_capital = v;
    }
    if let Some(v) = cli.monthly_contribution {
        config.monthly_contribution = v;
    }
    if let Some(v) = cli.years {
        config.years = v;
    }
    if let Some(v) = cli.expected_return {
        config.expected_annual_return = v;
    }
    if let Some(v) = cli.volatility {
        config.volatility = v;
    }
    if let Some(v) = cli.fee {
        config.management_fee_annual = v;
    }
    if let Some(v) = cli.tax_rate {
        config.tax_rate_on_gains = v;
    }
    if let Some(v) = cli.inflation {
        config.inflation_rate_annual = v;
    }
    if let Some(v) = cli.contribution_growth {
        config.contribution_growth_annual = v;
    }
    if cli.stochastic {
        config.enable_stochastic_returns = true;
    }
    if let Some(v) = cli.start_date {
        config.start_date = v;
    }
    if let Some(v) = cli.seed {
        config.seed = v;
    }
    if !cli.stress_years.is_empty() {
        config.stress_years = cli.stress_years.clone();
    }

    config.validate()?;
    Ok(config)
}

fn ensemble_options(simulations: u32, parallel: bool, jitter: bool) -> EnsembleOptions {
    EnsembleOptions {
        simulations,
        parallel,
        jitter: if jitter {
            EnsembleOptions::default().jitter
        } else {
            None
        },
    }
}

fn validate_bins(bins: usize) -> Result<usize, ApiError> {
    if bins == 0 || bins > MAX_HISTOGRAM_BINS {
        return Err(ApiError::InvalidBins);
    }
    Ok(bins)
}

fn project_report(
    config: &InvestmentConfig,
    include_monthly: bool,
) -> Result<ProjectReport, ApiError> {
    let trajectory = run_projection(config)?;
    let summary = summarize(&trajectory, config);
    Ok(report_from_trajectory(
        trajectory,
        summary,
        config.initial_capital,
        include_monthly,
    ))
}

fn report_from_trajectory(
    trajectory: Trajectory,
    summary: AggregateResult,
    initial_capital: f64,
    include_monthly: bool,
) -> ProjectReport {
    ProjectReport {
        summary,
        yearly: trajectory.yearly_view(),
        milestones: standard_milestones(&trajectory, initial_capital),
        resample_fallbacks: trajectory.resample_fallbacks,
        trajectory: include_monthly.then_some(trajectory.records),
    }
}

fn monte_carlo_report(ensemble: &MonteCarloEnsemble, bins: usize) -> MonteCarloReport {
    MonteCarloReport {
        simulations: ensemble.simulations,
        percentiles: ensemble.percentiles,
        inflation_adjusted_percentiles: ensemble.inflation_adjusted_percentiles,
        mean_final_value: ensemble.mean_final_value,
        probability_of_profit: ensemble.probability_of_profit,
        yearly_bands: ensemble.yearly_bands.clone(),
        histogram: ensemble.histogram(bins),
        resample_fallbacks: ensemble.resample_fallbacks,
    }
}

fn goal_report(config: &InvestmentConfig, target: f64) -> Result<GoalReport, ApiError> {
    Ok(GoalReport {
        timeline: time_to_goal(config, target)?,
        contribution: required_contribution(config, target)?,
    })
}

fn create_file(path: &Path) -> Result<BufWriter<File>, ApiError> {
    File::create(path)
        .map(BufWriter::new)
        .map_err(|source| ApiError::Io {
            path: path.display().to_string(),
            source,
        })
}

/// Runs the command line flow and prints the JSON report to stdout.
pub fn run_cli(cli: Cli) -> Result<(), ApiError> {
    let report = build_cli_report(&cli)?;
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

fn build_cli_report(cli: &Cli) -> Result<CliReport, ApiError> {
    let config = build_config(cli)?;
    if let Some(path) = &cli.save_config {
        save_config(path, &config)?;
        info!(path = %path.display(), "configuration saved");
    }

    let trajectory = run_projection(&config)?;
    if let Some(path) = &cli.csv {
        write_trajectory_csv(create_file(path)?, &trajectory)?;
    }
    if let Some(path) = &cli.yearly_csv {
        write_yearly_csv(create_file(path)?, &trajectory)?;
    }
    let summary = summarize(&trajectory, &config);
    if let Some(path) = &cli.summary_csv {
        write_summary_csv(create_file(path)?, &summary)?;
    }

    let simulations = cli
        .monte_carlo
        .or_else(|| cli.ensemble_csv.as_ref().map(|_| DEFAULT_SIMULATIONS));
    let monte_carlo = match simulations {
        Some(n) => {
            let bins = validate_bins(cli.bins)?;
            let options = ensemble_options(n, !cli.sequential, !cli.no_jitter);
            let ensemble = run_ensemble_with(&config, &options, None)?;
            if let Some(path) = &cli.ensemble_csv {
                write_ensemble_csv(create_file(path)?, &ensemble)?;
            }
            Some(monte_carlo_report(&ensemble, bins))
        }
        None => None,
    };

    Ok(CliReport {
        projection: report_from_trajectory(
            trajectory,
            summary,
            config.initial_capital,
            cli.include_monthly,
        ),
        monte_carlo,
        goal: cli
            .target
            .map(|target| goal_report(&config, target))
            .transpose()?,
        sensitivity: if cli.sensitivity {
            Some(SensitivityReport {
                series: run_sensitivity(&config)?,
            })
        } else {
            None
        },
        config,
    })
}

pub async fn run_http_server(port: u16) -> std::io::Result<()> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let app = Router::new()
        .route("/api/project", get(project_get_handler).post(project_post_handler))
        .route(
            "/api/monte-carlo",
            get(monte_carlo_get_handler).post(monte_carlo_post_handler),
        )
        .route("/api/goal", get(goal_get_handler).post(goal_post_handler))
        .route(
            "/api/sensitivity",
            get(sensitivity_get_handler).post(sensitivity_post_handler),
        )
        .route("/api/presets", get(presets_handler))
        .fallback(not_found_handler);

    let listener = TcpListener::bind(addr).await?;
    info!("etfsim HTTP API listening on http://{addr}");
    info!("local access: http://127.0.0.1:{port}/api/presets");

    axum::serve(listener, app).await
}

async fn not_found_handler() -> Response {
    error_response(StatusCode::NOT_FOUND, "Not found")
}

async fn presets_handler() -> Response {
    json_response(
        StatusCode::OK,
        PresetsReport {
            etfs: &ETF_PRESETS,
            scenarios: &SCENARIO_PRESETS,
        },
    )
}

async fn project_get_handler(Query(payload): Query<SimulatePayload>) -> Response {
    project_handler_impl(payload).await
}

async fn project_post_handler(Json(payload): Json<SimulatePayload>) -> Response {
    project_handler_impl(payload).await
}

async fn project_handler_impl(payload: SimulatePayload) -> Response {
    run_request(payload, |request| {
        project_report(&request.config, request.options.include_monthly)
    })
    .await
}

async fn monte_carlo_get_handler(Query(payload): Query<SimulatePayload>) -> Response {
    monte_carlo_handler_impl(payload).await
}

async fn monte_carlo_post_handler(Json(payload): Json<SimulatePayload>) -> Response {
    monte_carlo_handler_impl(payload).await
}

async fn monte_carlo_handler_impl(payload: SimulatePayload) -> Response {
    run_request(payload, |request| {
        let options = request.options;
        let ensemble = run_ensemble_with(
            &request.config,
            &ensemble_options(options.simulations, options.parallel, options.jitter),
            None,
        )?;
        Ok(monte_carlo_report(&ensemble, options.bins))
    })
    .await
}

async fn goal_get_handler(Query(payload): Query<SimulatePayload>) -> Response {
    goal_handler_impl(payload).await
}

async fn goal_post_handler(Json(payload): Json<SimulatePayload>) -> Response {
    goal_handler_impl(payload).await
}

async fn goal_handler_impl(payload: SimulatePayload) -> Response {
    run_request(payload, |request| {
        let target = request
            .options
            .target_amount
            .ok_or_else(|| EngineError::invalid("targetAmount", "is required"))?;
        goal_report(&request.config, target)
    })
    .await
}

async fn sensitivity_get_handler(Query(payload): Query<SimulatePayload>) -> Response {
    sensitivity_handler_impl(payload).await
}

async fn sensitivity_post_handler(Json(payload): Json<SimulatePayload>) -> Response {
    sensitivity_handler_impl(payload).await
}

async fn sensitivity_handler_impl(payload: SimulatePayload) -> Response {
    run_request(payload, |request| {
        Ok(SensitivityReport {
            series: run_sensitivity(&request.config)?,
        })
    })
    .await
}

/// Parses the payload, then runs the CPU-bound job off the async workers.
async fn run_request<T, F>(payload: SimulatePayload, job: F) -> Response
where
    T: Serialize + Send + 'static,
    F: FnOnce(ApiRequest) -> Result<T, ApiError> + Send + 'static,
{
    let request = match api_request_from_payload(payload) {
        Ok(request) => request,
        Err(e) => return error_response(e.status(), &e.to_string()),
    };

    match tokio::task::spawn_blocking(move || job(request)).await {
        Ok(Ok(body)) => json_response(StatusCode::OK, body),
        Ok(Err(e)) => error_response(e.status(), &e.to_string()),
        Err(e) => {
            error!(error = %e, "engine task failed");
            error_response(StatusCode::INTERNAL_SERVER_ERROR, "Internal error")
        }
    }
}

fn json_response<T: Serialize>(status: StatusCode, body: T) -> Response {
    let mut response = (status, Json(body)).into_response();
    response.headers_mut().insert(
        header::CACHE_CONTROL,
        header::HeaderValue::from_static("no-store"),
    );
    response
}

fn error_response(status: StatusCode, msg: &str) -> Response {
    json_response(
        status,
        ErrorResponse {
            error: msg.to_string(),
        },
    )
}

#[cfg(test)]
fn api_request_from_json(json: &str) -> Result<ApiRequest, ApiError> {
    let payload = serde_json::from_str::<SimulatePayload>(json)?;
    api_request_from_payload(payload)
}

fn api_request_from_payload(payload: SimulatePayload) -> Result<ApiRequest, ApiError> {
    let mut cli = default_cli_for_api();

    cli.preset = payload.preset;
    cli.scenario = payload.scenario;
    cli.initial_capital = payload.initial_capital;
    cli.monthly_contribution = payload.monthly_contribution;
    cli.years = payload.years;
    cli.expected_return = payload.expected_annual_return;
    cli.volatility = payload.volatility;
    cli.fee = payload.management_fee_annual;
    cli.tax_rate = payload.tax_rate_on_gains;
    cli.inflation = payload.inflation_rate_annual;
    cli.contribution_growth = payload.contribution_growth_annual;
    cli.stochastic = payload.enable_stochastic_returns.unwrap_or(false);
    cli.start_date = payload.start_date;
    cli.seed = payload.seed;
    if let Some(years) = payload.stress_years {
        cli.stress_years = years.into_years()?;
    }

    let options = ApiOptions {
        include_monthly: payload.include_monthly.unwrap_or(false),
        simulations: payload.simulations.unwrap_or(DEFAULT_SIMULATIONS),
        parallel: payload.parallel.unwrap_or(true),
        jitter: payload.jitter.unwrap_or(true),
        bins: validate_bins(payload.bins.unwrap_or(DEFAULT_HISTOGRAM_BINS))?,
        target_amount: payload.target_amount,
    };

    Ok(ApiRequest {
        config: build_config(&cli)?,
        options,
    })
}

/// The API never reads or writes files; only config overrides are honoured.
fn default_cli_for_api() -> Cli {
    Cli {
        preset: None,
        scenario: None,
        config: None,
        save_config: None,
        initial_capital: None,
        monthly_contribution: None,
        years: None,
        expected_return: None,
        volatility: None,
        fee: None,
        tax_rate: None,
        inflation: None,
        contribution_growth: None,
        stochastic: false,
        start_date: None,
        seed: None,
        stress_years: Vec::new(),
        include_monthly: false,
        monte_carlo: None,
        sequential: false,
        no_jitter: false,
        bins: DEFAULT_HISTOGRAM_BINS,
        target: None,
        sensitivity: false,
        csv: None,
        yearly_csv: None,
        summary_csv: None,
        ensemble_csv: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f64 = 1e-6;

    fn assert_approx(actual: f64, expected: f64) {
        assert!(
            (actual - expected).abs() <= EPS,
            "expected {expected}, got {actual}"
        );
    }

    fn parse_cli(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("etfsim").chain(args.iter().copied()))
            .expect("arguments should parse")
    }

    #[test]
    fn api_request_from_json_parses_web_keys() {
        let json = r#"{
          "initialCapital": 20000,
          "monthlyContribution": 250,
          "years": 30,
          "expectedAnnualReturn": 6.5,
          "volatility": 12,
          "managementFeeAnnual": 0.2,
          "taxRateOnGains": 25,
          "inflationRateAnnual": 2,
          "contributionGrowthAnnual": 1,
          "enableStochasticReturns": true,
          "startDate": "2025-01-01",
          "seed": 9,
          "stressYears": [3, 4],
          "includeMonthly": true,
          "simulations": 250,
          "parallel": false,
          "jitter": false,
          "bins": 10,
          "targetAmount": 150000
        }"#;
        let request = api_request_from_json(json).expect("json should parse");
        let config = request.config;

        assert_approx(config.initial_capital, 20_000.0);
        assert_approx(config.monthly_contribution, 250.0);
        assert_eq!(config.years, 30);
        assert_approx(config.expected_annual_return, 6.5);
        assert_approx(config.volatility, 12.0);
        assert_approx(config.management_fee_annual, 0.2);
        assert_approx(config.tax_rate_on_gains, 25.0);
        assert_approx(config.inflation_rate_annual, 2.0);
        assert_approx(config.contribution_growth_annual, 1.0);
        assert!(config.enable_stochastic_returns);
        assert_eq!(config.start_date, NaiveDate::from_ymd_opt(2025, 1, 1).unwrap());
        assert_eq!(config.seed, 9);
        assert_eq!(config.stress_years, vec![3, 4]);

        let options = request.options;
        assert!(options.include_monthly);
        assert_eq!(options.simulations, 250);
        assert!(!options.parallel);
        assert!(!options.jitter);
        assert_eq!(options.bins, 10);
        assert_eq!(options.target_amount, Some(150_000.0));
    }

    #[test]
    fn empty_payload_uses_defaults() {
        let request = api_request_from_json("{}").expect("empty payload is valid");
        let defaults = InvestmentConfig::default();
        assert_approx(request.config.initial_capital, defaults.initial_capital);
        assert_eq!(request.config.years, defaults.years);
        assert_eq!(request.options.simulations, DEFAULT_SIMULATIONS);
        assert!(request.options.parallel);
        assert!(request.options.jitter);
        assert_eq!(request.options.bins, DEFAULT_HISTOGRAM_BINS);
    }

    #[test]
    fn stress_years_accept_comma_separated_text() {
        let request = api_request_from_json(r#"{"stressYears": "1, 5"}"#).expect("valid");
        assert_eq!(request.config.stress_years, vec![1, 5]);

        let err = api_request_from_json(r#"{"stressYears": "1,x"}"#).unwrap_err();
        assert!(matches!(err, ApiError::InvalidStressYears(_)));
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn preset_is_applied_before_explicit_overrides() {
        let request =
            api_request_from_json(r#"{"preset": "emerging", "volatility": 10}"#).expect("valid");
        assert_approx(request.config.expected_annual_return, 8.0);
        assert_approx(request.config.management_fee_annual, 0.45);
        assert_approx(request.config.volatility, 10.0);
    }

    #[test]
    fn invalid_config_maps_to_bad_request() {
        let err = api_request_from_json(r#"{"years": 0}"#).unwrap_err();
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
        assert!(err.to_string().contains("years"));

        let err = api_request_from_json(r#"{"preset": "gold"}"#).unwrap_err();
        assert!(matches!(err, ApiError::UnknownPreset(_)));

        let err = api_request_from_json(r#"{"bins": 0}"#).unwrap_err();
        assert!(matches!(err, ApiError::InvalidBins));
    }

    #[test]
    fn cancelled_ensemble_is_a_server_error() {
        let err = ApiError::from(EngineError::Cancelled {
            completed: 0,
            requested: 10,
        });
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn build_config_applies_cli_flags() {
        let cli = parse_cli(&[
            "--preset",
            "bonds",
            "--initial-capital",
            "5000",
            "--years",
            "10",
            "--stochastic",
            "--stress-years",
            "2,3",
            "--start-date",
            "2024-06-01",
        ]);
        let config = build_config(&cli).expect("valid flags");
        assert_approx(config.initial_capital, 5_000.0);
        assert_eq!(config.years, 10);
        assert_approx(config.expected_annual_return, 3.5);
        assert!(config.enable_stochastic_returns);
        assert_eq!(config.stress_years, vec![2, 3]);
        assert_eq!(config.start_date, NaiveDate::from_ymd_opt(2024, 6, 1).unwrap());
    }

    #[test]
    fn build_config_rejects_invalid_values() {
        let cli = parse_cli(&["--fee", "12"]);
        assert!(matches!(
            build_config(&cli),
            Err(ApiError::Engine(EngineError::InvalidConfig { field: "managementFeeAnnual", .. }))
        ));
        let cli = parse_cli(&["--scenario", "recession"]);
        assert!(matches!(build_config(&cli), Err(ApiError::UnknownScenario(_))));
    }

    #[test]
    fn build_config_layers_flags_over_config_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("base.toml");
        std::fs::write(&path, "initialCapital = 40000.0\nyears = 12\n").unwrap();
        let path_arg = path.display().to_string();
        let cli = parse_cli(&["--config", &path_arg, "--years", "8"]);
        let config = build_config(&cli).expect("valid");
        assert_approx(config.initial_capital, 40_000.0);
        assert_eq!(config.years, 8);
    }

    #[test]
    fn project_report_includes_monthly_records_only_on_request() {
        let config = InvestmentConfig {
            years: 3,
            ..InvestmentConfig::default()
        };
        let without = project_report(&config, false).expect("valid");
        assert!(without.trajectory.is_none());
        assert_eq!(without.yearly.len(), 3);

        let with = project_report(&config, true).expect("valid");
        assert_eq!(with.trajectory.map(|t| t.len()), Some(36));
    }

    #[test]
    fn cli_report_and_csv_exports_share_one_projection() {
        let dir = tempfile::tempdir().unwrap();
        let monthly = dir.path().join("monthly.csv");
        let summary = dir.path().join("summary.csv");
        let monthly_arg = monthly.display().to_string();
        let summary_arg = summary.display().to_string();
        let cli = parse_cli(&[
            "--years",
            "2",
            "--stochastic",
            "--include-monthly",
            "--csv",
            &monthly_arg,
            "--summary-csv",
            &summary_arg,
        ]);
        let report = build_cli_report(&cli).expect("valid flags");

        let records = report.projection.trajectory.expect("monthly records requested");
        let csv_text = std::fs::read_to_string(&monthly).unwrap();
        let rows = csv_text.lines().skip(1).collect::<Vec<_>>();
        assert_eq!(rows.len(), records.len());
        let last_value: f64 = rows[rows.len() - 1].split(',').nth(2).unwrap().parse().unwrap();
        assert_approx(last_value, records[records.len() - 1].value);

        let summary_text = std::fs::read_to_string(&summary).unwrap();
        let final_row = summary_text
            .lines()
            .find(|l| l.starts_with("final_value,"))
            .expect("final value row");
        let final_value: f64 = final_row["final_value,".len()..].parse().unwrap();
        assert_approx(final_value, report.projection.summary.final_value);
        assert!(report.monte_carlo.is_none());
    }

    #[test]
    fn report_serialization_contains_expected_fields() {
        let config = InvestmentConfig {
            years: 2,
            ..InvestmentConfig::default()
        };
        let json = serde_json::to_value(project_report(&config, false).unwrap()).unwrap();
        assert!(json.get("summary").and_then(|s| s.get("finalValue")).is_some());
        assert!(json.get("yearly").is_some());
        assert!(json.get("milestones").is_some());
        assert!(json.get("trajectory").is_none());

        let options = ensemble_options(50, true, true);
        let ensemble = run_ensemble_with(&config, &options, None).unwrap();
        let json = serde_json::to_value(monte_carlo_report(&ensemble, 5)).unwrap();
        assert_eq!(json["simulations"], 50);
        assert!(json["percentiles"].get("p50").is_some());
        assert!(json["inflationAdjustedPercentiles"].get("p50").is_some());
        assert_eq!(json["histogram"].as_array().map(Vec::len), Some(5));
        assert!(json.get("probabilityOfProfit").is_some());
    }

    #[test]
    fn goal_report_solves_both_questions() {
        let config = InvestmentConfig {
            years: 10,
            ..InvestmentConfig::default()
        };
        let report = goal_report(&config, 50_000.0).expect("valid");
        assert!(report.timeline.achievable);
        assert!(report.contribution.required_contribution > 0.0);
        assert!(goal_report(&config, -1.0).is_err());
    }
}

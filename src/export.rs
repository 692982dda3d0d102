//! CSV output for projections and ensembles.

use std::io;

use chrono::NaiveDate;
use serde::Serialize;
use thiserror::Error;

use crate::core::{AggregateResult, MonteCarloEnsemble, Trajectory};

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

#[derive(Serialize)]
struct MonthRow {
    period: u32,
    date: NaiveDate,
    value: f64,
    contribution: f64,
    period_return: f64,
    gain: f64,
    fee: f64,
    tax: f64,
    cumulative_contributions: f64,
    cumulative_gains: f64,
    cumulative_taxes: f64,
    cumulative_fees: f64,
}

#[derive(Serialize)]
struct MetricRow<'a> {
    metric: &'a str,
    value: Option<f64>,
}

pub fn write_trajectory_csv<W: io::Write>(
    writer: W,
    trajectory: &Trajectory,
) -> Result<(), ExportError> {
    let mut wtr = csv::Writer::from_writer(writer);
    for r in &trajectory.records {
        wtr.serialize(MonthRow {
            period: r.period,
            date: trajectory.date_of(r.period),
            value: r.value,
            contribution: r.contribution,
            period_return: r.period_return,
            gain: r.gain,
            fee: r.fee,
            tax: r.tax,
            cumulative_contributions: r.cumulative_contributions,
            cumulative_gains: r.cumulative_gains,
            cumulative_taxes: r.cumulative_taxes,
            cumulative_fees: r.cumulative_fees,
        })?;
    }
    wtr.flush()?;
    Ok(())
}

pub fn write_yearly_csv<W: io::Write>(
    writer: W,
    trajectory: &Trajectory,
) -> Result<(), ExportError> {
    let mut wtr = csv::WriterBuilder::new().from_writer(writer);
    wtr.write_record([
        "year",
        "date",
        "value",
        "cumulative_contributions",
        "cumulative_gains",
        "cumulative_taxes",
        "cumulative_fees",
    ])?;
    for y in trajectory.yearly_view() {
        wtr.write_record([
            y.year.to_string(),
            y.date.to_string(),
            format!("{:.2}", y.value),
            format!("{:.2}", y.cumulative_contributions),
            format!("{:.2}", y.cumulative_gains),
            format!("{:.2}", y.cumulative_taxes),
            format!("{:.2}", y.cumulative_fees),
        ])?;
    }
    wtr.flush()?;
    Ok(())
}

/// One `metric,value` row per summary statistic; undefined values are left blank.
pub fn write_summary_csv<W: io::Write>(
    writer: W,
    summary: &AggregateResult,
) -> Result<(), ExportError> {
    let rows = [
        ("final_value", Some(summary.final_value)),
        ("total_contributions", Some(summary.total_contributions)),
        ("total_taxes_paid", Some(summary.total_taxes_paid)),
        ("total_fees_paid", Some(summary.total_fees_paid)),
        ("net_profit", Some(summary.net_profit)),
        (
            "inflation_adjusted_final_value",
            Some(summary.inflation_adjusted_final_value),
        ),
        ("cagr", summary.cagr),
        ("average_annual_return", summary.average_annual_return),
        ("realized_volatility", summary.realized_volatility),
        ("max_drawdown", Some(summary.max_drawdown)),
        ("risk_adjusted_ratio", summary.risk_adjusted_ratio),
        ("best_year_return", summary.best_year.map(|y| y.annual_return)),
        ("worst_year_return", summary.worst_year.map(|y| y.annual_return)),
    ];

    let mut wtr = csv::Writer::from_writer(writer);
    for (metric, value) in rows {
        wtr.serialize(MetricRow { metric, value })?;
    }
    wtr.flush()?;
    Ok(())
}

pub fn write_ensemble_csv<W: io::Write>(
    writer: W,
    ensemble: &MonteCarloEnsemble,
) -> Result<(), ExportError> {
    let mut wtr = csv::Writer::from_writer(writer);
    wtr.write_record([
        "run",
        "final_value",
        "inflation_adjusted_final_value",
        "max_drawdown",
    ])?;
    for outcome in &ensemble.outcomes {
        wtr.write_record([
            outcome.run.to_string(),
            format!("{:.2}", outcome.final_value),
            format!("{:.2}", outcome.inflation_adjusted_final_value),
            format!("{:.6}", outcome.max_drawdown),
        ])?;
    }
    wtr.flush()?;
    Ok(())
}

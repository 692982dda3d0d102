use chrono::{Months, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use super::error::EngineError;

pub const PERIODS_PER_YEAR: u32 = 12;
pub const MAX_YEARS: u32 = 100;
pub const MAX_MANAGEMENT_FEE: f64 = 10.0;

/// Annual return applied during stress years, in percent.
pub const CRISIS_ANNUAL_RETURN: f64 = -20.0;

/// Investment policy driving a projection. Rates are expressed in percent,
/// exactly as a user would type them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct InvestmentConfig {
    pub initial_capital: f64,
    pub monthly_contribution: f64,
    pub years: u32,
    pub expected_annual_return: f64,
    pub volatility: f64,
    pub management_fee_annual: f64,
    pub tax_rate_on_gains: f64,
    pub inflation_rate_annual: f64,
    pub contribution_growth_annual: f64,
    pub enable_stochastic_returns: bool,
    pub start_date: NaiveDate,
    pub seed: u64,
    /// Zero-based simulation years forced to the crisis return.
    pub stress_years: Vec<u32>,
}

impl Default for InvestmentConfig {
    fn default() -> Self {
        Self {
            initial_capital: 10_000.0,
            monthly_contribution: 500.0,
            years: 20,
            expected_annual_return: 7.0,
            volatility: 15.0,
            management_fee_annual: 0.25,
            tax_rate_on_gains: 26.0,
            inflation_rate_annual: 2.5,
            contribution_growth_annual: 3.0,
            enable_stochastic_returns: false,
            start_date: Utc::now().date_naive(),
            seed: 42,
            stress_years: Vec::new(),
        }
    }
}

impl InvestmentConfig {
    pub fn validate(&self) -> Result<(), EngineError> {
        for (field, value) in [
            ("initialCapital", self.initial_capital),
            ("monthlyContribution", self.monthly_contribution),
            ("expectedAnnualReturn", self.expected_annual_return),
            ("volatility", self.volatility),
            ("managementFeeAnnual", self.management_fee_annual),
            ("taxRateOnGains", self.tax_rate_on_gains),
            ("inflationRateAnnual", self.inflation_rate_annual),
            ("contributionGrowthAnnual", self.contribution_growth_annual),
        ] {
            if !value.is_finite() {
                return Err(EngineError::invalid(field, "must be a finite number"));
            }
        }

        if self.initial_capital < 0.0 {
            return Err(EngineError::invalid("initialCapital", "must be >= 0"));
        }
        if self.monthly_contribution < 0.0 {
            return Err(EngineError::invalid("monthlyContribution", "must be >= 0"));
        }
        if self.years == 0 || self.years > MAX_YEARS {
            return Err(EngineError::invalid(
                "years",
                format!("must be between 1 and {MAX_YEARS}"),
            ));
        }
        if self.expected_annual_return <= -100.0 || self.expected_annual_return > 100.0 {
            return Err(EngineError::invalid(
                "expectedAnnualReturn",
                "must be > -100 and <= 100",
            ));
        }
        if !(0.0..=100.0).contains(&self.volatility) {
            return Err(EngineError::invalid("volatility", "must be between 0 and 100"));
        }
        if !(0.0..=MAX_MANAGEMENT_FEE).contains(&self.management_fee_annual) {
            return Err(EngineError::invalid(
                "managementFeeAnnual",
                format!("must be between 0 and {MAX_MANAGEMENT_FEE}"),
            ));
        }
        if !(0.0..=100.0).contains(&self.tax_rate_on_gains) {
            return Err(EngineError::invalid(
                "taxRateOnGains",
                "must be between 0 and 100",
            ));
        }
        if !(-20.0..=50.0).contains(&self.inflation_rate_annual) {
            return Err(EngineError::invalid(
                "inflationRateAnnual",
                "must be between -20 and 50",
            ));
        }
        if self.contribution_growth_annual <= -100.0 || self.contribution_growth_annual > 100.0 {
            return Err(EngineError::invalid(
                "contributionGrowthAnnual",
                "must be > -100 and <= 100",
            ));
        }
        Ok(())
    }

    pub fn total_periods(&self) -> u32 {
        self.years * PERIODS_PER_YEAR
    }

    /// Nominal monthly rate: the annual percentage divided evenly over twelve months.
    pub fn periodic_return(&self) -> f64 {
        self.expected_annual_return / 100.0 / PERIODS_PER_YEAR as f64
    }

    pub fn periodic_volatility(&self) -> f64 {
        self.volatility / 100.0 / (PERIODS_PER_YEAR as f64).sqrt()
    }

    pub fn periodic_fee(&self) -> f64 {
        self.management_fee_annual / 100.0 / PERIODS_PER_YEAR as f64
    }

    pub fn tax_rate(&self) -> f64 {
        self.tax_rate_on_gains / 100.0
    }

    pub fn inflation_rate(&self) -> f64 {
        self.inflation_rate_annual / 100.0
    }

    pub fn contribution_growth(&self) -> f64 {
        self.contribution_growth_annual / 100.0
    }

    pub fn is_stress_year(&self, year_index: u32) -> bool {
        self.stress_years.contains(&year_index)
    }
}

/// State of the portfolio at the end of one monthly period.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PeriodRecord {
    pub period: u32,
    pub value: f64,
    pub cumulative_contributions: f64,
    pub contribution: f64,
    pub period_return: f64,
    pub gain: f64,
    pub fee: f64,
    pub tax: f64,
    pub cumulative_gains: f64,
    pub cumulative_taxes: f64,
    pub cumulative_fees: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Trajectory {
    pub start_date: NaiveDate,
    pub initial_capital: f64,
    pub records: Vec<PeriodRecord>,
    pub resample_fallbacks: u32,
}

impl Trajectory {
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn final_value(&self) -> f64 {
        self.records
            .last()
            .map(|r| r.value)
            .unwrap_or(self.initial_capital)
    }

    pub fn total_contributions(&self) -> f64 {
        self.records
            .last()
            .map(|r| r.cumulative_contributions)
            .unwrap_or(self.initial_capital)
    }

    /// Period-0 capital followed by the value after every period.
    pub fn values(&self) -> Vec<f64> {
        std::iter::once(self.initial_capital)
            .chain(self.records.iter().map(|r| r.value))
            .collect()
    }

    pub fn date_of(&self, period: u32) -> NaiveDate {
        self.start_date
            .checked_add_months(Months::new(period))
            .unwrap_or(self.start_date)
    }

    /// One snapshot per completed simulation year.
    pub fn yearly_view(&self) -> Vec<YearSnapshot> {
        self.records
            .iter()
            .filter(|r| r.period % PERIODS_PER_YEAR == 0)
            .map(|r| YearSnapshot {
                year: r.period / PERIODS_PER_YEAR,
                date: self.date_of(r.period),
                value: r.value,
                cumulative_contributions: r.cumulative_contributions,
                cumulative_gains: r.cumulative_gains,
                cumulative_taxes: r.cumulative_taxes,
                cumulative_fees: r.cumulative_fees,
            })
            .collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct YearSnapshot {
    pub year: u32,
    pub date: NaiveDate,
    pub value: f64,
    pub cumulative_contributions: f64,
    pub cumulative_gains: f64,
    pub cumulative_taxes: f64,
    pub cumulative_fees: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct YearReturn {
    pub year: u32,
    pub annual_return: f64,
}

/// Summary of a single trajectory. `None` marks a statistic that has no
/// meaningful value for the inputs.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AggregateResult {
    pub final_value: f64,
    pub total_contributions: f64,
    pub total_taxes_paid: f64,
    pub total_fees_paid: f64,
    pub net_profit: f64,
    pub inflation_adjusted_final_value: f64,
    pub cagr: Option<f64>,
    pub average_annual_return: Option<f64>,
    pub realized_volatility: Option<f64>,
    pub max_drawdown: f64,
    pub risk_adjusted_ratio: Option<f64>,
    pub best_year: Option<YearReturn>,
    pub worst_year: Option<YearReturn>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EnsembleOutcome {
    pub run: u32,
    pub final_value: f64,
    pub max_drawdown: f64,
    pub inflation_adjusted_final_value: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Percentiles {
    pub p5: f64,
    pub p10: f64,
    pub p25: f64,
    pub p50: f64,
    pub p75: f64,
    pub p90: f64,
    pub p95: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct YearBand {
    pub year: u32,
    pub p10: f64,
    pub p25: f64,
    pub p50: f64,
    pub p75: f64,
    pub p90: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct HistogramBin {
    pub start: f64,
    pub end: f64,
    pub count: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MonteCarloEnsemble {
    pub simulations: u32,
    /// Sorted ascending by final value.
    pub outcomes: Vec<EnsembleOutcome>,
    pub percentiles: Percentiles,
    /// Percentiles of final values deflated by each run's own inflation.
    pub inflation_adjusted_percentiles: Percentiles,
    pub mean_final_value: f64,
    pub probability_of_profit: f64,
    pub yearly_bands: Vec<YearBand>,
    pub resample_fallbacks: u32,
}

impl MonteCarloEnsemble {
    pub fn final_values(&self) -> Vec<f64> {
        self.outcomes.iter().map(|o| o.final_value).collect()
    }

    /// Equal-width bins over the final values; the maximum lands in the last bin.
    pub fn histogram(&self, bins: usize) -> Vec<HistogramBin> {
        if bins == 0 || self.outcomes.is_empty() {
            return Vec::new();
        }

        let min = self.outcomes[0].final_value;
        let max = self.outcomes[self.outcomes.len() - 1].final_value;
        let width = (max - min) / bins as f64;
        if width <= 0.0 {
            return vec![HistogramBin {
                start: min,
                end: max,
                count: self.outcomes.len() as u32,
            }];
        }

        let mut result = (0..bins)
            .map(|i| HistogramBin {
                start: min + i as f64 * width,
                end: min + (i + 1) as f64 * width,
                count: 0,
            })
            .collect::<Vec<_>>();
        for outcome in &self.outcomes {
            let idx = (((outcome.final_value - min) / width).floor() as usize).min(bins - 1);
            result[idx].count += 1;
        }
        result
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Milestone {
    pub label: String,
    pub index: usize,
    pub period: u32,
    pub year: u32,
    pub target: f64,
    pub value: f64,
    pub percent_of_final: f64,
}

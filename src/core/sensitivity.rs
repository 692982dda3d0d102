use serde::Serialize;

use super::engine::project;
use super::error::EngineError;
use super::random::derive_seed;
use super::types::{InvestmentConfig, MAX_MANAGEMENT_FEE};

#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum SensitivityParameter {
    ExpectedReturn,
    Volatility,
    Inflation,
    TaxRate,
    ManagementFee,
}

impl SensitivityParameter {
    pub const ALL: [SensitivityParameter; 5] = [
        SensitivityParameter::ExpectedReturn,
        SensitivityParameter::Volatility,
        SensitivityParameter::Inflation,
        SensitivityParameter::TaxRate,
        SensitivityParameter::ManagementFee,
    ];

    /// Percentage-point shifts applied to the base value.
    pub fn deltas(self) -> [f64; 5] {
        match self {
            SensitivityParameter::ExpectedReturn => [-2.0, -1.0, 0.0, 1.0, 2.0],
            SensitivityParameter::Volatility => [-5.0, -2.5, 0.0, 2.5, 5.0],
            SensitivityParameter::Inflation => [-1.0, -0.5, 0.0, 0.5, 1.0],
            SensitivityParameter::TaxRate => [-5.0, -2.5, 0.0, 2.5, 5.0],
            SensitivityParameter::ManagementFee => [-0.1, -0.05, 0.0, 0.05, 0.1],
        }
    }

    fn apply(self, config: &mut InvestmentConfig, delta: f64) {
        match self {
            SensitivityParameter::ExpectedReturn => {
                config.expected_annual_return =
                    (config.expected_annual_return + delta).clamp(-99.0, 100.0);
            }
            SensitivityParameter::Volatility => {
                config.volatility = (config.volatility + delta).clamp(0.0, 100.0);
            }
            SensitivityParameter::Inflation => {
                config.inflation_rate_annual =
                    (config.inflation_rate_annual + delta).clamp(-20.0, 50.0);
            }
            SensitivityParameter::TaxRate => {
                config.tax_rate_on_gains = (config.tax_rate_on_gains + delta).clamp(0.0, 100.0);
            }
            SensitivityParameter::ManagementFee => {
                config.management_fee_annual =
                    (config.management_fee_annual + delta).clamp(0.0, MAX_MANAGEMENT_FEE);
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SensitivityPoint {
    pub delta: f64,
    pub final_value: f64,
    /// Growth over the initial capital in percent; undefined without capital.
    pub impact: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SensitivitySeries {
    pub parameter: SensitivityParameter,
    pub points: Vec<SensitivityPoint>,
}

pub fn run_sensitivity(config: &InvestmentConfig) -> Result<Vec<SensitivitySeries>, EngineError> {
    config.validate()?;
    let seed = derive_seed(config.seed, 0);

    Ok(SensitivityParameter::ALL
        .iter()
        .map(|&parameter| SensitivitySeries {
            parameter,
            points: parameter
                .deltas()
                .iter()
                .map(|&delta| {
                    let mut shifted = config.clone();
                    parameter.apply(&mut shifted, delta);
                    let final_value = project(&shifted, seed).final_value();
                    SensitivityPoint {
                        delta,
                        final_value,
                        impact: (config.initial_capital > 0.0).then(|| {
                            (final_value - config.initial_capital) / config.initial_capital * 100.0
                        }),
                    }
                })
                .collect(),
        })
        .collect())
}

use serde::Serialize;

use super::types::InvestmentConfig;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EtfPreset {
    pub key: &'static str,
    pub name: &'static str,
    pub expected_return: f64,
    pub volatility: f64,
    pub fees: f64,
    pub description: &'static str,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScenarioPreset {
    pub name: &'static str,
    pub expected_return: f64,
    pub volatility: f64,
    pub description: &'static str,
}

pub const ETF_PRESETS: [EtfPreset; 6] = [
    EtfPreset {
        key: "world",
        name: "Global equity (MSCI World)",
        expected_return: 7.0,
        volatility: 15.0,
        fees: 0.25,
        description: "Diversified across developed markets",
    },
    EtfPreset {
        key: "sp500",
        name: "S&P 500",
        expected_return: 8.5,
        volatility: 18.0,
        fees: 0.15,
        description: "The 500 largest US companies",
    },
    EtfPreset {
        key: "europe",
        name: "European equity",
        expected_return: 6.5,
        volatility: 16.0,
        fees: 0.30,
        description: "European stock markets",
    },
    EtfPreset {
        key: "emerging",
        name: "Emerging markets",
        expected_return: 8.0,
        volatility: 22.0,
        fees: 0.45,
        description: "Emerging market equities",
    },
    EtfPreset {
        key: "bonds",
        name: "Bonds",
        expected_return: 3.5,
        volatility: 8.0,
        fees: 0.20,
        description: "Diversified bond index",
    },
    EtfPreset {
        key: "mixed",
        name: "Balanced 60/40",
        expected_return: 5.5,
        volatility: 12.0,
        fees: 0.35,
        description: "60% equities, 40% bonds",
    },
];

pub const SCENARIO_PRESETS: [ScenarioPreset; 5] = [
    ScenarioPreset {
        name: "Conservative",
        expected_return: 4.0,
        volatility: 8.0,
        description: "Low risk profile",
    },
    ScenarioPreset {
        name: "Moderate",
        expected_return: 6.0,
        volatility: 12.0,
        description: "Medium risk profile",
    },
    ScenarioPreset {
        name: "Aggressive",
        expected_return: 8.5,
        volatility: 18.0,
        description: "High risk profile",
    },
    ScenarioPreset {
        name: "2008 crisis",
        expected_return: -35.0,
        volatility: 30.0,
        description: "Financial crisis year",
    },
    ScenarioPreset {
        name: "Bull market",
        expected_return: 25.0,
        volatility: 15.0,
        description: "Exceptional year",
    },
];

pub fn etf_preset(key: &str) -> Option<&'static EtfPreset> {
    ETF_PRESETS.iter().find(|p| p.key.eq_ignore_ascii_case(key))
}

pub fn scenario_preset(name: &str) -> Option<&'static ScenarioPreset> {
    SCENARIO_PRESETS
        .iter()
        .find(|p| p.name.eq_ignore_ascii_case(name))
}

impl InvestmentConfig {
    pub fn with_etf_preset(mut self, preset: &EtfPreset) -> Self {
        self.expected_annual_return = preset.expected_return;
        self.volatility = preset.volatility;
        self.management_fee_annual = preset.fees;
        self
    }

    pub fn with_scenario(mut self, scenario: &ScenarioPreset) -> Self {
        self.expected_annual_return = scenario.expected_return;
        self.volatility = scenario.volatility;
        self
    }
}

//! Simulation scenarios.

use std::path::Path;

use pathrate_common::{Rate, Slippage};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// A simulation scenario.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Scenario {
    /// Scenario name.
    pub name: String,
    /// Description.
    pub description: String,
    /// Steps in the scenario.
    pub steps: Vec<ScenarioStep>,
}

/// A step in a scenario.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ScenarioStep {
    /// Replace every hop of the path.
    SetPath { hop_rates: Vec<Rate> },
    /// Send a batch of randomly sized packets.
    SendPackets {
        count: usize,
        min_amount: u64,
        max_amount: u64,
    },
    /// Change the rate of one hop.
    ChangeRate { hop: usize, rate: Rate },
    /// Set a minimum rate from a quote.
    SetMinimumRate {
        quoted: Rate,
        slippage: Slippage,
        expect_accepted: bool,
    },
    /// The path's nominal rate lies within the estimator's bounds.
    /// Only meaningful for single-hop paths.
    AssertRateWithinBounds,
    /// The estimator holds bounds.
    AssertBoundsEstablished,
    /// Sending the high source estimate for `target` delivers at least `target`.
    AssertSourceEstimate { target: u64 },
    /// Whether the minimum rate still holds against current evidence.
    AssertMinimumRate { holds: bool },
}

impl Scenario {
    /// Load a built-in scenario by name, or a JSON scenario file by path.
    pub fn load(name: &str) -> anyhow::Result<Self> {
        match name {
            "steady-rate" => Ok(Self::steady_rate()),
            "rate-change" => Ok(Self::rate_change()),
            "multi-hop" => Ok(Self::multi_hop()),
            "minimum-rate" => Ok(Self::minimum_rate()),
            path if path.ends_with(".json") => Self::from_file(path),
            _ => Err(anyhow::anyhow!(
                "Unknown scenario: {} (built-in: {})",
                name,
                Self::builtin_names().join(", ")
            )),
        }
    }

    /// Read a scenario from a JSON file.
    pub fn from_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("Cannot read scenario {}: {}", path.display(), e))?;
        Ok(serde_json::from_str(&contents)?)
    }

    /// Names of the built-in scenarios.
    pub fn builtin_names() -> &'static [&'static str] {
        &["steady-rate", "rate-change", "multi-hop", "minimum-rate"]
    }

    /// One hop at a fixed rate.
    fn steady_rate() -> Self {
        Self {
            name: "steady-rate".to_string(),
            description: "Single hop at 0.92, bounds converge on the true rate".to_string(),
            steps: vec![
                ScenarioStep::SetPath {
                    hop_rates: vec![decimal_rate(92, 2)],
                },
                ScenarioStep::SendPackets {
                    count: 200,
                    min_amount: 1,
                    max_amount: 1_000_000,
                },
                ScenarioStep::AssertBoundsEstablished,
                ScenarioStep::AssertRateWithinBounds,
                ScenarioStep::AssertSourceEstimate { target: 250_000 },
            ],
        }
    }

    /// The path rate drops midway.
    fn rate_change() -> Self {
        Self {
            name: "rate-change".to_string(),
            description: "Rate drops from 0.92 to 0.85, bounds reset and re-converge".to_string(),
            steps: vec![
                ScenarioStep::SetPath {
                    hop_rates: vec![decimal_rate(92, 2)],
                },
                ScenarioStep::SendPackets {
                    count: 100,
                    min_amount: 1_000,
                    max_amount: 1_000_000,
                },
                ScenarioStep::AssertRateWithinBounds,
                ScenarioStep::ChangeRate {
                    hop: 0,
                    rate: decimal_rate(85, 2),
                },
                ScenarioStep::SendPackets {
                    count: 100,
                    min_amount: 1_000,
                    max_amount: 1_000_000,
                },
                ScenarioStep::AssertRateWithinBounds,
                ScenarioStep::AssertSourceEstimate { target: 100_000 },
            ],
        }
    }

    /// Several flooring hops.
    fn multi_hop() -> Self {
        Self {
            name: "multi-hop".to_string(),
            description: "Three hops, each flooring its output".to_string(),
            steps: vec![
                ScenarioStep::SetPath {
                    hop_rates: vec![decimal_rate(92, 2), decimal_rate(150, 2), decimal_rate(80, 2)],
                },
                ScenarioStep::SendPackets {
                    count: 200,
                    min_amount: 1,
                    max_amount: 1_000_000,
                },
                ScenarioStep::AssertBoundsEstablished,
            ],
        }
    }

    /// Enforce a floor, then watch it break when the path degrades.
    fn minimum_rate() -> Self {
        Self {
            name: "minimum-rate".to_string(),
            description: "Quote 0.93 with 2% slippage against a 0.92 path, then degrade".to_string(),
            steps: vec![
                ScenarioStep::SetPath {
                    hop_rates: vec![decimal_rate(92, 2)],
                },
                ScenarioStep::SendPackets {
                    count: 50,
                    min_amount: 10_000,
                    max_amount: 1_000_000,
                },
                ScenarioStep::SetMinimumRate {
                    quoted: decimal_rate(93, 2),
                    slippage: slippage(2, 2),
                    expect_accepted: true,
                },
                ScenarioStep::SetMinimumRate {
                    quoted: Rate::one(),
                    slippage: slippage(1, 2),
                    expect_accepted: false,
                },
                ScenarioStep::SendPackets {
                    count: 50,
                    min_amount: 10_000,
                    max_amount: 1_000_000,
                },
                ScenarioStep::AssertMinimumRate { holds: true },
                ScenarioStep::ChangeRate {
                    hop: 0,
                    rate: decimal_rate(50, 2),
                },
                ScenarioStep::SendPackets {
                    count: 50,
                    min_amount: 10_000,
                    max_amount: 1_000_000,
                },
                ScenarioStep::AssertMinimumRate { holds: false },
            ],
        }
    }
}

fn decimal_rate(mantissa: i64, scale: u32) -> Rate {
    Rate::from_decimal(Decimal::new(mantissa, scale)).unwrap_or_default()
}

fn slippage(mantissa: i64, scale: u32) -> Slippage {
    Slippage::new(Decimal::new(mantissa, scale)).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_builtin_scenarios_load() {
        for name in Scenario::builtin_names() {
            let scenario = Scenario::load(name).unwrap();
            assert_eq!(scenario.name, *name);
            assert!(!scenario.steps.is_empty());
        }
        assert!(Scenario::load("no-such-scenario").is_err());
    }

    #[test]
    fn test_builtin_rates() {
        let scenario = Scenario::load("minimum-rate").unwrap();

        match &scenario.steps[2] {
            ScenarioStep::SetMinimumRate { quoted, slippage, .. } => {
                assert_eq!(*quoted, "93/100".parse().unwrap());
                assert_eq!(slippage.value(), dec!(0.02));
            }
            other => panic!("unexpected step {:?}", other),
        }
    }

    #[test]
    fn test_json_scenario() {
        let json = r#"{
            "name": "custom",
            "description": "from a file",
            "steps": [
                { "SetPath": { "hop_rates": ["0.5", "3/2"] } },
                { "SendPackets": { "count": 10, "min_amount": 1, "max_amount": 100 } },
                { "SetMinimumRate": { "quoted": "0.75", "slippage": "0.1", "expect_accepted": true } },
                "AssertBoundsEstablished"
            ]
        }"#;

        let scenario: Scenario = serde_json::from_str(json).unwrap();

        assert_eq!(scenario.steps.len(), 4);
        match &scenario.steps[0] {
            ScenarioStep::SetPath { hop_rates } => {
                assert_eq!(hop_rates[1], "3/2".parse().unwrap());
            }
            other => panic!("unexpected step {:?}", other),
        }
    }

    #[test]
    fn test_json_rejects_invalid_slippage() {
        let json = r#"{
            "name": "bad",
            "description": "",
            "steps": [
                { "SetMinimumRate": { "quoted": "1", "slippage": "1.5", "expect_accepted": true } }
            ]
        }"#;

        assert!(serde_json::from_str::<Scenario>(json).is_err());
    }

    #[test]
    fn test_scenario_file() {
        let path = std::env::temp_dir().join(format!("pathrate-scenario-{}.json", std::process::id()));
        let scenario = Scenario::load("multi-hop").unwrap();
        std::fs::write(&path, serde_json::to_string(&scenario).unwrap()).unwrap();

        let loaded = Scenario::load(path.to_str().unwrap()).unwrap();
        std::fs::remove_file(&path).unwrap();

        assert_eq!(loaded.name, "multi-hop");
        assert_eq!(loaded.steps.len(), scenario.steps.len());
    }
}

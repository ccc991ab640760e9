//! Simulator configuration.

use std::time::Duration;

use pathrate_common::{Rate, Slippage};
use rust_decimal::Decimal;

/// Simulated path configuration.
#[derive(Debug, Clone)]
pub struct PathConfig {
    /// Exchange rate applied at each hop, in order. Every hop floors.
    pub hop_rates: Vec<Rate>,
    /// Probability that a packet is rejected for liquidity before arriving.
    pub failure_probability: f64,
    /// Upper limit on simulated one-way latency.
    pub max_latency: Duration,
}

impl Default for PathConfig {
    fn default() -> Self {
        Self {
            // 0.92 source-to-destination
            hop_rates: vec![Rate::from_decimal(Decimal::new(92, 2)).unwrap_or_default()],
            failure_probability: 0.0,
            max_latency: Duration::from_millis(5),
        }
    }
}

/// Main simulator configuration.
#[derive(Debug, Clone)]
pub struct SimulatorConfig {
    /// Path configuration.
    pub path: PathConfig,
    /// Packets to send when no scenario is given.
    pub packets: usize,
    /// Smallest packet source amount.
    pub min_packet: u64,
    /// Largest packet source amount.
    pub max_packet: u64,
    /// Packets in flight at once.
    pub concurrency: usize,
    /// Random seed for reproducibility.
    pub seed: Option<u64>,
    /// Quoted rate to enforce after sending, if any.
    pub quoted_rate: Option<Rate>,
    /// Slippage applied to the quoted rate.
    pub slippage: Slippage,
    /// Emit JSON logs.
    pub json_logs: bool,
    /// Log level when `RUST_LOG` is unset.
    pub log_level: String,
}

impl Default for SimulatorConfig {
    fn default() -> Self {
        Self {
            path: PathConfig::default(),
            packets: 100,
            min_packet: 1,
            max_packet: 1_000_000,
            concurrency: 4,
            seed: None,
            quoted_rate: None,
            slippage: Slippage::new(Decimal::new(1, 2)).unwrap_or_default(),
            json_logs: false,
            log_level: "info".to_string(),
        }
    }
}

impl SimulatorConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(rates) = std::env::var("PATHRATE_HOP_RATES") {
            if let Ok(rates) = parse_hop_rates(&rates) {
                config.path.hop_rates = rates;
            }
        }

        if let Ok(probability) = std::env::var("PATHRATE_FAILURE_PROBABILITY") {
            if let Ok(probability) = probability.parse() {
                config.path.failure_probability = probability;
            }
        }

        if let Ok(packets) = std::env::var("PATHRATE_PACKETS") {
            if let Ok(packets) = packets.parse() {
                config.packets = packets;
            }
        }

        if let Ok(max) = std::env::var("PATHRATE_MAX_PACKET") {
            if let Ok(max) = max.parse() {
                config.max_packet = max;
            }
        }

        if let Ok(concurrency) = std::env::var("PATHRATE_CONCURRENCY") {
            if let Ok(concurrency) = concurrency.parse() {
                config.concurrency = concurrency;
            }
        }

        if let Ok(seed) = std::env::var("PATHRATE_SEED") {
            config.seed = seed.parse().ok();
        }

        if let Ok(level) = std::env::var("LOG_LEVEL") {
            config.log_level = level;
        }

        config
    }

    /// Validate configuration.
    pub fn validate(&self) -> Result<(), String> {
        if self.path.hop_rates.is_empty() {
            return Err("Path needs at least one hop".to_string());
        }

        if !(0.0..=1.0).contains(&self.path.failure_probability) {
            return Err("Failure probability must be within [0, 1]".to_string());
        }

        if self.min_packet == 0 || self.min_packet > self.max_packet {
            return Err("Packet range must be non-empty and start above zero".to_string());
        }

        if self.concurrency == 0 {
            return Err("Concurrency cannot be 0".to_string());
        }

        Ok(())
    }
}

/// Parse a comma-separated list of hop rates, e.g. `"0.92,3/2"`.
pub fn parse_hop_rates(input: &str) -> Result<Vec<Rate>, String> {
    input
        .split(',')
        .filter(|part| !part.trim().is_empty())
        .map(|part| part.parse::<Rate>().map_err(|e| e.to_string()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pathrate_common::Amount;

    #[test]
    fn test_default_config() {
        let config = SimulatorConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(
            config.path.hop_rates,
            vec![Rate::new(Amount::from(23u64), Amount::from(25u64)).unwrap()]
        );
    }

    #[test]
    fn test_invalid_config() {
        let mut config = SimulatorConfig::default();
        config.concurrency = 0;
        assert!(config.validate().is_err());

        let mut config = SimulatorConfig::default();
        config.min_packet = 10;
        config.max_packet = 5;
        assert!(config.validate().is_err());

        let mut config = SimulatorConfig::default();
        config.path.hop_rates.clear();
        assert!(config.validate().is_err());

        let mut config = SimulatorConfig::default();
        config.path.failure_probability = 1.5;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_parse_hop_rates() {
        let rates = parse_hop_rates("0.5, 3/2,").unwrap();
        assert_eq!(rates.len(), 2);
        assert_eq!(rates[1], Rate::new(Amount::from(3u64), Amount::from(2u64)).unwrap());
        assert!(parse_hop_rates("1/0").is_err());
    }
}

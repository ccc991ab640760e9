//! Pathrate Simulator
//!
//! Drives packets through a simulated flooring path and reports what the
//! rate estimator learned.

use std::path::PathBuf;

use clap::Parser;
use rust_decimal::Decimal;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod config;
mod controller;
mod metrics;
mod path;
mod scenario;

use pathrate_common::{Rate, Slippage};
use pathrate_protocol::RejectCode;

use config::{parse_hop_rates, SimulatorConfig};
use controller::SimulationController;
use scenario::Scenario;

/// Pathrate Simulator CLI
#[derive(Parser, Debug)]
#[command(name = "simulator")]
#[command(about = "Exchange rate estimation over a simulated payment path")]
struct Args {
    /// Single-hop rate, e.g. 0.92 or 23/25
    #[arg(short, long)]
    rate: Option<Rate>,

    /// Comma-separated hop rates; overrides --rate
    #[arg(long)]
    hops: Option<String>,

    /// Packets to send when no scenario is given
    #[arg(short, long)]
    packets: Option<usize>,

    /// Smallest packet source amount
    #[arg(long)]
    min_packet: Option<u64>,

    /// Largest packet source amount
    #[arg(long)]
    max_packet: Option<u64>,

    /// Packets in flight at once
    #[arg(short, long)]
    concurrency: Option<usize>,

    /// Probability a packet is rejected for liquidity
    #[arg(long)]
    failure_probability: Option<f64>,

    /// Random seed for reproducibility
    #[arg(long)]
    seed: Option<u64>,

    /// Built-in scenario name or path to a JSON scenario
    #[arg(short, long)]
    scenario: Option<String>,

    /// Quoted rate to enforce as a minimum after the first batch
    #[arg(long)]
    quoted_rate: Option<Rate>,

    /// Slippage tolerated below the quoted rate
    #[arg(long)]
    slippage: Option<Decimal>,

    /// Emit JSON logs
    #[arg(long)]
    json_logs: bool,

    /// Write a JSON report to this file, or `-` for stdout
    #[arg(long)]
    report: Option<PathBuf>,
}

impl Args {
    /// Apply command line overrides on top of environment configuration.
    fn apply(&self, config: &mut SimulatorConfig) -> anyhow::Result<()> {
        if let Some(rate) = &self.rate {
            config.path.hop_rates = vec![rate.clone()];
        }
        if let Some(hops) = &self.hops {
            config.path.hop_rates = parse_hop_rates(hops).map_err(anyhow::Error::msg)?;
        }
        if let Some(packets) = self.packets {
            config.packets = packets;
        }
        if let Some(min) = self.min_packet {
            config.min_packet = min;
        }
        if let Some(max) = self.max_packet {
            config.max_packet = max;
        }
        if let Some(concurrency) = self.concurrency {
            config.concurrency = concurrency;
        }
        if let Some(probability) = self.failure_probability {
            config.path.failure_probability = probability;
        }
        if self.seed.is_some() {
            config.seed = self.seed;
        }
        if let Some(quoted) = &self.quoted_rate {
            config.quoted_rate = Some(quoted.clone());
        }
        if let Some(slippage) = self.slippage {
            config.slippage = Slippage::new(slippage)?;
        }
        config.json_logs |= self.json_logs;

        Ok(())
    }
}

fn init_logging(config: &SimulatorConfig) {
    let filter = tracing_subscriber::EnvFilter::new(
        std::env::var("RUST_LOG").unwrap_or_else(|_| config.log_level.clone()),
    );

    if config.json_logs {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let mut config = SimulatorConfig::from_env();
    args.apply(&mut config)?;

    init_logging(&config);

    if let Err(e) = config.validate() {
        error!(error = %e, "Invalid configuration");
        return Err(anyhow::anyhow!("Configuration error: {}", e));
    }

    info!("Starting Pathrate Simulator");

    let mut controller = SimulationController::new(&config);

    info!("Hops: {}", controller.path().hop_count().await);
    info!("Concurrency: {}", config.concurrency);

    if let Some(scenario_name) = &args.scenario {
        let scenario = Scenario::load(scenario_name)?;
        controller.run_scenario(scenario).await?;
    } else {
        controller
            .send_packets(config.packets, config.min_packet, config.max_packet)
            .await?;

        if let Some(quoted) = &config.quoted_rate {
            match controller.estimator().set_minimum_rate(quoted, config.slippage) {
                Ok(minimum) => {
                    info!(minimum = %minimum, "Minimum rate enforced for second batch");
                    controller
                        .send_packets(config.packets, config.min_packet, config.max_packet)
                        .await?;
                }
                Err(e) => warn!("Quote not supported by the path: {}", e),
            }
        }
    }

    let report = controller.report().await;

    info!("Simulation complete");
    info!("Packets: {}", report.metrics.total_packets);
    info!("Fulfilled: {}", report.metrics.fulfilled_packets);
    info!(
        "Rejected: {} ({} below minimum)",
        report.metrics.rejected_packets,
        report.metrics.rejects(RejectCode::InsufficientDestinationAmount)
    );
    info!("Halted: {}", report.metrics.halted_packets);
    info!(
        "Latency: {}ms average, {}ms p99",
        report.metrics.average_latency_ms(),
        report.metrics.p99_latency_ms()
    );
    match (report.estimator.bounds.lower(), report.estimator.bounds.upper()) {
        (Some(lower), Some(upper)) => info!(
            lower = %lower.rate,
            upper = %upper.rate,
            nominal = %report.nominal_rate,
            "Rate bounds"
        ),
        _ => info!("No rate bounds established"),
    }

    if let Some(target) = &args.report {
        let json = serde_json::to_string_pretty(&report)?;
        if target.as_os_str() == "-" {
            println!("{}", json);
        } else {
            std::fs::write(target, json)?;
            info!("Report written to {}", target.display());
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_args_override_config() {
        let args = Args::parse_from([
            "simulator",
            "--rate",
            "0.5",
            "--packets",
            "10",
            "--seed",
            "9",
            "--slippage",
            "0.05",
        ]);
        let mut config = SimulatorConfig::default();

        args.apply(&mut config).unwrap();

        assert_eq!(config.path.hop_rates, vec!["1/2".parse::<Rate>().unwrap()]);
        assert_eq!(config.packets, 10);
        assert_eq!(config.seed, Some(9));
        assert_eq!(config.slippage.value(), dec!(0.05));
    }

    #[test]
    fn test_hops_override_rate() {
        let args = Args::parse_from(["simulator", "--rate", "0.5", "--hops", "0.9,2"]);
        let mut config = SimulatorConfig::default();

        args.apply(&mut config).unwrap();

        assert_eq!(config.path.hop_rates.len(), 2);
    }

    #[test]
    fn test_invalid_slippage() {
        let args = Args::parse_from(["simulator", "--slippage", "1.5"]);
        let mut config = SimulatorConfig::default();

        assert!(args.apply(&mut config).is_err());
    }
}

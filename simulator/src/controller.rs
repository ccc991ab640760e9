//! Simulation controller.

use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Instant;

use anyhow::{bail, Context};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Serialize;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use pathrate_common::{Amount, Rate};
use pathrate_estimator::{EstimatorSnapshot, SharedRateEstimator};
use pathrate_protocol::{PacketRequest, RoundTrip};

use crate::config::SimulatorConfig;
use crate::metrics::SimulationMetrics;
use crate::path::SimulatedPath;
use crate::scenario::{Scenario, ScenarioStep};

/// Final state of a simulation run.
#[derive(Debug, Clone, Serialize)]
pub struct SimulationReport {
    /// Scenario that was run, if any.
    pub scenario: Option<String>,
    /// Product of the path's hop rates at the end of the run.
    pub nominal_rate: Rate,
    /// Rate realized over fulfilled packets.
    pub realized_rate: Option<Rate>,
    /// Fraction of packets fulfilled.
    pub success_rate: f64,
    /// Packet counters.
    pub metrics: SimulationMetrics,
    /// Estimator state.
    pub estimator: EstimatorSnapshot,
}

/// Controls the simulation.
pub struct SimulationController {
    /// Packets in flight at once.
    concurrency: usize,
    /// Random number generator.
    rng: Arc<RwLock<StdRng>>,
    /// Path under test.
    path: Arc<SimulatedPath>,
    /// Estimator shared by every sender task.
    estimator: SharedRateEstimator,
    /// Simulation metrics.
    metrics: Arc<RwLock<SimulationMetrics>>,
    /// Next packet sequence number.
    sequence: Arc<AtomicU64>,
    /// Scenario being run.
    scenario: Option<String>,
}

impl SimulationController {
    /// Create a new simulation controller.
    pub fn new(config: &SimulatorConfig) -> Self {
        let rng = match config.seed {
            Some(s) => StdRng::seed_from_u64(s),
            None => StdRng::from_entropy(),
        };
        // Path failures use a separate stream
        let path_seed = config.seed.map(|s| s.wrapping_add(1));

        Self {
            concurrency: config.concurrency.max(1),
            rng: Arc::new(RwLock::new(rng)),
            path: Arc::new(SimulatedPath::new(&config.path, path_seed)),
            estimator: SharedRateEstimator::new(),
            metrics: Arc::new(RwLock::new(SimulationMetrics::new())),
            sequence: Arc::new(AtomicU64::new(1)),
            scenario: None,
        }
    }

    /// The shared estimator.
    pub fn estimator(&self) -> &SharedRateEstimator {
        &self.estimator
    }

    /// The simulated path.
    pub fn path(&self) -> &SimulatedPath {
        &self.path
    }

    /// Run a scenario.
    pub async fn run_scenario(&mut self, scenario: Scenario) -> anyhow::Result<()> {
        info!("Running scenario: {} - {}", scenario.name, scenario.description);
        self.scenario = Some(scenario.name.clone());

        for (index, step) in scenario.steps.iter().enumerate() {
            self.execute_step(step)
                .await
                .with_context(|| format!("Step {} of {} failed", index + 1, scenario.name))?;
        }

        Ok(())
    }

    /// Send `count` packets with source amounts drawn from `min..=max`.
    ///
    /// Sending stops early once the minimum rate no longer holds; unsent
    /// packets are counted as halted.
    pub async fn send_packets(&self, count: usize, min: u64, max: u64) -> anyhow::Result<()> {
        if min == 0 || min > max {
            bail!("Invalid packet range {}..={}", min, max);
        }

        info!(count, min, max, "Sending packets");

        let remaining = Arc::new(AtomicUsize::new(count));
        let halted = Arc::new(AtomicBool::new(false));

        let handles: Vec<_> = (0..self.concurrency.min(count.max(1)))
            .map(|_| {
                let remaining = remaining.clone();
                let halted = halted.clone();
                let rng = self.rng.clone();
                let path = self.path.clone();
                let estimator = self.estimator.clone();
                let metrics = self.metrics.clone();
                let sequence = self.sequence.clone();

                tokio::spawn(async move {
                    loop {
                        if halted.load(Ordering::SeqCst) {
                            break;
                        }
                        if remaining
                            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                            .is_err()
                        {
                            break;
                        }

                        if let Err(e) = estimator.enforce_minimum_rate() {
                            warn!("Halting sender: {}", e);
                            halted.store(true, Ordering::SeqCst);
                            // Return the claimed packet
                            remaining.fetch_add(1, Ordering::SeqCst);
                            break;
                        }

                        let source = Amount::from(rng.write().await.gen_range(min..=max));
                        let minimum = estimator.minimum_destination_amount(&source);
                        let request = PacketRequest::new(sequence.fetch_add(1, Ordering::SeqCst), source)
                            .with_minimum_destination(minimum);

                        let started = Instant::now();
                        let reply = path.send(&request).await;
                        let latency = started.elapsed().as_millis() as u64;

                        metrics.write().await.record(&request.source_amount, &reply, latency);

                        let round_trip = RoundTrip::new(request, Some(reply))?;
                        if estimator.apply(&round_trip) {
                            debug!(sequence = round_trip.request.sequence, "Round trip observed");
                        }
                    }

                    Ok::<(), anyhow::Error>(())
                })
            })
            .collect();

        for result in futures::future::try_join_all(handles).await? {
            result?;
        }

        let unsent = remaining.load(Ordering::SeqCst);
        if unsent > 0 {
            self.metrics.write().await.record_halted(unsent as u64);
            warn!(unsent, "Batch halted by minimum rate");
        }

        Ok(())
    }

    /// Execute a single scenario step.
    async fn execute_step(&self, step: &ScenarioStep) -> anyhow::Result<()> {
        match step {
            ScenarioStep::SetPath { hop_rates } => {
                if hop_rates.is_empty() {
                    bail!("Path needs at least one hop");
                }
                info!("Setting path with {} hops", hop_rates.len());
                self.path.set_hops(hop_rates.clone()).await;
            }
            ScenarioStep::SendPackets {
                count,
                min_amount,
                max_amount,
            } => {
                self.send_packets(*count, *min_amount, *max_amount).await?;
            }
            ScenarioStep::ChangeRate { hop, rate } => {
                info!("Changing hop {} rate to {}", hop, rate);
                if !self.path.set_hop_rate(*hop, rate.clone()).await {
                    bail!("No hop {}", hop);
                }
            }
            ScenarioStep::SetMinimumRate {
                quoted,
                slippage,
                expect_accepted,
            } => {
                let result = self.estimator.set_minimum_rate(quoted, *slippage);
                match (&result, expect_accepted) {
                    (Ok(minimum), true) => info!("Minimum rate set to {}", minimum),
                    (Err(e), false) => info!("Minimum rate refused as expected: {}", e),
                    (Ok(minimum), false) => bail!("Minimum rate {} was accepted", minimum),
                    (Err(e), true) => bail!("Minimum rate refused: {}", e),
                }
            }
            ScenarioStep::AssertRateWithinBounds => {
                let nominal = self.path.nominal_rate().await;
                let bounds = self.estimator.bounds();
                if !bounds.contains(&nominal) {
                    bail!("Path rate {} outside bounds {:?}", nominal, bounds);
                }
                info!("Path rate {} within bounds", nominal);
            }
            ScenarioStep::AssertBoundsEstablished => {
                if self.estimator.bounds().is_empty() {
                    bail!("No bounds established");
                }
            }
            ScenarioStep::AssertSourceEstimate { target } => {
                let target = Amount::from(*target);
                let estimate = self
                    .estimator
                    .estimate_source_amount(&target)
                    .context("No source estimate available")?;
                let delivered = self.path.deliver(&estimate.high).await;
                if delivered < target {
                    bail!(
                        "Sending {} delivered {}, short of {}",
                        estimate.high,
                        delivered,
                        target
                    );
                }
                info!(
                    "Source estimate for {}: [{}, {}], delivers {}",
                    target, estimate.low, estimate.high, delivered
                );
            }
            ScenarioStep::AssertMinimumRate { holds } => {
                let result = self.estimator.enforce_minimum_rate();
                if result.is_ok() != *holds {
                    bail!("Expected minimum rate holds = {}, got {:?}", holds, result);
                }
            }
        }

        Ok(())
    }

    /// Get simulation metrics.
    pub async fn metrics(&self) -> SimulationMetrics {
        self.metrics.read().await.clone()
    }

    /// Build a report of the run so far.
    pub async fn report(&self) -> SimulationReport {
        let metrics = self.metrics().await;

        SimulationReport {
            scenario: self.scenario.clone(),
            nominal_rate: self.path.nominal_rate().await,
            realized_rate: metrics.realized_rate(),
            success_rate: metrics.success_rate(),
            metrics,
            estimator: self.estimator.snapshot(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PathConfig;
    use pathrate_common::Slippage;
    use pathrate_protocol::RejectCode;
    use std::time::Duration;

    fn rate(s: &str) -> Rate {
        s.parse().unwrap()
    }

    fn config(rates: &[&str]) -> SimulatorConfig {
        SimulatorConfig {
            path: PathConfig {
                hop_rates: rates.iter().map(|r| rate(r)).collect(),
                failure_probability: 0.0,
                max_latency: Duration::ZERO,
            },
            seed: Some(42),
            ..SimulatorConfig::default()
        }
    }

    #[tokio::test]
    async fn test_send_packets_narrows_bounds() {
        let controller = SimulationController::new(&config(&["0.92"]));

        controller.send_packets(100, 1, 1_000_000).await.unwrap();

        let metrics = controller.metrics().await;
        assert_eq!(metrics.total_packets, 100);
        assert_eq!(metrics.fulfilled_packets, 100);
        assert!(controller.estimator().bounds().contains(&rate("0.92")));
        assert_eq!(controller.estimator().stats().resets, 0);
    }

    #[tokio::test]
    async fn test_sequences_are_unique() {
        let controller = SimulationController::new(&config(&["0.5"]));

        controller.send_packets(10, 1, 100).await.unwrap();
        controller.send_packets(10, 1, 100).await.unwrap();

        assert_eq!(controller.sequence.load(Ordering::SeqCst), 21);
    }

    #[tokio::test]
    async fn test_invalid_range() {
        let controller = SimulationController::new(&config(&["0.5"]));

        assert!(controller.send_packets(10, 0, 100).await.is_err());
        assert!(controller.send_packets(10, 50, 10).await.is_err());
    }

    #[tokio::test]
    async fn test_halts_when_minimum_breaks() {
        let controller = SimulationController::new(&config(&["0.92"]));
        controller.send_packets(20, 10_000, 100_000).await.unwrap();
        controller
            .estimator()
            .set_minimum_rate(&rate("0.9"), Slippage::ZERO)
            .unwrap();

        controller.path().set_hop_rate(0, rate("0.5")).await;
        controller.send_packets(50, 10_000, 100_000).await.unwrap();

        let metrics = controller.metrics().await;
        assert!(metrics.halted_packets > 0);
        assert!(metrics.rejects(RejectCode::InsufficientDestinationAmount) > 0);
        assert!(controller.estimator().enforce_minimum_rate().is_err());
    }

    #[tokio::test]
    async fn test_builtin_scenarios_pass() {
        for name in Scenario::builtin_names() {
            let mut controller = SimulationController::new(&config(&["1"]));
            controller
                .run_scenario(Scenario::load(name).unwrap())
                .await
                .unwrap_or_else(|e| panic!("{}: {:#}", name, e));
        }
    }

    #[tokio::test]
    async fn test_failed_assertion() {
        let mut controller = SimulationController::new(&config(&["0.92"]));
        let scenario = Scenario {
            name: "empty".to_string(),
            description: String::new(),
            steps: vec![ScenarioStep::AssertBoundsEstablished],
        };

        assert!(controller.run_scenario(scenario).await.is_err());
    }

    #[tokio::test]
    async fn test_report() {
        let mut controller = SimulationController::new(&config(&["0.5"]));
        let scenario = Scenario {
            name: "report".to_string(),
            description: String::new(),
            steps: vec![ScenarioStep::SendPackets {
                count: 5,
                min_amount: 2,
                max_amount: 2,
            }],
        };
        controller.run_scenario(scenario).await.unwrap();

        let report = controller.report().await;

        assert_eq!(report.scenario.as_deref(), Some("report"));
        assert_eq!(report.nominal_rate, rate("0.5"));
        assert_eq!(report.realized_rate, Some(rate("0.5")));
        assert_eq!(report.estimator.stats.observations, 5);
        assert!(serde_json::to_string(&report).is_ok());
    }
}

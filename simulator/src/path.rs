//! Simulated payment path.

use std::time::Duration;

use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tokio::sync::RwLock;
use tracing::{debug, trace};

use pathrate_common::{Amount, Rate, Rounding};
use pathrate_protocol::{PacketReply, PacketRequest, RejectCode};

use crate::config::PathConfig;

/// A chain of intermediaries, each converting at an exact rate and flooring.
pub struct SimulatedPath {
    /// Rate applied by each hop.
    hops: RwLock<Vec<Rate>>,
    /// Chance of a liquidity reject before the packet arrives.
    failure_probability: f64,
    /// Upper limit on simulated latency.
    max_latency: Duration,
    /// Randomness for failures and latency.
    rng: Mutex<StdRng>,
}

impl SimulatedPath {
    /// Create a path from configuration.
    pub fn new(config: &PathConfig, seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(s) => StdRng::seed_from_u64(s),
            None => StdRng::from_entropy(),
        };

        Self {
            hops: RwLock::new(config.hop_rates.clone()),
            failure_probability: config.failure_probability,
            max_latency: config.max_latency,
            rng: Mutex::new(rng),
        }
    }

    /// Amount that arrives when `source` traverses every hop.
    pub async fn deliver(&self, source: &Amount) -> Amount {
        let hops = self.hops.read().await;
        hops.iter()
            .fold(source.clone(), |amount, rate| rate.mul_amount(&amount, Rounding::Floor))
    }

    /// Product of the hop rates, ignoring flooring.
    pub async fn nominal_rate(&self) -> Rate {
        let hops = self.hops.read().await;
        hops.iter().fold(Rate::one(), |acc, rate| &acc * rate)
    }

    /// Number of hops.
    pub async fn hop_count(&self) -> usize {
        self.hops.read().await.len()
    }

    /// Replace every hop.
    pub async fn set_hops(&self, hop_rates: Vec<Rate>) {
        debug!(hops = hop_rates.len(), "Path replaced");
        *self.hops.write().await = hop_rates;
    }

    /// Change the rate of one hop. Returns false if there is no such hop.
    pub async fn set_hop_rate(&self, hop: usize, rate: Rate) -> bool {
        let mut hops = self.hops.write().await;
        match hops.get_mut(hop) {
            Some(current) => {
                debug!(hop, from = %current, to = %rate, "Hop rate changed");
                *current = rate;
                true
            }
            None => false,
        }
    }

    /// Send a packet and wait for its reply.
    pub async fn send(&self, request: &PacketRequest) -> PacketReply {
        let (fails, latency) = {
            let mut rng = self.rng.lock();
            let fails = rng.gen_bool(self.failure_probability);
            let max_ms = self.max_latency.as_millis() as u64;
            let latency = if max_ms == 0 { 0 } else { rng.gen_range(0..=max_ms) };
            (fails, Duration::from_millis(latency))
        };

        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }

        if fails {
            trace!(sequence = request.sequence, "Packet rejected for liquidity");
            return PacketReply::reject(request.sequence, RejectCode::InsufficientLiquidity, None);
        }

        let delivered = self.deliver(&request.source_amount).await;

        if delivered < request.minimum_destination_amount {
            trace!(
                sequence = request.sequence,
                delivered = %delivered,
                minimum = %request.minimum_destination_amount,
                "Packet below minimum destination amount"
            );
            return PacketReply::reject(
                request.sequence,
                RejectCode::InsufficientDestinationAmount,
                Some(delivered),
            );
        }

        PacketReply::fulfill(request.sequence, delivered)
    }
}

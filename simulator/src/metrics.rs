//! Simulation metrics.

use std::collections::{BTreeMap, VecDeque};

use pathrate_common::{Amount, Rate};
use pathrate_protocol::{PacketReply, RejectCode};
use serde::Serialize;

/// Simulation metrics.
#[derive(Debug, Clone, Serialize)]
pub struct SimulationMetrics {
    /// Packets sent.
    pub total_packets: u64,
    /// Packets fulfilled.
    pub fulfilled_packets: u64,
    /// Packets rejected.
    pub rejected_packets: u64,
    /// Packets not sent because the minimum rate stopped holding.
    pub halted_packets: u64,
    /// Rejections by protocol code.
    pub rejects_by_code: BTreeMap<String, u64>,
    /// Source amount of fulfilled packets.
    pub amount_sent: Amount,
    /// Destination amount of fulfilled packets.
    pub amount_delivered: Amount,
    /// Round trip samples (ms).
    #[serde(skip)]
    latency_samples: VecDeque<u64>,
    /// Maximum samples to keep.
    #[serde(skip)]
    max_samples: usize,
}

impl SimulationMetrics {
    /// Create new metrics.
    pub fn new() -> Self {
        Self {
            total_packets: 0,
            fulfilled_packets: 0,
            rejected_packets: 0,
            halted_packets: 0,
            rejects_by_code: BTreeMap::new(),
            amount_sent: Amount::zero(),
            amount_delivered: Amount::zero(),
            latency_samples: VecDeque::with_capacity(10000),
            max_samples: 10000,
        }
    }

    /// Record a completed round trip.
    pub fn record(&mut self, source: &Amount, reply: &PacketReply, latency_ms: u64) {
        self.total_packets += 1;

        match (reply.reject_code(), &reply.destination_amount) {
            (None, Some(delivered)) => {
                self.fulfilled_packets += 1;
                self.amount_sent = &self.amount_sent + source;
                self.amount_delivered = &self.amount_delivered + delivered;
            }
            (None, None) => self.fulfilled_packets += 1,
            (Some(code), _) => self.record_reject(code),
        }

        if self.latency_samples.len() >= self.max_samples {
            self.latency_samples.pop_front();
        }
        self.latency_samples.push_back(latency_ms);
    }

    fn record_reject(&mut self, code: RejectCode) {
        self.rejected_packets += 1;
        *self.rejects_by_code.entry(code.to_string()).or_insert(0) += 1;
    }

    /// Record packets left unsent.
    pub fn record_halted(&mut self, count: u64) {
        self.halted_packets += count;
    }

    /// Rejections recorded for one code.
    pub fn rejects(&self, code: RejectCode) -> u64 {
        self.rejects_by_code.get(code.code()).copied().unwrap_or(0)
    }

    /// Get average latency in ms.
    pub fn average_latency_ms(&self) -> u64 {
        if self.latency_samples.is_empty() {
            return 0;
        }

        let sum: u64 = self.latency_samples.iter().sum();
        sum / self.latency_samples.len() as u64
    }

    /// Get p99 latency.
    pub fn p99_latency_ms(&self) -> u64 {
        if self.latency_samples.is_empty() {
            return 0;
        }

        let mut sorted: Vec<_> = self.latency_samples.iter().copied().collect();
        sorted.sort_unstable();

        let idx = (sorted.len() * 99 / 100).min(sorted.len() - 1);
        sorted[idx]
    }

    /// Get success rate.
    pub fn success_rate(&self) -> f64 {
        if self.total_packets == 0 {
            return 0.0;
        }

        self.fulfilled_packets as f64 / self.total_packets as f64
    }

    /// Realized rate over fulfilled packets.
    pub fn realized_rate(&self) -> Option<Rate> {
        Rate::from_transfer(&self.amount_delivered, &self.amount_sent)
    }
}

impl Default for SimulationMetrics {
    fn default() -> Self {
        Self::new()
    }
}

//! Exchange rate estimation from packet round trips.

use std::collections::HashMap;

use pathrate_common::{Amount, Rate};
use pathrate_protocol::{PacketReply, PacketRequest, RoundTrip};
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument, trace};

use crate::bound::{PacketBounds, RateBounds, Transition};

/// A low/high pair of amounts.
///
/// The meaning of each side depends on the query: see
/// [`RateEstimator::estimate_source_amount`] and
/// [`RateEstimator::estimate_destination_amount`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Estimate {
    pub low: Amount,
    pub high: Amount,
}

impl Estimate {
    /// Create an estimate.
    pub fn new(low: Amount, high: Amount) -> Self {
        Self { low, high }
    }

    /// An estimate with no uncertainty.
    pub fn exact(amount: Amount) -> Self {
        Self {
            low: amount.clone(),
            high: amount,
        }
    }

    /// Check if both sides agree.
    pub fn is_exact(&self) -> bool {
        self.low == self.high
    }
}

/// Counters describing what the estimator has seen.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EstimatorStats {
    /// Observations with a non-zero source amount.
    pub observations: u64,
    /// Zero-amount observations ignored.
    pub skipped_zero: u64,
    /// Times bounds were created from nothing.
    pub initializations: u64,
    /// Observations that strictly tightened at least one side.
    pub narrowings: u64,
    /// Times disjoint evidence replaced the bounds.
    pub resets: u64,
    /// Repeated source amounts that delivered a different amount.
    pub inconsistencies: u64,
}

/// Serializable view of the estimator state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EstimatorSnapshot {
    pub bounds: RateBounds,
    pub minimum_rate: Option<Rate>,
    pub cached_source_amounts: usize,
    pub cached_destination_amounts: usize,
    pub stats: EstimatorStats,
}

/// Infers the exchange rate of a path that floors amounts.
///
/// The estimator keeps an interval `[lower, upper)` that provably contains the
/// path rate as long as the rate does not change, plus exact caches of every
/// amount pair observed. It never assumes a better rate than the evidence
/// supports.
///
/// Mutation takes `&mut self`; share across tasks with
/// [`SharedRateEstimator`](crate::SharedRateEstimator).
#[derive(Debug, Clone, Default)]
pub struct RateEstimator {
    bounds: RateBounds,
    sent_amounts: HashMap<Amount, Amount>,
    received_amounts: HashMap<Amount, Amount>,
    pub(crate) min_rate: Option<Rate>,
    stats: EstimatorStats,
}

impl RateEstimator {
    /// Create an estimator with no evidence.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record that sending `sent` delivered `received`.
    #[instrument(level = "trace", skip_all, fields(sent = %sent, received = %received))]
    pub fn observe(&mut self, sent: &Amount, received: &Amount) {
        let Some(packet) = PacketBounds::new(sent, received) else {
            self.stats.skipped_zero += 1;
            trace!("Ignoring zero source amount");
            return;
        };
        self.stats.observations += 1;

        if let Some(previous) = self.sent_amounts.get(sent) {
            if previous != received {
                debug!(
                    sent = %sent,
                    previous = %previous,
                    received = %received,
                    "Inconsistent delivery for repeated amount, discarding bounds"
                );
                self.stats.inconsistencies += 1;
                self.bounds = RateBounds::NoBounds;
            }
        }

        self.sent_amounts.insert(sent.clone(), received.clone());
        self.received_amounts.insert(received.clone(), sent.clone());

        let (bounds, transition) = std::mem::take(&mut self.bounds).apply(packet);
        self.bounds = bounds;
        self.record(transition);
    }

    /// Update from a completed round trip.
    ///
    /// Only replies that report a destination amount carry rate evidence;
    /// returns whether an observation was made.
    pub fn apply_round_trip(&mut self, request: &PacketRequest, reply: Option<&PacketReply>) -> bool {
        match reply.and_then(|reply| reply.destination_amount.as_ref()) {
            Some(received) => {
                self.observe(&request.source_amount, received);
                true
            }
            None => false,
        }
    }

    /// Update from a paired [`RoundTrip`].
    pub fn apply(&mut self, round_trip: &RoundTrip) -> bool {
        self.apply_round_trip(&round_trip.request, round_trip.reply.as_ref())
    }

    /// Source amounts needed to deliver `target`.
    ///
    /// `low` is the smallest amount that might deliver `target` at the best
    /// rate still possible; `high` is the smallest amount guaranteed to
    /// deliver it. `None` until there are bounds, or when the lower bound was
    /// established by a packet that delivered nothing.
    pub fn estimate_source_amount(&self, target: &Amount) -> Option<Estimate> {
        let (lower, upper) = self.bounds.pair()?;
        let low_raw = upper.sent_for(target)?;
        let high_raw = lower.sent_for(target)?;

        if let Some(sent) = self.received_amounts.get(target) {
            trace!(target = %target, sent = %sent, "Source estimate from exact match");
            return Some(Estimate::exact(sent.clone()));
        }
        if target.is_zero() {
            return Some(Estimate::exact(Amount::zero()));
        }

        // The upper bound is exclusive: hitting it exactly still falls short
        let low = if low_raw.is_integer() {
            low_raw.floor() + Amount::one()
        } else {
            low_raw.ceil()
        };

        Some(Estimate::new(low, high_raw.ceil()))
    }

    /// Destination amounts delivered by sending `source`.
    ///
    /// `low` is guaranteed to arrive; `high` is the most that can arrive.
    /// `None` until there are bounds.
    pub fn estimate_destination_amount(&self, source: &Amount) -> Option<Estimate> {
        let (lower, upper) = self.bounds.pair()?;
        let low_raw = lower.received_for(source)?;
        let high_raw = upper.received_for(source)?;

        if let Some(received) = self.sent_amounts.get(source) {
            trace!(source = %source, received = %received, "Destination estimate from exact match");
            return Some(Estimate::exact(received.clone()));
        }

        let high = if high_raw.is_integer() {
            high_raw.floor().saturating_sub(&Amount::one())
        } else {
            high_raw.floor()
        };

        Some(Estimate::new(low_raw.floor(), high))
    }

    /// Exclusive upper bound on the path rate.
    pub fn rate_upper_bound(&self) -> Option<Rate> {
        self.bounds.upper().map(|bound| bound.rate.clone())
    }

    /// Inclusive lower bound on the path rate.
    pub fn rate_lower_bound(&self) -> Option<Rate> {
        self.bounds.lower().map(|bound| bound.rate.clone())
    }

    /// Copy of the current bounds.
    pub fn bounds(&self) -> RateBounds {
        self.bounds.clone()
    }

    /// Amount previously delivered by exactly `source`, if observed.
    pub fn cached_destination_amount(&self, source: &Amount) -> Option<Amount> {
        self.sent_amounts.get(source).cloned()
    }

    /// Amount previously sent to deliver exactly `target`, if observed.
    pub fn cached_source_amount(&self, target: &Amount) -> Option<Amount> {
        self.received_amounts.get(target).cloned()
    }

    /// Observation counters.
    pub fn stats(&self) -> EstimatorStats {
        self.stats.clone()
    }

    /// Serializable copy of the state, without the caches.
    pub fn snapshot(&self) -> EstimatorSnapshot {
        EstimatorSnapshot {
            bounds: self.bounds.clone(),
            minimum_rate: self.min_rate.clone(),
            cached_source_amounts: self.sent_amounts.len(),
            cached_destination_amounts: self.received_amounts.len(),
            stats: self.stats.clone(),
        }
    }

    fn record(&mut self, transition: Transition) {
        let Some((lower, upper)) = self
            .bounds
            .pair()
            .map(|(lower, upper)| (lower.rate.clone(), upper.rate.clone()))
        else {
            return;
        };

        match transition {
            Transition::Initialized => {
                self.stats.initializations += 1;
                debug!(lower = %lower, upper = %upper, "Initialized rate bounds");
            }
            Transition::Reset => {
                self.stats.resets += 1;
                debug!(lower = %lower, upper = %upper, "Rate moved outside bounds, reset");
            }
            Transition::Narrowed { lower: l, upper: u } if l || u => {
                self.stats.narrowings += 1;
                trace!(lower = %lower, upper = %upper, "Narrowed rate bounds");
            }
            Transition::Narrowed { .. } => {}
        }
    }
}

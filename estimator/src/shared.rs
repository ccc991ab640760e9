//! Thread-safe estimator handle.

use std::sync::Arc;

use parking_lot::Mutex;
use pathrate_common::{Amount, Rate, Slippage};
use pathrate_protocol::{PacketReply, PacketRequest, RoundTrip};

use crate::bound::RateBounds;
use crate::error::RateResult;
use crate::estimator::{Estimate, EstimatorSnapshot, EstimatorStats, RateEstimator};

/// Cloneable handle serializing access to one [`RateEstimator`].
///
/// Round trips that complete on different tasks must be applied one at a time
/// for the bounds to narrow monotonically; every method here takes the lock
/// for exactly one estimator call.
#[derive(Debug, Clone, Default)]
pub struct SharedRateEstimator {
    inner: Arc<Mutex<RateEstimator>>,
}

impl SharedRateEstimator {
    /// Create a handle around a fresh estimator.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one observation.
    pub fn observe(&self, sent: &Amount, received: &Amount) {
        self.inner.lock().observe(sent, received);
    }

    /// Update from a request and optional reply.
    pub fn apply_round_trip(&self, request: &PacketRequest, reply: Option<&PacketReply>) -> bool {
        self.inner.lock().apply_round_trip(request, reply)
    }

    /// Update from a paired round trip.
    pub fn apply(&self, round_trip: &RoundTrip) -> bool {
        self.inner.lock().apply(round_trip)
    }

    /// Source amounts needed to deliver `target`.
    pub fn estimate_source_amount(&self, target: &Amount) -> Option<Estimate> {
        self.inner.lock().estimate_source_amount(target)
    }

    /// Destination amounts delivered by sending `source`.
    pub fn estimate_destination_amount(&self, source: &Amount) -> Option<Estimate> {
        self.inner.lock().estimate_destination_amount(source)
    }

    /// Exclusive upper bound on the path rate.
    pub fn rate_upper_bound(&self) -> Option<Rate> {
        self.inner.lock().rate_upper_bound()
    }

    /// Inclusive lower bound on the path rate.
    pub fn rate_lower_bound(&self) -> Option<Rate> {
        self.inner.lock().rate_lower_bound()
    }

    /// Copy of the current bounds.
    pub fn bounds(&self) -> RateBounds {
        self.inner.lock().bounds()
    }

    /// Require at least `quoted * (1 - slippage)` from the path.
    pub fn set_minimum_rate(&self, quoted: &Rate, slippage: Slippage) -> RateResult<Rate> {
        self.inner.lock().set_minimum_rate(quoted, slippage)
    }

    /// The enforced minimum rate, if any.
    pub fn minimum_rate(&self) -> Option<Rate> {
        self.inner.lock().minimum_rate()
    }

    /// Smallest destination amount a packet of `source` must deliver.
    pub fn minimum_destination_amount(&self, source: &Amount) -> Amount {
        self.inner.lock().minimum_destination_amount(source)
    }

    /// Check the minimum rate still holds against current evidence.
    pub fn enforce_minimum_rate(&self) -> RateResult<()> {
        self.inner.lock().enforce_minimum_rate()
    }

    /// Observation counters.
    pub fn stats(&self) -> EstimatorStats {
        self.inner.lock().stats()
    }

    /// Serializable copy of the state.
    pub fn snapshot(&self) -> EstimatorSnapshot {
        self.inner.lock().snapshot()
    }

    /// Run several reads against one consistent state.
    pub fn with<R>(&self, f: impl FnOnce(&RateEstimator) -> R) -> R {
        f(&self.inner.lock())
    }
}

impl From<RateEstimator> for SharedRateEstimator {
    fn from(estimator: RateEstimator) -> Self {
        Self {
            inner: Arc::new(Mutex::new(estimator)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_clones_share_state() {
        let shared = SharedRateEstimator::new();
        let other = shared.clone();

        other.observe(&Amount::from(1000u64), &Amount::from(500u64));

        assert_eq!(
            shared.rate_lower_bound(),
            Some(Rate::new(Amount::from(1u64), Amount::from(2u64)).unwrap())
        );
    }

    #[test]
    fn test_concurrent_observations() {
        let shared = SharedRateEstimator::new();

        let handles: Vec<_> = (1..=8u64)
            .map(|worker| {
                let shared = shared.clone();
                thread::spawn(move || {
                    for i in 1..=50u64 {
                        let sent = worker * 1000 + i;
                        // Path at exactly 3/4
                        shared.observe(&Amount::from(sent), &Amount::from(sent * 3 / 4));
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let three_quarters = Rate::new(Amount::from(3u64), Amount::from(4u64)).unwrap();
        let (lower, upper) = shared.with(|estimator| {
            (estimator.rate_lower_bound(), estimator.rate_upper_bound())
        });

        assert!(lower.unwrap() <= three_quarters);
        assert!(three_quarters < upper.unwrap());
        assert_eq!(shared.stats().observations, 400);
        assert_eq!(shared.stats().resets, 0);
    }
}

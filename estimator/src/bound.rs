//! Rate bounds and their transitions.

use pathrate_common::{Amount, Rate};
use serde::{Deserialize, Serialize};

/// A rate bound together with the observation that established it.
///
/// `rate` always equals `reference_received / reference_sent`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoundRecord {
    /// Source amount of the establishing observation.
    pub reference_sent: Amount,
    /// Destination amount of the establishing observation.
    pub reference_received: Amount,
    /// The bounding rate.
    pub rate: Rate,
}

impl BoundRecord {
    /// Create a bound from a reference pair. `None` when nothing was sent.
    pub fn new(reference_sent: Amount, reference_received: Amount) -> Option<Self> {
        let rate = Rate::from_transfer(&reference_received, &reference_sent)?;
        Some(Self {
            reference_sent,
            reference_received,
            rate,
        })
    }

    /// Exact destination amount for `source` at this bound.
    pub fn received_for(&self, source: &Amount) -> Option<Rate> {
        Rate::new(source * &self.reference_received, self.reference_sent.clone()).ok()
    }

    /// Exact source amount needed to deliver `target` at this bound.
    ///
    /// `None` when the reference delivered nothing, since the rate gives no
    /// way back from the destination side.
    pub fn sent_for(&self, target: &Amount) -> Option<Rate> {
        Rate::new(target * &self.reference_sent, self.reference_received.clone()).ok()
    }
}

/// The rate interval implied by one packet.
///
/// Intermediaries floor every amount they forward, so an observation of
/// `received` for `sent` means `received <= sent * r < received + 1`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PacketBounds {
    /// Inclusive: `received / sent`.
    pub lower: BoundRecord,
    /// Exclusive: `(received + 1) / sent`.
    pub upper: BoundRecord,
}

impl PacketBounds {
    /// Bounds for a single observation. `None` for a zero source amount.
    pub fn new(sent: &Amount, received: &Amount) -> Option<Self> {
        // Both quotients are exact, so rounding the lower bound up (to keep the
        // overlap comparisons on the same side as the upper) changes nothing.
        let lower = BoundRecord::new(sent.clone(), received.clone())?;
        let upper = BoundRecord::new(sent.clone(), received + &Amount::one())?;
        Some(Self { lower, upper })
    }
}

impl From<PacketBounds> for RateBounds {
    fn from(packet: PacketBounds) -> Self {
        RateBounds::Bounds {
            lower: packet.lower,
            upper: packet.upper,
        }
    }
}

/// What an observation did to the interval.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// First evidence; bounds created from the packet.
    Initialized,
    /// Packet did not overlap the interval; bounds replaced by the packet's.
    Reset,
    /// Packet overlapped; each flag is set if that side strictly tightened.
    Narrowed { lower: bool, upper: bool },
}

/// The estimator's knowledge of the path rate.
///
/// Both sides exist together or not at all. When present the true rate lies
/// in `[lower.rate, upper.rate)`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum RateBounds {
    /// Nothing observed yet, or the last evidence was discarded.
    #[default]
    NoBounds,
    /// Current interval.
    Bounds {
        lower: BoundRecord,
        upper: BoundRecord,
    },
}

impl RateBounds {
    /// Inclusive lower bound.
    pub fn lower(&self) -> Option<&BoundRecord> {
        match self {
            RateBounds::NoBounds => None,
            RateBounds::Bounds { lower, .. } => Some(lower),
        }
    }

    /// Exclusive upper bound.
    pub fn upper(&self) -> Option<&BoundRecord> {
        match self {
            RateBounds::NoBounds => None,
            RateBounds::Bounds { upper, .. } => Some(upper),
        }
    }

    /// Both sides, if present.
    pub fn pair(&self) -> Option<(&BoundRecord, &BoundRecord)> {
        match self {
            RateBounds::NoBounds => None,
            RateBounds::Bounds { lower, upper } => Some((lower, upper)),
        }
    }

    /// Check if no bounds are known.
    pub fn is_empty(&self) -> bool {
        matches!(self, RateBounds::NoBounds)
    }

    /// Check if `rate` lies in `[lower, upper)`.
    pub fn contains(&self, rate: &Rate) -> bool {
        match self {
            RateBounds::NoBounds => false,
            RateBounds::Bounds { lower, upper } => lower.rate <= *rate && *rate < upper.rate,
        }
    }

    /// Check if a packet's interval shares no rate with this one.
    pub fn is_disjoint(&self, packet: &PacketBounds) -> bool {
        match self {
            RateBounds::NoBounds => false,
            RateBounds::Bounds { lower, upper } => {
                packet.upper.rate < lower.rate || packet.lower.rate >= upper.rate
            }
        }
    }

    /// Fold one packet's interval into the current bounds.
    ///
    /// Overlapping evidence can only shrink the interval. Disjoint evidence
    /// means the path rate moved, and both sides are replaced together.
    pub fn apply(self, packet: PacketBounds) -> (RateBounds, Transition) {
        if self.is_disjoint(&packet) {
            return (packet.into(), Transition::Reset);
        }

        match self {
            RateBounds::NoBounds => (packet.into(), Transition::Initialized),
            RateBounds::Bounds { lower, upper } => {
                let upper_tightened = packet.upper.rate < upper.rate;
                let lower_tightened = packet.lower.rate > lower.rate;

                let upper = if upper.rate < packet.upper.rate {
                    upper
                } else {
                    packet.upper
                };
                let lower = if lower.rate > packet.lower.rate {
                    lower
                } else {
                    packet.lower
                };

                (
                    RateBounds::Bounds { lower, upper },
                    Transition::Narrowed {
                        lower: lower_tightened,
                        upper: upper_tightened,
                    },
                )
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn amount(value: u64) -> Amount {
        Amount::from(value)
    }

    fn rate(numer: u64, denom: u64) -> Rate {
        Rate::new(amount(numer), amount(denom)).unwrap()
    }

    fn packet(sent: u64, received: u64) -> PacketBounds {
        PacketBounds::new(&amount(sent), &amount(received)).unwrap()
    }

    #[test]
    fn test_packet_bounds() {
        let p = packet(1000, 500);

        assert_eq!(p.lower.rate, rate(1, 2));
        assert_eq!(p.upper.rate, rate(501, 1000));
        assert_eq!(p.upper.reference_sent, amount(1000));
        assert_eq!(p.upper.reference_received, amount(501));
    }

    #[test]
    fn test_zero_source_has_no_bounds() {
        assert!(PacketBounds::new(&amount(0), &amount(5)).is_none());
        assert!(BoundRecord::new(amount(0), amount(0)).is_none());
    }

    #[test]
    fn test_initialize_from_empty() {
        let (bounds, transition) = RateBounds::NoBounds.apply(packet(100, 50));

        assert_eq!(transition, Transition::Initialized);
        assert_eq!(bounds.lower().unwrap().rate, rate(1, 2));
        assert_eq!(bounds.upper().unwrap().rate, rate(51, 100));
        assert!(bounds.contains(&rate(1, 2)));
        assert!(!bounds.contains(&rate(51, 100)));
    }

    #[test]
    fn test_narrow_keeps_tighter_sides() {
        let (bounds, _) = RateBounds::NoBounds.apply(packet(100, 50));
        let (bounds, transition) = bounds.apply(packet(1000, 503));

        // 503/1000 raises the floor, 504/1000 lowers the 51/100 ceiling
        assert_eq!(
            transition,
            Transition::Narrowed {
                lower: true,
                upper: true
            }
        );
        assert_eq!(bounds.lower().unwrap().rate, rate(503, 1000));
        assert_eq!(bounds.upper().unwrap().rate, rate(504, 1000));

        // A coarse packet adds nothing
        let (bounds, transition) = bounds.apply(packet(10, 5));
        assert_eq!(
            transition,
            Transition::Narrowed {
                lower: false,
                upper: false
            }
        );
        assert_eq!(bounds.lower().unwrap().reference_sent, amount(1000));
        assert_eq!(bounds.upper().unwrap().reference_sent, amount(1000));
    }

    #[test]
    fn test_disjoint_resets_both() {
        let (bounds, _) = RateBounds::NoBounds.apply(packet(100, 50));
        let incoming = packet(200, 20);

        assert!(bounds.is_disjoint(&incoming));

        let (bounds, transition) = bounds.apply(incoming);
        assert_eq!(transition, Transition::Reset);
        assert_eq!(bounds.lower().unwrap().rate, rate(1, 10));
        assert_eq!(bounds.upper().unwrap().rate, rate(21, 200));
    }

    #[test]
    fn test_touching_upper_is_disjoint() {
        // Packet lower bound equal to the exclusive ceiling cannot overlap
        let (bounds, _) = RateBounds::NoBounds.apply(packet(100, 50));
        assert!(bounds.is_disjoint(&packet(100, 51)));
    }

    #[test]
    fn test_serialize_tagged() {
        let json = serde_json::to_string(&RateBounds::NoBounds).unwrap();
        assert_eq!(json, r#"{"state":"no_bounds"}"#);

        let (bounds, _) = RateBounds::NoBounds.apply(packet(4, 3));
        let json = serde_json::to_string(&bounds).unwrap();
        let back: RateBounds = serde_json::from_str(&json).unwrap();
        assert_eq!(back, bounds);
    }
}

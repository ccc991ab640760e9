//! Pathrate Estimator
//!
//! Infers the exchange rate of a payment path from packet round trips.
//!
//! Intermediaries floor every amount they forward, so no single packet
//! reveals the rate. Each delivered packet instead proves the rate lies in a
//! small interval; the estimator intersects those intervals, answers sizing
//! questions conservatively, and enforces a minimum acceptable rate.
//!
//! # Example
//!
//! ```rust
//! use pathrate_common::{Amount, Rate, Slippage};
//! use pathrate_estimator::RateEstimator;
//!
//! let mut estimator = RateEstimator::new();
//! estimator.observe(&Amount::from(1000u64), &Amount::from(500u64));
//! estimator.observe(&Amount::from(2000u64), &Amount::from(1000u64));
//!
//! let estimate = estimator
//!     .estimate_destination_amount(&Amount::from(1500u64))
//!     .unwrap();
//! assert_eq!(estimate.low, Amount::from(750u64));
//!
//! let quoted: Rate = "1/2".parse().unwrap();
//! estimator.set_minimum_rate(&quoted, Slippage::ZERO).unwrap();
//! ```

pub mod bound;
pub mod estimator;
pub mod policy;
pub mod shared;
pub mod error;

pub use bound::{BoundRecord, PacketBounds, RateBounds, Transition};
pub use estimator::{Estimate, EstimatorSnapshot, EstimatorStats, RateEstimator};
pub use shared::SharedRateEstimator;
pub use error::{RateError, RateResult};

//! Pathrate Common Types
//!
//! Exact numeric primitives shared across the pathrate crates: packet
//! amounts, exchange rates and the validated slippage tolerance.
//!
//! Nothing in this crate touches floating point except the explicit
//! [`Slippage::from_f64`] constructor, which converts to an exact decimal
//! before the value is ever used in arithmetic.

pub mod amount;
pub mod rate;
pub mod slippage;
pub mod error;

pub use amount::*;
pub use rate::*;
pub use slippage::*;
pub use error::*;

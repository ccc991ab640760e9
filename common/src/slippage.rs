//! Slippage tolerance.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::NumericError;
use crate::rate::Rate;

/// A fraction in `[0, 1]` of a quoted rate that a sender is willing to lose.
///
/// Construction is the only place the range is checked; a `Slippage` value is
/// always valid once it exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "Decimal", into = "Decimal")]
pub struct Slippage(Decimal);

impl Slippage {
    /// No tolerance at all.
    pub const ZERO: Slippage = Slippage(Decimal::ZERO);

    /// Full tolerance: any rate is acceptable.
    pub const ONE: Slippage = Slippage(Decimal::ONE);

    /// Create a slippage from an exact decimal.
    pub fn new(value: Decimal) -> Result<Self, NumericError> {
        if value < Decimal::ZERO || value > Decimal::ONE {
            return Err(NumericError::InvalidSlippage(value.to_string()));
        }
        Ok(Self(value.normalize()))
    }

    /// Create a slippage from a float. NaN and infinities are rejected.
    pub fn from_f64(value: f64) -> Result<Self, NumericError> {
        if value.is_nan() {
            return Err(NumericError::InvalidSlippage("NaN".to_string()));
        }
        let decimal = Decimal::try_from(value)
            .map_err(|_| NumericError::InvalidSlippage(value.to_string()))?;
        Self::new(decimal)
    }

    /// The underlying decimal.
    pub fn value(&self) -> Decimal {
        self.0
    }

    /// Check if this is zero tolerance.
    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    /// Check if this is full tolerance.
    pub fn is_one(&self) -> bool {
        self.0 == Decimal::ONE
    }

    /// The fraction of a quoted rate that must be kept: `1 - slippage`.
    pub fn retained(&self) -> Rate {
        let slippage = Rate::from_decimal(self.0).unwrap_or_default();
        Rate::one().checked_sub(&slippage).unwrap_or_default()
    }

    /// Apply to a quoted rate, giving the lowest acceptable rate.
    pub fn apply(&self, quoted: &Rate) -> Rate {
        quoted * &self.retained()
    }
}

impl Default for Slippage {
    fn default() -> Self {
        Self::ZERO
    }
}

impl TryFrom<Decimal> for Slippage {
    type Error = NumericError;

    fn try_from(value: Decimal) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Slippage> for Decimal {
    fn from(slippage: Slippage) -> Self {
        slippage.0
    }
}

impl fmt::Display for Slippage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

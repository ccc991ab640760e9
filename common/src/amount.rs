//! Packet amounts.

use num_bigint::BigUint;
use num_traits::{One, ToPrimitive, Zero};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::iter::Sum;
use std::ops::{Add, Mul};
use std::str::FromStr;

use crate::error::NumericError;

/// A non-negative, arbitrary-precision packet amount.
///
/// Amounts are denominated in the smallest unit of whatever asset the packet
/// carries. They cannot overflow and cannot go negative: subtraction is only
/// available as [`Amount::checked_sub`] or [`Amount::saturating_sub`].
///
/// Serialized as a decimal string so that values beyond `u64` survive JSON.
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct Amount(BigUint);

impl Amount {
    /// Create an amount from a big unsigned integer.
    pub fn new(value: BigUint) -> Self {
        Self(value)
    }

    /// The zero amount.
    pub fn zero() -> Self {
        Self(BigUint::zero())
    }

    /// The amount one.
    pub fn one() -> Self {
        Self(BigUint::one())
    }

    /// Check if the amount is zero.
    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    /// Borrow the underlying integer.
    pub fn as_biguint(&self) -> &BigUint {
        &self.0
    }

    /// Consume into the underlying integer.
    pub fn into_biguint(self) -> BigUint {
        self.0
    }

    /// Subtract, returning `None` if the result would be negative.
    pub fn checked_sub(&self, other: &Amount) -> Option<Amount> {
        if other.0 > self.0 {
            None
        } else {
            Some(Self(&self.0 - &other.0))
        }
    }

    /// Subtract, clamping at zero.
    pub fn saturating_sub(&self, other: &Amount) -> Amount {
        self.checked_sub(other).unwrap_or_default()
    }

    /// Integer division rounding down. `None` when dividing by zero.
    pub fn div_floor(&self, divisor: &Amount) -> Option<Amount> {
        if divisor.is_zero() {
            return None;
        }
        Some(Self(&self.0 / &divisor.0))
    }

    /// Integer division rounding up. `None` when dividing by zero.
    pub fn div_ceil(&self, divisor: &Amount) -> Option<Amount> {
        if divisor.is_zero() {
            return None;
        }
        let quotient = &self.0 / &divisor.0;
        if (&quotient * &divisor.0) == self.0 {
            Some(Self(quotient))
        } else {
            Some(Self(quotient + 1u32))
        }
    }

    /// Convert to `u64` if it fits.
    pub fn to_u64(&self) -> Option<u64> {
        self.0.to_u64()
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for Amount {
    type Err = NumericError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed.starts_with('-') {
            return Err(NumericError::Negative(trimmed.to_string()));
        }
        BigUint::from_str(trimmed)
            .map(Self)
            .map_err(|_| NumericError::Parse {
                kind: "amount",
                input: s.to_string(),
            })
    }
}

impl From<Amount> for String {
    fn from(amount: Amount) -> Self {
        amount.to_string()
    }
}

impl TryFrom<String> for Amount {
    type Error = NumericError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<BigUint> for Amount {
    fn from(value: BigUint) -> Self {
        Self(value)
    }
}

impl From<u64> for Amount {
    fn from(value: u64) -> Self {
        Self(BigUint::from(value))
    }
}

impl From<u32> for Amount {
    fn from(value: u32) -> Self {
        Self(BigUint::from(value))
    }
}

impl From<u128> for Amount {
    fn from(value: u128) -> Self {
        Self(BigUint::from(value))
    }
}

impl Add for Amount {
    type Output = Amount;

    fn add(self, other: Amount) -> Self::Output {
        Amount(self.0 + other.0)
    }
}

impl<'a> Add<&'a Amount> for &'a Amount {
    type Output = Amount;

    fn add(self, other: &'a Amount) -> Self::Output {
        Amount(&self.0 + &other.0)
    }
}

impl Mul for Amount {
    type Output = Amount;

    fn mul(self, other: Amount) -> Self::Output {
        Amount(self.0 * other.0)
    }
}

impl<'a> Mul<&'a Amount> for &'a Amount {
    type Output = Amount;

    fn mul(self, other: &'a Amount) -> Self::Output {
        Amount(&self.0 * &other.0)
    }
}

impl Sum for Amount {
    fn sum<I: Iterator<Item = Amount>>(iter: I) -> Self {
        iter.fold(Amount::zero(), Add::add)
    }
}

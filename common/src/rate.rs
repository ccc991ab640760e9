//! Exact exchange rates.

use num_bigint::BigUint;
use num_rational::Ratio;
use num_traits::{One, ToPrimitive, Zero};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::ops::{Div, Mul};
use std::str::FromStr;

use crate::amount::Amount;
use crate::error::NumericError;

/// Rounding mode used when a rate-derived value is turned back into an amount.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Rounding {
    /// Round toward zero.
    Floor,
    /// Round away from zero.
    Ceiling,
    /// Round to the nearest integer, ties away from zero.
    HalfUp,
}

/// A non-negative exchange rate, stored as an exact reduced fraction.
///
/// A rate of `received / sent` answers "how many destination units arrive per
/// source unit". All arithmetic is exact; converting back to an [`Amount`]
/// always goes through an explicit [`Rounding`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct Rate(Ratio<BigUint>);

impl Rate {
    /// Create the rate `numerator / denominator`.
    pub fn new(numerator: Amount, denominator: Amount) -> Result<Self, NumericError> {
        if denominator.is_zero() {
            return Err(NumericError::ZeroDenominator);
        }
        Ok(Self(Ratio::new(
            numerator.into_biguint(),
            denominator.into_biguint(),
        )))
    }

    /// The rate `received / sent` implied by a single transfer.
    ///
    /// `None` when nothing was sent.
    pub fn from_transfer(received: &Amount, sent: &Amount) -> Option<Self> {
        Self::new(received.clone(), sent.clone()).ok()
    }

    /// A whole-number rate.
    pub fn from_integer(value: Amount) -> Self {
        Self(Ratio::from_integer(value.into_biguint()))
    }

    /// The zero rate.
    pub fn zero() -> Self {
        Self(Ratio::zero())
    }

    /// The rate one.
    pub fn one() -> Self {
        Self(Ratio::one())
    }

    /// Build a rate from a decimal. Negative decimals are rejected.
    pub fn from_decimal(value: Decimal) -> Result<Self, NumericError> {
        if value.is_sign_negative() && !value.is_zero() {
            return Err(NumericError::Negative(value.to_string()));
        }
        let mantissa = value.mantissa().unsigned_abs();
        let scale = BigUint::from(10u32).pow(value.scale());
        Ok(Self(Ratio::new(BigUint::from(mantissa), scale)))
    }

    /// Truncate to a decimal with `decimal_places` fractional digits.
    ///
    /// Intended for display and reporting only. Returns `None` when the value
    /// does not fit a [`Decimal`].
    pub fn to_decimal(&self, decimal_places: u32) -> Option<Decimal> {
        let places = decimal_places.min(28);
        let scaled = self.0.numer() * BigUint::from(10u32).pow(places) / self.0.denom();
        let mantissa = scaled.to_i128()?;
        Decimal::try_from_i128_with_scale(mantissa, places).ok()
    }

    /// The numerator of the reduced fraction.
    pub fn numerator(&self) -> Amount {
        Amount::new(self.0.numer().clone())
    }

    /// The denominator of the reduced fraction.
    pub fn denominator(&self) -> Amount {
        Amount::new(self.0.denom().clone())
    }

    /// Check if the rate is zero.
    pub fn is_zero(&self) -> bool {
        self.0.numer().is_zero()
    }

    /// Check if the rate is a whole number.
    pub fn is_integer(&self) -> bool {
        self.0.denom().is_one()
    }

    /// The inverse rate, or `None` for zero.
    pub fn reciprocal(&self) -> Option<Rate> {
        if self.is_zero() {
            return None;
        }
        Some(Self(Ratio::new(
            self.0.denom().clone(),
            self.0.numer().clone(),
        )))
    }

    /// Subtract, returning `None` if the result would be negative.
    pub fn checked_sub(&self, other: &Rate) -> Option<Rate> {
        if other.0 > self.0 {
            None
        } else {
            Some(Self(&self.0 - &other.0))
        }
    }

    /// Round down to an amount.
    pub fn floor(&self) -> Amount {
        Amount::new(self.0.numer() / self.0.denom())
    }

    /// Round up to an amount.
    pub fn ceil(&self) -> Amount {
        let numer = self.0.numer();
        let denom = self.0.denom();
        Amount::new((numer + denom - 1u32) / denom)
    }

    /// Round to the nearest amount, ties rounding up.
    pub fn round_half_up(&self) -> Amount {
        let numer = self.0.numer() * 2u32 + self.0.denom();
        let denom = self.0.denom() * 2u32;
        Amount::new(numer / denom)
    }

    /// Round to an amount with the given mode.
    pub fn round(&self, rounding: Rounding) -> Amount {
        match rounding {
            Rounding::Floor => self.floor(),
            Rounding::Ceiling => self.ceil(),
            Rounding::HalfUp => self.round_half_up(),
        }
    }

    /// Multiply an amount by this rate and round the product.
    pub fn mul_amount(&self, amount: &Amount, rounding: Rounding) -> Amount {
        (self * amount).round(rounding)
    }
}

impl Default for Rate {
    fn default() -> Self {
        Self::zero()
    }
}

impl PartialOrd for Rate {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Rate {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.cmp(&other.0)
    }
}

impl<'a> Mul<&'a Rate> for &'a Rate {
    type Output = Rate;

    fn mul(self, other: &'a Rate) -> Self::Output {
        Rate(&self.0 * &other.0)
    }
}

impl Mul for Rate {
    type Output = Rate;

    fn mul(self, other: Rate) -> Self::Output {
        Rate(self.0 * other.0)
    }
}

impl<'a> Mul<&'a Amount> for &'a Rate {
    type Output = Rate;

    fn mul(self, amount: &'a Amount) -> Self::Output {
        Rate(&self.0 * Ratio::from_integer(amount.as_biguint().clone()))
    }
}

impl<'a> Div<&'a Amount> for &'a Rate {
    type Output = Option<Rate>;

    /// Divide by an amount; `None` when the amount is zero.
    fn div(self, amount: &'a Amount) -> Self::Output {
        if amount.is_zero() {
            return None;
        }
        Some(Rate(&self.0 / Ratio::from_integer(amount.as_biguint().clone())))
    }
}

impl fmt::Display for Rate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_integer() {
            write!(f, "{}", self.0.numer())
        } else {
            write!(f, "{}/{}", self.0.numer(), self.0.denom())
        }
    }
}

impl FromStr for Rate {
    type Err = NumericError;

    /// Parses `"n/d"`, an integer, or a decimal such as `"0.925"`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if let Some((numer, denom)) = trimmed.split_once('/') {
            return Rate::new(numer.parse()?, denom.parse()?);
        }
        if trimmed.contains('.') {
            let decimal = Decimal::from_str_exact(trimmed).map_err(|_| NumericError::Parse {
                kind: "rate",
                input: s.to_string(),
            })?;
            return Rate::from_decimal(decimal);
        }
        trimmed.parse::<Amount>().map(Rate::from_integer)
    }
}

impl From<Rate> for String {
    fn from(rate: Rate) -> Self {
        rate.to_string()
    }
}

impl TryFrom<String> for Rate {
    type Error = NumericError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

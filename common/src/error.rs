//! Error types for numeric primitives.

use thiserror::Error;

/// Errors raised while constructing amounts, rates or slippage values.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum NumericError {
    /// A value that must be non-negative was negative.
    #[error("Negative value not allowed: {0}")]
    Negative(String),

    /// A rate was built with a zero denominator.
    #[error("Zero denominator")]
    ZeroDenominator,

    /// Slippage outside of [0, 1], or not a number.
    #[error("Invalid slippage: {0}")]
    InvalidSlippage(String),

    /// Text could not be parsed as an amount or rate.
    #[error("Failed to parse {kind} from {input:?}")]
    Parse { kind: &'static str, input: String },
}

/// Result type alias for numeric construction.
pub type Result<T> = std::result::Result<T, NumericError>;

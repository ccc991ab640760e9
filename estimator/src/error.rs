//! Rate estimator error types.

use pathrate_common::Rate;
use thiserror::Error;

/// Errors that can occur when enforcing rate policy.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RateError {
    /// The rate proven so far is below the minimum the caller requires.
    ///
    /// `lower_bound` is zero when no rate has been proven yet.
    #[error("Insufficient exchange rate: minimum {minimum}, proven lower bound {lower_bound}")]
    InsufficientExchangeRate { minimum: Rate, lower_bound: Rate },
}

/// Result type for rate policy operations.
pub type RateResult<T> = Result<T, RateError>;

//! Minimum exchange rate policy.

use pathrate_common::{Amount, Rate, Rounding, Slippage};
use tracing::{debug, info, instrument, warn};

use crate::error::{RateError, RateResult};
use crate::estimator::RateEstimator;

impl RateEstimator {
    /// Require at least `quoted * (1 - slippage)` from the path.
    ///
    /// The floor is only accepted if the rate already proven is at least as
    /// good; otherwise the state is left untouched and
    /// [`RateError::InsufficientExchangeRate`] is returned. Full slippage or a
    /// zero quote clear the minimum and yield a zero rate.
    #[instrument(skip_all, fields(quoted = %quoted, slippage = %slippage))]
    pub fn set_minimum_rate(&mut self, quoted: &Rate, slippage: Slippage) -> RateResult<Rate> {
        if slippage.is_one() || quoted.is_zero() {
            debug!("No minimum exchange rate enforced");
            self.min_rate = None;
            return Ok(Rate::zero());
        }

        let minimum = slippage.apply(quoted);
        let lower_bound = self.rate_lower_bound().unwrap_or_default();

        if lower_bound < minimum {
            warn!(
                minimum = %minimum,
                lower_bound = %lower_bound,
                "Proven rate is below required minimum"
            );
            return Err(RateError::InsufficientExchangeRate {
                minimum,
                lower_bound,
            });
        }

        info!(minimum = %minimum, lower_bound = %lower_bound, "Minimum exchange rate set");
        self.min_rate = Some(minimum.clone());
        Ok(minimum)
    }

    /// The enforced minimum rate, if any.
    pub fn minimum_rate(&self) -> Option<Rate> {
        self.min_rate.clone()
    }

    /// Drop the enforced minimum rate.
    pub fn clear_minimum_rate(&mut self) {
        self.min_rate = None;
    }

    /// Smallest destination amount a packet of `source` must deliver to honor
    /// the minimum rate. Zero when no minimum is set.
    pub fn minimum_destination_amount(&self, source: &Amount) -> Amount {
        match &self.min_rate {
            Some(minimum) => minimum.mul_amount(source, Rounding::Ceiling),
            None => Amount::zero(),
        }
    }

    /// Check the minimum rate still holds against current evidence.
    ///
    /// Bounds can reset to a worse rate after the minimum was accepted; a
    /// caller should stop sending once this fails.
    pub fn enforce_minimum_rate(&self) -> RateResult<()> {
        let Some(minimum) = &self.min_rate else {
            return Ok(());
        };
        let lower_bound = self.rate_lower_bound().unwrap_or_default();

        if lower_bound < *minimum {
            return Err(RateError::InsufficientExchangeRate {
                minimum: minimum.clone(),
                lower_bound,
            });
        }
        Ok(())
    }
}

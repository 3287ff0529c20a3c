//! Single-sided redemption rates
//!
//! After settlement the contract publishes, per side, a rational rate
//! `numerator / denominator` of USDC per token. The pair is kept exact and
//! only collapsed by [`apply_rate`](crate::math::apply_rate).

use crate::math::apply_rate;
use crate::{MarketError, Result};

/// Exact redemption rate; the denominator is always non-zero
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rate {
    numerator: u128,
    denominator: u128,
}

impl Rate {
    pub fn numerator(&self) -> u128 {
        self.numerator
    }

    pub fn denominator(&self) -> u128 {
        self.denominator
    }

    pub fn apply(&self, amount: u128) -> Result<u128> {
        apply_rate(amount, self.numerator, self.denominator)
    }

    /// Rate as a float, for display only
    pub fn as_f64(&self) -> f64 {
        self.numerator as f64 / self.denominator as f64
    }
}

/// `None` until the contract has published a denominator
pub fn resolve_rate(numerator: u128, denominator: u128) -> Option<Rate> {
    if denominator == 0 {
        None
    } else {
        Some(Rate {
            numerator,
            denominator,
        })
    }
}

/// Projected payout for a holder
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayoutEstimate {
    /// Total payout in USDC micro units
    Determined(u128),
    /// A held side has no published rate yet
    Undetermined,
}

impl PayoutEstimate {
    pub fn amount(&self) -> Option<u128> {
        match self {
            PayoutEstimate::Determined(amount) => Some(*amount),
            PayoutEstimate::Undetermined => None,
        }
    }
}

/// Sum both redemption legs.
///
/// A leg with zero balance contributes nothing whatever its rate; a leg
/// with a balance but no rate makes the whole estimate `Undetermined`.
pub fn estimate_payout(
    long_balance: u128,
    long_rate: Option<Rate>,
    short_balance: u128,
    short_rate: Option<Rate>,
) -> Result<PayoutEstimate> {
    let leg = |balance: u128, rate: Option<Rate>| -> Result<Option<u128>> {
        match (balance, rate) {
            (0, _) => Ok(Some(0)),
            (_, None) => Ok(None),
            (b, Some(r)) => r.apply(b).map(Some),
        }
    };

    let (Some(long), Some(short)) = (leg(long_balance, long_rate)?, leg(short_balance, short_rate)?)
    else {
        return Ok(PayoutEstimate::Undetermined);
    };

    long.checked_add(short)
        .map(PayoutEstimate::Determined)
        .ok_or(MarketError::InvalidInput)
}

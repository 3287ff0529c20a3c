//! Mirrored market state
//!
//! Plain data copied out of the authoritative market. The keeper replaces
//! these wholesale on every refresh; nothing here is mutated in place.

use crate::redemption::{resolve_rate, Rate};
use crate::{MarketError, Phase, Result, BPS_SCALE};

/// Long or short leg of the market
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Side {
    Long,
    Short,
}

/// Snapshot of the authoritative market contract
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MarketState {
    pub phase: Phase,
    /// Unix seconds after which the market stops accepting mints
    pub close_at: u64,
    pub mint_fee_bps: u64,
    pub pair_redeem_fee_bps: u64,
    /// USDC held by the vault (6 decimals)
    pub vault_balance_micro: u128,
    pub long_pot_micro: u128,
    pub short_pot_micro: u128,
    pub long_redeem_numerator: u128,
    pub long_redeem_denominator: u128,
    pub short_redeem_numerator: u128,
    pub short_redeem_denominator: u128,
    pub long_token: [u8; 20],
    pub short_token: [u8; 20],
}

impl MarketState {
    /// Check the field-level invariants of a freshly read state.
    ///
    /// Fees must lie in [0, 10_000] bps and each redemption pair must be
    /// either all-zero or carry a positive denominator.
    pub fn validate(&self) -> Result<()> {
        if self.mint_fee_bps > BPS_SCALE || self.pair_redeem_fee_bps > BPS_SCALE {
            return Err(MarketError::InvalidInput);
        }
        let pair_ok = |num: u128, den: u128| den > 0 || num == 0;
        if !pair_ok(self.long_redeem_numerator, self.long_redeem_denominator)
            || !pair_ok(self.short_redeem_numerator, self.short_redeem_denominator)
        {
            return Err(MarketError::InvalidInput);
        }
        Ok(())
    }

    pub fn redeem_rate(&self, side: Side) -> Option<Rate> {
        match side {
            Side::Long => resolve_rate(self.long_redeem_numerator, self.long_redeem_denominator),
            Side::Short => resolve_rate(self.short_redeem_numerator, self.short_redeem_denominator),
        }
    }
}

/// GDP oracle reading
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct OracleReading {
    /// GDP delta in parts per million (1_000_000 = 100%)
    pub g_ppm: i64,
    pub finalized: bool,
}

impl OracleReading {
    /// Whether `self` is a legal successor of `previous`.
    ///
    /// Finalization happens once; after it the delta never changes.
    pub fn can_follow(&self, previous: &OracleReading) -> bool {
        if previous.finalized {
            self.finalized && self.g_ppm == previous.g_ppm
        } else {
            true
        }
    }
}

/// Balances of one holder
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Position {
    /// Long token balance (18 decimals)
    pub long_balance: u128,
    /// Short token balance (18 decimals)
    pub short_balance: u128,
    /// USDC balance (6 decimals)
    pub usdc_balance: u128,
}

impl Position {
    pub fn balance(&self, side: Side) -> u128 {
        match side {
            Side::Long => self.long_balance,
            Side::Short => self.short_balance,
        }
    }
}

/// Leverage constant fixed at market deployment
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LeverageConfig {
    pub k: u64,
}

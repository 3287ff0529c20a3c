//! Settlement split simulation
//!
//! The vault is split between the two sides by
//!
//! ```text
//! long_share  = clamp(1/2 + 1/2 * k * g, 0, 1)
//! short_share = 1 - long_share
//! ```
//!
//! with `g` the GDP surprise. Here `g` arrives in ppm and shares are
//! 1e18-scaled, so the projection for the finalized reading lands on the
//! same integers the contract settles with.

use crate::math::mul_div_floor;
use crate::redemption::{resolve_rate, Rate};
use crate::{MarketError, Result, PPM_SCALE, WAD};

/// Projected division of the vault
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SettlementSplit {
    /// Long share of the vault, 1e18 = 100%
    pub long_share_wad: u128,
    pub short_share_wad: u128,
    /// USDC assigned to the long side (6 decimals)
    pub long_pot: u128,
    pub short_pot: u128,
}

impl SettlementSplit {
    /// Long share in percent, for display only
    pub fn long_share_percent(&self) -> f64 {
        self.long_share_wad as f64 / 1e16
    }

    /// Short share in percent, for display only
    pub fn short_share_percent(&self) -> f64 {
        self.short_share_wad as f64 / 1e16
    }
}

/// `clamp(WAD/2 + (WAD/2) * k * g_ppm / 1e6, 0, WAD)`, truncating toward zero.
pub fn long_share_wad(k: u64, g_ppm: i64) -> u128 {
    let half = (WAD / 2) as i128;
    // Saturation only happens far outside [0, WAD], where the clamp wins anyway
    let delta = half
        .saturating_mul(k as i128)
        .saturating_mul(g_ppm as i128)
        / PPM_SCALE;
    let long = half.saturating_add(delta).clamp(0, WAD as i128);
    long as u128
}

/// Split `vault_micro` for a leverage `k` and GDP delta `g_ppm`.
pub fn simulate_split(vault_micro: u128, k: u64, g_ppm: i64) -> Result<SettlementSplit> {
    let long_share_wad = long_share_wad(k, g_ppm);
    let long_pot = mul_div_floor(vault_micro, long_share_wad, WAD)?;
    Ok(SettlementSplit {
        long_share_wad,
        short_share_wad: WAD - long_share_wad,
        long_pot,
        short_pot: vault_micro
            .checked_sub(long_pot)
            .ok_or(MarketError::InvalidInput)?,
    })
}

/// Per-token redemption rates implied by a split, given each side's supply.
///
/// A side with no supply has no rate.
pub fn implied_rates(
    split: &SettlementSplit,
    long_supply: u128,
    short_supply: u128,
) -> (Option<Rate>, Option<Rate>) {
    (
        resolve_rate(split.long_pot, long_supply),
        resolve_rate(split.short_pot, short_supply),
    )
}

//! GDP Model - Pure integer economics of a GDP-linked long/short market
//!
//! Mirrors the arithmetic of the authoritative market contract so quotes,
//! redemption estimates and settlement projections shown to a user agree
//! with what the chain will compute. Everything here is deterministic and
//! allocation-free; amounts never pass through floating point.

#![no_std]
#![forbid(unsafe_code)]

pub mod fees;
pub mod math;
pub mod phase;
pub mod redemption;
pub mod settlement;
pub mod state;

pub use fees::{quote_mint, quote_pair_redeem, quote_redeem, MintQuote, PairRedeemQuote, RedeemQuote};
pub use math::{apply_fee_bps, apply_rate, mul_div_floor, FeeSplit};
pub use phase::{ensure_permitted, Operation, Phase};
pub use redemption::{estimate_payout, resolve_rate, PayoutEstimate, Rate};
pub use settlement::{implied_rates, long_share_wad, simulate_split, SettlementSplit};
pub use state::{LeverageConfig, MarketState, OracleReading, Position, Side};

/// Basis points scale (10,000 bps = 100%)
pub const BPS_SCALE: u64 = 10_000;

/// GDP delta scale (1,000,000 ppm = 100%)
pub const PPM_SCALE: i128 = 1_000_000;

/// Share scale used by the settlement split (1e18 = 100%)
pub const WAD: u128 = 1_000_000_000_000_000_000;

/// Decimals of the settlement currency (USDC)
pub const USDC_DECIMALS: u32 = 6;

/// Decimals of the long/short position tokens
pub const TOKEN_DECIMALS: u32 = 18;

/// Error types for market math
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarketError {
    /// Malformed or out-of-range amount or fee, including arithmetic overflow
    InvalidInput,
    /// Rate requested while its denominator is still zero
    DivisionUndefined,
    /// Phase tag outside the four known lifecycle states
    UnknownPhase(u64),
    /// Operation gated off in the current phase
    OperationNotPermitted { phase: Phase, op: Operation },
}

impl core::fmt::Display for MarketError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            MarketError::InvalidInput => write!(f, "invalid input"),
            MarketError::DivisionUndefined => write!(f, "rate undefined before settlement"),
            MarketError::UnknownPhase(tag) => write!(f, "unknown phase tag {}", tag),
            MarketError::OperationNotPermitted { phase, op } => {
                write!(f, "{} not permitted while market is {}", op, phase)
            }
        }
    }
}

impl core::error::Error for MarketError {}

/// Result alias for model operations
pub type Result<T> = core::result::Result<T, MarketError>;

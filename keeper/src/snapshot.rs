//! Versioned, validated market snapshot

use chrono::{DateTime, Utc};
use gdp_model::{LeverageConfig, MarketError, MarketState, OracleReading, Phase, Position};

use crate::address::Address;
use crate::error::SyncError;
use crate::source::{MarketReadout, OracleReadout, PositionReadout};

/// Raw output of one complete read round
#[derive(Debug, Clone)]
pub struct RoundReadouts {
    pub market: MarketReadout,
    pub oracle: OracleReadout,
    pub position: Option<(Address, PositionReadout)>,
}

/// One consistent view of the market, oracle and holder.
///
/// Built from a single read round and never modified afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snapshot {
    pub version: u64,
    pub fetched_at: DateTime<Utc>,
    pub market: MarketState,
    pub oracle: OracleReading,
    pub leverage: LeverageConfig,
    pub holder: Option<Address>,
    pub position: Option<Position>,
}

impl Snapshot {
    /// Validate a round and, if it is a legal successor of `previous`,
    /// build the next snapshot from it.
    pub fn build(
        readouts: RoundReadouts,
        previous: Option<&Snapshot>,
        fetched_at: DateTime<Utc>,
    ) -> Result<Snapshot, SyncError> {
        let market = market_state(&readouts.market)?;
        let oracle = OracleReading {
            g_ppm: readouts.oracle.g_ppm,
            finalized: readouts.oracle.finalized,
        };
        if readouts.market.leverage_k == 0 {
            return Err(SyncError::InvalidReadout("leverage k is zero".into()));
        }
        let leverage = LeverageConfig {
            k: readouts.market.leverage_k,
        };

        if let Some(prev) = previous {
            if !market.phase.can_follow(prev.market.phase) {
                return Err(SyncError::InvalidReadout(format!(
                    "phase went back from {} to {}",
                    prev.market.phase, market.phase
                )));
            }
            if !oracle.can_follow(&prev.oracle) {
                return Err(SyncError::InvalidReadout(format!(
                    "finalized GDP reading changed from {} ppm to {} ppm",
                    prev.oracle.g_ppm, oracle.g_ppm
                )));
            }
            if leverage != prev.leverage {
                return Err(SyncError::InvalidReadout(format!(
                    "leverage changed from {} to {}",
                    prev.leverage.k, leverage.k
                )));
            }
        }

        let (holder, position) = match readouts.position {
            Some((holder, p)) => (
                Some(holder),
                Some(Position {
                    long_balance: p.long_balance,
                    short_balance: p.short_balance,
                    usdc_balance: p.usdc_balance,
                }),
            ),
            None => (None, None),
        };

        Ok(Snapshot {
            version: previous.map_or(1, |p| p.version + 1),
            fetched_at,
            market,
            oracle,
            leverage,
            holder,
            position,
        })
    }
}

fn market_state(raw: &MarketReadout) -> Result<MarketState, SyncError> {
    let phase = Phase::from_tag(raw.phase).map_err(|_| SyncError::UnknownPhase(raw.phase))?;

    let state = MarketState {
        phase,
        close_at: raw.close_at,
        mint_fee_bps: raw.mint_fee_bps,
        pair_redeem_fee_bps: raw.pair_redeem_fee_bps,
        vault_balance_micro: raw.vault_balance,
        long_pot_micro: raw.long_pot,
        short_pot_micro: raw.short_pot,
        long_redeem_numerator: raw.long_redeem_numerator,
        long_redeem_denominator: raw.long_redeem_denominator,
        short_redeem_numerator: raw.short_redeem_numerator,
        short_redeem_denominator: raw.short_redeem_denominator,
        long_token: raw.long_token.0,
        short_token: raw.short_token.0,
    };

    state.validate().map_err(|e| match e {
        MarketError::InvalidInput => {
            SyncError::InvalidReadout("fee or redemption rate out of range".into())
        }
        other => SyncError::InvalidReadout(other.to_string()),
    })?;
    Ok(state)
}

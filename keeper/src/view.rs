//! Derived view values for a snapshot

use gdp_model::{
    ensure_permitted, estimate_payout, quote_mint, quote_pair_redeem, quote_redeem, simulate_split,
    MarketError, MintQuote, Operation, PairRedeemQuote, PayoutEstimate, Phase, Rate, RedeemQuote,
    SettlementSplit, Side,
};

use crate::snapshot::Snapshot;

/// Everything a UI shows about the market, computed from one snapshot
#[derive(Debug, Clone, PartialEq)]
pub struct MarketView {
    pub version: u64,
    pub phase: Phase,
    pub can_mint: bool,
    pub can_pair_redeem: bool,
    pub can_redeem: bool,
    /// Seconds until `close_at`; negative once it has passed
    pub seconds_to_close: i64,
    pub long_rate: Option<Rate>,
    pub short_rate: Option<Rate>,
    /// `None` when the snapshot has no holder
    pub payout: Option<PayoutEstimate>,
    /// Vault split if GDP prints at the current oracle reading
    pub projected: SettlementSplit,
    /// Simulated minus published long pot, once settled
    pub long_pot_drift: Option<i128>,
}

/// Build the view for `snapshot` as of `now_unix`
pub fn derive_view(snapshot: &Snapshot, now_unix: u64) -> Result<MarketView, MarketError> {
    let market = &snapshot.market;
    let long_rate = market.redeem_rate(Side::Long);
    let short_rate = market.redeem_rate(Side::Short);

    let payout = match &snapshot.position {
        Some(p) => Some(estimate_payout(
            p.long_balance,
            long_rate,
            p.short_balance,
            short_rate,
        )?),
        None => None,
    };

    let projected = project_split(snapshot, snapshot.oracle.g_ppm)?;

    let long_pot_drift = if market.phase == Phase::Settled && snapshot.oracle.finalized {
        signed_difference(projected.long_pot, market.long_pot_micro)
    } else {
        None
    };

    Ok(MarketView {
        version: snapshot.version,
        phase: market.phase,
        can_mint: market.phase.permits(Operation::Mint),
        can_pair_redeem: market.phase.permits(Operation::PairRedeem),
        can_redeem: market.phase.permits(Operation::Redeem),
        seconds_to_close: seconds_between(now_unix, market.close_at),
        long_rate,
        short_rate,
        payout,
        projected,
        long_pot_drift,
    })
}

/// `to - from` in seconds, saturating at the i64 range
fn seconds_between(from: u64, to: u64) -> i64 {
    let diff = to as i128 - from as i128;
    diff.clamp(i64::MIN as i128, i64::MAX as i128) as i64
}

/// `a - b`, or `None` when either amount is beyond the i128 range
fn signed_difference(a: u128, b: u128) -> Option<i128> {
    i128::try_from(a).ok()?.checked_sub(i128::try_from(b).ok()?)
}

/// Vault split for a hypothetical GDP print of `g_ppm`
pub fn project_split(snapshot: &Snapshot, g_ppm: i64) -> Result<SettlementSplit, MarketError> {
    simulate_split(
        snapshot.market.vault_balance_micro,
        snapshot.leverage.k,
        g_ppm,
    )
}

/// Mint quote at the snapshot's fee, only while the market is open
pub fn mint_quote(snapshot: &Snapshot, usdc_in: u128) -> Result<MintQuote, MarketError> {
    ensure_permitted(snapshot.market.phase, Operation::Mint)?;
    quote_mint(usdc_in, snapshot.market.mint_fee_bps)
}

/// Pair-redeem quote at the snapshot's fee, only while the market is open
pub fn pair_redeem_quote(snapshot: &Snapshot, tokens_in: u128) -> Result<PairRedeemQuote, MarketError> {
    ensure_permitted(snapshot.market.phase, Operation::PairRedeem)?;
    quote_pair_redeem(tokens_in, snapshot.market.pair_redeem_fee_bps)
}

/// Single-sided redemption quote, only once settled
pub fn redeem_quote(snapshot: &Snapshot, side: Side, tokens_in: u128) -> Result<RedeemQuote, MarketError> {
    ensure_permitted(snapshot.market.phase, Operation::Redeem)?;
    quote_redeem(side, tokens_in, snapshot.market.redeem_rate(side))
}

/// Check if a snapshot is older than `max_age_secs`
pub fn is_snapshot_old(snapshot: &Snapshot, now_unix: i64, max_age_secs: i64) -> bool {
    now_unix.saturating_sub(snapshot.fetched_at.timestamp()) > max_age_secs
}

//! Mint, pair-redeem and single-sided redeem quotes
//!
//! Pure functions of their arguments. The amounts returned are the
//! economic quantities the contract moves; rescaling the minted amount
//! from 6 to 18 decimals is left to the display layer.

use crate::math::apply_fee_bps;
use crate::redemption::Rate;
use crate::{MarketError, Result, Side};

/// Quote for minting one side with USDC
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MintQuote {
    pub fee: u128,
    /// Tokens minted 1:1 against the net USDC
    pub tokens_out: u128,
}

/// Quote for burning equal long and short amounts before settlement
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PairRedeemQuote {
    pub fee: u128,
    pub usdc_out: u128,
}

/// Quote for redeeming one side after settlement
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RedeemQuote {
    pub side: Side,
    pub tokens_in: u128,
    pub usdc_out: u128,
}

pub fn quote_mint(usdc_in: u128, mint_fee_bps: u64) -> Result<MintQuote> {
    if usdc_in == 0 {
        return Err(MarketError::InvalidInput);
    }
    let split = apply_fee_bps(usdc_in, mint_fee_bps)?;
    Ok(MintQuote {
        fee: split.fee,
        tokens_out: split.net,
    })
}

pub fn quote_pair_redeem(token_in: u128, pair_redeem_fee_bps: u64) -> Result<PairRedeemQuote> {
    if token_in == 0 {
        return Err(MarketError::InvalidInput);
    }
    let split = apply_fee_bps(token_in, pair_redeem_fee_bps)?;
    Ok(PairRedeemQuote {
        fee: split.fee,
        usdc_out: split.net,
    })
}

/// Redeem `tokens_in` of one side at its published rate.
///
/// `rate` is `None` before settlement, which yields `DivisionUndefined`.
pub fn quote_redeem(side: Side, tokens_in: u128, rate: Option<Rate>) -> Result<RedeemQuote> {
    if tokens_in == 0 {
        return Err(MarketError::InvalidInput);
    }
    let rate = rate.ok_or(MarketError::DivisionUndefined)?;
    Ok(RedeemQuote {
        side,
        tokens_in,
        usdc_out: rate.apply(tokens_in)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::redemption::resolve_rate;

    #[test]
    fn test_mint_one_usdc_at_50_bps() {
        let quote = quote_mint(1_000_000, 50).unwrap();
        assert_eq!(quote.fee, 5_000);
        assert_eq!(quote.tokens_out, 995_000);
    }

    #[test]
    fn test_mint_rejects_zero_and_bad_fee() {
        assert_eq!(quote_mint(0, 50), Err(MarketError::InvalidInput));
        assert_eq!(quote_mint(1_000_000, 20_000), Err(MarketError::InvalidInput));
    }

    #[test]
    fn test_pair_redeem_mirrors_mint() {
        let mint = quote_mint(2_500_000, 30).unwrap();
        let redeem = quote_pair_redeem(2_500_000, 30).unwrap();
        assert_eq!(mint.fee, redeem.fee);
        assert_eq!(mint.tokens_out, redeem.usdc_out);
        assert_eq!(quote_pair_redeem(0, 30), Err(MarketError::InvalidInput));
    }

    #[test]
    fn test_tiny_amount_pays_no_fee() {
        // floor(199 * 50 / 10_000) = 0
        let quote = quote_mint(199, 50).unwrap();
        assert_eq!(quote.fee, 0);
        assert_eq!(quote.tokens_out, 199);
    }

    #[test]
    fn test_redeem_quote() {
        let quote = quote_redeem(Side::Short, 4_000, resolve_rate(1, 4)).unwrap();
        assert_eq!(quote.usdc_out, 1_000);
        assert_eq!(
            quote_redeem(Side::Long, 4_000, None),
            Err(MarketError::DivisionUndefined)
        );
        assert_eq!(
            quote_redeem(Side::Long, 0, resolve_rate(1, 4)),
            Err(MarketError::InvalidInput)
        );
    }
}

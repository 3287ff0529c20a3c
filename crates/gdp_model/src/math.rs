//! Fixed-point math on native-decimal integers
//!
//! Amounts are unsigned integers in the token's own decimals (6 for USDC,
//! 18 for the position tokens). Every division floors, matching the
//! contract's integer settlement.

use crate::{MarketError, Result, BPS_SCALE};

/// Fee taken from an amount and what remains
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeeSplit {
    pub fee: u128,
    pub net: u128,
}

/// Split `amount` into `fee = floor(amount * fee_bps / 10_000)` and `net`.
///
/// Fails with `InvalidInput` if `fee_bps` exceeds 10,000. Amounts are
/// unsigned, so a negative amount is rejected at parse time instead.
pub fn apply_fee_bps(amount: u128, fee_bps: u64) -> Result<FeeSplit> {
    if fee_bps > BPS_SCALE {
        return Err(MarketError::InvalidInput);
    }
    let fee = mul_div_floor(amount, fee_bps as u128, BPS_SCALE as u128)?;
    Ok(FeeSplit {
        fee,
        net: amount - fee,
    })
}

/// Payout `floor(amount * numerator / denominator)`.
pub fn apply_rate(amount: u128, numerator: u128, denominator: u128) -> Result<u128> {
    if denominator == 0 {
        return Err(MarketError::DivisionUndefined);
    }
    mul_div_floor(amount, numerator, denominator)
}

fn gcd_u128(mut a: u128, mut b: u128) -> u128 {
    while b != 0 {
        let r = a % b;
        a = b;
        b = r;
    }
    a
}

/// Exact `floor(a * b / c)`.
///
/// Common factors of `c` are cancelled against `a` and `b` first, which
/// leaves the rational value unchanged, so the floor is identical to a
/// wide multiply-then-divide. Only a reduced product that still exceeds
/// 128 bits is reported, as `InvalidInput`.
pub fn mul_div_floor(a: u128, b: u128, c: u128) -> Result<u128> {
    if c == 0 {
        return Err(MarketError::DivisionUndefined);
    }
    if a == 0 || b == 0 {
        return Ok(0);
    }

    let g1 = gcd_u128(a, c);
    let a1 = a / g1;
    let c1 = c / g1;

    let g2 = gcd_u128(b, c1);
    let b1 = b / g2;
    let c2 = c1 / g2;

    let product = a1.checked_mul(b1).ok_or(MarketError::InvalidInput)?;
    Ok(product / c2)
}

/// 10^decimals, or `InvalidInput` past u128 range
pub fn pow10(decimals: u32) -> Result<u128> {
    10u128.checked_pow(decimals).ok_or(MarketError::InvalidInput)
}

/// Convert an amount between decimal scales (e.g. 6-decimal USDC to
/// 18-decimal token units). Scaling down floors.
pub fn rescale(amount: u128, from_decimals: u32, to_decimals: u32) -> Result<u128> {
    if to_decimals >= from_decimals {
        let factor = pow10(to_decimals - from_decimals)?;
        amount.checked_mul(factor).ok_or(MarketError::InvalidInput)
    } else {
        let factor = pow10(from_decimals - to_decimals)?;
        Ok(amount / factor)
    }
}

/// Parse a user-entered decimal string such as `"1.5"` into a scaled integer.
///
/// Rejects signs, empty input, more fractional digits than `decimals`,
/// non-digit characters and values that overflow u128.
pub fn parse_units(text: &str, decimals: u32) -> Result<u128> {
    let text = text.trim();
    let (int_part, frac_part) = match text.split_once('.') {
        Some((i, f)) => (i, f),
        None => (text, ""),
    };

    if int_part.is_empty() && frac_part.is_empty() {
        return Err(MarketError::InvalidInput);
    }
    if frac_part.len() > decimals as usize {
        return Err(MarketError::InvalidInput);
    }
    let all_digits = |s: &str| s.bytes().all(|b| b.is_ascii_digit());
    if !all_digits(int_part) || !all_digits(frac_part) {
        return Err(MarketError::InvalidInput);
    }

    let scale = pow10(decimals)?;
    let mut whole: u128 = 0;
    for b in int_part.bytes() {
        whole = whole
            .checked_mul(10)
            .and_then(|w| w.checked_add((b - b'0') as u128))
            .ok_or(MarketError::InvalidInput)?;
    }

    let mut frac: u128 = 0;
    for b in frac_part.bytes() {
        frac = frac * 10 + (b - b'0') as u128;
    }
    let frac = frac * pow10(decimals - frac_part.len() as u32)?;

    whole
        .checked_mul(scale)
        .and_then(|w| w.checked_add(frac))
        .ok_or(MarketError::InvalidInput)
}

/// Signed variant of [`parse_units`], accepting a leading `+` or `-`.
pub fn parse_signed_units(text: &str, decimals: u32) -> Result<i128> {
    let text = text.trim();
    let (negative, digits) = match text.as_bytes().first() {
        Some(b'-') => (true, &text[1..]),
        Some(b'+') => (false, &text[1..]),
        _ => (false, text),
    };
    let magnitude = i128::try_from(parse_units(digits, decimals)?)
        .map_err(|_| MarketError::InvalidInput)?;
    Ok(if negative { -magnitude } else { magnitude })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fee_on_one_usdc() {
        let split = apply_fee_bps(1_000_000, 50).unwrap();
        assert_eq!(split.fee, 5_000);
        assert_eq!(split.net, 995_000);
    }

    #[test]
    fn test_fee_floors() {
        // 999 * 30 / 10_000 = 2.997
        let split = apply_fee_bps(999, 30).unwrap();
        assert_eq!(split.fee, 2);
        assert_eq!(split.net, 997);
    }

    #[test]
    fn test_fee_bounds() {
        assert_eq!(apply_fee_bps(100, 10_000).unwrap(), FeeSplit { fee: 100, net: 0 });
        assert_eq!(apply_fee_bps(100, 0).unwrap(), FeeSplit { fee: 0, net: 100 });
        assert_eq!(apply_fee_bps(100, 10_001), Err(MarketError::InvalidInput));
    }

    #[test]
    fn test_rate_three_quarters() {
        let payout = apply_rate(1_000_000_000_000_000_000, 3, 4).unwrap();
        assert_eq!(payout, 750_000_000_000_000_000);
    }

    #[test]
    fn test_rate_zero_denominator() {
        assert_eq!(apply_rate(5, 1, 0), Err(MarketError::DivisionUndefined));
        assert_eq!(apply_rate(0, 0, 0), Err(MarketError::DivisionUndefined));
    }

    #[test]
    fn test_mul_div_avoids_false_overflow() {
        // 1e30 * 1e30 does not fit, but the 1e30 denominator cancels exactly
        let big = 1_000_000_000_000_000_000_000_000_000_000u128;
        assert_eq!(mul_div_floor(big, big, big).unwrap(), big);
        assert_eq!(mul_div_floor(u128::MAX, u128::MAX, 1), Err(MarketError::InvalidInput));
    }

    #[test]
    fn test_rescale() {
        assert_eq!(rescale(995_000, 6, 18).unwrap(), 995_000_000_000_000_000);
        assert_eq!(rescale(1_999_999_999_999, 18, 6).unwrap(), 1);
        assert_eq!(rescale(u128::MAX, 6, 18), Err(MarketError::InvalidInput));
    }

    #[test]
    fn test_parse_units() {
        assert_eq!(parse_units("1", 6).unwrap(), 1_000_000);
        assert_eq!(parse_units("1.5", 6).unwrap(), 1_500_000);
        assert_eq!(parse_units(".25", 6).unwrap(), 250_000);
        assert_eq!(parse_units("0.000001", 6).unwrap(), 1);
        assert_eq!(parse_units("0.0000001", 6), Err(MarketError::InvalidInput));
        assert_eq!(parse_units("-1", 6), Err(MarketError::InvalidInput));
        assert_eq!(parse_units("", 6), Err(MarketError::InvalidInput));
        assert_eq!(parse_units(".", 6), Err(MarketError::InvalidInput));
        assert_eq!(parse_units("1e6", 6), Err(MarketError::InvalidInput));
    }

    #[test]
    fn test_parse_signed_units() {
        // percent to ppm: 4 extra decimals
        assert_eq!(parse_signed_units("0.3", 4).unwrap(), 3_000);
        assert_eq!(parse_signed_units("-1.25", 4).unwrap(), -12_500);
        assert_eq!(parse_signed_units("+2", 4).unwrap(), 20_000);
        assert_eq!(parse_signed_units("--2", 4), Err(MarketError::InvalidInput));
    }
}

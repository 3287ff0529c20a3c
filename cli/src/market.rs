//! Market status, quotes and settlement what-ifs

use anyhow::{Context, Result};
use colored::Colorize;
use gdp_keeper::view::{self, MarketView};
use gdp_keeper::{Address, Snapshot};
use gdp_model::math::{parse_signed_units, parse_units, rescale};
use gdp_model::{PayoutEstimate, Phase, Side, TOKEN_DECIMALS, USDC_DECIMALS};

use crate::client::{
    self, format_address, format_countdown, format_ppm_percent, format_rate, format_tokens,
    format_usdc,
};
use crate::config::NetworkConfig;

pub async fn show_status(config: &NetworkConfig, source: &str, holder: Option<Address>) -> Result<()> {
    let reconciler = client::open_source(source, holder)?;
    let snapshot = client::fetch_snapshot(&reconciler).await?;
    client::check_tokens(&snapshot, config);

    let view = view::derive_view(&snapshot, now_unix())?;
    print_status(config, &snapshot, &view);
    Ok(())
}

pub(crate) fn print_status(config: &NetworkConfig, snapshot: &Snapshot, view: &MarketView) {
    let market = &snapshot.market;

    println!("{}", "=== GDP Market ===".bright_green().bold());
    println!("{} {} (chain {})", "Network:".bright_cyan(), config.network, config.chain_id);
    println!("{} {}", "Market:".bright_cyan(), format_address(&config.market, config));
    println!("{} {}", "Oracle:".bright_cyan(), format_address(&config.oracle, config));
    println!("{} {}", "USDC:".bright_cyan(), format_address(&config.usdc, config));
    println!(
        "{} v{} at {}",
        "Snapshot:".bright_cyan(),
        snapshot.version,
        snapshot.fetched_at.format("%Y-%m-%d %H:%M:%S UTC")
    );

    println!("\n{}", "State:".bright_yellow());
    println!("  {} {}", "Phase:".bright_cyan(), phase_label(view.phase));
    println!(
        "  {} {}",
        "Closes:".bright_cyan(),
        format_countdown(view.seconds_to_close)
    );
    println!(
        "  {} mint {} bps, pair redeem {} bps",
        "Fees:".bright_cyan(),
        market.mint_fee_bps,
        market.pair_redeem_fee_bps
    );
    println!(
        "  {} {}",
        "Vault:".bright_cyan(),
        format_usdc(market.vault_balance_micro)
    );
    println!("  {} k = {}", "Leverage:".bright_cyan(), snapshot.leverage.k);
    println!(
        "  {} {}{}",
        "GDP surprise:".bright_cyan(),
        format_ppm_percent(snapshot.oracle.g_ppm),
        if snapshot.oracle.finalized { " (final)" } else { "" }
    );

    println!("\n{}", "Actions:".bright_yellow());
    for (name, allowed) in [
        ("Mint", view.can_mint),
        ("Pair redeem", view.can_pair_redeem),
        ("Redeem", view.can_redeem),
    ] {
        let mark = if allowed { "✓".green() } else { "✗".red() };
        println!("  {} {}", mark, name);
    }

    println!("\n{}", "Settlement:".bright_yellow());
    println!(
        "  {} {:.4}% / {:.4}%",
        "Projected split:".bright_cyan(),
        view.projected.long_share_percent(),
        view.projected.short_share_percent()
    );
    if market.phase == Phase::Settled {
        println!("  {} {}", "Long pot:".bright_cyan(), format_usdc(market.long_pot_micro));
        println!("  {} {}", "Short pot:".bright_cyan(), format_usdc(market.short_pot_micro));
    }
    println!("  {} {}", "LONG rate:".bright_cyan(), format_rate(view.long_rate));
    println!("  {} {}", "SHORT rate:".bright_cyan(), format_rate(view.short_rate));
    if let Some(drift) = view.long_pot_drift {
        if drift == 0 {
            println!("  {} matches published pots", "✓".green());
        } else {
            println!(
                "  {} simulated long pot differs by {} micro-USDC",
                "⚠".yellow(),
                drift
            );
        }
    }

    if let (Some(holder), Some(position)) = (snapshot.holder, snapshot.position) {
        println!("\n{} {}", "Position:".bright_yellow(), format_address(&holder, config));
        println!("  {} {}", "LONG:".bright_cyan(), format_tokens(position.long_balance, Side::Long));
        println!("  {} {}", "SHORT:".bright_cyan(), format_tokens(position.short_balance, Side::Short));
        println!("  {} {}", "USDC:".bright_cyan(), format_usdc(position.usdc_balance));
        if let Some(payout) = view.payout {
            println!("  {} {}", "Redeemable:".bright_cyan(), format_payout(payout));
        }
    }
}

pub enum QuoteKind {
    Mint { side: Side, usdc: String },
    PairRedeem { tokens: String },
    Redeem { side: Side, tokens: String },
}

pub async fn quote(config: &NetworkConfig, source: &str, kind: QuoteKind) -> Result<()> {
    let reconciler = client::open_source(source, None)?;
    let snapshot = client::fetch_snapshot(&reconciler).await?;
    client::check_tokens(&snapshot, config);

    println!("{}", "=== Quote ===".bright_green().bold());
    println!("{} {}", "Phase:".bright_cyan(), phase_label(snapshot.market.phase));

    match kind {
        QuoteKind::Mint { side, usdc } => {
            let usdc_in = parse_amount(&usdc, USDC_DECIMALS)?;
            let quote = view::mint_quote(&snapshot, usdc_in)?;
            println!("{} {}", "Deposit:".bright_cyan(), format_usdc(usdc_in));
            println!(
                "{} {} ({} bps)",
                "Fee:".bright_cyan(),
                format_usdc(quote.fee),
                snapshot.market.mint_fee_bps
            );
            println!(
                "{} {}",
                "Receive:".bright_cyan(),
                format_tokens(to_token_units(quote.tokens_out)?, side)
            );
        }
        QuoteKind::PairRedeem { tokens } => {
            // Tokens are minted 1:1 against micro-USDC, so finer amounts can't be redeemed
            let tokens_in = parse_amount(&tokens, USDC_DECIMALS)?;
            let quote = view::pair_redeem_quote(&snapshot, tokens_in)?;
            let burned = to_token_units(tokens_in)?;
            println!(
                "{} {} + {}",
                "Burn:".bright_cyan(),
                format_tokens(burned, Side::Long),
                format_tokens(burned, Side::Short)
            );
            println!(
                "{} {} ({} bps)",
                "Fee:".bright_cyan(),
                format_usdc(quote.fee),
                snapshot.market.pair_redeem_fee_bps
            );
            println!("{} {}", "Receive:".bright_cyan(), format_usdc(quote.usdc_out));
        }
        QuoteKind::Redeem { side, tokens } => {
            let tokens_in = parse_amount(&tokens, TOKEN_DECIMALS)?;
            let quote = view::redeem_quote(&snapshot, side, tokens_in)?;
            println!("{} {}", "Burn:".bright_cyan(), format_tokens(quote.tokens_in, side));
            println!(
                "{} {}",
                "Rate:".bright_cyan(),
                format_rate(snapshot.market.redeem_rate(side))
            );
            println!("{} {}", "Receive:".bright_cyan(), format_usdc(quote.usdc_out));
        }
    }
    Ok(())
}

pub async fn estimate(config: &NetworkConfig, source: &str, holder: Address) -> Result<()> {
    let reconciler = client::open_source(source, Some(holder))?;
    let snapshot = client::fetch_snapshot(&reconciler).await?;
    client::check_tokens(&snapshot, config);
    let view = view::derive_view(&snapshot, now_unix())?;

    println!("{}", "=== Redemption Estimate ===".bright_green().bold());
    println!("{} {}", "Holder:".bright_cyan(), format_address(&holder, config));
    if let Some(position) = snapshot.position {
        println!("{} {}", "LONG:".bright_cyan(), format_tokens(position.long_balance, Side::Long));
        println!("{} {}", "SHORT:".bright_cyan(), format_tokens(position.short_balance, Side::Short));
    }
    match view.payout {
        Some(payout) => println!("{} {}", "Redeemable:".bright_cyan(), format_payout(payout)),
        None => println!("{}", "No position read".dimmed()),
    }
    Ok(())
}

/// Project the vault split for a hypothetical GDP surprise in percent
pub async fn simulate(config: &NetworkConfig, source: &str, g_pct: &str) -> Result<()> {
    let g_ppm = percent_to_ppm(g_pct)?;
    let reconciler = client::open_source(source, None)?;
    let snapshot = client::fetch_snapshot(&reconciler).await?;
    client::check_tokens(&snapshot, config);

    let split = view::project_split(&snapshot, g_ppm)?;

    println!("{}", "=== Settlement Simulation ===".bright_green().bold());
    println!("{} {}", "GDP surprise:".bright_cyan(), format_ppm_percent(g_ppm));
    println!("{} k = {}", "Leverage:".bright_cyan(), snapshot.leverage.k);
    println!(
        "{} {}",
        "Vault:".bright_cyan(),
        format_usdc(snapshot.market.vault_balance_micro)
    );
    println!(
        "{} {:.4}% → {}",
        "LONG:".bright_cyan(),
        split.long_share_percent(),
        format_usdc(split.long_pot)
    );
    println!(
        "{} {:.4}% → {}",
        "SHORT:".bright_cyan(),
        split.short_share_percent(),
        format_usdc(split.short_pot)
    );
    Ok(())
}

fn parse_amount(text: &str, decimals: u32) -> Result<u128> {
    parse_units(text, decimals)
        .map_err(anyhow::Error::from)
        .with_context(|| format!("Invalid amount {:?} (at most {} decimals)", text, decimals))
}

/// `"0.3"` percent → 3_000 ppm. Accepts up to four decimals.
pub(crate) fn percent_to_ppm(text: &str) -> Result<i64> {
    let ppm = parse_signed_units(text.trim_end_matches('%'), 4)
        .map_err(anyhow::Error::from)
        .with_context(|| format!("Invalid percentage {:?} (at most 4 decimals)", text))?;
    i64::try_from(ppm).with_context(|| format!("Percentage {} is out of range", text))
}

/// Economic amount (6 decimals) in position-token units (18 decimals)
fn to_token_units(micro: u128) -> Result<u128> {
    rescale(micro, USDC_DECIMALS, TOKEN_DECIMALS)
        .map_err(anyhow::Error::from)
        .context("Amount too large to express in token units")
}

fn format_payout(payout: PayoutEstimate) -> String {
    match payout {
        PayoutEstimate::Determined(amount) => format_usdc(amount).bright_green().to_string(),
        PayoutEstimate::Undetermined => "not yet determined".yellow().to_string(),
    }
}

fn phase_label(phase: Phase) -> String {
    match phase {
        Phase::Pending => phase.to_string().dimmed().to_string(),
        Phase::Open => phase.to_string().bright_green().to_string(),
        Phase::Frozen => phase.to_string().yellow().to_string(),
        Phase::Settled => phase.to_string().bright_blue().to_string(),
    }
}

pub(crate) fn parse_side(text: &str) -> Result<Side> {
    match text.to_ascii_lowercase().as_str() {
        "long" => Ok(Side::Long),
        "short" => Ok(Side::Short),
        _ => anyhow::bail!("Unknown side: {}. Use long or short", text),
    }
}

pub(crate) fn now_unix() -> u64 {
    chrono::Utc::now().timestamp().max(0) as u64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_percent_to_ppm() {
        assert_eq!(percent_to_ppm("0.3").unwrap(), 3_000);
        assert_eq!(percent_to_ppm("-5").unwrap(), -50_000);
        assert_eq!(percent_to_ppm("+1.2345%").unwrap(), 12_345);
        assert!(percent_to_ppm("0.12345").is_err());
        assert!(percent_to_ppm("abc").is_err());
    }

    #[test]
    fn test_parse_side() {
        assert_eq!(parse_side("LONG").unwrap(), Side::Long);
        assert_eq!(parse_side("short").unwrap(), Side::Short);
        assert!(parse_side("both").is_err());
    }

    #[test]
    fn test_parse_amount() {
        assert_eq!(parse_amount("1.5", USDC_DECIMALS).unwrap(), 1_500_000);
        assert!(parse_amount("1.0000001", USDC_DECIMALS).is_err());
    }

    #[test]
    fn test_to_token_units() {
        assert_eq!(to_token_units(995_000).unwrap(), 995_000_000_000_000_000);
    }
}

//! Source loading and terminal formatting helpers

use anyhow::{Context, Result};
use colored::Colorize;
use gdp_keeper::{Address, FileSource, Reconciler, Snapshot};
use gdp_model::{Rate, Side, TOKEN_DECIMALS, USDC_DECIMALS, WAD};
use indicatif::{ProgressBar, ProgressStyle};
use std::sync::Arc;
use std::time::Duration;

use crate::config::{expand_path, NetworkConfig};

/// Reconciler over the readout file at `source`
pub fn open_source(source: &str, holder: Option<Address>) -> Result<Reconciler<FileSource>> {
    let path = expand_path(source)?;
    log::debug!("reading market from {}", path.display());
    Ok(Reconciler::new(FileSource::new(path), holder))
}

/// Run one refresh round behind a spinner
pub async fn fetch_snapshot(reconciler: &Reconciler<FileSource>) -> Result<Arc<Snapshot>> {
    let spinner = spinner("Reading market state...");
    let result = reconciler.refresh().await;
    spinner.finish_and_clear();

    result.with_context(|| {
        format!(
            "Failed to read market from {}",
            reconciler.source().path().display()
        )
    })
}

/// Warn when the readout's token addresses disagree with the network config
pub fn check_tokens(snapshot: &Snapshot, config: &NetworkConfig) {
    for (side, read, configured) in token_mismatches(snapshot, config) {
        log::warn!(
            "{} token is {} in the readout but {} in the {} config",
            side_name(side),
            read,
            configured,
            config.network
        );
    }
}

/// `(side, read, configured)` for each configured token the readout contradicts
fn token_mismatches(snapshot: &Snapshot, config: &NetworkConfig) -> Vec<(Side, Address, Address)> {
    [
        (Side::Long, Address(snapshot.market.long_token), config.long_token),
        (Side::Short, Address(snapshot.market.short_token), config.short_token),
    ]
    .into_iter()
    .filter(|(_, read, configured)| !configured.is_zero() && read != configured)
    .collect()
}

pub fn spinner(message: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::with_template("{spinner:.cyan} {msg}") {
        pb.set_style(style);
    }
    pb.set_message(message.to_string());
    pb.enable_steady_tick(Duration::from_millis(100));
    pb
}

/// Format a fixed-point integer with `decimals` places, dropping trailing zeros
pub fn format_units(amount: u128, decimals: u32) -> String {
    let scale = 10u128.pow(decimals);
    let whole = amount / scale;
    let frac = amount % scale;
    if frac == 0 {
        return whole.to_string();
    }
    let digits = format!("{:0width$}", frac, width = decimals as usize);
    format!("{}.{}", whole, digits.trim_end_matches('0'))
}

pub fn format_usdc(micro: u128) -> String {
    format!("{} USDC", format_units(micro, USDC_DECIMALS))
}

pub fn format_tokens(amount: u128, side: Side) -> String {
    format!("{} {}", format_units(amount, TOKEN_DECIMALS), side_name(side))
}

pub fn side_name(side: Side) -> &'static str {
    match side {
        Side::Long => "LONG",
        Side::Short => "SHORT",
    }
}

/// Signed ppm as a percentage with four decimals, e.g. `+0.3000%`
pub fn format_ppm_percent(ppm: i64) -> String {
    let sign = if ppm < 0 { "-" } else { "+" };
    let abs = ppm.unsigned_abs();
    format!("{}{}.{:04}%", sign, abs / 10_000, abs % 10_000)
}

/// USDC paid out for one whole token
pub fn format_rate(rate: Option<Rate>) -> String {
    match rate.map(|r| r.apply(WAD)) {
        Some(Ok(per_token)) => format!("{} per token", format_usdc(per_token)),
        Some(Err(_)) => "out of range".to_string(),
        None => "not published".dimmed().to_string(),
    }
}

/// Shortened address, followed by its explorer link when the network has one
pub fn format_address(address: &Address, config: &NetworkConfig) -> String {
    let short = address.short().bright_yellow();
    match config.address_url(address) {
        Some(url) => format!("{} ({})", short, url.dimmed()),
        None => short.to_string(),
    }
}

/// Human-readable duration until a deadline, or how long ago it passed
pub fn format_countdown(seconds: i64) -> String {
    let abs = seconds.unsigned_abs();
    let (d, h, m) = (abs / 86_400, (abs % 86_400) / 3_600, (abs % 3_600) / 60);
    let span = if d > 0 {
        format!("{}d {}h", d, h)
    } else if h > 0 {
        format!("{}h {}m", h, m)
    } else {
        format!("{}m {}s", m, abs % 60)
    };
    if seconds < 0 {
        format!("{} ago", span)
    } else {
        format!("in {}", span)
    }
}

//! Periodic refresh loop

use anyhow::Result;
use colored::Colorize;
use gdp_keeper::view;
use gdp_keeper::Address;
use std::time::Duration;

use crate::client;
use crate::config::NetworkConfig;
use crate::market::{now_unix, print_status};

pub async fn run_watch(
    config: &NetworkConfig,
    source: &str,
    holder: Option<Address>,
    interval: u64,
) -> Result<()> {
    if interval == 0 {
        anyhow::bail!("Interval must be at least 1 second");
    }

    let reconciler = client::open_source(source, holder)?;
    let mut updates = reconciler.subscribe();

    println!("{}", "=== Watching GDP Market ===".bright_green().bold());
    println!("{} {}", "Source:".bright_cyan(), reconciler.source().path().display());
    println!("{} {}s", "Interval:".bright_cyan(), interval);
    println!("{}", "(Press Ctrl+C to stop)".dimmed());

    let task = reconciler.spawn_scheduler(Duration::from_secs(interval));
    let mut shown_version = 0;

    loop {
        tokio::select! {
            changed = updates.changed() => {
                if changed.is_err() {
                    break;
                }
                let current = updates.borrow_and_update().clone();
                let stamp = chrono::Local::now().format("%H:%M:%S");

                if let Some(err) = &current.stale {
                    println!(
                        "\n{} {} {}",
                        format!("[{}]", stamp).dimmed(),
                        "⚠ stale:".yellow(),
                        err
                    );
                    let max_age = 3 * interval as i64;
                    if let Some(last) = &current.snapshot {
                        if view::is_snapshot_old(last, chrono::Utc::now().timestamp(), max_age) {
                            println!(
                                "  {} last good snapshot (v{}) is older than {}s",
                                "⚠".yellow(),
                                last.version,
                                max_age
                            );
                        }
                    }
                    continue;
                }
                let Some(snapshot) = current.snapshot else { continue };
                if snapshot.version == shown_version {
                    continue;
                }
                shown_version = snapshot.version;
                client::check_tokens(&snapshot, config);

                println!("\n{}", format!("[{}] version {}", stamp, snapshot.version).dimmed());
                match view::derive_view(&snapshot, now_unix()) {
                    Ok(v) => print_status(config, &snapshot, &v),
                    Err(e) => println!("  {} {}", "✗".red(), e),
                }
            }
            _ = tokio::signal::ctrl_c() => {
                println!("\n{}", "Stopping...".dimmed());
                break;
            }
        }
    }

    task.stop().await;
    reconciler.shutdown();
    println!(
        "{} last applied version {}",
        "Stopped:".bright_cyan(),
        reconciler.current().version()
    );
    Ok(())
}

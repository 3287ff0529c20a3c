//! gdpmarket - inspect and simulate a GDP-linked long/short market
//!
//! Reads market state from a readout file, validates it into a snapshot and
//! prints status, trade quotes and settlement projections for the selected
//! network (local, sepolia, mainnet).

use anyhow::Context;
use clap::{Parser, Subcommand};
use colored::Colorize;
use gdp_keeper::Address;

mod client;
mod config;
mod keeper;
mod market;

use config::{expand_path, NetworksConfig};
use market::QuoteKind;

#[derive(Parser)]
#[command(name = "gdpmarket")]
#[command(about = "GDP market CLI - status, quotes and settlement simulation", long_about = None)]
#[command(version)]
struct Cli {
    /// Network to use (local, sepolia, mainnet, or one from --config)
    #[arg(short, long, global = true, default_value = "local")]
    network: String,

    /// RPC URL (overrides network default)
    #[arg(short, long, global = true)]
    url: Option<String>,

    /// TOML file with additional or replacement networks
    #[arg(short, long, global = true)]
    config: Option<String>,

    /// Foundry broadcast file (run-latest.json) to take contract addresses from
    #[arg(long, global = true)]
    broadcast: Option<String>,

    /// JSON readout file with market, oracle and position state
    #[arg(short, long, global = true, default_value = "readout.json")]
    source: String,

    /// Holder whose balances are read
    #[arg(long, global = true)]
    holder: Option<Address>,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List configured networks
    Networks,

    /// Show market phase, fees, vault and rates
    Status,

    /// Quote a trade at the current fees and rates
    Quote {
        #[command(subcommand)]
        command: QuoteCommands,
    },

    /// Estimate what the holder can redeem
    Estimate,

    /// Project the settlement split for a GDP surprise
    Simulate {
        /// GDP surprise in percent, e.g. 0.3 or -1.25
        #[arg(long, allow_hyphen_values = true)]
        g_pct: String,
    },

    /// Refresh periodically and print each new snapshot
    Watch {
        /// Refresh interval in seconds
        #[arg(short, long, default_value = "5")]
        interval: u64,
    },
}

#[derive(Subcommand)]
enum QuoteCommands {
    /// Mint one side with USDC
    Mint {
        /// Side to mint (long or short)
        side: String,

        /// USDC to deposit, e.g. 100 or 2.5
        usdc: String,
    },

    /// Burn equal long and short amounts for USDC
    PairRedeem {
        /// Tokens of each side to burn
        tokens: String,
    },

    /// Redeem one side after settlement
    Redeem {
        /// Side to redeem (long or short)
        side: String,

        /// Tokens to burn
        tokens: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let default_filter = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter)).init();

    let mut networks = match &cli.config {
        Some(path) => NetworksConfig::load(&expand_path(path)?)?,
        None => NetworksConfig::builtin(),
    };
    if let Some(path) = &cli.broadcast {
        let imported = networks.import_broadcast(&cli.network, &expand_path(path)?)?;
        log::info!("imported {} contract addresses for {}", imported, cli.network);
    }

    if let Commands::Networks = cli.command {
        list_networks(&networks);
        return Ok(());
    }

    let config = networks
        .resolve(&cli.network, cli.url.clone())
        .with_context(|| format!("Invalid configuration for network {}", cli.network))?;

    if cli.verbose {
        println!("{} {}", "Network:".bright_cyan(), config.network);
        println!("{} {}", "RPC URL:".bright_cyan(), config.rpc_url);
        println!("{} {}", "Source:".bright_cyan(), cli.source);
    }

    match cli.command {
        Commands::Networks => {}
        Commands::Status => {
            market::show_status(&config, &cli.source, cli.holder).await?;
        }
        Commands::Quote { command } => {
            let kind = match command {
                QuoteCommands::Mint { side, usdc } => QuoteKind::Mint {
                    side: market::parse_side(&side)?,
                    usdc,
                },
                QuoteCommands::PairRedeem { tokens } => QuoteKind::PairRedeem { tokens },
                QuoteCommands::Redeem { side, tokens } => QuoteKind::Redeem {
                    side: market::parse_side(&side)?,
                    tokens,
                },
            };
            market::quote(&config, &cli.source, kind).await?;
        }
        Commands::Estimate => {
            let holder = cli
                .holder
                .context("estimate needs --holder <ADDRESS>")?;
            market::estimate(&config, &cli.source, holder).await?;
        }
        Commands::Simulate { g_pct } => {
            market::simulate(&config, &cli.source, &g_pct).await?;
        }
        Commands::Watch { interval } => {
            keeper::run_watch(&config, &cli.source, cli.holder, interval).await?;
        }
    }

    Ok(())
}

fn list_networks(networks: &NetworksConfig) {
    println!("{}", "=== Networks ===".bright_green().bold());
    for (id, entry) in &networks.networks {
        let deployed = match entry.contracts.market.parse::<Address>() {
            Ok(addr) if !addr.is_zero() => addr.short().green().to_string(),
            Ok(_) => "not deployed".dimmed().to_string(),
            Err(_) => "invalid address".red().to_string(),
        };
        println!(
            "{} chain {} {} market {}",
            format!("{:<10}", id).bright_cyan(),
            entry.chain_id,
            entry.rpc_url,
            deployed
        );
    }
}

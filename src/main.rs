//! holdscan CLI - scan an address's DeFi positions across protocols.
//!
//! Run with: cargo run -- --network ethereum-mainnet --address 0x...

use std::str::FromStr;
use std::sync::Arc;

use alloy_primitives::Address;
use clap::Parser;
use color_eyre::eyre::Result;
use console::style;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use holdscan::apps::Erc4626Hook;
use holdscan::{
    Config, EvmChainReader, HookRegistry, HttpTokenInfoSource, NetworkId, Position,
    PositionResolver,
};

#[derive(Parser, Debug)]
#[command(name = "holdscan", about = "DeFi position aggregation and USD valuation")]
struct Cli {
    /// Network to scan
    #[arg(long, default_value = "ethereum-mainnet")]
    network: NetworkId,

    /// Holder address; omit for network-wide, non-address-specific positions
    #[arg(long)]
    address: Option<String>,

    /// Restrict to these app ids (comma separated); default: all registered
    #[arg(long, value_delimiter = ',')]
    apps: Vec<String>,

    /// Emit raw JSON instead of the table view
    #[arg(long)]
    json: bool,
}

fn print_banner(network: NetworkId) {
    println!();
    println!(
        "{}",
        style("═══════════════════════════════════════════════════════").cyan()
    );
    println!(
        "{}",
        style(" holdscan - DeFi position scanner").cyan().bold()
    );
    println!("{}", style(format!("    network: {network}")).cyan());
    println!(
        "{}",
        style("═══════════════════════════════════════════════════════").cyan()
    );
    println!();
}

fn print_positions(positions: &[Position]) {
    if positions.is_empty() {
        println!("{}", style("No positions found.").yellow());
        return;
    }

    let mut total = holdscan::DecimalNumber::zero();
    for position in positions {
        let value = position.balance_usd();
        total = &total + &value;
        println!(
            "  {} {} ({})",
            style(&position.display_props().title).green().bold(),
            style(format!("${value}")).bold(),
            position.app_id(),
        );
        println!("    {}", style(position.address()).dim());
    }
    println!();
    println!("  {} {}", style("Total:").bold(), style(format!("${total}")).bold());
}

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();
    let config = Config::from_env()?;

    let address = cli
        .address
        .as_deref()
        .map(Address::from_str)
        .transpose()
        .map_err(|e| color_eyre::eyre::eyre!("invalid address: {e}"))?;

    if !cli.json {
        print_banner(cli.network);
    }

    let chain = Arc::new(EvmChainReader::new(config.rpc_urls.clone()));

    let mut registry = HookRegistry::new();
    registry.register(Arc::new(Erc4626Hook::new(
        chain.clone(),
        config.erc4626_vaults.clone(),
    )));

    let resolver = PositionResolver::new(
        registry,
        chain,
        Arc::new(HttpTokenInfoSource::new(config.get_tokens_info_url)),
    );

    let positions = resolver
        .get_positions(cli.network, address, &cli.apps)
        .await?;

    if cli.json {
        println!("{}", serde_json::to_string_pretty(&positions)?);
    } else {
        print_positions(&positions);
    }

    Ok(())
}

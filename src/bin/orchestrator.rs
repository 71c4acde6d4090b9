//! Orchestrator CLI
//!
//! Thin command-line front end over the orchestrator library:
//! - `addresses`: print the smart account address on every configured chain
//! - `refresh`: print native and unified token balances
//! - `transfer`: send a token from several chains in one supertransaction
//!
//! ## Usage
//!
//! ```bash
//! cargo run --bin orchestrator -- --config config/orchestrator.toml refresh --token USDC
//! ```
//!
//! Or set the config path via environment variable:
//!
//! ```bash
//! ORCHESTRATOR_CONFIG_PATH=orchestrator.toml cargo run --bin orchestrator -- addresses
//! ```

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use orchestrator::{
    abi::parse_address,
    config::OrchestratorConfig,
    crypto::LocalSigner,
    error::ErrorKind,
    service::{Orchestrator, TransferRequest},
    units::{format_units, parse_units},
};
use std::sync::Arc;
use tracing::{info, warn};

#[derive(Parser, Debug)]
#[command(name = "orchestrator")]
#[command(about = "Multichain smart account orchestrator - unified balances and single-signature cross-chain transfers")]
struct Args {
    /// Path to configuration file (default: config/orchestrator.toml or ORCHESTRATOR_CONFIG_PATH env var)
    #[arg(short, long)]
    config: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the smart account address on every configured chain
    Addresses,
    /// Print native and token balances of the smart account
    Refresh {
        /// Token symbol (e.g. USDC)
        #[arg(long)]
        token: String,
        /// Chain IDs to query (default: every chain the token is mapped on)
        #[arg(long = "chain")]
        chains: Vec<u64>,
    },
    /// Transfer a token from one or more chains in a single supertransaction
    Transfer {
        /// Token symbol (e.g. USDC)
        #[arg(long)]
        token: String,
        /// Recipient address (0x-prefixed)
        #[arg(long)]
        recipient: String,
        /// Amount per chain as CHAIN:AMOUNT in token units (e.g. 84532:0.3)
        #[arg(long = "amount", required = true)]
        amounts: Vec<String>,
        /// Chain whose token deployment pays the relay fee
        #[arg(long)]
        fee_chain: u64,
        /// Wait until every chain reaches a final status
        #[arg(long)]
        wait: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command line arguments first (before initializing logging)
    let args = Args::parse();

    // Initialize structured logging
    tracing_subscriber::fmt::init();

    // Priority: CLI arg > env var > default
    let config = OrchestratorConfig::load_from_path(args.config.as_deref())
        .context("Failed to load orchestrator configuration")?;
    info!("Relay URL: {}", config.service.relay_url);

    let private_key = config
        .signer
        .get_private_key()
        .context("Failed to read signer private key")?;
    let signer = Arc::new(LocalSigner::from_bytes(&private_key).context("Invalid signer private key")?);

    let orchestrator = Orchestrator::from_config(&config, signer)
        .context("Failed to initialize orchestrator")?;

    match args.command {
        Command::Addresses => {
            let account = orchestrator.account();
            println!("Owner: {:?}", account.owner());
            for (chain_id, address) in account.addresses() {
                println!(
                    "{} ({}): {:?}",
                    orchestrator.registry().display_name(*chain_id),
                    chain_id,
                    address
                );
            }
        }
        Command::Refresh { token, chains } => {
            let view = orchestrator
                .refresh_view(&chains, &token)
                .await
                .context("Failed to refresh balances")?;

            println!("Owner: {:?}", view.owner);
            for ((chain_id, address), native) in view.addresses.iter().zip(&view.native) {
                let token_amount = view.token.on_chain(*chain_id).unwrap_or_default();
                println!(
                    "{} ({}): {:?}  native {}  {} {}",
                    orchestrator.registry().display_name(*chain_id),
                    chain_id,
                    address,
                    native.formatted(),
                    format_units(token_amount, view.token.decimals),
                    view.token.token
                );
            }
            println!("Total: {} {}", view.token.formatted_total(), view.token.token);
        }
        Command::Transfer {
            token,
            recipient,
            amounts,
            fee_chain,
            wait,
        } => {
            let decimals = orchestrator.tokens().mapping(&token)?.decimals();
            let amounts = amounts
                .iter()
                .map(|entry| parse_amount(entry, decimals))
                .collect::<Result<Vec<_>>>()?;
            let request = TransferRequest {
                token,
                recipient: parse_address(&recipient).context("Invalid recipient address")?,
                amounts,
                fee_chain,
            };

            let handle = match orchestrator.submit_transfer(&request).await {
                Ok(handle) => handle,
                // Relay unreachable after signing: one more round with the same signature
                Err(err) if err.kind() == ErrorKind::Pending => {
                    warn!("{}", err);
                    let pending = err.into_pending().context("Pending error without submission")?;
                    orchestrator
                        .resume_submission(pending)
                        .await
                        .context("Failed to resubmit signed execution")?
                }
                Err(err) => return Err(err.into()),
            };
            println!("Submitted: {:?}", handle.aggregate_hash);

            if wait {
                let chains: Vec<u64> = request.amounts.iter().map(|(chain_id, _)| *chain_id).collect();
                let report = orchestrator
                    .await_execution(&handle, &chains)
                    .await?
                    .into_result()?;
                println!("Confirmed: {}", report.summary());
            }
        }
    }

    Ok(())
}

/// Parses `CHAIN:AMOUNT` into a chain ID and raw token amount.
fn parse_amount(entry: &str, decimals: u8) -> Result<(u64, ethereum_types::U256)> {
    let (chain, amount) = entry
        .split_once(':')
        .with_context(|| format!("Amount '{}' must be CHAIN:AMOUNT", entry))?;
    let chain_id = chain
        .parse::<u64>()
        .with_context(|| format!("Invalid chain ID in '{}'", entry))?;
    let raw = parse_units(amount, decimals).with_context(|| format!("Invalid amount in '{}'", entry))?;
    Ok((chain_id, raw))
}

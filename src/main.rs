//! mintforge - Solana token creation CLI
//!
//! Creates a fungible SPL token with Metaplex metadata in one run:
//! mint, holding account, initial supply, off-chain metadata, on-chain
//! metadata and the requested authority changes.

// Compiler warning configuration
#![deny(unused_imports)]
#![deny(unused_mut)]
#![deny(unused_variables)]
#![warn(dead_code)]
#![warn(unused_must_use)]

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use mintforge::config::Config;
use mintforge::funding::FundingValidator;
use mintforge::metadata::HttpMetadataStore;
use mintforge::metrics::metrics;
use mintforge::observability::ProgressEvent;
use mintforge::orchestrator::CreationOrchestrator;
use mintforge::rpc_manager::{EndpointResolver, SolanaRpcConnector};
use mintforge::tx_builder::planned_step_count;
use mintforge::types::{CreationRequest, CreationResult};
use mintforge::wallet::WalletManager;

/// Command line arguments
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "mintforge.toml", global = true)]
    config: PathBuf,

    /// Payer keypair file (JSON byte array or base58)
    #[arg(short, long, global = true)]
    keypair: Option<PathBuf>,

    /// Payer secret key, base58
    #[arg(long, env = "MINTFORGE_PAYER_KEY", hide_env_values = true, global = true)]
    payer_key: Option<String>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Create the token described in the config file
    Create,
    /// Validate the config and print the transactions a run would submit
    Plan,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command line arguments
    let args = Args::parse();

    let config = Config::from_file_with_env(&args.config)
        .with_context(|| format!("Failed to load config from {}", args.config.display()))?;

    // Initialize logging
    init_logging(&config, args.verbose)?;
    info!("Version: {}", env!("CARGO_PKG_VERSION"));

    let payer_key = resolve_payer_key(&args)?;
    let form = config.to_form(&payer_key)?;

    match args.command {
        Command::Plan => {
            let request = CreationRequest::from_form(&form)?;
            let orchestrator = build_orchestrator(&config)?;
            print_plan(&orchestrator, &request, &config)
        }
        Command::Create => {
            let (tx, rx) = mpsc::unbounded_channel();
            let orchestrator = build_orchestrator(&config)?.with_progress(tx);
            let printer = tokio::spawn(print_progress(rx));

            let outcome = orchestrator.run(&form).await;
            // Closes the progress channel
            drop(orchestrator);
            printer.await.context("progress printer panicked")?;

            if config.monitoring.print_metrics {
                println!("{}", metrics().render()?);
            }

            let result = outcome?;
            print_result(&result);
            Ok(())
        }
    }
}

/// Initialize logging subsystem
fn init_logging(config: &Config, verbose: bool) -> Result<()> {
    let env_filter = if verbose {
        "mintforge=debug,info".to_string()
    } else {
        config.monitoring.log_filter.clone()
    };
    let json = config.monitoring.json_logs;

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| env_filter.into()),
        )
        .with(json.then(|| tracing_subscriber::fmt::layer().json()))
        .with((!json).then(|| tracing_subscriber::fmt::layer().with_target(true)))
        .try_init()
        .context("Failed to initialize logging")?;

    Ok(())
}

/// `--keypair` wins over `MINTFORGE_PAYER_KEY`
fn resolve_payer_key(args: &Args) -> Result<String> {
    if let Some(path) = &args.keypair {
        let wallet = WalletManager::from_file(path)
            .with_context(|| format!("Failed to load keypair from {}", path.display()))?;
        info!("Payer: {}", wallet.pubkey());
        return Ok(bs58::encode(wallet.keypair().to_bytes()).into_string());
    }
    args.payer_key
        .clone()
        .context("No payer key: pass --keypair or set MINTFORGE_PAYER_KEY")
}

fn build_orchestrator(config: &Config) -> Result<CreationOrchestrator> {
    let connector = Arc::new(SolanaRpcConnector::new(config.rpc.request_timeout()));
    let resolver = EndpointResolver::new(config.rpc.clone(), connector);
    let store = HttpMetadataStore::new(&config.metadata_store)?;

    Ok(CreationOrchestrator::new(
        resolver,
        FundingValidator::new(config.funding),
        Arc::new(store),
    ))
}

async fn print_progress(mut rx: mpsc::UnboundedReceiver<ProgressEvent>) {
    while let Some(event) = rx.recv().await {
        match event {
            ProgressEvent::StateChanged { to, .. } => println!("==> {}", to),
            ProgressEvent::Log(line) => println!("{}", line),
        }
    }
}

fn print_plan(
    orchestrator: &CreationOrchestrator,
    request: &CreationRequest,
    config: &Config,
) -> Result<()> {
    let token = request.token();
    let plan = orchestrator.preview(request)?;
    let steps = planned_step_count(request.authorities());

    println!(
        "{} ({}) on {}: {} base units, {} decimals",
        token.name,
        token.symbol,
        request.network(),
        token.base_unit_supply(),
        token.decimals
    );
    println!("Payer: {}", request.payer().pubkey());
    println!("  1. create-mint({} decimals)", token.decimals);
    println!("  2. create-holding-account");
    println!("  3. mint-to({})", token.base_unit_supply());
    for (offset, kind) in plan.kinds().iter().enumerate() {
        println!("  {}. {}", offset + 4, kind);
    }
    println!(
        "Funding: mint rent + {} x {} lamports + {} lamports buffer",
        steps, config.funding.fee_per_transaction, config.funding.fixed_buffer
    );
    Ok(())
}

fn print_result(result: &CreationResult) {
    println!();
    println!("Mint:             {}", result.mint);
    println!("Holding account:  {}", result.holding_account);
    println!("Metadata account: {}", result.metadata_account);
    println!("Metadata URI:     {}", result.metadata_uri);
    println!("Endpoint:         {}", result.endpoint);
    println!("Mint authority:   {}", result.authorities.mint);
    println!("Freeze authority: {}", result.authorities.freeze);
    println!("Update authority: {}", result.authorities.update);
    println!("Metadata mutable: {}", result.authorities.metadata_mutable);
    println!("Explorer:         {}", result.mint_explorer_url());
    for url in result.transaction_explorer_urls() {
        println!("  {}", url);
    }
}

//! Command-line interface for chain-loadtest
//!
//! # Usage Examples
//!
//! ## Load Run
//! ```bash
//! # Generate 100 accounts, deploy the token, fund, send 100 txs per account
//! chain-loadtest run \
//!   --host http://localhost:8545 --chain-id 901 \
//!   --accounts-file accounts.txt \
//!   --output-dir data-eth-erc20 \
//!   --num-accounts 100 --txcount 100
//!
//! # Reuse a deployed token and price native transfers with a flat gas price
//! chain-loadtest run \
//!   --accounts-file accounts.txt --output-dir data \
//!   --token-address 0x5FbDB2315678afecb367f032d93F642f64180aa3 \
//!   --native-pricing fixed
//! ```
//!
//! ## Funding Only
//! ```bash
//! chain-loadtest fund --accounts-file accounts.txt --fund-amount 0.05
//! ```
//!
//! ## Report
//! ```bash
//! chain-loadtest report --output-dir data-eth-erc20
//! chain-loadtest report --output-dir data-eth-erc20 --format json
//! ```
//!
//! Set `RUST_LOG` to change verbosity (default `info`).

use chain_loadtest::loadtest::{run_loadtest, run_loadtest_fund, run_loadtest_report};
use chain_loadtest::{FundArgs, ReportArgs, RunArgs};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "chain-loadtest")]
#[command(about = "Fund test accounts and drive native and ERC20 transfers against an EVM ledger")]
#[command(long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Deploy the test token, fund the accounts and run the transfer workers
    Run(Box<RunArgs>),

    /// Deploy (or attach to) the test token and fund the accounts only
    Fund(Box<FundArgs>),

    /// Summarize the CSV artifacts of a run
    Report(ReportArgs),
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    if let Err(e) = run().await {
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
    Ok(())
}

async fn run() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run(args) => run_loadtest(*args).await,
        Commands::Fund(args) => run_loadtest_fund(*args).await,
        Commands::Report(args) => run_loadtest_report(args).await,
    }
}

//! chain-loadtest library
//!
//! A load generator for EVM ledgers: it provisions test accounts, funds them
//! with native currency and a test token, then runs one transfer worker per
//! account while recording the confirmation latency of every transaction.
//!
//! # CLI Usage
//!
//! ```bash
//! # Full run: accounts, token deployment, funding, transfers
//! chain-loadtest run --accounts-file accounts.txt --output-dir data --txcount 100
//!
//! # Same pipeline against the in-process ledger, no node required
//! chain-loadtest run --accounts-file accounts.txt --output-dir data --dry-run
//!
//! # Only fund the accounts
//! chain-loadtest fund --accounts-file accounts.txt --fund-amount 0.05
//!
//! # Summarize the CSV artifacts of a run
//! chain-loadtest report --output-dir data --format json
//! ```

use alloy_primitives::utils::parse_ether;
use alloy_primitives::{Address, U256};
use clap::{Args, ValueEnum};
use loadtest_engine::PricingMode;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

pub mod loadtest;

/// Private key of the first well-known local development account.
pub const DEV_FAUCET_KEY: &str =
    "0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";

/// Connection to the ledger.
#[derive(Args, Clone, Debug)]
pub struct ChainOpts {
    /// JSON-RPC endpoint
    #[arg(long, default_value = "http://localhost:8545", env = "CHAIN_HOST")]
    pub host: String,

    /// Expected chain id, verified against the endpoint
    #[arg(long, default_value = "901", env = "CHAIN_ID")]
    pub chain_id: u64,

    /// Faucet private key (hex) funding the test accounts
    #[arg(long, default_value = DEV_FAUCET_KEY, env = "FAUCET_PK", hide_env_values = true)]
    pub faucet_pk: String,

    /// Deadline for each confirmation wait, in seconds
    #[arg(long, default_value = "60")]
    pub confirmation_timeout_secs: u64,

    /// Run against an in-process ledger instead of the endpoint
    #[arg(long)]
    pub dry_run: bool,
}

impl ChainOpts {
    pub fn confirmation_timeout(&self) -> Duration {
        Duration::from_secs(self.confirmation_timeout_secs)
    }
}

/// Test account key file.
#[derive(Args, Clone, Debug)]
pub struct AccountOpts {
    /// File with one private key per line; created when absent
    #[arg(long, env = "ACCOUNTS_FILE")]
    pub accounts_file: PathBuf,

    /// Number of accounts to create when the accounts file does not exist
    #[arg(long, default_value = "100")]
    pub num_accounts: usize,
}

/// Test token contract.
#[derive(Args, Clone, Debug)]
pub struct TokenOpts {
    /// Foundry artifact of the test token
    #[arg(long, default_value = "contracts/out/Token.sol/TestToken.json")]
    pub token_artifact: PathBuf,

    /// Use an already deployed token instead of deploying a new one
    #[arg(long)]
    pub token_address: Option<Address>,
}

/// Funding amounts and pricing.
#[derive(Args, Clone, Debug)]
pub struct FundOpts {
    /// Native balance every account is topped up to, in ether
    #[arg(long, default_value = "0.01", value_parser = parse_ether_amount)]
    pub fund_amount: U256,

    /// Token base units sent to every account
    #[arg(long, default_value = "1000000000000000000", value_parser = parse_units)]
    pub token_fund_amount: U256,

    /// Pricing of native transfers (token transfers always use dynamic pricing)
    #[arg(long, value_enum, default_value = "dynamic")]
    pub native_pricing: PricingMode,
}

/// Arguments of `run`.
#[derive(Args, Clone, Debug)]
pub struct RunArgs {
    #[command(flatten)]
    pub chain: ChainOpts,

    #[command(flatten)]
    pub accounts: AccountOpts,

    #[command(flatten)]
    pub token: TokenOpts,

    #[command(flatten)]
    pub fund: FundOpts,

    /// Directory receiving one CSV artifact per worker
    #[arg(long, env = "OUTPUT_DIR")]
    pub output_dir: PathBuf,

    /// Prefix of the CSV artifact file names
    #[arg(long, default_value = "")]
    pub output_prefix: String,

    /// Transactions sent by every account
    #[arg(long, default_value = "100")]
    pub txcount: usize,

    /// Seed for recipient and kind selection; worker i uses seed + i
    #[arg(long)]
    pub seed: Option<u64>,
}

/// Arguments of `fund`.
#[derive(Args, Clone, Debug)]
pub struct FundArgs {
    #[command(flatten)]
    pub chain: ChainOpts,

    #[command(flatten)]
    pub accounts: AccountOpts,

    #[command(flatten)]
    pub token: TokenOpts,

    #[command(flatten)]
    pub fund: FundOpts,
}

/// Report output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum ReportFormat {
    #[default]
    Table,
    Json,
}

/// Arguments of `report`.
#[derive(Args, Clone, Debug)]
pub struct ReportArgs {
    /// Directory holding the CSV artifacts of a run
    #[arg(long, env = "OUTPUT_DIR")]
    pub output_dir: PathBuf,

    /// Output format
    #[arg(long, value_enum, default_value = "table")]
    pub format: ReportFormat,
}

/// Parse a decimal ether amount such as `0.01` into wei.
pub fn parse_ether_amount(value: &str) -> Result<U256, String> {
    parse_ether(value.trim()).map_err(|e| format!("invalid ether amount '{value}': {e}"))
}

/// Parse an integer amount of base units.
pub fn parse_units(value: &str) -> Result<U256, String> {
    U256::from_str(value.trim()).map_err(|e| format!("invalid amount '{value}': {e}"))
}

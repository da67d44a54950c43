//! Loadtest fund command handler.

use alloy_primitives::Address;
use anyhow::Context;
use chain_client::{ChainClient, Identity, TestToken};
use loadtest_engine::{FeeStrategy, FundingConfig, FundingOrchestrator, FundingSummary};
use std::sync::Arc;

use super::setup::{connect, dry_run_chain, load_accounts, load_faucet, prepare_token};
use crate::{FundArgs, FundOpts};

/// Fund `accounts` from the faucet and log a summary of the outcomes.
pub async fn fund_accounts<C: ChainClient + 'static>(
    client: Arc<C>,
    faucet: Arc<Identity>,
    accounts: &[Address],
    token: &TestToken,
    opts: &FundOpts,
) -> anyhow::Result<FundingSummary> {
    tracing::info!("Funding {} accounts", accounts.len());

    let config = FundingConfig::default()
        .with_target_balance(opts.fund_amount)
        .with_token_amount(opts.token_fund_amount);
    let orchestrator =
        FundingOrchestrator::new(client, FeeStrategy::new(opts.native_pricing), config);

    let outcomes = orchestrator
        .fund(accounts, token, faucet)
        .await
        .context("Failed to start funding")?;
    let summary = FundingSummary::from_outcomes(&outcomes);

    tracing::info!(
        "Funding submitted: {} native top-ups, {} already funded, {} token transfers, {} accounts with failures",
        summary.native_submitted,
        summary.native_skipped,
        summary.token_submitted,
        summary.failed
    );
    Ok(summary)
}

/// Run the fund command: accounts, token, funding.
pub async fn run_loadtest_fund(args: FundArgs) -> anyhow::Result<()> {
    let identities = load_accounts(&args.accounts)?;
    let addresses: Vec<Address> = identities.iter().map(Identity::address).collect();
    let faucet = load_faucet(&args.chain)?;
    let timeout = args.chain.confirmation_timeout();

    if args.chain.dry_run {
        let client = Arc::new(dry_run_chain(&args.chain, &faucet));
        let token = prepare_token(client.as_ref(), &faucet, &args.token, timeout).await?;
        fund_accounts(client, Arc::new(faucet), &addresses, &token, &args.fund).await?;
    } else {
        let client = Arc::new(connect(&args.chain).await?);
        let token = prepare_token(client.as_ref(), &faucet, &args.token, timeout).await?;
        fund_accounts(client, Arc::new(faucet), &addresses, &token, &args.fund).await?;
    }

    tracing::info!("Done");
    Ok(())
}

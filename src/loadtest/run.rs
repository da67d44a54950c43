//! Loadtest run command handler.

use alloy_primitives::Address;
use anyhow::Context;
use chain_client::{ChainClient, Identity};
use loadtest_engine::{
    FeeStrategy, FundingSummary, MetricsSink, TransferConfig, TransferEngine, TransferSummary,
};
use std::sync::Arc;

use super::fund::fund_accounts;
use super::setup::{connect, dry_run_chain, load_accounts, load_faucet, prepare_token};
use crate::RunArgs;

/// What a complete run did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunReport {
    pub token: Address,
    pub funding: FundingSummary,
    pub transfers: TransferSummary,
}

/// Deploy the token, fund `identities` and drive the transfer workers.
///
/// Individual funding and transfer failures never fail the run; they are
/// logged and counted in the returned report.
pub async fn execute_run<C: ChainClient + 'static>(
    client: Arc<C>,
    faucet: Identity,
    identities: Vec<Identity>,
    args: &RunArgs,
) -> anyhow::Result<RunReport> {
    let timeout = args.chain.confirmation_timeout();
    let token = prepare_token(client.as_ref(), &faucet, &args.token, timeout).await?;

    let addresses: Vec<Address> = identities.iter().map(Identity::address).collect();
    let funding = fund_accounts(
        Arc::clone(&client),
        Arc::new(faucet),
        &addresses,
        &token,
        &args.fund,
    )
    .await?;

    tracing::info!(
        "Sending {} transactions from {} accounts",
        args.txcount,
        identities.len()
    );
    let config = TransferConfig::default()
        .with_ops_per_account(args.txcount)
        .with_confirmation_timeout(timeout)
        .with_seed(args.seed);
    let engine = TransferEngine::new(
        client,
        FeeStrategy::new(args.fund.native_pricing),
        token.clone(),
        config,
    );
    let sink = MetricsSink::new(&args.output_dir).with_prefix(args.output_prefix.clone());
    let runs = engine.run_all(identities, &sink).await;
    let transfers = TransferSummary::from_runs(&runs);

    tracing::info!(
        "Transfers finished: {} workers, {} confirmed operations ({} failed on chain), {} workers stopped early, {} artifacts in {:?}",
        transfers.workers,
        transfers.operations,
        transfers.failed_on_chain,
        transfers.aborted_workers,
        transfers.artifacts,
        args.output_dir
    );

    Ok(RunReport {
        token: token.address(),
        funding,
        transfers,
    })
}

/// Run the full pipeline: accounts, token, funding, transfers.
pub async fn run_loadtest(args: RunArgs) -> anyhow::Result<()> {
    std::fs::create_dir_all(&args.output_dir)
        .with_context(|| format!("Failed to create output directory: {:?}", args.output_dir))?;

    let identities = load_accounts(&args.accounts)?;
    let faucet = load_faucet(&args.chain)?;

    if args.chain.dry_run {
        let client = Arc::new(dry_run_chain(&args.chain, &faucet));
        execute_run(client, faucet, identities, &args).await?;
    } else {
        let client = Arc::new(connect(&args.chain).await?);
        execute_run(client, faucet, identities, &args).await?;
    }

    tracing::info!("Done");
    Ok(())
}

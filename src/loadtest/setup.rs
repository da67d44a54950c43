//! Startup steps shared by the `run` and `fund` commands.
//!
//! Every failure here is fatal: the accounts, the faucet, the ledger
//! connection and the token contract are needed by every later phase.

use alloy_primitives::U256;
use anyhow::Context;
use chain_client::{
    deploy_test_token, ChainClient, ContractArtifact, Identity, InMemoryChain, RpcChainClient,
    TestToken,
};
use std::time::Duration;

use crate::{AccountOpts, ChainOpts, TokenOpts};

/// Native balance of the faucet on the in-process ledger: one million ether.
pub const DRY_RUN_FAUCET_BALANCE: u128 = 1_000_000 * 1_000_000_000_000_000_000;

/// Decode the faucet key.
pub fn load_faucet(opts: &ChainOpts) -> anyhow::Result<Identity> {
    let faucet = Identity::from_hex(&opts.faucet_pk).context("Failed to load faucet private key")?;
    tracing::info!("Faucet account: {}", faucet.address());
    Ok(faucet)
}

/// Load the test accounts, generating and saving them when the file is absent.
pub fn load_accounts(opts: &AccountOpts) -> anyhow::Result<Vec<Identity>> {
    loadtest_engine::load_or_create(&opts.accounts_file, opts.num_accounts).with_context(|| {
        format!(
            "Failed to read or create accounts in {:?}",
            opts.accounts_file
        )
    })
}

/// Connect to the configured endpoint.
pub async fn connect(opts: &ChainOpts) -> anyhow::Result<RpcChainClient> {
    RpcChainClient::connect(&opts.host, opts.chain_id)
        .await
        .with_context(|| format!("Failed to connect to {}", opts.host))
}

/// Build the in-process ledger used by `--dry-run`, with a funded faucet.
pub fn dry_run_chain(opts: &ChainOpts, faucet: &Identity) -> InMemoryChain {
    tracing::info!(
        "[DRY-RUN] Using in-process ledger (chain id {}) instead of {}",
        opts.chain_id,
        opts.host
    );
    InMemoryChain::new(opts.chain_id)
        .with_balance(faucet.address(), U256::from(DRY_RUN_FAUCET_BALANCE))
}

/// Deploy the test token, or attach to the one given by `--token-address`.
pub async fn prepare_token<C: ChainClient + ?Sized>(
    client: &C,
    faucet: &Identity,
    opts: &TokenOpts,
    timeout: Duration,
) -> anyhow::Result<TestToken> {
    let artifact = ContractArtifact::from_file(&opts.token_artifact)
        .with_context(|| format!("Failed to load token artifact {:?}", opts.token_artifact))?;

    if let Some(address) = opts.token_address {
        tracing::info!("Using deployed token contract at {}", address);
        return Ok(TestToken::attach(address, artifact.abi));
    }

    tracing::info!("Deploying ERC20 test contract");
    let token = deploy_test_token(client, faucet, &artifact, timeout)
        .await
        .context("Failed to deploy test token contract")?;
    tracing::info!("Deployed contract at {}", token.address());
    Ok(token)
}

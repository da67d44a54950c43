//! End-to-end load run against the in-process ledger.
//!
//! These tests drive the whole pipeline without a node:
//! 1. Generate (or load) the test accounts
//! 2. Deploy the test token from a Foundry artifact
//! 3. Fund every account with native currency and tokens
//! 4. Run one transfer worker per account
//! 5. Aggregate the CSV artifacts into a report

use alloy_primitives::U256;
use chain_client::{ChainClient, Identity, InMemoryChain};
use chain_loadtest::loadtest::{execute_run, fund_accounts, run_loadtest};
use chain_loadtest::{
    AccountOpts, ChainOpts, FundOpts, RunArgs, TokenOpts, DEV_FAUCET_KEY,
};
use loadtest_engine::{load_or_create, PricingMode};
use loadtest_report::{aggregate_dir, format_json};
use std::path::Path;
use std::sync::Arc;
use tempfile::TempDir;

const NUM_ACCOUNTS: usize = 4;
const TXCOUNT: usize = 6;
const TOKEN_FUND_AMOUNT: u128 = 1_000_000_000_000_000_000;
const FUND_AMOUNT: u128 = 10_000_000_000_000_000;

const TOKEN_ARTIFACT: &str = r#"{
    "abi": [
        {
            "type": "constructor",
            "inputs": [{"name": "owner", "type": "address", "internalType": "address"}],
            "stateMutability": "nonpayable"
        },
        {
            "type": "function",
            "name": "transfer",
            "inputs": [
                {"name": "to", "type": "address", "internalType": "address"},
                {"name": "value", "type": "uint256", "internalType": "uint256"}
            ],
            "outputs": [{"name": "", "type": "bool", "internalType": "bool"}],
            "stateMutability": "nonpayable"
        }
    ],
    "bytecode": {"object": "0x608060405234801561001057600080fd5b50"}
}"#;

fn run_args(dir: &Path, dry_run: bool) -> RunArgs {
    let artifact = dir.join("TestToken.json");
    std::fs::write(&artifact, TOKEN_ARTIFACT).unwrap();

    RunArgs {
        chain: ChainOpts {
            host: "http://localhost:8545".to_string(),
            chain_id: 901,
            faucet_pk: DEV_FAUCET_KEY.to_string(),
            confirmation_timeout_secs: 5,
            dry_run,
        },
        accounts: AccountOpts {
            accounts_file: dir.join("accounts.txt"),
            num_accounts: NUM_ACCOUNTS,
        },
        token: TokenOpts {
            token_artifact: artifact,
            token_address: None,
        },
        fund: FundOpts {
            fund_amount: U256::from(FUND_AMOUNT),
            token_fund_amount: U256::from(TOKEN_FUND_AMOUNT),
            native_pricing: PricingMode::Dynamic,
        },
        output_dir: dir.join("data"),
        output_prefix: "run-".to_string(),
        txcount: TXCOUNT,
        seed: Some(42),
    }
}

fn funded_chain(faucet: &Identity) -> Arc<InMemoryChain> {
    Arc::new(
        InMemoryChain::new(901).with_balance(
            faucet.address(),
            U256::from(100u128 * 1_000_000_000_000_000_000),
        ),
    )
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_full_run_against_in_memory_ledger() {
    tracing_subscriber::fmt()
        .with_env_filter("chain_loadtest=info,loadtest_engine=info")
        .try_init()
        .ok();

    let dir = TempDir::new().unwrap();
    let args = run_args(dir.path(), false);
    let faucet = Identity::from_hex(DEV_FAUCET_KEY).unwrap();
    let chain = funded_chain(&faucet);
    let identities = load_or_create(&args.accounts.accounts_file, NUM_ACCOUNTS).unwrap();
    let addresses: Vec<_> = identities.iter().map(Identity::address).collect();

    let report = execute_run(Arc::clone(&chain), faucet, identities, &args)
        .await
        .unwrap();

    assert_eq!(report.funding.accounts, NUM_ACCOUNTS);
    assert_eq!(report.funding.native_submitted, NUM_ACCOUNTS);
    assert_eq!(report.funding.token_submitted, NUM_ACCOUNTS);
    assert_eq!(report.funding.failed, 0);

    assert_eq!(report.transfers.workers, NUM_ACCOUNTS);
    assert_eq!(report.transfers.operations, NUM_ACCOUNTS * TXCOUNT);
    assert_eq!(report.transfers.failed_on_chain, 0);
    assert_eq!(report.transfers.aborted_workers, 0);
    assert_eq!(report.transfers.artifacts, NUM_ACCOUNTS);

    // Each worker used exactly the nonces 0..TXCOUNT.
    for address in &addresses {
        let nonces: Vec<u64> = chain
            .submissions_from(*address)
            .iter()
            .map(|tx| tx.transaction.nonce)
            .collect();
        assert_eq!(nonces, (0..TXCOUNT as u64).collect::<Vec<_>>());
    }

    // Token transfers only move balances between the test accounts.
    let total: U256 = addresses
        .iter()
        .map(|a| chain.token_balance(report.token, *a))
        .fold(U256::ZERO, |acc, b| acc + b);
    assert_eq!(total, U256::from(NUM_ACCOUNTS as u128 * TOKEN_FUND_AMOUNT));

    let summary = aggregate_dir(&args.output_dir).unwrap();
    assert_eq!(summary.artifacts, NUM_ACCOUNTS);
    assert_eq!(summary.overall.operations, NUM_ACCOUNTS * TXCOUNT);
    assert_eq!(summary.overall.success_rate, 1.0);

    let json: serde_json::Value = serde_json::from_str(&format_json(&summary).unwrap()).unwrap();
    assert_eq!(json["overall"]["operations"], NUM_ACCOUNTS * TXCOUNT);
}

#[tokio::test]
async fn test_refunding_skips_funded_accounts() {
    let dir = TempDir::new().unwrap();
    let args = run_args(dir.path(), false);
    let faucet = Identity::from_hex(DEV_FAUCET_KEY).unwrap();
    let chain = funded_chain(&faucet);
    let token = chain_client::deploy_test_token(
        chain.as_ref(),
        &faucet,
        &chain_client::ContractArtifact::from_file(&args.token.token_artifact).unwrap(),
        std::time::Duration::from_secs(5),
    )
    .await
    .unwrap();
    let faucet = Arc::new(faucet);
    let accounts: Vec<_> = (0..3).map(|_| Identity::generate().address()).collect();

    let first = fund_accounts(
        Arc::clone(&chain),
        Arc::clone(&faucet),
        &accounts,
        &token,
        &args.fund,
    )
    .await
    .unwrap();
    assert_eq!(first.native_submitted, 3);

    let second = fund_accounts(
        Arc::clone(&chain),
        Arc::clone(&faucet),
        &accounts,
        &token,
        &args.fund,
    )
    .await
    .unwrap();
    assert_eq!(second.native_skipped, 3);
    assert_eq!(second.token_submitted, 3);

    for account in &accounts {
        assert_eq!(chain.balance(*account).await.unwrap(), U256::from(FUND_AMOUNT));
        assert_eq!(
            chain.token_balance(token.address(), *account),
            U256::from(2 * TOKEN_FUND_AMOUNT)
        );
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_dry_run_command_writes_artifacts() {
    let dir = TempDir::new().unwrap();
    let args = run_args(dir.path(), true);
    let output_dir = args.output_dir.clone();
    let accounts_file = args.accounts.accounts_file.clone();

    run_loadtest(args).await.unwrap();

    let keys = std::fs::read_to_string(accounts_file).unwrap();
    assert_eq!(keys.lines().count(), NUM_ACCOUNTS);

    let artifacts: Vec<_> = std::fs::read_dir(&output_dir)
        .unwrap()
        .map(|e| e.unwrap().file_name().into_string().unwrap())
        .collect();
    assert_eq!(artifacts.len(), NUM_ACCOUNTS);
    assert!(artifacts
        .iter()
        .all(|name| name.starts_with("run-") && name.ends_with(".csv")));

    for artifact in &artifacts {
        let content = std::fs::read_to_string(output_dir.join(artifact)).unwrap();
        assert_eq!(content.lines().count(), TXCOUNT + 1);
    }
}

#[tokio::test]
async fn test_missing_artifact_is_fatal() {
    let dir = TempDir::new().unwrap();
    let mut args = run_args(dir.path(), true);
    args.token.token_artifact = dir.path().join("missing.json");

    let err = run_loadtest(args).await.unwrap_err();
    assert!(format!("{err:#}").contains("token artifact"));
}

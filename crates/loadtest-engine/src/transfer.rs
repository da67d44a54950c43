//! Concurrent transfer workers.
//!
//! One worker runs per test account. A worker issues a fixed number of
//! operations, strictly one after another: each picks a random recipient
//! among the peers (the sender included) and a random kind, takes the next
//! nonce from the worker's own counter, prices the operation, submits it and
//! blocks until it is confirmed. The first error stops the worker; the
//! results gathered so far are kept and flushed.
//!
//! Workers share only the client, the token and the read-only peer list.

use crate::fee::FeeStrategy;
use crate::intent::{transfer_call, TransferIntent, TransferKind};
use crate::metrics::{MetricsSink, OperationResult};
use crate::sequence::{OwnedSequence, SequenceAllocator};
use alloy_primitives::{Address, U256};
use chain_client::{ChainClient, ChainError, Identity, Result, TestToken};
use chrono::Utc;
use futures::future::join_all;
use rand::rngs::StdRng;
use rand::seq::IndexedRandom;
use rand::{Rng, SeedableRng};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info};

/// Default number of operations per account.
pub const DEFAULT_OPS_PER_ACCOUNT: usize = 100;

/// Default deadline for a single confirmation.
pub const DEFAULT_CONFIRMATION_TIMEOUT: Duration = Duration::from_secs(60);

/// Transfer phase parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferConfig {
    /// Operations each worker issues.
    pub ops_per_account: usize,
    /// Wei moved by a native transfer.
    pub native_amount: U256,
    /// Token units moved by a token transfer.
    pub token_amount: U256,
    /// Deadline for each confirmation wait.
    pub confirmation_timeout: Duration,
    /// Worker `i` seeds its RNG with `seed + i`; `None` uses OS entropy.
    pub seed: Option<u64>,
}

impl Default for TransferConfig {
    fn default() -> Self {
        Self {
            ops_per_account: DEFAULT_OPS_PER_ACCOUNT,
            native_amount: U256::from(1),
            token_amount: U256::from(1),
            confirmation_timeout: DEFAULT_CONFIRMATION_TIMEOUT,
            seed: None,
        }
    }
}

impl TransferConfig {
    pub fn with_ops_per_account(mut self, ops_per_account: usize) -> Self {
        self.ops_per_account = ops_per_account;
        self
    }

    pub fn with_amounts(mut self, native_amount: U256, token_amount: U256) -> Self {
        self.native_amount = native_amount;
        self.token_amount = token_amount;
        self
    }

    pub fn with_confirmation_timeout(mut self, confirmation_timeout: Duration) -> Self {
        self.confirmation_timeout = confirmation_timeout;
        self
    }

    pub fn with_seed(mut self, seed: Option<u64>) -> Self {
        self.seed = seed;
        self
    }

    fn rng_for_worker(&self, index: usize) -> StdRng {
        match self.seed {
            Some(seed) => StdRng::seed_from_u64(seed.wrapping_add(index as u64)),
            None => StdRng::from_os_rng(),
        }
    }
}

/// What one worker produced.
#[derive(Debug)]
pub struct WorkerRun {
    pub address: Address,
    /// Results in issue order.
    pub results: Vec<OperationResult>,
    /// The error that stopped the worker early, if any.
    pub error: Option<ChainError>,
    /// Metrics artifact, when one was written.
    pub artifact: Option<PathBuf>,
}

impl WorkerRun {
    fn new(address: Address) -> Self {
        Self {
            address,
            results: Vec::new(),
            error: None,
            artifact: None,
        }
    }

    /// Whether the worker stopped before issuing every operation.
    pub fn aborted(&self) -> bool {
        self.error.is_some()
    }
}

/// Tallies over a transfer phase.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TransferSummary {
    pub workers: usize,
    pub operations: usize,
    pub failed_on_chain: usize,
    pub aborted_workers: usize,
    pub artifacts: usize,
}

impl TransferSummary {
    pub fn from_runs(runs: &[WorkerRun]) -> Self {
        runs.iter().fold(
            TransferSummary {
                workers: runs.len(),
                ..Default::default()
            },
            |mut summary, run| {
                summary.operations += run.results.len();
                summary.failed_on_chain += run.results.iter().filter(|r| !r.success).count();
                summary.aborted_workers += usize::from(run.aborted());
                summary.artifacts += usize::from(run.artifact.is_some());
                summary
            },
        )
    }
}

/// Drives transfer workers against a ledger.
pub struct TransferEngine<C: ChainClient + 'static> {
    client: Arc<C>,
    fees: FeeStrategy,
    token: TestToken,
    config: TransferConfig,
}

impl<C: ChainClient + 'static> Clone for TransferEngine<C> {
    fn clone(&self) -> Self {
        Self {
            client: Arc::clone(&self.client),
            fees: self.fees,
            token: self.token.clone(),
            config: self.config.clone(),
        }
    }
}

impl<C: ChainClient + 'static> TransferEngine<C> {
    pub fn new(client: Arc<C>, fees: FeeStrategy, token: TestToken, config: TransferConfig) -> Self {
        Self {
            client,
            fees,
            token,
            config,
        }
    }

    /// Run one worker per identity concurrently and flush each worker's
    /// results through `sink` when it finishes.
    ///
    /// Every identity is also a potential recipient for every worker.
    pub async fn run_all(&self, identities: Vec<Identity>, sink: &MetricsSink) -> Vec<WorkerRun> {
        let peers: Arc<Vec<Address>> = Arc::new(identities.iter().map(Identity::address).collect());

        info!(
            "Starting {} workers with {} operations each",
            identities.len(),
            self.config.ops_per_account
        );

        let handles: Vec<_> = identities
            .into_iter()
            .enumerate()
            .map(|(index, identity)| {
                let engine = self.clone();
                let peers = Arc::clone(&peers);
                let sink = sink.clone();
                let mut rng = self.config.rng_for_worker(index);
                tokio::spawn(async move {
                    let mut run = engine.run(&identity, &peers, &mut rng).await;
                    run.artifact = match sink.flush(&run.results) {
                        Ok(artifact) => artifact,
                        Err(e) => {
                            error!("Lost metrics of worker {}: {}", run.address, e);
                            None
                        }
                    };
                    run
                })
            })
            .collect();

        join_all(handles)
            .await
            .into_iter()
            .filter_map(|joined| match joined {
                Ok(run) => Some(run),
                Err(e) => {
                    error!("Transfer worker panicked: {}", e);
                    None
                }
            })
            .collect()
    }

    /// Issue up to `ops_per_account` operations from `identity`.
    ///
    /// The worker's nonce counter is seeded from the identity's pending
    /// nonce. The first failing operation ends the worker; no result exists
    /// for any operation after it.
    pub async fn run<R: Rng + Send>(
        &self,
        identity: &Identity,
        peers: &[Address],
        rng: &mut R,
    ) -> WorkerRun {
        let address = identity.address();
        let mut run = WorkerRun::new(address);

        let start = match self.client.sequence_number(address).await {
            Ok(start) => start,
            Err(e) => {
                error!("Worker {} could not read its nonce: {}", address, e);
                run.error = Some(e);
                return run;
            }
        };
        let mut sequence = OwnedSequence::new(start);

        for index in 0..self.config.ops_per_account {
            match self.execute(identity, peers, &mut sequence, rng).await {
                Ok(result) => {
                    debug!(
                        "Worker {} op {}: {} in block {} after {:?}",
                        address,
                        index,
                        result.tx_hash,
                        result.block_number,
                        result.latency()
                    );
                    run.results.push(result);
                }
                Err(e) => {
                    error!(
                        "Worker {} stopped after {} of {} operations: {}",
                        address, index, self.config.ops_per_account, e
                    );
                    run.error = Some(e);
                    break;
                }
            }
        }

        info!(
            "Worker {} finished with {} results",
            address,
            run.results.len()
        );
        run
    }

    async fn execute<R: Rng + Send>(
        &self,
        identity: &Identity,
        peers: &[Address],
        sequence: &mut OwnedSequence,
        rng: &mut R,
    ) -> Result<OperationResult> {
        let sender = identity.address();
        let recipient = peers.choose(rng).copied().unwrap_or(sender);
        let kind = TransferKind::random(rng);
        let nonce = sequence.next();

        let amount = match kind {
            TransferKind::Native => self.config.native_amount,
            TransferKind::Token => self.config.token_amount,
        };
        let call = transfer_call(kind, sender, recipient, amount, &self.token);
        let quote = self.fees.quote(self.client.as_ref(), kind, &call).await?;

        let intent = TransferIntent {
            kind,
            sender,
            recipient,
            amount,
            nonce,
            quote,
        };
        let signed = self.client.sign(identity, &intent.to_unsigned(&self.token))?;

        let start_time = Utc::now();
        let confirmation = self
            .client
            .submit_and_confirm(&signed, self.config.confirmation_timeout)
            .await?;
        let end_time = Utc::now();

        Ok(OperationResult {
            kind,
            pricing: quote.pricing,
            tx_hash: confirmation.tx_hash,
            block_number: confirmation.block_number,
            gas_used: confirmation.gas_used,
            success: confirmation.success,
            start_time,
            end_time,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fee::PricingMode;
    use chain_client::InMemoryChain;
    use tempfile::TempDir;

    const ONE_ETHER: u128 = 1_000_000_000_000_000_000;

    fn setup(count: usize) -> (Arc<InMemoryChain>, TestToken, Vec<Identity>) {
        let identities: Vec<Identity> = (0..count).map(|_| Identity::generate()).collect();
        let contract = Address::repeat_byte(0xcc);
        let mut chain = InMemoryChain::new(901);
        for identity in &identities {
            chain = chain.with_balance(identity.address(), U256::from(ONE_ETHER));
        }
        for identity in &identities {
            chain.register_token(contract, identity.address(), U256::from(1_000_000));
        }
        (
            Arc::new(chain),
            TestToken::attach(contract, Default::default()),
            identities,
        )
    }

    fn engine(
        chain: &Arc<InMemoryChain>,
        token: &TestToken,
        ops: usize,
    ) -> TransferEngine<InMemoryChain> {
        TransferEngine::new(
            Arc::clone(chain),
            FeeStrategy::new(PricingMode::Dynamic),
            token.clone(),
            TransferConfig::default()
                .with_ops_per_account(ops)
                .with_confirmation_timeout(Duration::from_secs(2))
                .with_seed(Some(7)),
        )
    }

    #[tokio::test]
    async fn test_worker_issues_contiguous_nonces() {
        let (chain, token, identities) = setup(1);
        let identity = &identities[0];
        let peers = vec![identity.address(), Address::repeat_byte(5)];
        let mut rng = StdRng::seed_from_u64(1);

        let run = engine(&chain, &token, 10)
            .run(identity, &peers, &mut rng)
            .await;

        assert!(run.error.is_none());
        assert_eq!(run.results.len(), 10);
        let nonces: Vec<u64> = chain
            .submissions_from(identity.address())
            .iter()
            .map(|tx| tx.transaction.nonce)
            .collect();
        assert_eq!(nonces, (0..10).collect::<Vec<u64>>());
        assert!(run.results.iter().all(|r| r.success));
    }

    #[tokio::test]
    async fn test_worker_stops_at_first_failure() {
        const SERVED_ESTIMATES: usize = 2;

        let (_, token, identities) = setup(1);
        let identity = &identities[0];
        let chain = Arc::new(
            InMemoryChain::new(901)
                .with_balance(identity.address(), U256::from(ONE_ETHER))
                .fail_gas_estimation_after(SERVED_ESTIMATES),
        );
        chain.register_token(token.address(), identity.address(), U256::from(100));
        let peers = vec![Address::repeat_byte(5)];

        // Only token transfers estimate gas: the first two succeed and the
        // third one stops the worker.
        let mut rng = StdRng::seed_from_u64(3);
        let run = engine(&chain, &token, 50)
            .run(identity, &peers, &mut rng)
            .await;

        assert!(matches!(run.error, Some(ChainError::GasEstimation(_))));
        assert!(!run.results.is_empty());
        assert!(run.results.len() < 50);
        let token_results = run
            .results
            .iter()
            .filter(|r| r.kind == TransferKind::Token)
            .count();
        assert_eq!(token_results, SERVED_ESTIMATES);
        assert!(run.results.iter().all(|r| r.success));

        // The failed operation took nonce `results.len()`; nothing was
        // submitted with it or after it.
        let failed_nonce = run.results.len() as u64;
        let nonces: Vec<u64> = chain
            .submissions_from(identity.address())
            .iter()
            .map(|tx| tx.transaction.nonce)
            .collect();
        assert_eq!(nonces, (0..failed_nonce).collect::<Vec<_>>());
        assert!(nonces.iter().all(|&n| n < failed_nonce));
        assert_eq!(chain.token_balance(token.address(), peers[0]), U256::from(2));
    }

    #[tokio::test]
    async fn test_missing_fee_market_aborts_worker() {
        let (_, token, identities) = setup(1);
        let identity = &identities[0];
        let chain = Arc::new(
            InMemoryChain::new(901)
                .with_balance(identity.address(), U256::from(ONE_ETHER))
                .with_base_fee(None),
        );
        let mut rng = StdRng::seed_from_u64(3);

        let run = engine(&chain, &token, 5)
            .run(identity, &[Address::repeat_byte(5)], &mut rng)
            .await;

        assert!(matches!(run.error, Some(ChainError::FeeMarketUnavailable)));
        assert!(run.results.is_empty());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_run_all_writes_one_artifact_per_worker() {
        let (chain, token, identities) = setup(4);
        let addresses: Vec<Address> = identities.iter().map(Identity::address).collect();
        let dir = TempDir::new().unwrap();
        let sink = MetricsSink::new(dir.path());

        let runs = engine(&chain, &token, 5).run_all(identities, &sink).await;

        assert_eq!(runs.len(), 4);
        for run in &runs {
            assert!(run.error.is_none());
            assert_eq!(run.results.len(), 5);
            let artifact = run.artifact.as_ref().unwrap();
            let content = std::fs::read_to_string(artifact).unwrap();
            assert_eq!(content.lines().count(), 6);
        }
        for address in addresses {
            let nonces: Vec<u64> = chain
                .submissions_from(address)
                .iter()
                .map(|tx| tx.transaction.nonce)
                .collect();
            assert_eq!(nonces, vec![0, 1, 2, 3, 4]);
        }

        let summary = TransferSummary::from_runs(&runs);
        assert_eq!(summary.workers, 4);
        assert_eq!(summary.operations, 20);
        assert_eq!(summary.aborted_workers, 0);
        assert_eq!(summary.artifacts, 4);
    }

    #[tokio::test]
    async fn test_seeded_workers_are_reproducible() {
        let kinds = |seed: u64| async move {
            let (chain, token, identities) = setup(1);
            let mut rng = StdRng::seed_from_u64(seed);
            let peers = vec![identities[0].address()];
            engine(&chain, &token, 8)
                .run(&identities[0], &peers, &mut rng)
                .await
                .results
                .iter()
                .map(|r| r.kind)
                .collect::<Vec<_>>()
        };

        assert_eq!(kinds(11).await, kinds(11).await);
    }
}

//! Funding of test accounts from a single faucet identity.
//!
//! Every account is handled by its own task. All tasks issue transactions
//! from the faucet and draw nonces from one [`SharedSequence`] seeded with the
//! faucet's pending nonce before any task starts.
//!
//! Native funding only tops up a deficit; token funding is sent every time,
//! regardless of the account's current token balance. Funding transfers are
//! submitted without waiting for inclusion. Balances are sampled once per
//! account and may be stale by the time the top-up lands.
//!
//! Once a faucet nonce is allocated it must reach the network, or every
//! higher nonce held by the other tasks stalls behind it. A rejected
//! submission is retried with the same signed transaction; when every attempt
//! fails the nonce is filled with a zero-value transfer from the faucet to
//! itself and only the failing account is reported as failed.

use crate::fee::{FeeStrategy, NATIVE_TRANSFER_GAS};
use crate::intent::{transfer_call, TransferIntent, TransferKind};
use crate::sequence::{SequenceAllocator, SharedSequence};
use alloy_primitives::{Address, Bytes, B256, U256};
use chain_client::{
    ChainClient, FeeDescriptor, Identity, Result, SignedTransaction, TestToken,
    UnsignedTransaction,
};
use futures::future::join_all;
use std::sync::Arc;
use tracing::{error, info, warn};

/// Default native target balance: 0.01 ether.
pub const DEFAULT_TARGET_BALANCE: u128 = 10_000_000_000_000_000;

/// Default token amount sent to each account: 1 token with 18 decimals.
pub const DEFAULT_TOKEN_AMOUNT: u128 = 1_000_000_000_000_000_000;

/// Submission attempts for one funding transaction before its nonce is filled.
pub const SUBMIT_ATTEMPTS: usize = 3;

/// Funding parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FundingConfig {
    /// Minimum native balance every account should reach.
    pub target_balance: U256,
    /// Token amount sent to every account.
    pub token_amount: U256,
}

impl Default for FundingConfig {
    fn default() -> Self {
        Self {
            target_balance: U256::from(DEFAULT_TARGET_BALANCE),
            token_amount: U256::from(DEFAULT_TOKEN_AMOUNT),
        }
    }
}

impl FundingConfig {
    pub fn with_target_balance(mut self, target_balance: U256) -> Self {
        self.target_balance = target_balance;
        self
    }

    pub fn with_token_amount(mut self, token_amount: U256) -> Self {
        self.token_amount = token_amount;
        self
    }
}

/// What happened to an account's native top-up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NativeFunding {
    /// Balance already at or above the target.
    Skipped { balance: U256 },
    /// Top-up submitted.
    Submitted { amount: U256, tx_hash: B256 },
    Failed(String),
}

/// What happened to an account's token transfer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenFunding {
    Submitted { tx_hash: B256 },
    Failed(String),
}

/// Per-account funding result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FundingOutcome {
    pub address: Address,
    pub native: NativeFunding,
    pub token: TokenFunding,
}

impl FundingOutcome {
    /// Whether neither funding step failed.
    pub fn is_success(&self) -> bool {
        !matches!(self.native, NativeFunding::Failed(_))
            && !matches!(self.token, TokenFunding::Failed(_))
    }
}

/// Tallies over a funding pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FundingSummary {
    pub accounts: usize,
    pub native_submitted: usize,
    pub native_skipped: usize,
    pub token_submitted: usize,
    pub failed: usize,
}

impl FundingSummary {
    pub fn from_outcomes(outcomes: &[FundingOutcome]) -> Self {
        let mut summary = FundingSummary {
            accounts: outcomes.len(),
            ..Default::default()
        };
        for outcome in outcomes {
            match outcome.native {
                NativeFunding::Submitted { .. } => summary.native_submitted += 1,
                NativeFunding::Skipped { .. } => summary.native_skipped += 1,
                NativeFunding::Failed(_) => {}
            }
            if matches!(outcome.token, TokenFunding::Submitted { .. }) {
                summary.token_submitted += 1;
            }
            if !outcome.is_success() {
                summary.failed += 1;
            }
        }
        summary
    }
}

/// Brings every account to the configured native balance and sends it tokens.
pub struct FundingOrchestrator<C: ChainClient + 'static> {
    client: Arc<C>,
    fees: FeeStrategy,
    config: FundingConfig,
}

impl<C: ChainClient + 'static> FundingOrchestrator<C> {
    pub fn new(client: Arc<C>, fees: FeeStrategy, config: FundingConfig) -> Self {
        Self {
            client,
            fees,
            config,
        }
    }

    /// Fund `accounts` from `faucet`.
    ///
    /// Best effort: a failure for one account is logged and reported in its
    /// outcome, and never stops the others. Returns one outcome per account,
    /// in input order.
    ///
    /// # Errors
    ///
    /// Only fails if the faucet's pending nonce cannot be read, since no
    /// transaction can be issued without it.
    pub async fn fund(
        &self,
        accounts: &[Address],
        token: &TestToken,
        faucet: Arc<Identity>,
    ) -> Result<Vec<FundingOutcome>> {
        let start = self.client.sequence_number(faucet.address()).await?;
        let sequence = SharedSequence::new(start);

        info!(
            "Funding {} accounts from {} (starting nonce {})",
            accounts.len(),
            faucet.address(),
            start
        );

        let handles: Vec<_> = accounts
            .iter()
            .map(|&account| {
                let task = FundingTask {
                    client: Arc::clone(&self.client),
                    fees: self.fees,
                    config: self.config.clone(),
                    faucet: Arc::clone(&faucet),
                    token: token.clone(),
                    sequence: sequence.clone(),
                };
                tokio::spawn(async move { task.run(account).await })
            })
            .collect();

        let outcomes = join_all(handles)
            .await
            .into_iter()
            .zip(accounts)
            .map(|(joined, &address)| match joined {
                Ok(outcome) => outcome,
                Err(e) => {
                    error!("Funding task for {} panicked: {}", address, e);
                    FundingOutcome {
                        address,
                        native: NativeFunding::Failed(e.to_string()),
                        token: TokenFunding::Failed(e.to_string()),
                    }
                }
            })
            .collect();

        Ok(outcomes)
    }
}

struct FundingTask<C: ChainClient> {
    client: Arc<C>,
    fees: FeeStrategy,
    config: FundingConfig,
    faucet: Arc<Identity>,
    token: TestToken,
    sequence: SharedSequence,
}

impl<C: ChainClient> FundingTask<C> {
    async fn run(mut self, account: Address) -> FundingOutcome {
        let native = match self.fund_native(account).await {
            Ok(native) => native,
            Err(e) => {
                warn!("Failed to fund {} with native currency: {}", account, e);
                NativeFunding::Failed(e.to_string())
            }
        };

        let token = match self.fund_token(account).await {
            Ok(tx_hash) => TokenFunding::Submitted { tx_hash },
            Err(e) => {
                warn!("Failed to transfer tokens to {}: {}", account, e);
                TokenFunding::Failed(e.to_string())
            }
        };

        FundingOutcome {
            address: account,
            native,
            token,
        }
    }

    async fn fund_native(&mut self, account: Address) -> Result<NativeFunding> {
        let balance = self.client.balance(account).await?;
        if balance >= self.config.target_balance {
            info!("Account {} already funded with {} wei", account, balance);
            return Ok(NativeFunding::Skipped { balance });
        }
        let deficit = self.config.target_balance - balance;

        let tx_hash = self.send(TransferKind::Native, account, deficit).await?;
        info!("Transferring {} wei to {} ({})", deficit, account, tx_hash);
        Ok(NativeFunding::Submitted {
            amount: deficit,
            tx_hash,
        })
    }

    async fn fund_token(&mut self, account: Address) -> Result<B256> {
        let amount = self.config.token_amount;
        let tx_hash = self.send(TransferKind::Token, account, amount).await?;
        info!("Transferring {} token units to {} ({})", amount, account, tx_hash);
        Ok(tx_hash)
    }

    /// Quote, allocate a nonce, sign and submit without waiting for inclusion.
    ///
    /// The quote comes first so a pricing failure never consumes a nonce.
    /// After allocation the nonce is always used, by this transfer or by a
    /// filler.
    async fn send(&mut self, kind: TransferKind, recipient: Address, amount: U256) -> Result<B256> {
        let sender = self.faucet.address();
        let call = transfer_call(kind, sender, recipient, amount, &self.token);
        let quote = self.fees.quote(self.client.as_ref(), kind, &call).await?;

        let intent = TransferIntent {
            kind,
            sender,
            recipient,
            amount,
            nonce: self.sequence.next(),
            quote,
        };
        let result = match self
            .client
            .sign(&self.faucet, &intent.to_unsigned(&self.token))
        {
            Ok(signed) => self.submit_with_retry(&signed).await.map(|()| signed.hash),
            Err(e) => Err(e),
        };
        if result.is_err() {
            self.fill_nonce(intent.nonce, quote.fee).await;
        }
        result
    }

    async fn submit_with_retry(&self, signed: &SignedTransaction) -> Result<()> {
        let mut attempt = 1;
        loop {
            match self.client.submit(signed).await {
                Ok(()) => return Ok(()),
                Err(e) if attempt < SUBMIT_ATTEMPTS => {
                    warn!(
                        "Submission {} of {} for faucet nonce {} failed: {}",
                        attempt, SUBMIT_ATTEMPTS, signed.transaction.nonce, e
                    );
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Use up `nonce` with a zero-value transfer from the faucet to itself.
    async fn fill_nonce(&self, nonce: u64, fee: FeeDescriptor) {
        let faucet = self.faucet.address();
        let filler = UnsignedTransaction {
            to: Some(faucet),
            value: U256::ZERO,
            input: Bytes::new(),
            nonce,
            gas_limit: NATIVE_TRANSFER_GAS,
            fee,
        };
        let result = match self.client.sign(&self.faucet, &filler) {
            Ok(signed) => self.submit_with_retry(&signed).await,
            Err(e) => Err(e),
        };
        match result {
            Ok(()) => info!("Filled faucet nonce {} with a self-transfer", nonce),
            Err(e) => error!(
                "Faucet nonce {} left unused, later funding transfers will stall: {}",
                nonce, e
            ),
        }
    }
}

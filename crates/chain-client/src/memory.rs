//! Deterministic in-process ledger.
//!
//! `InMemoryChain` implements [`ChainClient`] without a network. It keeps
//! native balances, per-sender nonces and an ERC-20 ledger for every contract
//! created through it. A transaction whose nonce is ahead of the sender's next
//! nonce is queued and only executes once the gap closes, the same way a node's
//! transaction pool holds back future transactions. Each executed transaction
//! is sealed in its own block.
//!
//! The ledger backs `--dry-run` and is the test double for every component
//! that consumes a `ChainClient`.

use crate::client::ChainClient;
use crate::error::{ChainError, Result};
use crate::token::decode_transfer;
use crate::types::{CallRequest, Confirmation, SignedTransaction};
use alloy_primitives::{Address, B256, U256};
use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::time::sleep;
use tracing::debug;

/// Gas charged for a plain value transfer.
pub const NATIVE_TRANSFER_GAS_USED: u64 = 21_000;

/// Gas charged for a token `transfer` call.
pub const TOKEN_TRANSFER_GAS_USED: u64 = 51_000;

/// Gas charged for a contract creation.
pub const CONTRACT_CREATION_GAS_USED: u64 = 1_000_000;

/// Token supply minted to the deployer of a contract created on this ledger.
pub const INITIAL_TOKEN_SUPPLY: u128 = 1_000_000_000 * 1_000_000_000_000_000_000;

const RECEIPT_POLL_INTERVAL: Duration = Duration::from_millis(5);

#[derive(Debug)]
struct LedgerState {
    balances: HashMap<Address, U256>,
    next_nonces: HashMap<Address, u64>,
    queued: HashMap<Address, BTreeMap<u64, SignedTransaction>>,
    tokens: HashMap<Address, HashMap<Address, U256>>,
    receipts: HashMap<B256, Confirmation>,
    accepted: Vec<SignedTransaction>,
    block_number: u64,
    gas_price: u128,
    priority_tip: u128,
    base_fee: Option<u128>,
    estimates_served: usize,
    fail_estimates_after: Option<usize>,
    reject_submissions: bool,
    failing_submissions: usize,
    rejected_recipients: HashSet<Address>,
}

impl Default for LedgerState {
    fn default() -> Self {
        Self {
            balances: HashMap::new(),
            next_nonces: HashMap::new(),
            queued: HashMap::new(),
            tokens: HashMap::new(),
            receipts: HashMap::new(),
            accepted: Vec::new(),
            block_number: 0,
            gas_price: 2_000_000_000,
            priority_tip: 100_000_000,
            base_fee: Some(1_000_000_000),
            estimates_served: 0,
            fail_estimates_after: None,
            reject_submissions: false,
            failing_submissions: 0,
            rejected_recipients: HashSet::new(),
        }
    }
}

impl LedgerState {
    fn balance(&self, address: &Address) -> U256 {
        self.balances.get(address).copied().unwrap_or_default()
    }

    fn next_nonce(&self, address: &Address) -> u64 {
        self.next_nonces.get(address).copied().unwrap_or_default()
    }

    /// Execute queued transactions of `sender` for as long as nonces are contiguous.
    fn drain(&mut self, sender: Address) {
        loop {
            let next = self.next_nonce(&sender);
            let Some(tx) = self
                .queued
                .get_mut(&sender)
                .and_then(|queue| queue.remove(&next))
            else {
                break;
            };
            self.execute(&tx);
            self.next_nonces.insert(sender, next + 1);
        }
    }

    fn execute(&mut self, signed: &SignedTransaction) {
        let tx = &signed.transaction;
        let sender = signed.from;

        let gas_used = match tx.to {
            None => CONTRACT_CREATION_GAS_USED,
            Some(to) if self.tokens.contains_key(&to) => TOKEN_TRANSFER_GAS_USED,
            Some(_) => NATIVE_TRANSFER_GAS_USED,
        };
        let price = tx.fee.effective_price(self.base_fee);
        let gas_cost = U256::from(gas_used) * U256::from(price);

        let sender_balance = self.balance(&sender);
        let mut success = sender_balance >= gas_cost + tx.value;
        let mut contract_address = None;

        if success {
            self.balances.insert(sender, sender_balance - gas_cost - tx.value);
            match tx.to {
                None => {
                    let contract = sender.create(tx.nonce);
                    let mut holders = HashMap::new();
                    holders.insert(sender, U256::from(INITIAL_TOKEN_SUPPLY));
                    self.tokens.insert(contract, holders);
                    contract_address = Some(contract);
                }
                Some(to) => {
                    if let Some(holders) = self.tokens.get_mut(&to) {
                        success = apply_token_transfer(holders, sender, &tx.input);
                    }
                    // A reverted call keeps the gas but returns the value
                    let credited = if success { to } else { sender };
                    *self.balances.entry(credited).or_default() += tx.value;
                }
            }
        } else {
            self.balances
                .insert(sender, sender_balance.saturating_sub(gas_cost));
        }

        self.block_number += 1;
        debug!(
            "Block {}: {} from {} nonce {} success={}",
            self.block_number, signed.hash, sender, tx.nonce, success
        );
        self.receipts.insert(
            signed.hash,
            Confirmation {
                tx_hash: signed.hash,
                block_number: self.block_number,
                gas_used,
                success,
                contract_address,
            },
        );
    }
}

/// Move tokens for a `transfer(to, amount)` call; returns `false` on revert.
fn apply_token_transfer(holders: &mut HashMap<Address, U256>, sender: Address, input: &[u8]) -> bool {
    let Some((to, amount)) = decode_transfer(input) else {
        return false;
    };
    let available = holders.get(&sender).copied().unwrap_or_default();
    if available < amount {
        return false;
    }
    holders.insert(sender, available - amount);
    *holders.entry(to).or_default() += amount;
    true
}

/// Single-process ledger implementing [`ChainClient`].
#[derive(Debug)]
pub struct InMemoryChain {
    chain_id: u64,
    state: Mutex<LedgerState>,
}

impl InMemoryChain {
    /// Create an empty ledger with a fee market.
    pub fn new(chain_id: u64) -> Self {
        Self {
            chain_id,
            state: Mutex::new(LedgerState::default()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, LedgerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Credit `address` with `amount` wei.
    pub fn with_balance(self, address: Address, amount: U256) -> Self {
        self.set_balance(address, amount);
        self
    }

    /// Set the base fee reported for the latest block (`None` disables the fee market).
    pub fn with_base_fee(self, base_fee: Option<u128>) -> Self {
        self.lock().base_fee = base_fee;
        self
    }

    /// Set the suggested flat gas price.
    pub fn with_gas_price(self, gas_price: u128) -> Self {
        self.lock().gas_price = gas_price;
        self
    }

    /// Set the suggested priority tip.
    pub fn with_priority_tip(self, priority_tip: u128) -> Self {
        self.lock().priority_tip = priority_tip;
        self
    }

    /// Serve `count` gas estimates, then fail every subsequent one.
    pub fn fail_gas_estimation_after(self, count: usize) -> Self {
        self.lock().fail_estimates_after = Some(count);
        self
    }

    /// Reject every submission from now on.
    pub fn reject_submissions(&self, reject: bool) {
        self.lock().reject_submissions = reject;
    }

    /// Reject the next `count` submissions, whatever they are.
    pub fn fail_next_submissions(&self, count: usize) {
        self.lock().failing_submissions = count;
    }

    /// Reject every submission addressed to `recipient`.
    pub fn reject_submissions_to(&self, recipient: Address) {
        self.lock().rejected_recipients.insert(recipient);
    }

    /// Overwrite the native balance of `address`.
    pub fn set_balance(&self, address: Address, amount: U256) {
        self.lock().balances.insert(address, amount);
    }

    /// Token balance of `holder` in `contract`.
    pub fn token_balance(&self, contract: Address, holder: Address) -> U256 {
        self.lock()
            .tokens
            .get(&contract)
            .and_then(|holders| holders.get(&holder).copied())
            .unwrap_or_default()
    }

    /// Treat `contract` as a token without deploying it and set `holder`'s balance to `amount`.
    pub fn register_token(&self, contract: Address, holder: Address, amount: U256) {
        self.lock()
            .tokens
            .entry(contract)
            .or_default()
            .insert(holder, amount);
    }

    /// Every transaction accepted from `sender`, in submission order.
    pub fn submissions_from(&self, sender: Address) -> Vec<SignedTransaction> {
        self.lock()
            .accepted
            .iter()
            .filter(|tx| tx.from == sender)
            .cloned()
            .collect()
    }

    /// Every accepted transaction, in submission order.
    pub fn submissions(&self) -> Vec<SignedTransaction> {
        self.lock().accepted.clone()
    }

    /// Number of transactions of `sender` held back by a nonce gap.
    pub fn queued_count(&self, sender: Address) -> usize {
        self.lock().queued.get(&sender).map_or(0, BTreeMap::len)
    }

    /// Height of the latest block.
    pub fn block_number(&self) -> u64 {
        self.lock().block_number
    }
}

#[async_trait]
impl ChainClient for InMemoryChain {
    fn chain_id(&self) -> u64 {
        self.chain_id
    }

    async fn sequence_number(&self, address: Address) -> Result<u64> {
        Ok(self.lock().next_nonce(&address))
    }

    async fn balance(&self, address: Address) -> Result<U256> {
        Ok(self.lock().balance(&address))
    }

    async fn suggest_fixed_price(&self) -> Result<u128> {
        Ok(self.lock().gas_price)
    }

    async fn suggest_priority_tip(&self) -> Result<u128> {
        Ok(self.lock().priority_tip)
    }

    async fn latest_base_fee(&self) -> Result<Option<u128>> {
        Ok(self.lock().base_fee)
    }

    async fn estimate_gas(&self, call: &CallRequest) -> Result<u64> {
        let mut state = self.lock();
        if let Some(limit) = state.fail_estimates_after {
            if state.estimates_served >= limit {
                return Err(ChainError::GasEstimation(
                    "execution reverted".to_string(),
                ));
            }
        }
        state.estimates_served += 1;

        Ok(match call.to {
            None => CONTRACT_CREATION_GAS_USED,
            Some(to) if state.tokens.contains_key(&to) => TOKEN_TRANSFER_GAS_USED,
            Some(_) => NATIVE_TRANSFER_GAS_USED,
        })
    }

    async fn submit(&self, tx: &SignedTransaction) -> Result<()> {
        let mut state = self.lock();
        if state.reject_submissions {
            return Err(ChainError::Send(format!("{}: rejected", tx.hash)));
        }
        if tx
            .transaction
            .to
            .is_some_and(|to| state.rejected_recipients.contains(&to))
        {
            return Err(ChainError::Send(format!("{}: recipient rejected", tx.hash)));
        }
        if state.failing_submissions > 0 {
            state.failing_submissions -= 1;
            return Err(ChainError::Send(format!("{}: transient failure", tx.hash)));
        }

        let sender = tx.from;
        let nonce = tx.transaction.nonce;
        let next = state.next_nonce(&sender);
        if nonce < next {
            return Err(ChainError::Send(format!(
                "{}: nonce too low (next {next}, got {nonce})",
                tx.hash
            )));
        }
        if state
            .queued
            .get(&sender)
            .is_some_and(|queue| queue.contains_key(&nonce))
        {
            return Err(ChainError::Send(format!("{}: already known", tx.hash)));
        }

        let max_cost = U256::from(tx.transaction.gas_limit) * U256::from(tx.transaction.fee.max_price())
            + tx.transaction.value;
        if state.balance(&sender) < max_cost {
            return Err(ChainError::Send(format!(
                "{}: insufficient funds for gas * price + value",
                tx.hash
            )));
        }

        state.accepted.push(tx.clone());
        state
            .queued
            .entry(sender)
            .or_default()
            .insert(nonce, tx.clone());
        state.drain(sender);
        Ok(())
    }

    async fn await_confirmation(&self, tx_hash: B256, timeout: Duration) -> Result<Confirmation> {
        let poll = async {
            loop {
                let receipt = self.lock().receipts.get(&tx_hash).cloned();
                if let Some(confirmation) = receipt {
                    return confirmation;
                }
                sleep(RECEIPT_POLL_INTERVAL).await;
            }
        };

        tokio::time::timeout(timeout, poll)
            .await
            .map_err(|_| ChainError::ConfirmationTimeout {
                tx_hash: tx_hash.to_string(),
                timeout_secs: timeout.as_secs(),
            })
    }
}

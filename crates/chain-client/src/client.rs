//! The ledger access contract consumed by the load generator.

use crate::error::Result;
use crate::signing::sign_transaction;
use crate::types::{CallRequest, Confirmation, Identity, SignedTransaction, UnsignedTransaction};
use alloy_primitives::{Address, B256, U256};
use async_trait::async_trait;
use std::time::Duration;

/// Trait for ledger access.
///
/// Implementations must be safe for unsynchronized concurrent use: every
/// funding task and transfer worker shares one client through an `Arc`.
/// This allows the same load generator to run against:
/// - A live JSON-RPC endpoint (`RpcChainClient`)
/// - A deterministic in-process ledger (`InMemoryChain`)
#[async_trait]
pub trait ChainClient: Send + Sync {
    /// Chain id used for replay protection when signing.
    fn chain_id(&self) -> u64;

    /// Next sequence number for `address`, counting pending transactions.
    async fn sequence_number(&self, address: Address) -> Result<u64>;

    /// Native balance of `address` in wei.
    async fn balance(&self, address: Address) -> Result<U256>;

    /// Suggested flat gas price in wei.
    async fn suggest_fixed_price(&self) -> Result<u128>;

    /// Suggested priority tip in wei.
    async fn suggest_priority_tip(&self) -> Result<u128>;

    /// Base fee of the latest block, or `None` when the network has no fee market.
    async fn latest_base_fee(&self) -> Result<Option<u128>>;

    /// Estimate the gas a call consumes.
    async fn estimate_gas(&self, call: &CallRequest) -> Result<u64>;

    /// Submit a signed transaction, returning once the network has accepted it.
    async fn submit(&self, tx: &SignedTransaction) -> Result<()>;

    /// Wait until `tx_hash` is included, or fail with `ConfirmationTimeout`.
    async fn await_confirmation(&self, tx_hash: B256, timeout: Duration) -> Result<Confirmation>;

    /// Sign a transaction on behalf of `identity`.
    fn sign(&self, identity: &Identity, tx: &UnsignedTransaction) -> Result<SignedTransaction> {
        sign_transaction(identity, tx, self.chain_id())
    }

    /// Submit a signed transaction and wait for its inclusion.
    async fn submit_and_confirm(
        &self,
        tx: &SignedTransaction,
        timeout: Duration,
    ) -> Result<Confirmation> {
        self.submit(tx).await?;
        self.await_confirmation(tx.hash, timeout).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::InMemoryChain;
    use crate::types::FeeDescriptor;
    use alloy_consensus::{Transaction, TxEnvelope};
    use alloy_eips::eip2718::Decodable2718;
    use alloy_primitives::Bytes;

    #[test]
    fn test_sign_uses_client_chain_id() {
        let chain = InMemoryChain::new(4242);
        let identity = Identity::generate();
        let tx = UnsignedTransaction {
            to: Some(Address::repeat_byte(3)),
            value: U256::from(1),
            input: Bytes::new(),
            nonce: 0,
            gas_limit: 21_000,
            fee: FeeDescriptor::Fixed { gas_price: 1 },
        };

        let signed = chain.sign(&identity, &tx).unwrap();
        let envelope = TxEnvelope::decode_2718(&mut signed.raw.as_ref()).unwrap();
        assert_eq!(envelope.chain_id(), Some(4242));
    }

    #[test]
    fn test_submit_and_confirm_waits_for_inclusion() {
        let identity = Identity::generate();
        let chain = InMemoryChain::new(901)
            .with_balance(identity.address(), U256::from(1_000_000_000_000_000u64));
        let tx = UnsignedTransaction {
            to: Some(Address::repeat_byte(3)),
            value: U256::from(5),
            input: Bytes::new(),
            nonce: 0,
            gas_limit: 21_000,
            fee: FeeDescriptor::Fixed { gas_price: 1 },
        };
        let signed = chain.sign(&identity, &tx).unwrap();

        let confirmation = tokio_test::block_on(
            chain.submit_and_confirm(&signed, Duration::from_secs(1)),
        )
        .unwrap();
        assert_eq!(confirmation.tx_hash, signed.hash);
        assert!(confirmation.success);
    }
}

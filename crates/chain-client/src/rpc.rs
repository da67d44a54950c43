//! JSON-RPC ledger client backed by an alloy HTTP provider.

use crate::client::ChainClient;
use crate::error::{ChainError, Result};
use crate::types::{CallRequest, Confirmation, FeeDescriptor, SignedTransaction};
use alloy_eips::BlockNumberOrTag;
use alloy_network::{Ethereum, ReceiptResponse, TransactionBuilder};
use alloy_primitives::{Address, B256, U256};
use alloy_provider::{Provider, RootProvider};
use alloy_rpc_types_eth::TransactionRequest;
use async_trait::async_trait;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, info, warn};
use url::Url;

/// Interval between receipt polls while waiting for a confirmation.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(500);

/// Ledger client speaking Ethereum JSON-RPC over HTTP.
#[derive(Debug, Clone)]
pub struct RpcChainClient {
    provider: RootProvider<Ethereum>,
    chain_id: u64,
    poll_interval: Duration,
}

impl RpcChainClient {
    /// Connect to `endpoint` and verify it serves `chain_id`.
    ///
    /// # Errors
    ///
    /// Returns `ChainError::Connect` if the URL is invalid, the endpoint is
    /// unreachable, or it reports a different chain id.
    pub async fn connect(endpoint: &str, chain_id: u64) -> Result<Self> {
        let url: Url = endpoint
            .parse()
            .map_err(|e| ChainError::Connect(format!("invalid endpoint '{endpoint}': {e}")))?;
        let provider = RootProvider::<Ethereum>::new_http(url);

        let remote_chain_id = provider
            .get_chain_id()
            .await
            .map_err(|e| ChainError::Connect(format!("failed to reach '{endpoint}': {e}")))?;
        if remote_chain_id != chain_id {
            return Err(ChainError::Connect(format!(
                "endpoint '{endpoint}' serves chain id {remote_chain_id}, expected {chain_id}"
            )));
        }

        info!("Connected to {} (chain id {})", endpoint, chain_id);

        Ok(Self {
            provider,
            chain_id,
            poll_interval: DEFAULT_POLL_INTERVAL,
        })
    }

    /// Set the interval between receipt polls.
    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }
}

/// Convert a gas-estimation call into an RPC transaction request.
fn call_to_request(call: &CallRequest) -> TransactionRequest {
    let mut request = TransactionRequest::default()
        .with_from(call.from)
        .with_value(call.value);

    request = match call.to {
        Some(to) => request.with_to(to).with_input(call.input.clone()),
        None => request.with_deploy_code(call.input.clone()),
    };

    match call.fee {
        Some(FeeDescriptor::Fixed { gas_price }) => request.with_gas_price(gas_price),
        Some(FeeDescriptor::Dynamic {
            max_fee_per_gas,
            max_priority_fee_per_gas,
        }) => request
            .with_max_fee_per_gas(max_fee_per_gas)
            .with_max_priority_fee_per_gas(max_priority_fee_per_gas),
        None => request,
    }
}

#[async_trait]
impl ChainClient for RpcChainClient {
    fn chain_id(&self) -> u64 {
        self.chain_id
    }

    async fn sequence_number(&self, address: Address) -> Result<u64> {
        self.provider
            .get_transaction_count(address)
            .pending()
            .await
            .map_err(|e| ChainError::Rpc(format!("eth_getTransactionCount({address}): {e}")))
    }

    async fn balance(&self, address: Address) -> Result<U256> {
        self.provider
            .get_balance(address)
            .await
            .map_err(|e| ChainError::Rpc(format!("eth_getBalance({address}): {e}")))
    }

    async fn suggest_fixed_price(&self) -> Result<u128> {
        self.provider
            .get_gas_price()
            .await
            .map_err(|e| ChainError::Rpc(format!("eth_gasPrice: {e}")))
    }

    async fn suggest_priority_tip(&self) -> Result<u128> {
        self.provider
            .get_max_priority_fee_per_gas()
            .await
            .map_err(|e| ChainError::Rpc(format!("eth_maxPriorityFeePerGas: {e}")))
    }

    async fn latest_base_fee(&self) -> Result<Option<u128>> {
        let block = self
            .provider
            .get_block_by_number(BlockNumberOrTag::Latest)
            .await
            .map_err(|e| ChainError::Rpc(format!("eth_getBlockByNumber(latest): {e}")))?
            .ok_or_else(|| ChainError::Rpc("latest block not found".to_string()))?;
        Ok(block.header.base_fee_per_gas.map(u128::from))
    }

    async fn estimate_gas(&self, call: &CallRequest) -> Result<u64> {
        self.provider
            .estimate_gas(call_to_request(call))
            .await
            .map_err(|e| ChainError::GasEstimation(e.to_string()))
    }

    async fn submit(&self, tx: &SignedTransaction) -> Result<()> {
        let _ = self
            .provider
            .send_raw_transaction(&tx.raw)
            .await
            .map_err(|e| ChainError::Send(format!("{}: {e}", tx.hash)))?;
        debug!(
            "Submitted {} (from {}, nonce {})",
            tx.hash, tx.from, tx.transaction.nonce
        );
        Ok(())
    }

    async fn await_confirmation(&self, tx_hash: B256, timeout: Duration) -> Result<Confirmation> {
        let poll = async {
            loop {
                match self.provider.get_transaction_receipt(tx_hash).await {
                    Ok(Some(receipt)) => return receipt,
                    Ok(None) => {}
                    // Transient RPC failures are retried until the deadline
                    Err(e) => warn!("Receipt poll for {} failed: {}", tx_hash, e),
                }
                sleep(self.poll_interval).await;
            }
        };

        let receipt = tokio::time::timeout(timeout, poll).await.map_err(|_| {
            ChainError::ConfirmationTimeout {
                tx_hash: tx_hash.to_string(),
                timeout_secs: timeout.as_secs(),
            }
        })?;

        let block_number = receipt.block_number().ok_or_else(|| {
            ChainError::Confirmation(format!("receipt for {tx_hash} has no block number"))
        })?;

        Ok(Confirmation {
            tx_hash: receipt.transaction_hash(),
            block_number,
            gas_used: receipt.gas_used(),
            success: receipt.status(),
            contract_address: receipt.contract_address(),
        })
    }
}

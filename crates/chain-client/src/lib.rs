//! Ledger access for the chain load generator.
//!
//! This crate provides the `ChainClient` trait that every load-generation
//! component talks to, together with two implementations:
//!
//! - `RpcChainClient` - Ethereum JSON-RPC over HTTP (alloy provider)
//! - `InMemoryChain` - deterministic in-process ledger used by `--dry-run` and tests
//!
//! It also owns the value types that cross the seam (identities, fee
//! descriptors, signed transactions, confirmations), local signing, and the
//! fungible test token (artifact loading, calldata encoding, deployment).
//!
//! # Example
//!
//! ```rust,no_run
//! use chain_client::{ChainClient, Identity, InMemoryChain};
//! use alloy_primitives::U256;
//!
//! # async fn example() -> chain_client::Result<()> {
//! let faucet = Identity::generate();
//! let chain = InMemoryChain::new(901).with_balance(faucet.address(), U256::from(10u64.pow(18)));
//! let nonce = chain.sequence_number(faucet.address()).await?;
//! assert_eq!(nonce, 0);
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod error;
pub mod memory;
pub mod rpc;
pub mod signing;
pub mod token;
pub mod types;

pub use client::ChainClient;
pub use error::{ChainError, Result};
pub use memory::InMemoryChain;
pub use rpc::RpcChainClient;
pub use signing::sign_transaction;
pub use token::{decode_transfer, deploy_test_token, ContractArtifact, TestToken};
pub use types::{
    CallRequest, Confirmation, FeeDescriptor, Identity, SignedTransaction, UnsignedTransaction,
};

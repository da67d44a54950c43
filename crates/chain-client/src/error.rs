//! Error types for ledger access.

use thiserror::Error;

/// Errors that can occur while talking to the ledger.
///
/// Startup-phase variants (`Connect`, `ContractLoad`, `Deployment`,
/// `InvalidKey`) are fatal to the process. The remaining variants are scoped
/// to a single operation and are contained by the caller.
#[derive(Error, Debug)]
pub enum ChainError {
    /// The endpoint could not be reached or reports a different chain.
    #[error("Chain connect error: {0}")]
    Connect(String),

    /// A read-only RPC call failed.
    #[error("RPC error: {0}")]
    Rpc(String),

    /// The latest block carries no base fee, so dynamic pricing is unavailable.
    #[error("Fee market unavailable: latest block has no base fee (is EIP-1559 active on this network?)")]
    FeeMarketUnavailable,

    /// Gas estimation for a contract call failed.
    #[error("Gas estimation error: {0}")]
    GasEstimation(String),

    /// The network rejected a signed transaction.
    #[error("Send error: {0}")]
    Send(String),

    /// Waiting for the receipt failed for a reason other than the deadline.
    #[error("Confirmation error: {0}")]
    Confirmation(String),

    /// No receipt was observed before the deadline.
    #[error("Confirmation timed out after {timeout_secs}s for transaction {tx_hash}")]
    ConfirmationTimeout {
        /// Hash of the transaction that was awaited.
        tx_hash: String,
        /// Deadline that elapsed.
        timeout_secs: u64,
    },

    /// Local signing failed.
    #[error("Signing error: {0}")]
    Signing(String),

    /// A private key could not be decoded.
    #[error("Invalid private key: {0}")]
    InvalidKey(String),

    /// The token contract artifact could not be loaded.
    #[error("Contract load error: {0}")]
    ContractLoad(String),

    /// The token contract could not be deployed.
    #[error("Deployment error: {0}")]
    Deployment(String),
}

/// Result alias for ledger operations.
pub type Result<T> = std::result::Result<T, ChainError>;

//! Value types shared by every ledger backend.

use crate::error::{ChainError, Result};
use alloy_primitives::{hex, Address, Bytes, B256, U256};
use alloy_signer_local::PrivateKeySigner;
use std::fmt;

/// A signing identity: an address plus the private key it is derived from.
///
/// The key never leaves the identity; it is only used through
/// [`crate::sign_transaction`]. Identities are not `Clone` so that a worker
/// owns the key of the account it drives.
pub struct Identity {
    signer: PrivateKeySigner,
}

impl Identity {
    /// Generate a fresh random key pair.
    pub fn generate() -> Self {
        Self {
            signer: PrivateKeySigner::random(),
        }
    }

    /// Decode a hex-encoded 32-byte private key, with or without a `0x` prefix.
    pub fn from_hex(key: &str) -> Result<Self> {
        let key = key.trim();
        let stripped = key
            .strip_prefix("0x")
            .or_else(|| key.strip_prefix("0X"))
            .unwrap_or(key);
        let bytes = hex::decode(stripped).map_err(|e| ChainError::InvalidKey(e.to_string()))?;
        if bytes.len() != 32 {
            return Err(ChainError::InvalidKey(format!(
                "expected 32 bytes, got {}",
                bytes.len()
            )));
        }
        let signer =
            PrivateKeySigner::from_slice(&bytes).map_err(|e| ChainError::InvalidKey(e.to_string()))?;
        Ok(Self { signer })
    }

    /// The address derived from this identity's public key.
    pub fn address(&self) -> Address {
        self.signer.address()
    }

    /// Hex encoding of the private key without a `0x` prefix, as persisted in key files.
    pub fn to_hex(&self) -> String {
        hex::encode(self.signer.to_bytes())
    }

    pub(crate) fn signer(&self) -> &PrivateKeySigner {
        &self.signer
    }
}

impl fmt::Debug for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Identity")
            .field("address", &self.address())
            .finish_non_exhaustive()
    }
}

/// Pricing attached to exactly one submitted transaction.
///
/// The two variants map to the two transaction envelopes on the wire: a
/// legacy transaction carries a single gas price, an EIP-1559 transaction
/// carries a fee cap and a priority tip.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeeDescriptor {
    /// Flat price per unit of gas.
    Fixed {
        /// Gas price in wei.
        gas_price: u128,
    },
    /// Base fee plus priority tip.
    Dynamic {
        /// Maximum total fee per gas in wei.
        max_fee_per_gas: u128,
        /// Maximum priority fee per gas in wei.
        max_priority_fee_per_gas: u128,
    },
}

impl FeeDescriptor {
    /// Short label used in logs and metrics.
    pub fn label(&self) -> &'static str {
        match self {
            FeeDescriptor::Fixed { .. } => "fixed",
            FeeDescriptor::Dynamic { .. } => "dynamic",
        }
    }

    /// The highest price per gas this descriptor allows.
    pub fn max_price(&self) -> u128 {
        match *self {
            FeeDescriptor::Fixed { gas_price } => gas_price,
            FeeDescriptor::Dynamic {
                max_fee_per_gas, ..
            } => max_fee_per_gas,
        }
    }

    /// The price per gas actually paid given the block's base fee.
    pub fn effective_price(&self, base_fee: Option<u128>) -> u128 {
        match *self {
            FeeDescriptor::Fixed { gas_price } => gas_price,
            FeeDescriptor::Dynamic {
                max_fee_per_gas,
                max_priority_fee_per_gas,
            } => {
                let base = base_fee.unwrap_or(0);
                max_fee_per_gas.min(base.saturating_add(max_priority_fee_per_gas))
            }
        }
    }
}

/// A fully formed transaction awaiting a signature.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnsignedTransaction {
    /// Recipient; `None` creates a contract.
    pub to: Option<Address>,
    /// Native value in wei.
    pub value: U256,
    /// Calldata or init code.
    pub input: Bytes,
    /// Sender sequence number.
    pub nonce: u64,
    /// Gas limit.
    pub gas_limit: u64,
    /// Pricing.
    pub fee: FeeDescriptor,
}

/// A call used for gas estimation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallRequest {
    /// Caller.
    pub from: Address,
    /// Callee; `None` estimates a contract creation.
    pub to: Option<Address>,
    /// Native value in wei.
    pub value: U256,
    /// Calldata or init code.
    pub input: Bytes,
    /// Pricing the estimate should assume, if any.
    pub fee: Option<FeeDescriptor>,
}

/// A signed transaction ready for submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedTransaction {
    /// Address of the signing identity.
    pub from: Address,
    /// Transaction hash.
    pub hash: B256,
    /// EIP-2718 encoded envelope.
    pub raw: Bytes,
    /// The transaction that was signed.
    pub transaction: UnsignedTransaction,
}

/// Outcome of an included transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Confirmation {
    /// Transaction hash.
    pub tx_hash: B256,
    /// Block the transaction was included in.
    pub block_number: u64,
    /// Gas consumed.
    pub gas_used: u64,
    /// Whether execution succeeded.
    pub success: bool,
    /// Address of the contract created by the transaction, if any.
    pub contract_address: Option<Address>,
}

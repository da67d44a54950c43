//! Planned transfer operations.

use crate::fee::{PricingMode, Quote};
use alloy_primitives::{Address, Bytes, U256};
use chain_client::{CallRequest, TestToken, UnsignedTransaction};
use rand::Rng;
use std::fmt;

/// The two operation kinds the load generator issues.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransferKind {
    /// Movement of the chain's base asset.
    Native,
    /// `transfer` call on the test token contract.
    Token,
}

impl TransferKind {
    /// Uniform random draw between the two kinds.
    pub fn random<R: Rng + ?Sized>(rng: &mut R) -> Self {
        if rng.random_bool(0.5) {
            TransferKind::Native
        } else {
            TransferKind::Token
        }
    }

    /// Label written to the `kind` column of the metrics artifact.
    pub fn label(&self, pricing: PricingMode) -> &'static str {
        match (self, pricing) {
            (TransferKind::Native, PricingMode::Fixed) => "eth-transfer-legacy",
            (TransferKind::Native, PricingMode::Dynamic) => "eth-transfer-eip1559",
            (TransferKind::Token, _) => "erc20-transfer",
        }
    }
}

impl fmt::Display for TransferKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransferKind::Native => write!(f, "native"),
            TransferKind::Token => write!(f, "token"),
        }
    }
}

/// Build the gas-estimation call for a transfer of `amount` from `sender` to `recipient`.
pub fn transfer_call(
    kind: TransferKind,
    sender: Address,
    recipient: Address,
    amount: U256,
    token: &TestToken,
) -> CallRequest {
    match kind {
        TransferKind::Native => CallRequest {
            from: sender,
            to: Some(recipient),
            value: amount,
            input: Bytes::new(),
            fee: None,
        },
        TransferKind::Token => CallRequest {
            from: sender,
            to: Some(token.address()),
            value: U256::ZERO,
            input: token.transfer_calldata(recipient, amount),
            fee: None,
        },
    }
}

/// One fully formed operation: nothing is submitted until every field is known.
#[derive(Debug, Clone)]
pub struct TransferIntent {
    pub kind: TransferKind,
    pub sender: Address,
    pub recipient: Address,
    pub amount: U256,
    pub nonce: u64,
    pub quote: Quote,
}

impl TransferIntent {
    /// The transaction to sign for this intent.
    pub fn to_unsigned(&self, token: &TestToken) -> UnsignedTransaction {
        let call = transfer_call(self.kind, self.sender, self.recipient, self.amount, token);
        UnsignedTransaction {
            to: call.to,
            value: call.value,
            input: call.input,
            nonce: self.nonce,
            gas_limit: self.quote.gas_limit,
            fee: self.quote.fee,
        }
    }
}

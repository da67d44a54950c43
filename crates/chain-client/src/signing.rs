//! Local transaction signing.

use crate::error::{ChainError, Result};
use crate::types::{FeeDescriptor, Identity, SignedTransaction, UnsignedTransaction};
use alloy_consensus::{SignableTransaction, TxEip1559, TxEnvelope, TxLegacy};
use alloy_eips::eip2718::Encodable2718;
use alloy_primitives::{Bytes, TxKind};
use alloy_signer::SignerSync;

/// Sign a transaction with the identity's key.
///
/// Fixed pricing produces an EIP-155 legacy transaction, dynamic pricing an
/// EIP-1559 transaction.
pub fn sign_transaction(
    identity: &Identity,
    tx: &UnsignedTransaction,
    chain_id: u64,
) -> Result<SignedTransaction> {
    let to = match tx.to {
        Some(address) => TxKind::Call(address),
        None => TxKind::Create,
    };

    let envelope: TxEnvelope = match tx.fee {
        FeeDescriptor::Fixed { gas_price } => {
            let legacy = TxLegacy {
                chain_id: Some(chain_id),
                nonce: tx.nonce,
                gas_price,
                gas_limit: tx.gas_limit,
                to,
                value: tx.value,
                input: tx.input.clone(),
            };
            let signature = identity
                .signer()
                .sign_hash_sync(&legacy.signature_hash())
                .map_err(|e| ChainError::Signing(e.to_string()))?;
            legacy.into_signed(signature).into()
        }
        FeeDescriptor::Dynamic {
            max_fee_per_gas,
            max_priority_fee_per_gas,
        } => {
            let dynamic = TxEip1559 {
                chain_id,
                nonce: tx.nonce,
                gas_limit: tx.gas_limit,
                max_fee_per_gas,
                max_priority_fee_per_gas,
                to,
                value: tx.value,
                access_list: Default::default(),
                input: tx.input.clone(),
            };
            let signature = identity
                .signer()
                .sign_hash_sync(&dynamic.signature_hash())
                .map_err(|e| ChainError::Signing(e.to_string()))?;
            dynamic.into_signed(signature).into()
        }
    };

    Ok(SignedTransaction {
        from: identity.address(),
        hash: *envelope.tx_hash(),
        raw: Bytes::from(envelope.encoded_2718()),
        transaction: tx.clone(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_consensus::Transaction;
    use alloy_eips::eip2718::Decodable2718;
    use alloy_primitives::{keccak256, Address, U256};

    fn transfer(fee: FeeDescriptor) -> UnsignedTransaction {
        UnsignedTransaction {
            to: Some(Address::repeat_byte(0x11)),
            value: U256::from(1),
            input: Bytes::new(),
            nonce: 7,
            gas_limit: 21_000,
            fee,
        }
    }

    #[test]
    fn test_sign_legacy_transaction() {
        let identity = Identity::generate();
        let signed =
            sign_transaction(&identity, &transfer(FeeDescriptor::Fixed { gas_price: 10 }), 901)
                .unwrap();

        assert_eq!(signed.from, identity.address());
        assert_eq!(signed.hash, keccak256(&signed.raw));

        let envelope = TxEnvelope::decode_2718(&mut signed.raw.as_ref()).unwrap();
        assert!(envelope.is_legacy());
        assert_eq!(envelope.nonce(), 7);
        assert_eq!(envelope.chain_id(), Some(901));
    }

    #[test]
    fn test_sign_dynamic_transaction() {
        let identity = Identity::generate();
        let fee = FeeDescriptor::Dynamic {
            max_fee_per_gas: 30,
            max_priority_fee_per_gas: 2,
        };
        let signed = sign_transaction(&identity, &transfer(fee), 901).unwrap();

        let envelope = TxEnvelope::decode_2718(&mut signed.raw.as_ref()).unwrap();
        assert!(envelope.is_eip1559());
        assert_eq!(envelope.max_fee_per_gas(), 30);
        assert_eq!(envelope.max_priority_fee_per_gas(), Some(2));
        assert_eq!(*envelope.tx_hash(), signed.hash);
    }

    #[test]
    fn test_distinct_nonces_produce_distinct_hashes() {
        let identity = Identity::generate();
        let mut tx = transfer(FeeDescriptor::Fixed { gas_price: 10 });
        let first = sign_transaction(&identity, &tx, 901).unwrap();
        tx.nonce += 1;
        let second = sign_transaction(&identity, &tx, 901).unwrap();
        assert_ne!(first.hash, second.hash);
    }
}

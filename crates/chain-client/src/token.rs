//! The fungible test token: artifact loading, calldata encoding and deployment.

use crate::client::ChainClient;
use crate::error::{ChainError, Result};
use crate::types::{CallRequest, FeeDescriptor, Identity, UnsignedTransaction};
use alloy_json_abi::JsonAbi;
use alloy_primitives::{hex, Address, Bytes, U256};
use alloy_sol_types::{sol, SolCall, SolValue};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;
use tracing::info;

sol! {
    interface IERC20 {
        function transfer(address to, uint256 amount) external returns (bool);
    }
}

/// Foundry build artifact of the test token contract.
#[derive(Debug, Clone, Deserialize)]
pub struct ContractArtifact {
    /// Contract interface.
    pub abi: JsonAbi,
    /// Creation bytecode.
    pub bytecode: ArtifactBytecode,
}

/// Bytecode section of a Foundry artifact.
#[derive(Debug, Clone, Deserialize)]
pub struct ArtifactBytecode {
    /// Hex-encoded creation code.
    pub object: String,
}

impl ContractArtifact {
    /// Load and validate an artifact from disk.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            ChainError::ContractLoad(format!("failed to read {}: {e}", path.display()))
        })?;
        Self::from_json(&content)
            .map_err(|e| ChainError::ContractLoad(format!("{}: {e}", path.display())))
    }

    /// Parse and validate an artifact from its JSON text.
    pub fn from_json(json: &str) -> Result<Self> {
        let artifact: ContractArtifact = serde_json::from_str(json)
            .map_err(|e| ChainError::ContractLoad(format!("invalid artifact JSON: {e}")))?;
        if artifact.abi.function("transfer").is_none() {
            return Err(ChainError::ContractLoad(
                "ABI has no 'transfer' function".to_string(),
            ));
        }
        artifact.creation_code()?;
        Ok(artifact)
    }

    /// Decoded creation bytecode.
    pub fn creation_code(&self) -> Result<Bytes> {
        let code = hex::decode(self.bytecode.object.trim())
            .map_err(|e| ChainError::ContractLoad(format!("invalid bytecode hex: {e}")))?;
        if code.is_empty() {
            return Err(ChainError::ContractLoad("empty bytecode".to_string()));
        }
        Ok(Bytes::from(code))
    }

    /// Creation bytecode followed by the ABI-encoded `constructor(address owner)` argument.
    pub fn deploy_code(&self, owner: Address) -> Result<Bytes> {
        let mut code = self.creation_code()?.to_vec();
        code.extend_from_slice(&owner.abi_encode());
        Ok(Bytes::from(code))
    }
}

/// A deployed token contract shared read-only by every worker.
#[derive(Debug, Clone)]
pub struct TestToken {
    address: Address,
    abi: JsonAbi,
}

impl TestToken {
    /// Refer to an already deployed token.
    pub fn attach(address: Address, abi: JsonAbi) -> Self {
        Self { address, abi }
    }

    /// Contract address.
    pub fn address(&self) -> Address {
        self.address
    }

    /// Contract interface.
    pub fn abi(&self) -> &JsonAbi {
        &self.abi
    }

    /// Calldata for `transfer(to, amount)`.
    pub fn transfer_calldata(&self, to: Address, amount: U256) -> Bytes {
        Bytes::from(IERC20::transferCall { to, amount }.abi_encode())
    }
}

/// Decode `transfer(to, amount)` calldata.
pub fn decode_transfer(input: &[u8]) -> Option<(Address, U256)> {
    IERC20::transferCall::abi_decode(input)
        .ok()
        .map(|call| (call.to, call.amount))
}

/// Deploy the test token from `deployer` and wait for the receipt.
///
/// The deployment uses fixed pricing and a gas limit 20% above the estimate.
///
/// # Errors
///
/// Every failure, including a reverted deployment, is reported as
/// `ChainError::Deployment`.
pub async fn deploy_test_token<C: ChainClient + ?Sized>(
    client: &C,
    deployer: &Identity,
    artifact: &ContractArtifact,
    timeout: Duration,
) -> Result<TestToken> {
    let deploy_err = |e: ChainError| ChainError::Deployment(e.to_string());

    let code = artifact.deploy_code(deployer.address())?;
    let gas_price = client.suggest_fixed_price().await.map_err(deploy_err)?;
    let fee = FeeDescriptor::Fixed { gas_price };

    let estimate = client
        .estimate_gas(&CallRequest {
            from: deployer.address(),
            to: None,
            value: U256::ZERO,
            input: code.clone(),
            fee: Some(fee),
        })
        .await
        .map_err(deploy_err)?;
    let gas_limit = estimate.saturating_add(estimate / 5);

    let nonce = client
        .sequence_number(deployer.address())
        .await
        .map_err(deploy_err)?;

    let signed = client
        .sign(
            deployer,
            &UnsignedTransaction {
                to: None,
                value: U256::ZERO,
                input: code,
                nonce,
                gas_limit,
                fee,
            },
        )
        .map_err(deploy_err)?;

    info!("Deploying test token contract (tx {})", signed.hash);

    let confirmation = client
        .submit_and_confirm(&signed, timeout)
        .await
        .map_err(deploy_err)?;
    if !confirmation.success {
        return Err(ChainError::Deployment(format!(
            "deployment transaction {} reverted",
            confirmation.tx_hash
        )));
    }
    let address = confirmation.contract_address.ok_or_else(|| {
        ChainError::Deployment(format!(
            "receipt for {} has no contract address",
            confirmation.tx_hash
        ))
    })?;

    Ok(TestToken::attach(address, artifact.abi.clone()))
}

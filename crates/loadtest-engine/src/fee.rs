//! Transaction pricing.
//!
//! Two pricing modes are supported: fixed ("legacy") pricing pays a single
//! suggested gas price, dynamic ("market") pricing pays the latest base fee
//! plus a priority tip. Token transfers always use dynamic pricing with a gas
//! limit derived from estimation; native transfers use the configured mode
//! and a fixed gas limit.

use crate::intent::TransferKind;
use chain_client::{CallRequest, ChainClient, ChainError, FeeDescriptor, Result};
use clap::ValueEnum;
use std::fmt;

/// Gas limit for a plain value transfer.
pub const NATIVE_TRANSFER_GAS: u64 = 21_000;

/// Pricing mode selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum PricingMode {
    /// Single flat gas price.
    Fixed,
    /// Base fee plus priority tip.
    #[default]
    Dynamic,
}

impl fmt::Display for PricingMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PricingMode::Fixed => write!(f, "fixed"),
            PricingMode::Dynamic => write!(f, "dynamic"),
        }
    }
}

/// Pricing and gas limit for one operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Quote {
    pub fee: FeeDescriptor,
    pub gas_limit: u64,
    pub pricing: PricingMode,
}

/// Computes fee descriptors and gas limits.
#[derive(Debug, Clone, Copy, Default)]
pub struct FeeStrategy {
    native_pricing: PricingMode,
}

impl FeeStrategy {
    /// Create a strategy that prices native transfers with `native_pricing`.
    pub fn new(native_pricing: PricingMode) -> Self {
        Self { native_pricing }
    }

    /// Pricing mode used for operations of `kind`.
    pub fn mode_for(&self, kind: TransferKind) -> PricingMode {
        match kind {
            TransferKind::Native => self.native_pricing,
            TransferKind::Token => PricingMode::Dynamic,
        }
    }

    /// Query the network for a fee descriptor in `mode`.
    ///
    /// # Errors
    ///
    /// Dynamic pricing fails with `ChainError::FeeMarketUnavailable` when the
    /// latest block carries no base fee.
    pub async fn price<C: ChainClient + ?Sized>(
        &self,
        client: &C,
        mode: PricingMode,
    ) -> Result<FeeDescriptor> {
        match mode {
            PricingMode::Fixed => {
                let gas_price = client.suggest_fixed_price().await?;
                Ok(FeeDescriptor::Fixed { gas_price })
            }
            PricingMode::Dynamic => {
                let tip = client.suggest_priority_tip().await?;
                let base_fee = client
                    .latest_base_fee()
                    .await?
                    .ok_or(ChainError::FeeMarketUnavailable)?;
                Ok(FeeDescriptor::Dynamic {
                    max_fee_per_gas: base_fee.saturating_mul(2).saturating_add(tip),
                    max_priority_fee_per_gas: tip,
                })
            }
        }
    }

    /// Price an operation of `kind` whose call is `call`.
    ///
    /// Native transfers get [`NATIVE_TRANSFER_GAS`]; token transfers are
    /// estimated against `call` and the estimate is inflated by 10%.
    pub async fn quote<C: ChainClient + ?Sized>(
        &self,
        client: &C,
        kind: TransferKind,
        call: &CallRequest,
    ) -> Result<Quote> {
        let pricing = self.mode_for(kind);
        let fee = self.price(client, pricing).await?;

        let gas_limit = match kind {
            TransferKind::Native => NATIVE_TRANSFER_GAS,
            TransferKind::Token => {
                let call = CallRequest {
                    fee: Some(fee),
                    ..call.clone()
                };
                let estimate = client.estimate_gas(&call).await?;
                estimate.saturating_add(estimate / 10)
            }
        };

        Ok(Quote {
            fee,
            gas_limit,
            pricing,
        })
    }
}

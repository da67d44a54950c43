//! Load-generation engine for EVM chains.
//!
//! The engine provisions test accounts, funds them from a faucet, then runs
//! one transfer worker per account and records every confirmed operation.
//!
//! # Architecture
//!
//! ```text
//! key file ──► accounts::load_or_create ──► Vec<Identity>
//!                                               │
//!                       ┌───────────────────────┤
//!                       ▼                       ▼
//!             FundingOrchestrator        TransferEngine
//!             (SharedSequence on          (OwnedSequence per
//!              the faucet identity)        worker identity)
//!                       │                       │
//!                       └────► FeeStrategy ◄────┘
//!                                   │
//!                                   ▼
//!                              ChainClient
//!                                               │
//!                                               ▼
//!                                   MetricsSink ──► {prefix}{id}.csv
//! ```
//!
//! Nonces of one identity are always allocated gap-free. The faucet's nonces
//! are shared by concurrent funding tasks through an atomic counter; each
//! worker owns the counter of its own account and issues sequentially.

pub mod accounts;
pub mod error;
pub mod fee;
pub mod funding;
pub mod intent;
pub mod metrics;
pub mod sequence;
pub mod transfer;

pub use accounts::load_or_create;
pub use error::{AccountStoreError, MetricsError};
pub use fee::{FeeStrategy, PricingMode, Quote, NATIVE_TRANSFER_GAS};
pub use funding::{
    FundingConfig, FundingOrchestrator, FundingOutcome, FundingSummary, NativeFunding,
    TokenFunding,
};
pub use intent::{TransferIntent, TransferKind};
pub use metrics::{MetricRecord, MetricsSink, OperationResult};
pub use sequence::{OwnedSequence, SequenceAllocator, SharedSequence};
pub use transfer::{TransferConfig, TransferEngine, TransferSummary, WorkerRun};

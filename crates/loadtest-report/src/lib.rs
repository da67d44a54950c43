//! Reporting for chain-loadtest runs.
//!
//! Reads the per-worker CSV artifacts a run leaves in its output directory
//! and summarizes them per operation kind: success rate, confirmation
//! latency percentiles, mean gas used and overall throughput. The summary
//! can be rendered as a terminal table or as JSON.

pub mod aggregator;
pub mod artifact;
pub mod error;

pub use aggregator::{
    aggregate_dir, aggregate_rows, format_json, format_table, KindSummary, ReportSummary,
};
pub use artifact::{list_artifacts, read_artifact, OperationRow};
pub use error::ReportError;

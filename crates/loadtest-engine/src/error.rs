//! Error types for the load-generation engine.

use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while loading or creating the account key file.
#[derive(Error, Debug)]
pub enum AccountStoreError {
    /// A line of the key file is not a valid private key.
    ///
    /// The key material itself is never included in the message.
    #[error("Malformed key on line {line}: {reason}")]
    MalformedKey { line: usize, reason: String },

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors raised while flushing operation results.
#[derive(Error, Debug)]
pub enum MetricsError {
    /// The metrics artifact could not be written.
    #[error("Failed to write metrics to {}: {source}", path.display())]
    FileWrite {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },
}

//! Error types for report generation.

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur while building a report.
#[derive(Error, Debug)]
pub enum ReportError {
    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// CSV error.
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// JSON serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// The directory holds no metrics artifacts.
    #[error("No metrics artifacts (*.csv) found in {}", .0.display())]
    NoArtifacts(PathBuf),
}

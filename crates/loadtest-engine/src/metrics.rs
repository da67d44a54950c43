//! Per-operation results and their CSV artifact.

use crate::error::MetricsError;
use crate::fee::PricingMode;
use crate::intent::TransferKind;
use alloy_primitives::B256;
use chrono::{DateTime, Utc};
use csv::Writer;
use rand::distr::Alphanumeric;
use rand::Rng;
use std::fs::{self, File, OpenOptions};
use std::io::{self, BufWriter, ErrorKind};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::info;

/// Length of the random part of an artifact file name.
pub const ARTIFACT_ID_LEN: usize = 8;

/// File names tried before giving up on creating an artifact.
const MAX_NAME_ATTEMPTS: usize = 16;

/// A record that can be written as one CSV row.
pub trait MetricRecord {
    /// Ordered `(column, value)` pairs.
    fn fields(&self) -> Vec<(&'static str, String)>;
}

/// Outcome of one confirmed operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OperationResult {
    pub kind: TransferKind,
    pub pricing: PricingMode,
    pub tx_hash: B256,
    pub block_number: u64,
    pub gas_used: u64,
    pub success: bool,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
}

impl OperationResult {
    /// Time from submission to confirmation.
    pub fn latency(&self) -> Duration {
        (self.end_time - self.start_time).to_std().unwrap_or_default()
    }
}

impl MetricRecord for OperationResult {
    fn fields(&self) -> Vec<(&'static str, String)> {
        vec![
            ("kind", self.kind.label(self.pricing).to_string()),
            ("tx_hash", self.tx_hash.to_string()),
            ("block_number", self.block_number.to_string()),
            ("gas_used", self.gas_used.to_string()),
            ("status", u8::from(self.success).to_string()),
            ("start_time", self.start_time.timestamp_millis().to_string()),
            ("end_time", self.end_time.timestamp_millis().to_string()),
            ("time_to_include", self.latency().as_micros().to_string()),
        ]
    }
}

/// Writes a worker's results to `{prefix}{random id}.csv` in an output directory.
#[derive(Debug, Clone)]
pub struct MetricsSink {
    output_dir: PathBuf,
    prefix: String,
}

impl MetricsSink {
    /// Create a sink writing into `output_dir`.
    pub fn new<P: Into<PathBuf>>(output_dir: P) -> Self {
        Self {
            output_dir: output_dir.into(),
            prefix: String::new(),
        }
    }

    /// Set the file name prefix.
    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }

    /// Output directory.
    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Write `records` as a CSV artifact and return its path.
    ///
    /// The header is taken from the first record; a column missing from a
    /// later record is written as an empty value. Nothing is written when
    /// `records` is empty.
    ///
    /// An existing file is never overwritten: on a name collision a fresh
    /// random id is drawn.
    pub fn flush<R: MetricRecord>(&self, records: &[R]) -> Result<Option<PathBuf>, MetricsError> {
        let Some(first) = records.first() else {
            info!("No results to write");
            return Ok(None);
        };

        let (path, file) = fs::create_dir_all(&self.output_dir)
            .and_then(|()| self.create_artifact(random_id))
            .map_err(|e| MetricsError::FileWrite {
                path: self.output_dir.clone(),
                source: e.into(),
            })?;
        let write_err = |source: csv::Error| MetricsError::FileWrite {
            path: path.clone(),
            source,
        };

        let mut writer = Writer::from_writer(BufWriter::new(file));

        let columns: Vec<&'static str> = first.fields().into_iter().map(|(k, _)| k).collect();
        writer.write_record(&columns).map_err(write_err)?;

        for record in records {
            let fields = record.fields();
            let row: Vec<&str> = columns
                .iter()
                .map(|column| {
                    fields
                        .iter()
                        .find(|(key, _)| key == column)
                        .map(|(_, value)| value.as_str())
                        .unwrap_or("")
                })
                .collect();
            writer.write_record(&row).map_err(write_err)?;
        }

        writer.flush().map_err(|e| write_err(e.into()))?;

        info!("Wrote {} results to {}", records.len(), path.display());
        Ok(Some(path))
    }
}

impl MetricsSink {
    /// Create a new artifact file, drawing ids from `next_id` until a free name is found.
    fn create_artifact(&self, mut next_id: impl FnMut() -> String) -> io::Result<(PathBuf, File)> {
        for _ in 0..MAX_NAME_ATTEMPTS {
            let path = self
                .output_dir
                .join(format!("{}{}.csv", self.prefix, next_id()));
            match OpenOptions::new().write(true).create_new(true).open(&path) {
                Ok(file) => return Ok((path, file)),
                Err(e) if e.kind() == ErrorKind::AlreadyExists => continue,
                Err(e) => return Err(e),
            }
        }
        Err(io::Error::new(
            ErrorKind::AlreadyExists,
            format!("no free artifact name after {MAX_NAME_ATTEMPTS} attempts"),
        ))
    }
}

fn random_id() -> String {
    rand::rng()
        .sample_iter(&Alphanumeric)
        .take(ARTIFACT_ID_LEN)
        .map(char::from)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use tempfile::TempDir;

    fn result(block_number: u64) -> OperationResult {
        let start_time = Utc.timestamp_millis_opt(1_700_000_000_000).unwrap();
        OperationResult {
            kind: TransferKind::Token,
            pricing: PricingMode::Dynamic,
            tx_hash: B256::repeat_byte(block_number as u8),
            block_number,
            gas_used: 51_000,
            success: true,
            start_time,
            end_time: start_time + chrono::Duration::milliseconds(1_500),
        }
    }

    struct Sparse(Vec<(&'static str, String)>);

    impl MetricRecord for Sparse {
        fn fields(&self) -> Vec<(&'static str, String)> {
            self.0.clone()
        }
    }

    #[test]
    fn test_operation_result_fields() {
        let fields = result(3).fields();
        let columns: Vec<_> = fields.iter().map(|(k, _)| *k).collect();
        assert_eq!(
            columns,
            vec![
                "kind",
                "tx_hash",
                "block_number",
                "gas_used",
                "status",
                "start_time",
                "end_time",
                "time_to_include"
            ]
        );
        assert_eq!(fields[0].1, "erc20-transfer");
        assert_eq!(fields[4].1, "1");
        assert_eq!(fields[5].1, "1700000000000");
        assert_eq!(fields[6].1, "1700000001500");
        assert_eq!(fields[7].1, "1500000");
    }

    #[test]
    fn test_flush_writes_header_and_one_row_per_result() {
        let dir = TempDir::new().unwrap();
        let sink = MetricsSink::new(dir.path()).with_prefix("worker-");

        let path = sink.flush(&[result(1), result(2), result(3)]).unwrap().unwrap();

        let name = path.file_name().unwrap().to_str().unwrap();
        assert!(name.starts_with("worker-"));
        assert!(name.ends_with(".csv"));
        assert_eq!(name.len(), "worker-".len() + ARTIFACT_ID_LEN + ".csv".len());

        let content = fs::read_to_string(&path).unwrap();
        assert_eq!(content.lines().count(), 4);
        assert!(content.starts_with("kind,tx_hash,block_number"));
    }

    #[test]
    fn test_flush_empty_is_noop() {
        let dir = TempDir::new().unwrap();
        let sink = MetricsSink::new(dir.path());

        assert!(sink.flush::<OperationResult>(&[]).unwrap().is_none());
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_missing_column_written_empty() {
        let dir = TempDir::new().unwrap();
        let sink = MetricsSink::new(dir.path());
        let records = vec![
            Sparse(vec![("a", "1".to_string()), ("b", "2".to_string())]),
            Sparse(vec![("a", "3".to_string())]),
        ];

        let path = sink.flush(&records).unwrap().unwrap();

        let content = fs::read_to_string(path).unwrap();
        assert_eq!(content, "a,b\n1,2\n3,\n");
    }

    #[test]
    fn test_name_collision_keeps_existing_artifact() {
        let dir = TempDir::new().unwrap();
        let sink = MetricsSink::new(dir.path()).with_prefix("w-");
        let taken = dir.path().join("w-AAAAAAAA.csv");
        fs::write(&taken, "kind\nfirst\n").unwrap();

        let mut ids = vec!["BBBBBBBB", "AAAAAAAA"];
        let (path, _) = sink
            .create_artifact(|| ids.pop().unwrap().to_string())
            .unwrap();

        assert_eq!(path, dir.path().join("w-BBBBBBBB.csv"));
        assert_eq!(fs::read_to_string(&taken).unwrap(), "kind\nfirst\n");
    }

    #[test]
    fn test_name_attempts_are_bounded() {
        let dir = TempDir::new().unwrap();
        let sink = MetricsSink::new(dir.path());
        fs::write(dir.path().join("same.csv"), "").unwrap();

        let err = sink.create_artifact(|| "same".to_string()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::AlreadyExists);
    }

    #[test]
    fn test_random_ids_are_alphanumeric() {
        let id = random_id();
        assert_eq!(id.len(), ARTIFACT_ID_LEN);
        assert!(id.chars().all(|c| c.is_ascii_alphanumeric()));
    }
}

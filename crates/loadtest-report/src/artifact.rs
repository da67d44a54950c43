//! Reading worker metrics artifacts.

use crate::error::ReportError;
use csv::{Reader, StringRecord};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// One operation read back from an artifact.
#[derive(Debug, Clone, PartialEq)]
pub struct OperationRow {
    pub kind: String,
    pub gas_used: u64,
    pub success: bool,
    /// Submission time, Unix milliseconds.
    pub start_ms: i64,
    /// Confirmation time, Unix milliseconds.
    pub end_ms: i64,
    pub latency_ms: f64,
}

/// Column positions resolved from an artifact's header.
struct Columns {
    kind: usize,
    gas_used: usize,
    status: usize,
    start_time: usize,
    end_time: usize,
    time_to_include: Option<usize>,
}

impl Columns {
    fn resolve(headers: &StringRecord) -> Option<Self> {
        let find = |name: &str| headers.iter().position(|h| h == name);
        Some(Self {
            kind: find("kind")?,
            gas_used: find("gas_used")?,
            status: find("status")?,
            start_time: find("start_time")?,
            end_time: find("end_time")?,
            time_to_include: find("time_to_include"),
        })
    }

    fn parse(&self, record: &StringRecord) -> Option<OperationRow> {
        let field = |index: usize| record.get(index).map(str::trim).filter(|v| !v.is_empty());

        let kind = field(self.kind)?.to_string();
        let gas_used = field(self.gas_used)?.parse().ok()?;
        let success = match field(self.status)? {
            "1" | "true" => true,
            "0" | "false" => false,
            _ => return None,
        };
        let start_ms: i64 = field(self.start_time)?.parse().ok()?;
        let end_ms: i64 = field(self.end_time)?.parse().ok()?;
        let latency_ms = match self.time_to_include.and_then(field) {
            Some(micros) => micros.parse::<f64>().ok()? / 1000.0,
            None => (end_ms - start_ms) as f64,
        };

        Some(OperationRow {
            kind,
            gas_used,
            success,
            start_ms,
            end_ms,
            latency_ms,
        })
    }
}

/// List the `*.csv` files in `dir`, sorted by name.
pub fn list_artifacts(dir: &Path) -> Result<Vec<PathBuf>, ReportError> {
    let mut artifacts: Vec<PathBuf> = fs::read_dir(dir)?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| path.is_file() && path.extension().is_some_and(|e| e == "csv"))
        .collect();
    artifacts.sort();
    if artifacts.is_empty() {
        return Err(ReportError::NoArtifacts(dir.to_path_buf()));
    }
    Ok(artifacts)
}

/// Read every row of one artifact.
///
/// Columns are looked up by header name. Rows with a missing or unparsable
/// value are skipped with a warning; an artifact lacking a required column
/// yields no rows.
pub fn read_artifact(path: &Path) -> Result<Vec<OperationRow>, ReportError> {
    let mut reader = Reader::from_path(path)?;
    let headers = reader.headers()?.clone();
    let Some(columns) = Columns::resolve(&headers) else {
        warn!("Skipping {}: missing required columns", path.display());
        return Ok(Vec::new());
    };

    let mut rows = Vec::new();
    for (index, record) in reader.records().enumerate() {
        match record.ok().and_then(|r| columns.parse(&r)) {
            Some(row) => rows.push(row),
            None => warn!("Skipping row {} of {}", index + 1, path.display()),
        }
    }

    debug!("Read {} rows from {}", rows.len(), path.display());
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const HEADER: &str = "kind,tx_hash,block_number,gas_used,status,start_time,end_time,time_to_include";

    #[test]
    fn test_read_artifact_rows() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("a.csv");
        fs::write(
            &path,
            format!("{HEADER}\nerc20-transfer,0x01,1,51000,1,1000,1250,250000\neth-transfer-eip1559,0x02,2,21000,0,1300,1400,100000\n"),
        )
        .unwrap();

        let rows = read_artifact(&path).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].kind, "erc20-transfer");
        assert_eq!(rows[0].latency_ms, 250.0);
        assert!(rows[0].success);
        assert!(!rows[1].success);
        assert_eq!(rows[1].gas_used, 21_000);
    }

    #[test]
    fn test_bad_rows_are_skipped() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("a.csv");
        fs::write(
            &path,
            format!("{HEADER}\nerc20-transfer,0x01,1,lots,1,1000,1250,250000\nerc20-transfer,0x02,2,51000,1,1000,1100,\n"),
        )
        .unwrap();

        let rows = read_artifact(&path).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].latency_ms, 100.0);
    }

    #[test]
    fn test_columns_found_by_name() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("a.csv");
        fs::write(
            &path,
            "end_time,start_time,status,gas_used,kind\n2000,1000,1,21000,eth-transfer-legacy\n",
        )
        .unwrap();

        let rows = read_artifact(&path).unwrap();
        assert_eq!(rows[0].kind, "eth-transfer-legacy");
        assert_eq!(rows[0].latency_ms, 1000.0);
    }

    #[test]
    fn test_list_artifacts_requires_csv() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("notes.txt"), "x").unwrap();
        assert!(matches!(
            list_artifacts(dir.path()),
            Err(ReportError::NoArtifacts(_))
        ));

        fs::write(dir.path().join("b.csv"), HEADER).unwrap();
        fs::write(dir.path().join("a.csv"), HEADER).unwrap();
        let artifacts = list_artifacts(dir.path()).unwrap();
        assert_eq!(artifacts.len(), 2);
        assert!(artifacts[0].ends_with("a.csv"));
    }
}

//! Aggregation of operation rows into per-kind statistics.

use crate::artifact::{list_artifacts, read_artifact, OperationRow};
use crate::error::ReportError;
use comfy_table::{presets::UTF8_FULL, Cell, Color, Table};
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::Path;
use tracing::info;

/// Statistics for one operation kind (or for all of them).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct KindSummary {
    pub kind: String,
    pub operations: usize,
    pub succeeded: usize,
    pub success_rate: f64,
    pub latency_mean_ms: f64,
    pub latency_p50_ms: f64,
    pub latency_p90_ms: f64,
    pub latency_p99_ms: f64,
    pub latency_max_ms: f64,
    pub mean_gas_used: f64,
}

/// Aggregated view over every artifact of a run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReportSummary {
    /// Number of artifacts read.
    pub artifacts: usize,
    /// Per-kind statistics, sorted by kind.
    pub kinds: Vec<KindSummary>,
    /// Statistics over all operations.
    pub overall: KindSummary,
    /// Span between the first submission and the last confirmation.
    pub wall_clock_secs: f64,
    /// Operations per second over the wall clock span.
    pub throughput_ops_per_sec: f64,
}

/// Read every artifact in `dir` and aggregate it.
pub fn aggregate_dir(dir: &Path) -> Result<ReportSummary, ReportError> {
    let artifacts = list_artifacts(dir)?;
    let mut rows = Vec::new();
    for artifact in &artifacts {
        rows.extend(read_artifact(artifact)?);
    }
    info!(
        "Aggregating {} operations from {} artifacts",
        rows.len(),
        artifacts.len()
    );
    Ok(aggregate_rows(&rows, artifacts.len()))
}

/// Aggregate rows read from `artifacts` files.
pub fn aggregate_rows(rows: &[OperationRow], artifacts: usize) -> ReportSummary {
    let mut by_kind: BTreeMap<&str, Vec<&OperationRow>> = BTreeMap::new();
    for row in rows {
        by_kind.entry(row.kind.as_str()).or_default().push(row);
    }

    let kinds = by_kind
        .into_iter()
        .map(|(kind, rows)| summarize(kind, &rows))
        .collect();
    let overall = summarize("all", &rows.iter().collect::<Vec<_>>());

    let first_start = rows.iter().map(|r| r.start_ms).min();
    let last_end = rows.iter().map(|r| r.end_ms).max();
    let wall_clock_secs = match (first_start, last_end) {
        (Some(start), Some(end)) if end > start => (end - start) as f64 / 1000.0,
        _ => 0.0,
    };
    let throughput_ops_per_sec = if wall_clock_secs > 0.0 {
        rows.len() as f64 / wall_clock_secs
    } else {
        0.0
    };

    ReportSummary {
        artifacts,
        kinds,
        overall,
        wall_clock_secs,
        throughput_ops_per_sec,
    }
}

fn summarize(kind: &str, rows: &[&OperationRow]) -> KindSummary {
    let operations = rows.len();
    let succeeded = rows.iter().filter(|r| r.success).count();

    let mut latencies: Vec<f64> = rows.iter().map(|r| r.latency_ms).collect();
    latencies.sort_by(f64::total_cmp);

    KindSummary {
        kind: kind.to_string(),
        operations,
        succeeded,
        success_rate: ratio(succeeded as f64, operations),
        latency_mean_ms: ratio(latencies.iter().sum(), operations),
        latency_p50_ms: percentile(&latencies, 50.0),
        latency_p90_ms: percentile(&latencies, 90.0),
        latency_p99_ms: percentile(&latencies, 99.0),
        latency_max_ms: latencies.last().copied().unwrap_or(0.0),
        mean_gas_used: ratio(rows.iter().map(|r| r.gas_used as f64).sum(), operations),
    }
}

fn ratio(total: f64, count: usize) -> f64 {
    if count == 0 {
        0.0
    } else {
        total / count as f64
    }
}

/// Nearest-rank percentile of an ascending slice.
fn percentile(sorted: &[f64], p: f64) -> f64 {
    if sorted.is_empty() {
        return 0.0;
    }
    let rank = (p * sorted.len() as f64 / 100.0).ceil() as usize;
    sorted[rank.clamp(1, sorted.len()) - 1]
}

/// Format the report as a table.
pub fn format_table(report: &ReportSummary) -> String {
    let mut output = String::new();

    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_header(vec![
        "Kind", "Ops", "Success", "Mean (ms)", "p50", "p90", "p99", "Max", "Mean gas",
    ]);

    for kind in &report.kinds {
        table.add_row(summary_row(Cell::new(&kind.kind), kind));
    }
    table.add_row(summary_row(
        Cell::new("TOTAL").fg(Color::Cyan),
        &report.overall,
    ));

    output.push_str(&table.to_string());
    output.push_str(&format!(
        "\n{} artifacts, {:.1}s wall clock, {:.2} ops/sec\n",
        report.artifacts, report.wall_clock_secs, report.throughput_ops_per_sec
    ));
    output
}

fn summary_row(name: Cell, kind: &KindSummary) -> Vec<Cell> {
    let success = format!("{:.1}%", kind.success_rate * 100.0);
    let success = if kind.succeeded == kind.operations {
        Cell::new(success).fg(Color::Green)
    } else {
        Cell::new(success).fg(Color::Red)
    };

    vec![
        name,
        Cell::new(kind.operations),
        success,
        Cell::new(format!("{:.1}", kind.latency_mean_ms)),
        Cell::new(format!("{:.1}", kind.latency_p50_ms)),
        Cell::new(format!("{:.1}", kind.latency_p90_ms)),
        Cell::new(format!("{:.1}", kind.latency_p99_ms)),
        Cell::new(format!("{:.1}", kind.latency_max_ms)),
        Cell::new(format!("{:.0}", kind.mean_gas_used)),
    ]
}

/// Format the report as pretty-printed JSON.
pub fn format_json(report: &ReportSummary) -> Result<String, ReportError> {
    Ok(serde_json::to_string_pretty(report)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn row(kind: &str, latency_ms: f64, success: bool, start_ms: i64) -> OperationRow {
        OperationRow {
            kind: kind.to_string(),
            gas_used: if kind == "erc20-transfer" { 51_000 } else { 21_000 },
            success,
            start_ms,
            end_ms: start_ms + latency_ms as i64,
            latency_ms,
        }
    }

    #[test]
    fn test_percentile_nearest_rank() {
        let values: Vec<f64> = (1..=100).map(f64::from).collect();
        assert_eq!(percentile(&values, 50.0), 50.0);
        assert_eq!(percentile(&values, 90.0), 90.0);
        assert_eq!(percentile(&values, 99.0), 99.0);
        assert_eq!(percentile(&[7.0], 99.0), 7.0);
        assert_eq!(percentile(&[], 50.0), 0.0);
    }

    #[test]
    fn test_aggregate_rows_per_kind() {
        let rows = vec![
            row("erc20-transfer", 100.0, true, 0),
            row("erc20-transfer", 300.0, false, 100),
            row("eth-transfer-eip1559", 200.0, true, 200),
        ];

        let report = aggregate_rows(&rows, 2);

        assert_eq!(report.artifacts, 2);
        assert_eq!(report.kinds.len(), 2);
        let token = &report.kinds[0];
        assert_eq!(token.kind, "erc20-transfer");
        assert_eq!(token.operations, 2);
        assert_eq!(token.success_rate, 0.5);
        assert_eq!(token.latency_mean_ms, 200.0);
        assert_eq!(token.latency_max_ms, 300.0);
        assert_eq!(token.mean_gas_used, 51_000.0);

        assert_eq!(report.overall.operations, 3);
        assert_eq!(report.wall_clock_secs, 0.4);
        assert!((report.throughput_ops_per_sec - 7.5).abs() < 1e-9);
    }

    #[test]
    fn test_aggregate_dir_and_format() {
        let dir = TempDir::new().unwrap();
        let header = "kind,tx_hash,block_number,gas_used,status,start_time,end_time,time_to_include";
        fs::write(
            dir.path().join("one.csv"),
            format!("{header}\nerc20-transfer,0x1,1,51000,1,1000,2000,1000000\n"),
        )
        .unwrap();
        fs::write(
            dir.path().join("two.csv"),
            format!("{header}\neth-transfer-eip1559,0x2,2,21000,1,1500,3000,1500000\n"),
        )
        .unwrap();

        let report = aggregate_dir(dir.path()).unwrap();
        assert_eq!(report.artifacts, 2);
        assert_eq!(report.overall.operations, 2);
        assert_eq!(report.wall_clock_secs, 2.0);

        let table = format_table(&report);
        assert!(table.contains("erc20-transfer"));
        assert!(table.contains("TOTAL"));

        let json: serde_json::Value = serde_json::from_str(&format_json(&report).unwrap()).unwrap();
        assert_eq!(json["overall"]["operations"], 2);
        assert_eq!(json["kinds"][1]["kind"], "eth-transfer-eip1559");
    }

    #[test]
    fn test_empty_dir_is_an_error() {
        let dir = TempDir::new().unwrap();
        assert!(matches!(
            aggregate_dir(dir.path()),
            Err(ReportError::NoArtifacts(_))
        ));
    }
}

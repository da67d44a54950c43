//! Loadtest report command handler.

use anyhow::Context;
use loadtest_report::{aggregate_dir, format_json, format_table};

use crate::{ReportArgs, ReportFormat};

/// Summarize the CSV artifacts in the output directory and print the result.
pub async fn run_loadtest_report(args: ReportArgs) -> anyhow::Result<()> {
    let report = aggregate_dir(&args.output_dir)
        .with_context(|| format!("Failed to aggregate results in {:?}", args.output_dir))?;

    match args.format {
        ReportFormat::Table => print!("{}", format_table(&report)),
        ReportFormat::Json => println!("{}", format_json(&report)?),
    }
    Ok(())
}

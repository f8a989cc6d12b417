use std::process::ExitCode;

use geoimport_engine::{
    default_targets, run_import, ImportManifest, ImportTarget, StoreConnector,
};
use serde_json::json;

use crate::CliResult;

/// Manifest entries first, then `--file` entries; the built-in list when both are empty.
pub fn collect_targets(
    manifest: Option<ImportManifest>,
    files: Vec<ImportTarget>,
) -> Vec<ImportTarget> {
    let mut targets = manifest.map(|m| m.files).unwrap_or_default();
    targets.extend(files);
    if targets.is_empty() {
        targets = default_targets();
    }
    targets
}

pub async fn run<C: StoreConnector>(
    connector: &C,
    targets: &[ImportTarget],
) -> CliResult<ExitCode> {
    let summary = run_import(connector, targets).await?;
    let status = if summary.is_success() { "ok" } else { "failed" };
    let output = json!({
        "status": status,
        "imported_rows": summary.imported_rows(),
        "failed": summary.failed_count(),
        "reports": summary.reports,
    });
    println!("{}", serde_json::to_string_pretty(&output)?);

    if summary.is_success() {
        Ok(ExitCode::SUCCESS)
    } else {
        Ok(ExitCode::FAILURE)
    }
}

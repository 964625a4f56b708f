//! JSON output helpers.

use anyhow::{Context, Result};
use swell_common::RunReport;

/// Serialize a run report for `--json` consumers.
///
/// # Errors
///
/// Returns an error if JSON serialization fails (should not happen in
/// practice — the report contains only strings, integers and timestamps).
pub fn render_report(report: &RunReport) -> Result<String> {
    serde_json::to_string_pretty(report).context("JSON serialization failed")
}

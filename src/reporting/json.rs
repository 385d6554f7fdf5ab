use anyhow::{Context, Result};
use std::fs;
use std::path::Path;

use crate::core::results::Report;

/// Writes the report as pretty-printed JSON: timestamp, summary counts and the
/// ordered results with their tagged outcome.
/// 将报告写为格式化的 JSON：时间戳、摘要计数以及带有标记结果的有序结果。
pub fn generate_json_report(report: &Report, output_path: &Path) -> Result<()> {
    let json = serde_json::to_string_pretty(report).context("Failed to serialize report")?;
    fs::write(output_path, json)
        .with_context(|| format!("Failed to write JSON report to {}", output_path.display()))
}

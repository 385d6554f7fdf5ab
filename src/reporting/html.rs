//! # HTML Reporting Module / HTML 报告模块
//!
//! Writes a self-contained HTML page with the summary counts and one table row
//! per result. Failure details are shown under the row that produced them.
//!
//! 写入一个独立的 HTML 页面，其中包含摘要计数和每个结果一行的表格。
//! 失败详情显示在产生它们的行下方。

use anyhow::{Context, Result};
use maud::{DOCTYPE, Markup, PreEscaped, html};
use std::fs;
use std::path::Path;

use crate::core::models::Outcome;
use crate::core::results::Report;

/// Embedded CSS styles for HTML reports / HTML 报告的嵌入式 CSS 样式
const HTML_STYLE: &str = "
body { font-family: -apple-system, 'Segoe UI', Helvetica, Arial, sans-serif; margin: 2em; color: #24292e; }
h1 { font-size: 1.6em; }
.meta { color: #6a737d; }
.summary-container { display: flex; gap: 2em; margin: 1.5em 0; }
.summary-item { display: flex; flex-direction: column; align-items: center; }
.count { font-size: 1.8em; font-weight: bold; }
.label { color: #6a737d; }
table { border-collapse: collapse; width: 100%; }
th, td { text-align: left; padding: 0.4em 0.8em; border-bottom: 1px solid #e1e4e8; }
.success { color: #22863a; }
.failure { color: #cb2431; }
.skipped { color: #b08800; }
pre.detail { margin: 0; white-space: pre-wrap; font-size: 0.9em; }
";

/// Renders the report as an HTML document.
pub fn render_html(report: &Report) -> Markup {
    let summary = report.summary;
    html! {
        (DOCTYPE)
        html {
            head {
                meta charset="utf-8";
                title { "Port Test Report" }
                style { (PreEscaped(HTML_STYLE)) }
            }
            body {
                h1 { "Port Test Report" }
                p.meta { "Generated " (report.generated_at.format("%Y-%m-%d %H:%M:%S %:z").to_string()) }
                div.summary-container {
                    div.summary-item { span.count { (summary.total) } span.label { "Total" } }
                    div.summary-item { span.count.success { (summary.succeeded) } span.label { "Succeeded" } }
                    div.summary-item { span.count.failure { (summary.failed) } span.label { "Failed" } }
                    div.summary-item { span.count.skipped { (summary.skipped) } span.label { "Skipped" } }
                }
                table {
                    thead {
                        tr {
                            th { "Source" }
                            th { "Destination" }
                            th { "Path" }
                            th { "Service" }
                            th { "Status" }
                        }
                    }
                    tbody {
                        @for result in &report.results {
                            tr {
                                td { (result.source) }
                                td { (result.destination) }
                                td { code { (result.path) } }
                                td { (result.service) }
                                td class=(status_class(&result.outcome)) { (result.outcome.status_str()) }
                            }
                            @if !result.outcome.is_success() {
                                tr {
                                    td colspan="5" {
                                        pre class=(format!("detail {}", status_class(&result.outcome))) { (result.outcome.detail()) }
                                    }
                                }
                            }
                        }
                    }
                }
            }
        }
    }
}

fn status_class(outcome: &Outcome) -> &'static str {
    match outcome {
        Outcome::Success => "success",
        Outcome::Failure { .. } => "failure",
        Outcome::Skipped { .. } => "skipped",
    }
}

/// Generates an HTML report file from a finished run.
///
/// # Arguments / 参数
/// * `report` - The finished report
///              完成的报告
/// * `output_path` - The file path where the HTML report will be saved
///                   保存 HTML 报告的文件路径
pub fn generate_html_report(report: &Report, output_path: &Path) -> Result<()> {
    fs::write(output_path, render_html(report).into_string())
        .with_context(|| format!("Failed to write HTML report to {}", output_path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::models::{Node, TestResult};
    use crate::core::planner::PortSpec;

    #[test]
    fn failure_detail_is_escaped() {
        let spec = PortSpec {
            port: 9200,
            service: "App to Elasticsearch",
        };
        let result = TestResult::new(
            &Node::new("web1", "10.0.0.1"),
            &Node::new("es1", "10.0.0.4"),
            &spec,
            Outcome::failure("unexpected response: <html>"),
        );
        let page = render_html(&Report::new(vec![result])).into_string();

        assert!(page.contains("App to Elasticsearch"));
        assert!(page.contains("unexpected response: &lt;html&gt;"));
        assert!(!page.contains("<html>unexpected"));
    }
}

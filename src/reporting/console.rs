//! # Console Reporting Module / 控制台报告模块
//!
//! Prints one line per result, in report order, followed by a summary. Failure
//! details are printed in red and skip reasons in yellow so they stand apart
//! from successes.
//!
//! 每个结果打印一行（按报告顺序），然后是摘要。失败详情以红色打印，
//! 跳过原因以黄色打印，以便与成功区分开。

use colored::*;

use crate::core::models::{Outcome, TestResult};
use crate::core::results::Report;

/// Renders a single result as a console line.
///
/// # Output Format / 输出格式
/// ```text
/// web1 -> db1 [10.0.0.1 -> 10.0.0.2:3306] App to DB: Success
/// web1 -> mq1 [10.0.0.1 -> 10.0.0.3:5672] App to RabbitMQ: Failure
///     Output: Error: error connecting to 10.0.0.3:5672: Connection refused Error: exit status 1
/// ```
pub fn render_line(result: &TestResult) -> String {
    let head = format!(
        "{} -> {} [{}] {}:",
        result.source, result.destination, result.path, result.service
    );

    match &result.outcome {
        Outcome::Success => format!("{head} {}", "Success".green()),
        Outcome::Failure { detail } => format!(
            "{head} {}\n{}",
            "Failure".red().bold(),
            indent(detail).red()
        ),
        Outcome::Skipped { reason } => format!(
            "{head} {}\n{}",
            "Skipped".yellow(),
            indent(reason).yellow()
        ),
    }
}

fn indent(text: &str) -> String {
    text.trim()
        .lines()
        .map(|line| format!("    {line}"))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Prints the whole report followed by a summary banner.
/// 打印整个报告，然后打印摘要横幅。
pub fn print_report(report: &Report) {
    println!("\n{}", "--- Port Test Results ---".bold());

    if report.results.is_empty() {
        println!("{}", "No port tests were scheduled for this inventory.".yellow());
        return;
    }

    for result in &report.results {
        println!("{}", render_line(result));
    }

    let summary = report.summary;
    println!(
        "\n{} total, {} succeeded, {} failed, {} skipped",
        summary.total.to_string().bold(),
        summary.succeeded.to_string().green(),
        summary.failed.to_string().red(),
        summary.skipped.to_string().yellow()
    );

    if report.all_succeeded() {
        println!("{}", "All required ports are open.".green().bold());
    } else {
        println!("{}", "Some required ports could not be verified.".red().bold());
    }
}

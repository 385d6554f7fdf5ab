//! # Reporting Module / 报告模块
//!
//! This module renders a finished `Report`: colored lines on the console, and
//! optional HTML and JSON files.
//!
//! 此模块渲染完成的 `Report`：控制台上的彩色行，以及可选的 HTML 和 JSON 文件。

pub mod console;
pub mod html;
pub mod json;

// Re-export common reporting functions
pub use console::{print_report, render_line};
pub use html::generate_html_report;
pub use json::generate_json_report;

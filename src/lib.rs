//! # Port Test Library / 端口测试库
//!
//! This library provides the core functionality for the `porttest` tool, which
//! verifies that the network paths a multi-role server cluster depends on are
//! actually open. It deploys a small probe pair to every node over SSH and then
//! tests every required (source, destination, port) triple concurrently.
//!
//! 此库为 `porttest` 工具提供核心功能，用于验证多角色服务器集群所依赖的网络路径
//! 是否真正开放。它通过 SSH 向每个节点部署一对探针程序，然后并发测试每个必需的
//! （源、目标、端口）三元组。
//!
//! ## Modules / 模块
//!
//! - `core` - Data models, port rules, deployment and the test matrix executor
//! - `infra` - Remote execution gateway (SSH), host trust, logging and local files
//! - `probe` - The listener/dialer liveness protocol used on every node
//! - `reporting` - Console, HTML and JSON reports
//! - `cli` - Command-line interface and commands
//!
//! - `core` - 数据模型、端口规则、部署和测试矩阵执行器
//! - `infra` - 远程执行网关（SSH）、主机信任、日志和本地文件
//! - `probe` - 每个节点上使用的监听器/拨号器存活协议
//! - `reporting` - 控制台、HTML 和 JSON 报告
//! - `cli` - 命令行接口和命令

pub mod cli;
pub mod core;
pub mod infra;
pub mod probe;
pub mod reporting;

// Re-export commonly used items
pub use core::config;
pub use core::execution;
pub use core::models;
pub use core::planner;

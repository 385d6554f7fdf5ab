//! # Core Module / 核心模块
//!
//! This module contains the orchestration core of porttest: the node and result
//! models, inventory configuration, the role-based port rules, the deployment
//! coordinator and the test matrix executor.
//!
//! 此模块包含 porttest 的编排核心：节点和结果模型、清单配置、基于角色的端口规则、
//! 部署协调器和测试矩阵执行器。

pub mod config;
pub mod deployment;
pub mod error;
pub mod execution;
pub mod layout;
pub mod models;
pub mod planner;
pub mod results;

// Re-exports
pub use error::RunError;
pub use execution::execute_matrix;
pub use models::{Node, Outcome, TestResult};
pub use results::{Report, ResultAccumulator};

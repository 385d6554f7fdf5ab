//! # Infrastructure Module / 基础设施模块
//!
//! This module provides infrastructure services for porttest: the remote
//! execution gateway and its SSH implementation with per-node session pools,
//! host-key trust, logging setup and local file helpers.
//!
//! 此模块为 porttest 提供基础设施服务：远程执行网关及其 SSH 实现、
//! 主机密钥信任、日志设置和本地文件辅助函数。

pub mod fs;
pub mod gateway;
pub mod logging;
pub mod pool;
pub mod ssh;
pub mod trust;

pub use gateway::{CommandOutput, Connector, GatewayError, RemoteSession};

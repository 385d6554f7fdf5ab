//! # Error Types / 错误类型
//!
//! Typed errors for the orchestration core. Configuration errors stop the run
//! before any work starts; `RunError` is what the deployment join point
//! escalates when the final report would be meaningless.
//!
//! 编排核心的类型化错误。配置错误会在任何工作开始之前停止运行；
//! `RunError` 是部署汇合点在最终报告将失去意义时上报的错误。

use std::path::PathBuf;
use thiserror::Error;

/// A bad or missing inventory, or invalid settings.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("inventory file {path} could not be read: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("inventory file {path} is not valid TOML: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("inventory declares no nodes")]
    Empty,
    #[error("node name `{0}` is declared more than once")]
    DuplicateName(String),
    #[error("node at position {0} has an empty name")]
    MissingName(usize),
    #[error("node `{0}` has an empty address")]
    MissingAddress(String),
    #[error("invalid setting `{key}`: {reason}")]
    InvalidSetting { key: &'static str, reason: String },
}

/// Fatal errors that abort the whole run at the deployment join point.
/// 在部署汇合点中止整个运行的致命错误。
#[derive(Debug, Error)]
pub enum RunError {
    #[error(transparent)]
    Configuration(#[from] ConfigError),
    #[error("authentication failed on {node}: {detail}")]
    Authentication { node: String, detail: String },
    #[error("host identity check failed for {node}: {detail}")]
    HostTrust { node: String, detail: String },
    #[error("deployment failed on {node}: {detail}")]
    Deployment { node: String, detail: String },
    #[error("interrupted while deploying probes")]
    Interrupted,
}

//! # Remote Execution Gateway / 远程执行网关
//!
//! The two capabilities the orchestration core needs from a node: run a shell
//! command and upload a file. `Connector` opens one session per node; the SSH
//! implementation lives in `infra::ssh`, tests provide in-process fakes.
//!
//! 编排核心需要节点提供的两种能力：运行 shell 命令和上传文件。
//! `Connector` 为每个节点打开一个会话；SSH 实现位于 `infra::ssh`，测试提供进程内的伪实现。

use async_trait::async_trait;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

use crate::core::models::Node;
use crate::infra::pool::PoolClosed;

/// Captured output of a remote command that exited successfully.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    /// Combined stdout and stderr, trimmed.
    /// 合并的 stdout 和 stderr，已去除首尾空白。
    pub fn combined(&self) -> String {
        combine(&self.stdout, &self.stderr)
    }
}

pub(crate) fn combine(stdout: &str, stderr: &str) -> String {
    match (stdout.trim(), stderr.trim()) {
        ("", err) => err.to_string(),
        (out, "") => out.to_string(),
        (out, err) => format!("{out}\n{err}"),
    }
}

/// Errors surfaced by a gateway. Authentication and host-trust failures are
/// fatal for the whole run; everything else is local to one node or one step.
///
/// 网关产生的错误。认证和主机信任失败对整个运行是致命的；其他错误只影响一个节点或一个步骤。
#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("authentication as `{user}` failed: {detail}")]
    Authentication { user: String, detail: String },
    #[error("{0}")]
    HostTrust(String),
    #[error("network error: {0}")]
    Network(String),
    #[error("command `{command}` exited with status {status}: {output}")]
    CommandFailed {
        command: String,
        status: i32,
        output: String,
    },
    #[error("could not upload {local} to {remote}: {detail}")]
    Transfer {
        local: String,
        remote: String,
        detail: String,
    },
    #[error("`{command}` did not finish within {}s", timeout.as_secs_f64())]
    Timeout { command: String, timeout: Duration },
    #[error("session error: {0}")]
    Session(String),
}

impl GatewayError {
    /// Whether this error means nothing else in the run can be trusted.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            GatewayError::Authentication { .. } | GatewayError::HostTrust(_)
        )
    }
}

impl From<PoolClosed> for GatewayError {
    fn from(e: PoolClosed) -> Self {
        GatewayError::Session(e.to_string())
    }
}

/// Runs `step` with an upper bound, reporting an overrun as `GatewayError::Timeout`.
/// 以上限运行 `step`，超时报告为 `GatewayError::Timeout`。
pub async fn bounded<T, F>(timeout: Duration, label: &str, step: F) -> Result<T, GatewayError>
where
    F: Future<Output = Result<T, GatewayError>>,
{
    tokio::time::timeout(timeout, step)
        .await
        .unwrap_or_else(|_| {
            Err(GatewayError::Timeout {
                command: label.to_string(),
                timeout,
            })
        })
}

/// An open, authenticated session bound to one node.
///
/// Implementations must tolerate concurrent `run` calls: a node can be the
/// destination of several pair tasks at once.
///
/// 绑定到一个节点的已认证会话。实现必须容忍并发的 `run` 调用：
/// 一个节点可能同时是多个节点对任务的目标。
#[async_trait]
pub trait RemoteSession: Send + Sync {
    /// Runs `command` through the node's shell. A non-zero exit status is
    /// reported as `GatewayError::CommandFailed` carrying the output.
    async fn run(&self, command: &str) -> Result<CommandOutput, GatewayError>;

    /// Copies a local file to `remote_path` on the node.
    async fn upload(&self, local_path: &Path, remote_path: &str) -> Result<(), GatewayError>;
}

/// Opens sessions to nodes.
/// 打开到节点的会话。
#[async_trait]
pub trait Connector: Send + Sync {
    type Session: RemoteSession + 'static;

    async fn connect(&self, node: &Node) -> Result<Self::Session, GatewayError>;
}

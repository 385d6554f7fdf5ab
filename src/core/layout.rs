//! # Remote Layout / 远程布局
//!
//! Where the probe binaries live on a node and the exact shell commands used to
//! install and invoke them. Every command is built here so deployment and
//! execution agree on paths and quoting.
//!
//! 探针二进制文件在节点上的位置，以及用于安装和调用它们的确切 shell 命令。

use crate::infra::fs::{DIALER_BINARY, LISTENER_BINARY};

/// The remote directory holding the probe binaries on every node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteLayout {
    dir: String,
}

impl RemoteLayout {
    /// `dir` is relative to the login directory unless absolute.
    pub fn new(dir: impl Into<String>) -> Self {
        let dir = dir.into();
        let trimmed = dir.trim_end_matches('/');
        Self {
            dir: if trimmed.is_empty() { dir } else { trimmed.to_string() },
        }
    }

    pub fn dir(&self) -> &str {
        &self.dir
    }

    pub fn listener_path(&self) -> String {
        format!("{}/{LISTENER_BINARY}", self.dir)
    }

    pub fn dialer_path(&self) -> String {
        format!("{}/{DIALER_BINARY}", self.dir)
    }

    /// `mkdir -p <dir>`
    pub fn setup_command(&self) -> String {
        format!("mkdir -p {}", quote(&self.dir))
    }

    /// `chmod +x` on both binaries.
    pub fn chmod_command(&self) -> String {
        format!(
            "chmod +x {} {}",
            quote(&self.listener_path()),
            quote(&self.dialer_path())
        )
    }

    /// Starts a detached listener on `port` that quits after `timeout_secs`.
    pub fn listener_command(&self, port: u16, timeout_secs: u64) -> String {
        format!(
            "{} --port {port} --timeout {timeout_secs}",
            quote(&self.listener_path())
        )
    }

    /// Dials `host:port` with a connect/reply bound of `timeout_secs`.
    pub fn dialer_command(&self, host: &str, port: u16, timeout_secs: u64) -> String {
        format!(
            "{} --host {} --port {port} --timeout {timeout_secs}",
            quote(&self.dialer_path()),
            quote(host)
        )
    }
}

/// Quotes `value` for a POSIX shell. Strings containing NUL cannot be quoted
/// and are passed through; the remote shell then rejects them.
fn quote(value: &str) -> String {
    shlex::try_quote(value)
        .map(|quoted| quoted.into_owned())
        .unwrap_or_else(|_| value.to_string())
}

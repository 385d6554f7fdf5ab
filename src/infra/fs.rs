//! # File System Helpers / 文件系统辅助模块
//!
//! Locating the local probe binaries that get uploaded to every node, and
//! expanding operator-supplied paths such as `~/.ssh/id_rsa`.
//!
//! 定位要上传到每个节点的本地探针二进制文件，以及展开操作员提供的路径，例如 `~/.ssh/id_rsa`。

use anyhow::{Context, Result, bail};
use std::path::{Path, PathBuf};

pub const LISTENER_BINARY: &str = "probe-listener";
pub const DIALER_BINARY: &str = "probe-dialer";

/// The two local files the deployment phase uploads.
/// 部署阶段上传的两个本地文件。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeArtifacts {
    pub listener: PathBuf,
    pub dialer: PathBuf,
}

impl ProbeArtifacts {
    /// Artifacts in `dir`, checked for existence.
    pub fn in_dir(dir: &Path) -> Result<Self> {
        let artifacts = Self {
            listener: dir.join(binary_name(LISTENER_BINARY)),
            dialer: dir.join(binary_name(DIALER_BINARY)),
        };
        for path in [&artifacts.listener, &artifacts.dialer] {
            if !path.is_file() {
                bail!(
                    "probe binary {} not found; build it or point --probe-dir at it",
                    path.display()
                );
            }
        }
        Ok(artifacts)
    }

    /// Artifacts from `dir` when given, otherwise from the directory holding the
    /// running executable, where cargo places all of this crate's binaries.
    ///
    /// The probes run on the nodes, so they must be built for the nodes'
    /// platform, not necessarily the operator's.
    pub fn locate(dir: Option<&Path>) -> Result<Self> {
        match dir {
            Some(dir) => Self::in_dir(&expand_path(dir)?),
            None => {
                let exe = std::env::current_exe().context("Failed to locate the running executable")?;
                let dir = exe
                    .parent()
                    .context("Running executable has no parent directory")?;
                Self::in_dir(dir)
            }
        }
    }
}

fn binary_name(stem: &str) -> String {
    format!("{stem}{}", std::env::consts::EXE_SUFFIX)
}

/// Expands `~` and environment variables in a path.
/// 展开路径中的 `~` 和环境变量。
pub fn expand_path(path: &Path) -> Result<PathBuf> {
    let raw = path.to_string_lossy();
    let expanded = shellexpand::full(&raw)
        .with_context(|| format!("Failed to expand path: {raw}"))?;
    Ok(PathBuf::from(expanded.as_ref()))
}

/// `~/.ssh/known_hosts`, expanded.
pub fn default_known_hosts() -> PathBuf {
    PathBuf::from(shellexpand::tilde("~/.ssh/known_hosts").as_ref())
}

/// `~/.ssh/id_rsa`, expanded.
pub fn default_private_key() -> PathBuf {
    PathBuf::from(shellexpand::tilde("~/.ssh/id_rsa").as_ref())
}

//! # Inventory Configuration Module / 清单配置模块
//!
//! Loads and validates the inventory file (TOML), which lists the cluster nodes
//! and an optional `[settings]` table. Settings resolve in three layers:
//! built-in defaults, then the inventory file, then command-line overrides.
//!
//! 加载并验证清单文件（TOML），其中列出集群节点和可选的 `[settings]` 表。
//! 设置分三层解析：内置默认值、清单文件、命令行覆盖。

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::Path;
use std::time::Duration;

use crate::core::error::ConfigError;
use crate::core::models::{Node, Role};

/// Run-wide settings. Every field has a default so the table may be omitted.
/// 全局运行设置。每个字段都有默认值，因此可以省略该表。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Directory on each node, relative to the login directory unless absolute,
    /// that receives the probe binaries.
    /// 每个节点上接收探针二进制文件的目录，除非是绝对路径，否则相对于登录目录。
    pub remote_dir: String,
    /// Maximum number of node or pair tasks in flight at once.
    /// 同时进行的节点或节点对任务的最大数量。
    pub jobs: usize,
    /// Pause between a listener reporting ready and the dialer starting.
    /// 监听器报告就绪与拨号器启动之间的暂停。
    pub settle_delay_ms: u64,
    /// Hard lifetime of a remote listener.
    pub listener_timeout_secs: u64,
    /// Connect and read timeout of a remote dialer.
    pub dial_timeout_secs: u64,
    /// Upper bound on any single remote command.
    /// 任何单个远程命令的上限。
    pub step_timeout_secs: u64,
    /// Upper bound on establishing an SSH session.
    pub connect_timeout_secs: u64,
    /// Abort the run when any node fails to deploy instead of skipping it.
    /// 当任何节点部署失败时中止运行，而不是跳过它。
    pub fail_fast: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            remote_dir: ".porttest".to_string(),
            jobs: 32,
            settle_delay_ms: 1000,
            listener_timeout_secs: 10,
            dial_timeout_secs: 5,
            step_timeout_secs: 60,
            connect_timeout_secs: 15,
            fail_fast: false,
        }
    }
}

impl Settings {
    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }

    pub fn listener_timeout(&self) -> Duration {
        Duration::from_secs(self.listener_timeout_secs)
    }

    pub fn dial_timeout(&self) -> Duration {
        Duration::from_secs(self.dial_timeout_secs)
    }

    pub fn step_timeout(&self) -> Duration {
        Duration::from_secs(self.step_timeout_secs)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    /// Checks the settings for values that would make the run meaningless.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.jobs == 0 {
            return Err(ConfigError::InvalidSetting {
                key: "jobs",
                reason: "must be at least 1".to_string(),
            });
        }
        if self.remote_dir.trim().is_empty() {
            return Err(ConfigError::InvalidSetting {
                key: "remote_dir",
                reason: "must not be empty".to_string(),
            });
        }
        if self.listener_timeout_secs == 0 {
            return Err(ConfigError::InvalidSetting {
                key: "listener_timeout_secs",
                reason: "must be at least 1".to_string(),
            });
        }
        if self.dial_timeout_secs == 0 {
            return Err(ConfigError::InvalidSetting {
                key: "dial_timeout_secs",
                reason: "must be at least 1".to_string(),
            });
        }
        // A listener that expires during the settle delay can never be reached.
        if self.settle_delay() >= self.listener_timeout() {
            return Err(ConfigError::InvalidSetting {
                key: "settle_delay_ms",
                reason: format!(
                    "must be shorter than listener_timeout_secs ({}s)",
                    self.listener_timeout_secs
                ),
            });
        }
        Ok(())
    }
}

/// Represents the entire inventory, loaded from a TOML file.
/// 代表从 TOML 文件加载的整个清单。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Inventory {
    #[serde(default)]
    pub settings: Settings,
    /// Nodes in declaration order. Legacy files call this list `servers`.
    /// 按声明顺序排列的节点。旧文件将此列表称为 `servers`。
    #[serde(alias = "servers")]
    pub nodes: Vec<Node>,
}

impl Inventory {
    /// Validates the structural invariants: at least one node, unique
    /// non-empty names and non-empty addresses.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.nodes.is_empty() {
            return Err(ConfigError::Empty);
        }

        let mut seen = HashSet::new();
        for (index, node) in self.nodes.iter().enumerate() {
            if node.name.trim().is_empty() {
                return Err(ConfigError::MissingName(index));
            }
            if node.address.trim().is_empty() {
                return Err(ConfigError::MissingAddress(node.name.clone()));
            }
            if !seen.insert(node.name.as_str()) {
                return Err(ConfigError::DuplicateName(node.name.clone()));
            }
        }

        self.settings.validate()
    }

    pub fn node(&self, name: &str) -> Option<&Node> {
        self.nodes.iter().find(|node| node.name == name)
    }
}

/// Parses an inventory from TOML text and validates it.
pub fn parse_inventory(content: &str, path: &Path) -> Result<Inventory, ConfigError> {
    let inventory: Inventory = toml::from_str(content).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })?;
    inventory.validate()?;
    Ok(inventory)
}

/// Loads an inventory file from disk and validates it.
/// 从磁盘加载清单文件并进行验证。
pub fn load_inventory(path: &Path) -> Result<Inventory, ConfigError> {
    let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    parse_inventory(&content, path)
}

/// The inventory written by `porttest init`: one node carrying most roles and
/// a dedicated database node.
/// `porttest init` 写入的清单：一个承担大部分角色的节点和一个专用数据库节点。
pub fn sample_inventory() -> Inventory {
    Inventory {
        settings: Settings::default(),
        nodes: vec![
            Node::new("server1", "192.168.1.100")
                .with_role(Role::Application)
                .with_role(Role::MessageBroker)
                .with_role(Role::Search)
                .with_role(Role::ReplicationPrimary),
            Node::new("server2", "192.168.1.101").with_role(Role::Database),
        ],
    }
}

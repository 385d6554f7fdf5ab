//! # Data Models Module / 数据模型模块
//!
//! This module defines the core data structures used throughout porttest:
//! inventory nodes and their role flags, and the per-port test results.
//!
//! 此模块定义了整个 porttest 中使用的核心数据结构：
//! 清单节点及其角色标志，以及每个端口的测试结果。

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::core::planner::PortSpec;

/// A capability tag on a node. The combination of tags on a pair of nodes
/// decides which ports have to be reachable between them.
/// 节点上的能力标签。一对节点上的标签组合决定了它们之间必须可达的端口。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Application,
    MessageBroker,
    Search,
    Database,
    ReplicationPrimary,
}

impl Role {
    /// All roles, in the order they are listed in reports.
    pub const ALL: [Role; 5] = [
        Role::Application,
        Role::MessageBroker,
        Role::Search,
        Role::Database,
        Role::ReplicationPrimary,
    ];
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Role::Application => "application",
            Role::MessageBroker => "message broker",
            Role::Search => "search",
            Role::Database => "database",
            Role::ReplicationPrimary => "replication primary",
        };
        f.write_str(label)
    }
}

/// The set of role flags carried by a node. A node may hold any combination.
///
/// The legacy key names (`appnode`, `rabbitnode`, ...) are accepted as aliases
/// so that older inventory files keep loading.
///
/// 节点携带的角色标志集合。一个节点可以持有任意组合。
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Roles {
    #[serde(default, alias = "appnode")]
    pub application: bool,
    #[serde(default, alias = "rabbitnode")]
    pub message_broker: bool,
    #[serde(default, alias = "elasticnode")]
    pub search: bool,
    #[serde(default, alias = "databasenode")]
    pub database: bool,
    #[serde(default, alias = "perconanode")]
    pub replication_primary: bool,
}

impl Roles {
    /// Builds a role set from a list of roles.
    pub fn of(roles: &[Role]) -> Self {
        roles.iter().fold(Self::default(), |set, role| set.with(*role))
    }

    /// Returns a copy of this set with `role` enabled.
    pub fn with(mut self, role: Role) -> Self {
        *self.flag_mut(role) = true;
        self
    }

    pub fn has(&self, role: Role) -> bool {
        match role {
            Role::Application => self.application,
            Role::MessageBroker => self.message_broker,
            Role::Search => self.search,
            Role::Database => self.database,
            Role::ReplicationPrimary => self.replication_primary,
        }
    }

    /// Iterates over the enabled roles.
    pub fn iter(&self) -> impl Iterator<Item = Role> + use<> {
        let roles = *self;
        Role::ALL.into_iter().filter(move |role| roles.has(*role))
    }

    pub fn is_empty(&self) -> bool {
        self.iter().next().is_none()
    }

    fn flag_mut(&mut self, role: Role) -> &mut bool {
        match role {
            Role::Application => &mut self.application,
            Role::MessageBroker => &mut self.message_broker,
            Role::Search => &mut self.search,
            Role::Database => &mut self.database,
            Role::ReplicationPrimary => &mut self.replication_primary,
        }
    }
}

fn default_ssh_port() -> u16 {
    22
}

/// Represents a single cluster member declared in the inventory.
/// Nodes are immutable once loaded; the rest of the run only borrows them.
///
/// 代表清单中声明的单个集群成员。
/// 节点加载后不可变；运行的其余部分只借用它们。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Node {
    /// The unique name of the node, used as its key everywhere.
    /// 节点的唯一名称，在所有地方用作其键。
    pub name: String,
    /// The address probes dial and SSH connects to.
    /// 探针拨号和 SSH 连接的地址。
    #[serde(alias = "ip")]
    pub address: String,
    /// Role flags driving which ports get tested.
    /// 决定测试哪些端口的角色标志。
    #[serde(flatten)]
    pub roles: Roles,
    /// Optional SSH login overriding the run-wide user.
    /// 覆盖全局用户的可选 SSH 登录名。
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,
    /// SSH port, 22 unless stated otherwise.
    #[serde(default = "default_ssh_port")]
    pub ssh_port: u16,
}

impl Node {
    /// Creates a node with no roles on the default SSH port.
    pub fn new(name: impl Into<String>, address: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            address: address.into(),
            roles: Roles::default(),
            user: None,
            ssh_port: default_ssh_port(),
        }
    }

    /// Adds a role to the node. Handy when building inventories in code.
    pub fn with_role(mut self, role: Role) -> Self {
        self.roles = self.roles.with(role);
        self
    }

    pub fn has(&self, role: Role) -> bool {
        self.roles.has(role)
    }
}

/// The outcome of a single port test.
/// 单个端口测试的结果。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Outcome {
    /// The dialer received the acknowledgement token.
    /// 拨号器收到了确认令牌。
    Success,
    /// The probe sequence failed; `detail` carries the underlying error text.
    /// 探针序列失败；`detail` 携带底层错误文本。
    Failure { detail: String },
    /// The test never ran, e.g. because one side could not be provisioned.
    /// 测试从未运行，例如因为一方无法完成部署。
    Skipped { reason: String },
}

impl Outcome {
    /// Builds a failure, substituting a placeholder when the detail is blank.
    pub fn failure(detail: impl Into<String>) -> Self {
        Outcome::Failure {
            detail: non_empty(detail.into(), "probe failed without reporting an error"),
        }
    }

    /// Builds a skip, substituting a placeholder when the reason is blank.
    pub fn skipped(reason: impl Into<String>) -> Self {
        Outcome::Skipped {
            reason: non_empty(reason.into(), "skipped without a recorded reason"),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Outcome::Success)
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, Outcome::Failure { .. })
    }

    pub fn is_skipped(&self) -> bool {
        matches!(self, Outcome::Skipped { .. })
    }

    /// Gets the status of the outcome as a short string for display.
    /// 以短字符串形式获取结果状态以供显示。
    pub fn status_str(&self) -> &'static str {
        match self {
            Outcome::Success => "Success",
            Outcome::Failure { .. } => "Failure",
            Outcome::Skipped { .. } => "Skipped",
        }
    }

    /// Gets the failure detail or skip reason; empty for successes.
    pub fn detail(&self) -> &str {
        match self {
            Outcome::Success => "",
            Outcome::Failure { detail } => detail,
            Outcome::Skipped { reason } => reason,
        }
    }
}

fn non_empty(text: String, fallback: &str) -> String {
    if text.trim().is_empty() {
        fallback.to_string()
    } else {
        text
    }
}

/// Represents the result of testing one port for one ordered pair of nodes.
/// Exactly one is produced for every (source, destination, port) that was
/// scheduled.
///
/// 表示对一个有序节点对的一个端口的测试结果。
/// 每个被调度的（源、目标、端口）恰好产生一个结果。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestResult {
    pub source: String,
    pub destination: String,
    pub port: u16,
    /// Human-readable path, e.g. `10.0.0.1 -> 10.0.0.2:3306`.
    /// 人类可读的路径，例如 `10.0.0.1 -> 10.0.0.2:3306`。
    pub path: String,
    /// The service label from the port rules, e.g. `App to DB`.
    /// 来自端口规则的服务标签，例如 `App to DB`。
    pub service: String,
    pub outcome: Outcome,
}

impl TestResult {
    pub fn new(source: &Node, destination: &Node, spec: &PortSpec, outcome: Outcome) -> Self {
        Self {
            source: source.name.clone(),
            destination: destination.name.clone(),
            port: spec.port,
            path: format!("{} -> {}:{}", source.address, destination.address, spec.port),
            service: spec.service.to_string(),
            outcome,
        }
    }

    pub fn is_success(&self) -> bool {
        self.outcome.is_success()
    }

    pub fn is_failure(&self) -> bool {
        self.outcome.is_failure()
    }
}

impl fmt::Display for TestResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} -> {} [{}] {}: {}",
            self.source,
            self.destination,
            self.path,
            self.service,
            self.outcome.status_str()
        )
    }
}

//! # Port Matrix Planner Module / 端口矩阵计划模块
//!
//! This module holds the role-based port rules and turns an inventory into an
//! execution plan: every ordered pair of distinct nodes together with the
//! ports that must be reachable from the first to the second.
//!
//! 此模块包含基于角色的端口规则，并将清单转换为执行计划：
//! 每个不同节点的有序对，以及从第一个节点到第二个节点必须可达的端口。

use crate::core::models::{Node, Role};

/// A port that must be reachable, with the service label it is reported under.
/// 一个必须可达的端口，以及报告时使用的服务标签。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PortSpec {
    pub port: u16,
    pub service: &'static str,
}

const fn spec(port: u16, service: &'static str) -> PortSpec {
    PortSpec { port, service }
}

const REPLICATION_INTRA: [PortSpec; 3] = [
    spec(4444, "Percona"),
    spec(4567, "Percona"),
    spec(4568, "Percona"),
];
const BROKER_INTRA: [PortSpec; 2] = [spec(4369, "RabbitMQ"), spec(25672, "RabbitMQ")];
const SEARCH_INTRA: [PortSpec; 1] = [spec(9300, "Elasticsearch")];
const APP_TO_DATABASE: [PortSpec; 1] = [spec(3306, "App to DB")];
const APP_TO_BROKER: [PortSpec; 4] = [
    spec(5672, "App to RabbitMQ"),
    spec(5671, "App to RabbitMQ"),
    spec(61613, "App to RabbitMQ"),
    spec(61614, "App to RabbitMQ"),
];
const APP_TO_SEARCH: [PortSpec; 1] = [spec(9200, "App to Elasticsearch")];

/// Returns the ports that must be reachable from `source` to `destination`.
///
/// The rules form a priority-ordered decision table; the first matching rule
/// wins and categories are never merged, so a node carrying several roles only
/// gets the ports of the highest-priority match:
///
/// 1. both replication primaries → intra-replication ports
/// 2. both message brokers → intra-broker ports
/// 3. both search nodes → intra-search port
/// 4. application source → database, then broker, then search destination
/// 5. otherwise nothing
///
/// 返回从 `source` 到 `destination` 必须可达的端口。
/// 规则构成一个按优先级排序的决策表；第一个匹配的规则生效，类别从不合并。
pub fn ports_for(source: &Node, destination: &Node) -> Vec<PortSpec> {
    let both = |role: Role| source.has(role) && destination.has(role);

    let ports: &[PortSpec] = if both(Role::ReplicationPrimary) {
        &REPLICATION_INTRA
    } else if both(Role::MessageBroker) {
        &BROKER_INTRA
    } else if both(Role::Search) {
        &SEARCH_INTRA
    } else if source.has(Role::Application) {
        if destination.has(Role::Database) {
            &APP_TO_DATABASE
        } else if destination.has(Role::MessageBroker) {
            &APP_TO_BROKER
        } else if destination.has(Role::Search) {
            &APP_TO_SEARCH
        } else {
            &[]
        }
    } else {
        &[]
    };

    ports.to_vec()
}

/// One unit of work for the executor: an ordered pair and its port list.
/// 执行器的一个工作单元：一个有序对及其端口列表。
#[derive(Debug, Clone)]
pub struct PairPlan {
    pub source: Node,
    pub destination: Node,
    pub ports: Vec<PortSpec>,
}

/// Represents a complete execution plan for the test matrix.
/// 表示测试矩阵的完整执行计划。
#[derive(Debug, Clone)]
pub struct ExecutionPlan {
    /// Pairs with at least one port to test, in inventory order.
    /// 至少有一个端口需要测试的节点对，按清单顺序排列。
    pub pairs: Vec<PairPlan>,
    /// Number of ordered pairs considered, always N×(N−1).
    /// 考虑的有序对数量，始终为 N×(N−1)。
    pub pairs_considered: usize,
    /// Pairs for which no rule matched.
    /// 没有规则匹配的节点对。
    pub pairs_without_rules: usize,
}

impl ExecutionPlan {
    /// Total number of port tests the plan will produce results for.
    pub fn total_tests(&self) -> usize {
        self.pairs.iter().map(|pair| pair.ports.len()).sum()
    }
}

/// Creates an execution plan for the given nodes.
/// Every ordered pair of distinct nodes is evaluated independently, so
/// (A, B) and (B, A) are both considered.
///
/// 为给定节点创建执行计划。每个不同节点的有序对都被独立评估，
/// 因此 (A, B) 和 (B, A) 都会被考虑。
pub fn plan_matrix(nodes: &[Node]) -> ExecutionPlan {
    let mut pairs = Vec::new();
    let mut pairs_considered = 0;
    let mut pairs_without_rules = 0;

    for source in nodes {
        for destination in nodes {
            if source.name == destination.name {
                continue;
            }
            pairs_considered += 1;

            let ports = ports_for(source, destination);
            if ports.is_empty() {
                pairs_without_rules += 1;
                continue;
            }
            pairs.push(PairPlan {
                source: source.clone(),
                destination: destination.clone(),
                ports,
            });
        }
    }

    ExecutionPlan {
        pairs,
        pairs_considered,
        pairs_without_rules,
    }
}

//! # Deployment Coordinator / 部署协调器
//!
//! Provisions the probe binaries onto every node before any test runs. Each
//! node is handled by its own task: connect, create the remote directory,
//! upload both probes and mark them executable. The coordinator waits for all
//! of them and then applies the failure policy in one place:
//!
//! - authentication and host-trust failures abort the run;
//! - with `fail_fast`, any other failure aborts the run as well;
//! - otherwise the node is marked unavailable and its pairs are reported as
//!   skipped, since results between the remaining nodes stay valid.
//!
//! 在任何测试运行之前将探针二进制文件部署到每个节点。每个节点由其自己的任务处理：
//! 连接、创建远程目录、上传两个探针并将其标记为可执行。协调器等待所有任务完成，
//! 然后在一个地方应用失败策略。

use colored::*;
use futures::{StreamExt, stream};
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::core::config::Settings;
use crate::core::error::RunError;
use crate::core::layout::RemoteLayout;
use crate::core::models::Node;
use crate::infra::fs::ProbeArtifacts;
use crate::infra::gateway::{Connector, GatewayError, RemoteSession, bounded};

/// Deployment state of one node after the join barrier.
#[derive(Debug)]
pub enum NodeState<S> {
    /// Probes installed; the session is ready for test commands.
    Ready(Arc<S>),
    /// Deployment failed; pairs touching this node are skipped with this reason.
    Unavailable(String),
}

impl<S> Clone for NodeState<S> {
    fn clone(&self) -> Self {
        match self {
            NodeState::Ready(session) => NodeState::Ready(Arc::clone(session)),
            NodeState::Unavailable(reason) => NodeState::Unavailable(reason.clone()),
        }
    }
}

/// Node-indexed table of sessions, built once by the coordinator and shared
/// read-only with the executor.
///
/// 以节点为索引的会话表，由协调器构建一次，并以只读方式与执行器共享。
#[derive(Debug)]
pub struct SessionTable<S> {
    nodes: BTreeMap<String, NodeState<S>>,
}

impl<S> Default for SessionTable<S> {
    fn default() -> Self {
        Self {
            nodes: BTreeMap::new(),
        }
    }
}

impl<S> SessionTable<S> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, node: impl Into<String>, state: NodeState<S>) {
        self.nodes.insert(node.into(), state);
    }

    pub fn state(&self, node: &str) -> Option<&NodeState<S>> {
        self.nodes.get(node)
    }

    /// The session for `node`, or the reason it cannot be used.
    pub fn session(&self, node: &str) -> Result<&Arc<S>, String> {
        match self.nodes.get(node) {
            Some(NodeState::Ready(session)) => Ok(session),
            Some(NodeState::Unavailable(reason)) => Err(format!("node `{node}` unavailable: {reason}")),
            None => Err(format!("node `{node}` was never deployed")),
        }
    }

    pub fn ready_count(&self) -> usize {
        self.nodes
            .values()
            .filter(|state| matches!(state, NodeState::Ready(_)))
            .count()
    }

    /// Names and reasons of nodes that could not be provisioned.
    pub fn unavailable(&self) -> impl Iterator<Item = (&str, &str)> {
        self.nodes.iter().filter_map(|(name, state)| match state {
            NodeState::Unavailable(reason) => Some((name.as_str(), reason.as_str())),
            NodeState::Ready(_) => None,
        })
    }
}

/// Installs the probes on every node concurrently, at most `settings.jobs`
/// at a time, and applies the failure policy once all tasks have finished.
///
/// # Arguments / 参数
/// * `connector` - Opens the per-node sessions
///                 打开每个节点的会话
/// * `nodes` - The inventory nodes, in declaration order
///             按声明顺序排列的清单节点
/// * `artifacts` - Local probe binaries to upload
///                 要上传的本地探针二进制文件
/// * `layout` - Remote directory and command builder
///              远程目录和命令构建器
/// * `settings` - Concurrency limit, step timeout and fail-fast flag
///                并发限制、步骤超时和快速失败标志
/// * `stop` - Cancelled on Ctrl-C; abandons the deployment
///            在 Ctrl-C 时取消；放弃部署
///
/// # Returns / 返回值
/// The session table, or the first fatal error in inventory order.
/// 会话表，或按清单顺序的第一个致命错误。
pub async fn deploy_all<C>(
    connector: Arc<C>,
    nodes: &[Node],
    artifacts: &ProbeArtifacts,
    layout: &RemoteLayout,
    settings: &Settings,
    stop: &CancellationToken,
) -> Result<SessionTable<C::Session>, RunError>
where
    C: Connector + 'static,
{
    println!(
        "{}",
        format!("Deploying probes to {} node(s)...", nodes.len()).blue()
    );

    let artifacts = Arc::new(artifacts.clone());
    let step_timeout = settings.step_timeout();

    let deployments = stream::iter(nodes.iter().cloned().enumerate().map(|(index, node)| {
        let connector = Arc::clone(&connector);
        let artifacts = Arc::clone(&artifacts);
        let layout = layout.clone();

        async move {
            let name = node.name.clone();
            let handle = tokio::spawn(async move {
                deploy_node(connector.as_ref(), &node, &artifacts, &layout, step_timeout).await
            });
            let outcome = match handle.await {
                Ok(result) => result,
                Err(e) => Err(GatewayError::Session(format!("deployment task failed: {e}"))),
            };
            (index, name, outcome)
        }
    }))
    .buffer_unordered(settings.jobs)
    .collect::<Vec<_>>();

    let mut outcomes = tokio::select! {
        biased;
        _ = stop.cancelled() => return Err(RunError::Interrupted),
        outcomes = deployments => outcomes,
    };

    // Decide in inventory order so the reported error does not depend on timing.
    outcomes.sort_by_key(|(index, _, _)| *index);

    if let Some((_, node, error)) = outcomes
        .iter()
        .find_map(|(i, name, outcome)| outcome.as_ref().err().filter(|e| e.is_fatal()).map(|e| (i, name, e)))
    {
        return Err(escalate(node, error));
    }

    let mut table = SessionTable::new();
    for (_, name, outcome) in outcomes {
        match outcome {
            Ok(session) => {
                println!("  {} {}", "✓".green(), name);
                table.insert(name, NodeState::Ready(Arc::new(session)));
            }
            Err(e) if settings.fail_fast => {
                return Err(RunError::Deployment {
                    node: name,
                    detail: e.to_string(),
                });
            }
            Err(e) => {
                println!("  {} {}: {}", "✗".red(), name, e.to_string().red());
                warn!("node {name} will be skipped: {e}");
                table.insert(name, NodeState::Unavailable(e.to_string()));
            }
        }
    }

    Ok(table)
}

fn escalate(node: &str, error: &GatewayError) -> RunError {
    let node = node.to_string();
    match error {
        GatewayError::HostTrust(detail) => RunError::HostTrust {
            node,
            detail: detail.clone(),
        },
        other => RunError::Authentication {
            node,
            detail: other.to_string(),
        },
    }
}

async fn deploy_node<C: Connector>(
    connector: &C,
    node: &Node,
    artifacts: &ProbeArtifacts,
    layout: &RemoteLayout,
    step_timeout: std::time::Duration,
) -> Result<C::Session, GatewayError> {
    let session = bounded(step_timeout, "connect", connector.connect(node)).await?;
    debug!("connected to {}", node.name);

    let setup = layout.setup_command();
    bounded(step_timeout, &setup, session.run(&setup)).await?;

    let uploads = [
        (&artifacts.listener, layout.listener_path()),
        (&artifacts.dialer, layout.dialer_path()),
    ];
    for (local, remote) in uploads {
        let label = format!("upload {remote}");
        bounded(step_timeout, &label, session.upload(local, &remote)).await?;
    }

    let chmod = layout.chmod_command();
    bounded(step_timeout, &chmod, session.run(&chmod)).await?;
    debug!("probes installed on {}", node.name);

    Ok(session)
}

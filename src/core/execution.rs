//! # Test Matrix Executor Module / 测试矩阵执行模块
//!
//! Runs the planned matrix. Every ordered pair is one task; pairs run in
//! parallel under the `jobs` limit while the ports of a pair are tested strictly
//! one after another. A single port test is:
//!
//! 1. start a listener on the destination (returns once it is bound),
//! 2. wait the settle delay,
//! 3. run the dialer on the source against the destination's address,
//! 4. record exactly one result.
//!
//! 运行计划好的矩阵。每个有序对是一个任务；节点对在 `jobs` 限制下并行运行，
//! 而一个节点对的端口严格依次测试。

use colored::*;
use futures::{StreamExt, stream};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::core::config::Settings;
use crate::core::deployment::SessionTable;
use crate::core::layout::RemoteLayout;
use crate::core::models::{Outcome, TestResult};
use crate::core::planner::{ExecutionPlan, PairPlan};
use crate::core::results::{Report, ResultAccumulator};
use crate::infra::gateway::{GatewayError, RemoteSession, bounded};

/// Reason recorded for ports that never ran because the run was cancelled.
pub const INTERRUPTED: &str = "run interrupted";

/// Executes every pair of `plan` and returns the sorted report.
///
/// Every port the plan lists yields exactly one result: pairs touching an
/// unavailable node are recorded as skipped, ports left over after `stop` is
/// cancelled are recorded as interrupted, and ports of a task that died are
/// recorded as failures.
///
/// # Arguments / 参数
/// * `plan` - The pairs and ports to test
///            要测试的节点对和端口
/// * `sessions` - Session table produced by the deployment phase
///                部署阶段生成的会话表
/// * `layout` - Builds the remote probe commands
///              构建远程探针命令
/// * `settings` - Concurrency limit and probe timings
///                并发限制和探针时序
/// * `stop` - Cancelled on Ctrl-C
///            在 Ctrl-C 时取消
pub async fn execute_matrix<S>(
    plan: &ExecutionPlan,
    sessions: Arc<SessionTable<S>>,
    layout: &RemoteLayout,
    settings: &Settings,
    stop: CancellationToken,
) -> Report
where
    S: RemoteSession + 'static,
{
    println!(
        "{}",
        format!(
            "Testing {} port(s) across {} pair(s)...",
            plan.total_tests(),
            plan.pairs.len()
        )
        .blue()
    );

    let results = Arc::new(ResultAccumulator::new());
    let settings = Arc::new(settings.clone());

    let joined = stream::iter(plan.pairs.iter().cloned().map(|pair| {
        let sessions = Arc::clone(&sessions);
        let results = Arc::clone(&results);
        let settings = Arc::clone(&settings);
        let layout = layout.clone();
        let stop = stop.clone();

        async move {
            let task_pair = pair.clone();
            let handle = tokio::spawn(async move {
                run_pair(&task_pair, &sessions, &layout, &settings, &results, &stop).await
            });
            (pair, handle.await)
        }
    }))
    .buffer_unordered(settings.jobs)
    .collect::<Vec<_>>()
    .await;

    for (pair, outcome) in joined {
        if let Err(e) = outcome {
            for spec in &pair.ports {
                if !results.contains(&pair.source.name, &pair.destination.name, spec.port) {
                    results.push(TestResult::new(
                        &pair.source,
                        &pair.destination,
                        spec,
                        Outcome::failure(format!("test task failed: {e}")),
                    ));
                }
            }
        }
    }

    results.report()
}

async fn run_pair<S: RemoteSession>(
    pair: &PairPlan,
    sessions: &SessionTable<S>,
    layout: &RemoteLayout,
    settings: &Settings,
    results: &ResultAccumulator,
    stop: &CancellationToken,
) {
    let (source, destination) = match (
        sessions.session(&pair.source.name),
        sessions.session(&pair.destination.name),
    ) {
        (Ok(source), Ok(destination)) => (source, destination),
        (Err(reason), _) | (_, Err(reason)) => {
            for spec in &pair.ports {
                results.push(TestResult::new(
                    &pair.source,
                    &pair.destination,
                    spec,
                    Outcome::skipped(reason.clone()),
                ));
            }
            println!(
                "  {} {} -> {}: {}",
                "-".yellow(),
                pair.source.name,
                pair.destination.name,
                "skipped".yellow()
            );
            return;
        }
    };

    let mut succeeded = 0;
    for spec in &pair.ports {
        let outcome = tokio::select! {
            biased;
            _ = stop.cancelled() => Outcome::skipped(INTERRUPTED),
            outcome = probe_port(
                source.as_ref(),
                destination.as_ref(),
                &pair.destination.address,
                spec.port,
                layout,
                settings,
            ) => outcome,
        };
        if outcome.is_success() {
            succeeded += 1;
        }
        debug!(
            "{} -> {}:{} {}",
            pair.source.name,
            pair.destination.name,
            spec.port,
            outcome.status_str()
        );
        results.push(TestResult::new(&pair.source, &pair.destination, spec, outcome));
    }

    let total = pair.ports.len();
    let tally = format!("{succeeded}/{total} open");
    let (mark, tally) = if succeeded == total {
        ("✓".green(), tally.green())
    } else {
        ("✗".red(), tally.red())
    };
    println!(
        "  {} {} -> {}: {}",
        mark, pair.source.name, pair.destination.name, tally
    );
}

/// Listener on `destination`, settle delay, dialer on `source`.
async fn probe_port<S: RemoteSession>(
    source: &S,
    destination: &S,
    destination_address: &str,
    port: u16,
    layout: &RemoteLayout,
    settings: &Settings,
) -> Outcome {
    let listen = layout.listener_command(port, settings.listener_timeout_secs);
    let listener_error = bounded(settings.step_timeout(), &listen, destination.run(&listen))
        .await
        .err();
    match &listener_error {
        Some(e) => debug!("listener on {destination_address}:{port} did not start: {e}"),
        None => tokio::time::sleep(settings.settle_delay()).await,
    }

    // The dialer still runs when the listener failed: its connection error is
    // the detail an operator needs.
    let dial = layout.dialer_command(destination_address, port, settings.dial_timeout_secs);
    match bounded(settings.step_timeout(), &dial, source.run(&dial)).await {
        Ok(_) => Outcome::Success,
        Err(e) => {
            let mut detail = failure_detail(&e);
            if let Some(listener_error) = listener_error {
                detail.push_str("\nListener: ");
                detail.push_str(&failure_detail(&listener_error));
            }
            Outcome::failure(detail)
        }
    }
}

fn failure_detail(error: &GatewayError) -> String {
    match error {
        GatewayError::CommandFailed { status, output, .. } => {
            format!("Output: {output} Error: exit status {status}")
        }
        other => format!("Error: {other}"),
    }
}

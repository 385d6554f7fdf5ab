//! # Test Matrix Execution Integration Tests / 测试矩阵执行集成测试
//!
//! Runs the executor against the in-process fake gateway, whose probes are real
//! loopback listeners and dialers.
//!
//! 针对进程内伪网关运行执行器，其探针是真实的回环监听器和拨号器。

mod common;

use common::{Behaviour, FakeConnector, fast_settings, node};
use porttest::config::Settings;
use porttest::core::deployment::{NodeState, SessionTable};
use porttest::core::execution::{INTERRUPTED, execute_matrix};
use porttest::core::layout::RemoteLayout;
use porttest::models::{Outcome, Role};
use porttest::planner::{plan_matrix, ports_for};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;

fn layout() -> RemoteLayout {
    RemoteLayout::new(".porttest")
}

/// An application node and a database node with working probes yield exactly
/// one successful "App to DB" result.
///
/// 具有正常探针的应用节点和数据库节点恰好产生一个成功的 "App to DB" 结果。
#[tokio::test]
async fn test_app_to_database_single_success() {
    let nodes = vec![
        node("app1", "10.0.0.1", &[Role::Application]),
        node("db1", "10.0.0.2", &[Role::Database]),
    ];
    let connector = FakeConnector::new();
    let plan = plan_matrix(&nodes);

    let report = execute_matrix(
        &plan,
        Arc::new(connector.ready_table(&nodes)),
        &layout(),
        &fast_settings(),
        CancellationToken::new(),
    )
    .await;

    assert_eq!(report.results.len(), 1);
    let result = &report.results[0];
    assert_eq!(result.source, "app1");
    assert_eq!(result.destination, "db1");
    assert_eq!(result.port, 3306);
    assert_eq!(result.service, "App to DB");
    assert_eq!(result.path, "10.0.0.1 -> 10.0.0.2:3306");
    assert_eq!(result.outcome, Outcome::Success);

    // Listener on the destination first, then the dialer on the source.
    assert_eq!(
        connector.actions_for("db1"),
        vec![".porttest/probe-listener --port 3306 --timeout 5"]
    );
    assert_eq!(
        connector.actions_for("app1"),
        vec![".porttest/probe-dialer --host 10.0.0.2 --port 3306 --timeout 2"]
    );
}

/// A listener that never starts produces a failure carrying the dialer's
/// connection error, while other pairs still succeed.
///
/// 从未启动的监听器产生携带拨号器连接错误的失败，而其他节点对仍然成功。
#[tokio::test]
async fn test_listener_bind_failure_is_local_to_its_pair() {
    let nodes = vec![
        node("app1", "10.0.0.1", &[Role::Application]),
        node("db1", "10.0.0.2", &[Role::Database]),
        node("mq1", "10.0.0.3", &[Role::MessageBroker]),
    ];
    let connector = FakeConnector::new().with("db1", Behaviour::BindFailure);
    let plan = plan_matrix(&nodes);

    let report = execute_matrix(
        &plan,
        Arc::new(connector.ready_table(&nodes)),
        &layout(),
        &fast_settings(),
        CancellationToken::new(),
    )
    .await;

    assert_eq!(report.results.len(), 5);

    let db = report
        .results
        .iter()
        .find(|r| r.destination == "db1")
        .unwrap();
    match &db.outcome {
        Outcome::Failure { detail } => {
            assert!(detail.contains("error connecting to"), "detail: {detail}");
            assert!(detail.contains("Address already in use"), "detail: {detail}");
        }
        other => panic!("expected a failure, got {other:?}"),
    }

    let broker: Vec<_> = report
        .results
        .iter()
        .filter(|r| r.destination == "mq1")
        .collect();
    assert_eq!(broker.len(), 4);
    assert!(broker.iter().all(|r| r.is_success()));
    assert_eq!(report.summary.failed, 1);
    assert_eq!(report.summary.succeeded, 4);
}

/// For N nodes, N×(N−1) ordered pairs are considered and the number of results
/// equals the sum of the port lists over all pairs.
///
/// 对于 N 个节点，考虑 N×(N−1) 个有序对，结果数量等于所有节点对端口列表长度之和。
#[tokio::test]
async fn test_result_count_matches_port_rules() {
    let nodes = vec![
        node("app1", "10.0.0.1", &[Role::Application]),
        node("app2", "10.0.0.2", &[Role::Application, Role::Search]),
        node("db1", "10.0.0.3", &[Role::Database, Role::ReplicationPrimary]),
        node("db2", "10.0.0.4", &[Role::Database, Role::ReplicationPrimary]),
        node("mq1", "10.0.0.5", &[Role::MessageBroker, Role::Search]),
    ];
    let connector = FakeConnector::new();
    let plan = plan_matrix(&nodes);

    let expected: usize = nodes
        .iter()
        .flat_map(|a| nodes.iter().map(move |b| (a, b)))
        .filter(|(a, b)| a.name != b.name)
        .map(|(a, b)| ports_for(a, b).len())
        .sum();
    assert_eq!(plan.pairs_considered, 5 * 4);

    let report = execute_matrix(
        &plan,
        Arc::new(connector.ready_table(&nodes)),
        &layout(),
        &fast_settings(),
        CancellationToken::new(),
    )
    .await;

    assert_eq!(report.results.len(), expected);
    assert_eq!(report.results.len(), plan.total_tests());
    assert!(report.all_succeeded(), "{:?}", report.results);

    // Sorted by source name.
    let sources: Vec<_> = report.results.iter().map(|r| r.source.clone()).collect();
    let mut sorted = sources.clone();
    sorted.sort();
    assert_eq!(sources, sorted);

    // Every (source, destination, port) appears once.
    let mut triples: Vec<_> = report
        .results
        .iter()
        .map(|r| (r.source.clone(), r.destination.clone(), r.port))
        .collect();
    triples.sort();
    triples.dedup();
    assert_eq!(triples.len(), expected);
}

/// Pairs touching a node that could not be provisioned are skipped with the
/// deployment error as reason.
///
/// 涉及无法部署的节点的节点对被跳过，原因为部署错误。
#[tokio::test]
async fn test_unavailable_node_pairs_are_skipped() {
    let nodes = vec![
        node("app1", "10.0.0.1", &[Role::Application]),
        node("db1", "10.0.0.2", &[Role::Database]),
        node("es1", "10.0.0.3", &[Role::Search]),
    ];
    let connector = FakeConnector::new();
    let mut table: SessionTable<_> = connector.ready_table(&nodes);
    table.insert("db1", NodeState::Unavailable("no space left on device".to_string()));
    let plan = plan_matrix(&nodes);

    let report = execute_matrix(
        &plan,
        Arc::new(table),
        &layout(),
        &fast_settings(),
        CancellationToken::new(),
    )
    .await;

    assert_eq!(report.results.len(), 2);
    let db = report.results.iter().find(|r| r.destination == "db1").unwrap();
    assert!(db.outcome.is_skipped());
    assert!(db.outcome.detail().contains("db1"));
    assert!(db.outcome.detail().contains("no space left on device"));

    let es = report.results.iter().find(|r| r.destination == "es1").unwrap();
    assert!(es.is_success());
    assert!(connector.actions_for("db1").is_empty());
}

/// Cancelling before the run records every planned port as interrupted.
///
/// 在运行前取消会将每个计划的端口记录为已中断。
#[tokio::test]
async fn test_cancelled_run_records_every_port() {
    let nodes = vec![
        node("app1", "10.0.0.1", &[Role::Application]),
        node("mq1", "10.0.0.2", &[Role::MessageBroker]),
    ];
    let connector = FakeConnector::new();
    let plan = plan_matrix(&nodes);
    let stop = CancellationToken::new();
    stop.cancel();

    let report = execute_matrix(
        &plan,
        Arc::new(connector.ready_table(&nodes)),
        &layout(),
        &fast_settings(),
        stop,
    )
    .await;

    assert_eq!(report.results.len(), 4);
    assert!(
        report
            .results
            .iter()
            .all(|r| r.outcome == Outcome::skipped(INTERRUPTED))
    );
    assert_eq!(report.summary.skipped, 4);
}

/// Dialers from one source run side by side: peers that accept but never
/// answer do not delay the dial to an open peer past its listener's lifetime.
///
/// 同一源节点的拨号器并行运行：接受连接但从不应答的对端不会让对开放对端的拨号
/// 延迟到其监听器寿命之后。
#[tokio::test]
async fn test_slow_peers_do_not_delay_other_dials() {
    let nodes = vec![
        node("app1", "10.0.0.1", &[Role::Application]),
        node("db1", "10.0.0.2", &[Role::Database]),
        node("db2", "10.0.0.3", &[Role::Database]),
        node("db3", "10.0.0.4", &[Role::Database]),
        node("open", "10.0.0.5", &[Role::Database]),
    ];
    let connector = FakeConnector::new()
        .with("db1", Behaviour::Silent)
        .with("db2", Behaviour::Silent)
        .with("db3", Behaviour::Silent);
    let settings = Settings {
        settle_delay_ms: 200,
        listener_timeout_secs: 2,
        dial_timeout_secs: 1,
        ..fast_settings()
    };
    let plan = plan_matrix(&nodes);

    let report = execute_matrix(
        &plan,
        Arc::new(connector.ready_table(&nodes)),
        &layout(),
        &settings,
        CancellationToken::new(),
    )
    .await;

    assert_eq!(report.results.len(), 4);
    let open = report.results.iter().find(|r| r.destination == "open").unwrap();
    assert_eq!(open.outcome, Outcome::Success, "{:?}", open.outcome);
    assert_eq!(report.summary.failed, 3);
}

/// A pair task that dies mid-run keeps what it recorded; its remaining ports
/// are reported as failures.
///
/// 运行中途终止的节点对任务保留已记录的结果；其余端口报告为失败。
#[tokio::test]
async fn test_crashed_pair_task_records_remaining_ports() {
    let nodes = vec![
        node("mq1", "10.0.0.1", &[Role::MessageBroker]),
        node("mq2", "10.0.0.2", &[Role::MessageBroker]),
    ];
    let connector = FakeConnector::new().with("mq1", Behaviour::PanicOnDial(2));
    let plan = plan_matrix(&nodes);

    let report = execute_matrix(
        &plan,
        Arc::new(connector.ready_table(&nodes)),
        &layout(),
        &fast_settings(),
        CancellationToken::new(),
    )
    .await;

    assert_eq!(report.results.len(), 4);

    let crashed: Vec<_> = report.results.iter().filter(|r| r.source == "mq1").collect();
    assert_eq!(crashed.len(), 2);
    assert_eq!(crashed[0].port, 4369);
    assert_eq!(crashed[0].outcome, Outcome::Success);
    assert_eq!(crashed[1].port, 25672);
    match &crashed[1].outcome {
        Outcome::Failure { detail } => assert!(detail.contains("test task failed"), "{detail}"),
        other => panic!("expected a failure, got {other:?}"),
    }

    assert!(
        report
            .results
            .iter()
            .filter(|r| r.source == "mq2")
            .all(|r| r.is_success())
    );
}

/// Cancelling while a port is in flight drops that test and skips the rest of
/// the pair, keeping the results already recorded.
///
/// 在端口测试进行中取消会丢弃该探测并跳过节点对的其余端口，保留已记录的结果。
#[tokio::test]
async fn test_interrupt_mid_pair_records_each_port_once() {
    let nodes = vec![
        node("app1", "10.0.0.1", &[Role::Application]),
        node("mq1", "10.0.0.2", &[Role::MessageBroker]),
    ];
    let stop = CancellationToken::new();
    let connector = FakeConnector::new().interrupt_on_dial(stop.clone(), 2);
    let plan = plan_matrix(&nodes);

    let started = Instant::now();
    let report = execute_matrix(
        &plan,
        Arc::new(connector.ready_table(&nodes)),
        &layout(),
        &fast_settings(),
        stop,
    )
    .await;
    assert!(started.elapsed() < Duration::from_secs(5));

    assert_eq!(report.results.len(), 4);
    let ports: Vec<_> = report.results.iter().map(|r| r.port).collect();
    assert_eq!(ports, vec![5672, 5671, 61613, 61614]);

    let mut triples: Vec<_> = report
        .results
        .iter()
        .map(|r| (r.source.clone(), r.destination.clone(), r.port))
        .collect();
    triples.sort();
    triples.dedup();
    assert_eq!(triples.len(), 4);

    assert_eq!(report.results[0].outcome, Outcome::Success);
    assert!(
        report.results[1..]
            .iter()
            .all(|r| r.outcome == Outcome::skipped(INTERRUPTED))
    );
    assert_eq!(report.summary.skipped, 3);
}

/*
 * Copyright (c) 2025 Dylan Storey
 * Licensed under the Elastic License 2.0.
 * See LICENSE file in the project root for full license text.
 */

use crate::fixtures::{cluster_key, registered_backend, servers, Behavior, FakeAgentRepository};
use keel_models::models::clusters::Server;
use keel_operator::rpc::status::{
    collect_agent_status, collect_agent_status_with_timeouts, AgentState, AgentStatus,
    StatusTimeouts, VERSION_UNSUPPORTED,
};
use keel_operator::rpc::RpcError;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

fn find<'a>(statuses: &'a [AgentStatus], hostname: &str) -> &'a AgentStatus {
    statuses
        .iter()
        .find(|status| status.hostname == hostname)
        .unwrap_or_else(|| panic!("no status for {}", hostname))
}

#[tokio::test(start_paused = true)]
async fn test_mixed_fleet() {
    let agents = Arc::new(
        FakeAgentRepository::new()
            .with_agent("10.0.0.1", Behavior::Healthy("7.1.0"))
            .with_agent("10.0.0.2", Behavior::Unsupported)
            .with_agent("10.0.0.3", Behavior::QueryHang),
    );
    let started = Instant::now();

    let list = collect_agent_status(&CancellationToken::new(), &servers(), agents.clone()).await;

    assert_eq!(list.len(), 3);
    assert!(!list.agents_active());
    // Bounded by dial plus request timeout, not their sum per server
    assert!(started.elapsed() <= Duration::from_secs(10));

    let statuses = list.statuses();
    let healthy = find(statuses, "node-1");
    assert_eq!(healthy.status, AgentState::Deployed);
    assert_eq!(healthy.version.as_deref(), Some("7.1.0"));
    assert!(healthy.error.is_none());

    let legacy = find(statuses, "node-2");
    assert_eq!(legacy.status, AgentState::Deployed);
    assert_eq!(legacy.version.as_deref(), Some(VERSION_UNSUPPORTED));

    let hung = find(statuses, "node-3");
    assert_eq!(hung.status, AgentState::Offline);
    assert_eq!(hung.version, None);
    assert_eq!(hung.error, Some(RpcError::Timeout(Duration::from_secs(5))));

    // Every obtained client is closed, the hung one included
    assert_eq!(agents.closed(), 3);
}

#[tokio::test(start_paused = true)]
async fn test_healthy_dial_timeout_and_not_implemented() {
    let agents = Arc::new(
        FakeAgentRepository::new()
            .with_agent("10.0.0.1", Behavior::Healthy("2.1.0"))
            .with_agent("10.0.0.2", Behavior::DialHang)
            .with_agent("10.0.0.3", Behavior::Unsupported),
    );

    let list = collect_agent_status(&CancellationToken::new(), &servers(), agents.clone()).await;

    assert_eq!(list.len(), 3);
    assert!(!list.agents_active());
    let statuses = list.statuses();

    let healthy = find(statuses, "node-1");
    assert_eq!(healthy.status, AgentState::Deployed);
    assert_eq!(healthy.version.as_deref(), Some("2.1.0"));
    assert!(healthy.error.is_none());

    let unreachable = find(statuses, "node-2");
    assert_eq!(unreachable.status, AgentState::Offline);
    assert_eq!(unreachable.version, None);
    assert_eq!(
        unreachable.error,
        Some(RpcError::Timeout(Duration::from_secs(5)))
    );

    let legacy = find(statuses, "node-3");
    assert_eq!(legacy.status, AgentState::Deployed);
    assert_eq!(legacy.version.as_deref(), Some(VERSION_UNSUPPORTED));
    assert!(legacy.error.is_none());

    assert_eq!(agents.closed(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_hanging_release_does_not_block_collection() {
    let agents = Arc::new(
        FakeAgentRepository::new()
            .with_agent("10.0.0.1", Behavior::CloseHang("2.1.0"))
            .with_agent("10.0.0.2", Behavior::Healthy("2.1.0"))
            .with_agent("10.0.0.3", Behavior::Healthy("2.1.0")),
    );
    let started = Instant::now();

    let list = tokio::time::timeout(
        Duration::from_secs(3600),
        collect_agent_status(&CancellationToken::new(), &servers(), agents.clone()),
    )
    .await
    .expect("collection waited on a release that never finishes");

    assert!(started.elapsed() <= Duration::from_secs(10));
    assert_eq!(list.len(), 3);
    assert!(list.agents_active());
    let stuck = find(list.statuses(), "node-1");
    assert_eq!(stuck.status, AgentState::Deployed);
    assert_eq!(stuck.version.as_deref(), Some("2.1.0"));
    assert_eq!(agents.closed(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_dial_failures_are_offline() {
    let agents = Arc::new(
        FakeAgentRepository::new()
            .with_agent("10.0.0.1", Behavior::DialHang)
            .with_agent("10.0.0.2", Behavior::DialError)
            .with_agent("10.0.0.3", Behavior::QueryError),
    );
    let timeouts = StatusTimeouts {
        dial: Duration::from_secs(2),
        request: Duration::from_secs(3),
    };

    let list = collect_agent_status_with_timeouts(
        &CancellationToken::new(),
        &servers(),
        agents.clone(),
        timeouts,
    )
    .await;

    let statuses = list.statuses();
    assert!(statuses.iter().all(|s| s.status == AgentState::Offline));
    assert_eq!(
        find(statuses, "node-1").error,
        Some(RpcError::Timeout(Duration::from_secs(2)))
    );
    assert!(matches!(
        find(statuses, "node-2").error,
        Some(RpcError::Unavailable(_))
    ));
    assert!(matches!(
        find(statuses, "node-3").error,
        Some(RpcError::Transport(_))
    ));
    // Only the third agent was dialed successfully
    assert_eq!(agents.closed(), 1);
}

#[tokio::test]
async fn test_all_healthy() {
    let agents = Arc::new(
        FakeAgentRepository::new()
            .with_agent("10.0.0.1", Behavior::Healthy("7.1.0"))
            .with_agent("10.0.0.2", Behavior::Healthy("7.1.0"))
            .with_agent("10.0.0.3", Behavior::Unsupported),
    );

    let list = collect_agent_status(&CancellationToken::new(), &servers(), agents).await;

    assert_eq!(list.len(), 3);
    assert!(list.agents_active());
    let table = list.to_string();
    assert!(table.starts_with("Hostname"));
    assert_eq!(table.lines().count(), 4);
}

#[tokio::test]
async fn test_empty_server_list() {
    let list = collect_agent_status(
        &CancellationToken::new(),
        &[],
        Arc::new(FakeAgentRepository::new()),
    )
    .await;
    assert!(list.is_empty());
    assert!(list.agents_active());
}

#[tokio::test(start_paused = true)]
async fn test_cancellation_reports_every_server() {
    let agents = Arc::new(
        FakeAgentRepository::new()
            .with_agent("10.0.0.1", Behavior::DialHang)
            .with_agent("10.0.0.2", Behavior::QueryHang)
            .with_agent("10.0.0.3", Behavior::QueryHang),
    );
    let cancel = CancellationToken::new();
    let canceler = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_secs(1)).await;
        canceler.cancel();
    });

    let list = collect_agent_status(&cancel, &servers(), agents.clone()).await;

    assert_eq!(list.len(), 3);
    for status in list.statuses() {
        assert_eq!(status.status, AgentState::Offline);
        assert_eq!(status.error, Some(RpcError::Canceled));
    }
    assert_eq!(agents.closed(), 2);
}

#[tokio::test]
async fn test_crashed_query_is_reported_aborted() {
    let agents = Arc::new(
        FakeAgentRepository::new()
            .with_agent("10.0.0.1", Behavior::Healthy("7.1.0"))
            .with_agent("10.0.0.2", Behavior::Panic),
    );
    let servers = vec![
        Server::new("node-1", "10.0.0.1"),
        Server::new("node-2", "10.0.0.2"),
    ];

    let list = collect_agent_status(&CancellationToken::new(), &servers, agents).await;

    assert_eq!(list.len(), 2);
    assert_eq!(find(list.statuses(), "node-1").status, AgentState::Deployed);
    let crashed = find(list.statuses(), "node-2");
    assert_eq!(crashed.status, AgentState::Offline);
    assert_eq!(crashed.error, Some(RpcError::Aborted));
}

#[tokio::test]
async fn test_operator_collects_cluster_servers() {
    let agents = Arc::new(
        FakeAgentRepository::new()
            .with_agent("10.0.0.1", Behavior::Healthy("7.1.0"))
            .with_agent("10.0.0.2", Behavior::Healthy("7.1.0")),
    );
    let backend = registered_backend(agents).await;

    let list = backend
        .operator
        .collect_agent_status(&CancellationToken::new(), &cluster_key())
        .await
        .expect("Failed to collect agent status");

    assert_eq!(list.len(), 3);
    assert!(!list.agents_active());
    assert_eq!(find(list.statuses(), "node-3").status, AgentState::Offline);
}

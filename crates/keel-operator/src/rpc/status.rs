/*
 * Copyright (c) 2025 Dylan Storey
 * Licensed under the Elastic License 2.0.
 * See LICENSE file in the project root for full license text.
 */

//! # Agent Status Broadcaster
//!
//! Queries every server's agent concurrently and gathers exactly one
//! [`AgentStatus`] per server.
//!
//! Each server gets its own task. A task first obtains a client under the dial
//! timeout, then queries the version under the request timeout; the two budgets
//! are independent. Both phases also end early when the caller's
//! [`CancellationToken`] fires. The client is closed on every path once it has
//! been obtained.
//!
//! | Outcome | Status | Version |
//! |---|---|---|
//! | version reported | `Deployed` | reported version |
//! | version query not implemented | `Deployed` | `N/A` |
//! | dial failure, timeout, cancellation, transport error | `Offline` | unset |
//!
//! Collection never fails as a whole. Failures are kept on the entry for
//! diagnostics. The gatherer does not watch the token itself: it waits for all
//! tasks, which are bounded by their timeouts.

use crate::metrics;
use crate::rpc::{AgentRepository, RpcError, VersionQuery};
use keel_models::models::clusters::Server;
use keel_utils::config::Agent;
use keel_utils::logging::prelude::*;
use serde::{Serialize, Serializer};
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// Version shown for agents without the version query.
pub const VERSION_UNSUPPORTED: &str = "N/A";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum AgentState {
    Deployed,
    Offline,
}

impl AgentState {
    pub fn as_str(&self) -> &'static str {
        match self {
            AgentState::Deployed => "Deployed",
            AgentState::Offline => "Offline",
        }
    }
}

impl fmt::Display for AgentState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Status of a single agent.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AgentStatus {
    pub hostname: String,
    pub address: String,
    pub status: AgentState,
    pub version: Option<String>,
    /// Why the query failed, kept for diagnostics
    #[serde(serialize_with = "serialize_error", skip_serializing_if = "Option::is_none")]
    pub error: Option<RpcError>,
}

fn serialize_error<S: Serializer>(error: &Option<RpcError>, s: S) -> Result<S::Ok, S::Error> {
    match error {
        Some(error) => s.serialize_str(&error.to_string()),
        None => s.serialize_none(),
    }
}

impl AgentStatus {
    fn offline(server: &Server, error: RpcError) -> Self {
        Self {
            hostname: server.hostname.clone(),
            address: server.advertise_ip.clone(),
            status: AgentState::Offline,
            version: None,
            error: Some(error),
        }
    }

    fn from_query(server: &Server, query: VersionQuery) -> Self {
        match query {
            VersionQuery::Reported(version) => Self {
                hostname: server.hostname.clone(),
                address: server.advertise_ip.clone(),
                status: AgentState::Deployed,
                version: Some(version.version),
                error: None,
            },
            VersionQuery::Unsupported => Self {
                hostname: server.hostname.clone(),
                address: server.advertise_ip.clone(),
                status: AgentState::Deployed,
                version: Some(VERSION_UNSUPPORTED.to_string()),
                error: None,
            },
            VersionQuery::Failed(error) => Self::offline(server, error),
        }
    }
}

/// Statuses in the order the queries completed.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct StatusList(Vec<AgentStatus>);

impl StatusList {
    pub fn new(statuses: Vec<AgentStatus>) -> Self {
        Self(statuses)
    }

    /// True when no agent is offline. An empty list is active.
    pub fn agents_active(&self) -> bool {
        self.0
            .iter()
            .all(|status| status.status != AgentState::Offline)
    }

    pub fn statuses(&self) -> &[AgentStatus] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn into_inner(self) -> Vec<AgentStatus> {
        self.0
    }
}

impl fmt::Display for StatusList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rows = self
            .0
            .iter()
            .map(|status| {
                if let Some(error) = &status.error {
                    debug!(
                        "Failed to collect agent status on {}: {}",
                        status.address, error
                    );
                }
                vec![
                    status.hostname.clone(),
                    status.address.clone(),
                    status.status.to_string(),
                    status.version.clone().unwrap_or_default(),
                ]
            })
            .collect::<Vec<_>>();
        f.write_str(&render_table(
            &["Hostname", "Address", "Status", "Version"],
            &rows,
        ))
    }
}

fn render_table(headers: &[&str], rows: &[Vec<String>]) -> String {
    let mut widths = headers
        .iter()
        .map(|h| h.chars().count())
        .collect::<Vec<_>>();
    for row in rows {
        for (idx, cell) in row.iter().enumerate() {
            if let Some(width) = widths.get_mut(idx) {
                *width = (*width).max(cell.chars().count());
            }
        }
    }

    let mut lines = Vec::with_capacity(rows.len() + 1);
    lines.push(format_row(headers, &widths));
    for row in rows {
        let cells = row.iter().map(|c| c.as_str()).collect::<Vec<_>>();
        lines.push(format_row(&cells, &widths));
    }

    lines.join("\n")
}

fn format_row(cells: &[&str], widths: &[usize]) -> String {
    cells
        .iter()
        .enumerate()
        .map(|(idx, cell)| format!("{:<width$}", cell, width = widths[idx]))
        .collect::<Vec<_>>()
        .join("  ")
        .trim_end()
        .to_string()
}

/// Per-phase time budgets of a status query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusTimeouts {
    pub dial: Duration,
    pub request: Duration,
}

impl Default for StatusTimeouts {
    fn default() -> Self {
        Self {
            dial: Duration::from_secs(5),
            request: Duration::from_secs(5),
        }
    }
}

impl From<&Agent> for StatusTimeouts {
    fn from(settings: &Agent) -> Self {
        Self {
            dial: settings.dial_timeout(),
            request: settings.request_timeout(),
        }
    }
}

/// Collects the status of every server's agent with the default timeouts.
pub async fn collect_agent_status(
    cancel: &CancellationToken,
    servers: &[Server],
    agents: Arc<dyn AgentRepository>,
) -> StatusList {
    collect_agent_status_with_timeouts(cancel, servers, agents, StatusTimeouts::default()).await
}

/// Collects the status of every server's agent.
///
/// Returns one entry per server, in completion order.
pub async fn collect_agent_status_with_timeouts(
    cancel: &CancellationToken,
    servers: &[Server],
    agents: Arc<dyn AgentRepository>,
    timeouts: StatusTimeouts,
) -> StatusList {
    if servers.is_empty() {
        return StatusList::default();
    }
    let started = Instant::now();

    let (tx, mut rx) = mpsc::channel(servers.len());
    for (index, server) in servers.iter().cloned().enumerate() {
        let tx = tx.clone();
        let agents = agents.clone();
        let cancel = cancel.clone();
        tokio::spawn(async move {
            let query = query_version(&cancel, &server.advertise_ip, agents.as_ref(), timeouts).await;
            // Capacity equals the server count, so this never waits
            let _ = tx
                .send((index, AgentStatus::from_query(&server, query)))
                .await;
        });
    }
    drop(tx);

    let mut reported = vec![false; servers.len()];
    let mut statuses = Vec::with_capacity(servers.len());
    while statuses.len() < servers.len() {
        match rx.recv().await {
            Some((index, status)) => {
                reported[index] = true;
                statuses.push(status);
            }
            // Every sender is gone: some task ended without reporting
            None => break,
        }
    }
    for (index, _) in reported.iter().enumerate().filter(|(_, done)| !**done) {
        warn!(
            "Status query for {} ended without a result",
            servers[index].advertise_ip
        );
        statuses.push(AgentStatus::offline(&servers[index], RpcError::Aborted));
    }

    for status in &statuses {
        metrics::agent_status_total()
            .with_label_values(&[status.status.as_str()])
            .inc();
    }
    metrics::agent_status_collection_duration_seconds().observe(started.elapsed().as_secs_f64());

    let list = StatusList::new(statuses);
    info!(
        "Collected status of {} agents, all active: {}",
        list.len(),
        list.agents_active()
    );
    list
}

async fn query_version(
    cancel: &CancellationToken,
    address: &str,
    agents: &dyn AgentRepository,
    timeouts: StatusTimeouts,
) -> VersionQuery {
    let client = match bounded(cancel, timeouts.dial, agents.get_client(address)).await {
        Ok(Ok(client)) => client,
        Ok(Err(error)) | Err(error) => return VersionQuery::Failed(error),
    };

    let query = bounded(cancel, timeouts.request, client.get_version())
        .await
        .unwrap_or_else(VersionQuery::Failed);
    // Release still runs after cancellation, within the request timeout
    if tokio::time::timeout(timeouts.request, client.close())
        .await
        .is_err()
    {
        warn!(
            "Abandoned release of agent client for {} after {:?}",
            address, timeouts.request
        );
    }
    query
}

/// Runs `fut` until it completes, `limit` elapses or `cancel` fires.
async fn bounded<F: Future>(
    cancel: &CancellationToken,
    limit: Duration,
    fut: F,
) -> Result<F::Output, RpcError> {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(RpcError::Canceled),
        result = tokio::time::timeout(limit, fut) => result.map_err(|_| RpcError::Timeout(limit)),
    }
}

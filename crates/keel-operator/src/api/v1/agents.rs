/*
 * Copyright (c) 2025 Dylan Storey
 * Licensed under the Elastic License 2.0.
 * See LICENSE file in the project root for full license text.
 */

//! Agent fleet status endpoint.

use super::ClusterPath;
use crate::error::Result;
use crate::ops::Operator;
use crate::rpc::status::StatusList;
use axum::extract::{Path, Query, State};
use axum::http::header;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use keel_models::models::clusters::ClusterKey;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

pub fn routes() -> Router<Operator> {
    Router::new().route(
        "/clusters/:account_id/:cluster_name/agents/status",
        get(get_agent_status),
    )
}

#[derive(Debug, Default, Deserialize)]
struct StatusQuery {
    /// `table` renders the status table as plain text
    format: Option<String>,
}

#[derive(Debug, Serialize)]
struct AgentStatusResponse {
    agents_active: bool,
    agents: StatusList,
}

async fn get_agent_status(
    State(operator): State<Operator>,
    Path(path): Path<ClusterPath>,
    Query(query): Query<StatusQuery>,
) -> Result<Response> {
    let key = ClusterKey::from(path);
    // A client hanging up drops this future, canceling the in-flight queries
    let cancel = CancellationToken::new();
    let _guard = cancel.clone().drop_guard();

    let statuses = operator.collect_agent_status(&cancel, &key).await?;
    if query.format.as_deref() == Some("table") {
        return Ok((
            [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
            statuses.to_string(),
        )
            .into_response());
    }
    Ok(Json(AgentStatusResponse {
        agents_active: statuses.agents_active(),
        agents: statuses,
    })
    .into_response())
}

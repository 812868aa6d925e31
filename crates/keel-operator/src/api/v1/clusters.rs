/*
 * Copyright (c) 2025 Dylan Storey
 * Licensed under the Elastic License 2.0.
 * See LICENSE file in the project root for full license text.
 */

//! Cluster registration and configuration endpoints.
//!
//! Configuration documents travel as YAML in both directions.

use super::ClusterPath;
use crate::error::Result;
use crate::ops::{Operator, RegisterClusterRequest, UpdateClusterConfigRequest};
use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use keel_models::models::clusters::ClusterKey;
use keel_utils::logging::prelude::*;

const YAML_CONTENT_TYPE: &str = "application/yaml";

pub fn routes() -> Router<Operator> {
    Router::new()
        .route("/clusters", post(register_cluster))
        .route(
            "/clusters/:account_id/:cluster_name/configuration",
            get(get_configuration).put(update_configuration),
        )
        .route(
            "/clusters/:account_id/:cluster_name/service-configuration",
            post(update_service_configuration),
        )
}

async fn register_cluster(
    State(operator): State<Operator>,
    Json(req): Json<RegisterClusterRequest>,
) -> Result<impl IntoResponse> {
    info!(
        "Handling registration of cluster {}/{}",
        req.account_id, req.cluster_name
    );
    let cluster = operator.register_cluster(req).await?;
    Ok((StatusCode::CREATED, Json(cluster)))
}

async fn get_configuration(
    State(operator): State<Operator>,
    Path(path): Path<ClusterPath>,
) -> Result<impl IntoResponse> {
    let key = ClusterKey::from(path);
    let config = operator.get_cluster_configuration(&key).await?;
    Ok((
        [(header::CONTENT_TYPE, YAML_CONTENT_TYPE)],
        config.marshal()?,
    ))
}

async fn update_configuration(
    State(operator): State<Operator>,
    Path(path): Path<ClusterPath>,
    body: Bytes,
) -> Result<StatusCode> {
    let req = UpdateClusterConfigRequest {
        cluster_key: path.into(),
        config: body.to_vec(),
    };
    info!("Handling configuration update of cluster {}", req.cluster_key);
    operator.update_cluster_configuration(req).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn update_service_configuration(
    State(operator): State<Operator>,
    Path(path): Path<ClusterPath>,
) -> Result<StatusCode> {
    let key = ClusterKey::from(path);
    operator.update_service_configuration(&key).await?;
    Ok(StatusCode::NO_CONTENT)
}

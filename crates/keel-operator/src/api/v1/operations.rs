/*
 * Copyright (c) 2025 Dylan Storey
 * Licensed under the Elastic License 2.0.
 * See LICENSE file in the project root for full license text.
 */

//! Operation ledger endpoints.

use super::{ClusterPath, USER_HEADER};
use crate::error::{Error, Result};
use crate::ops::{CreateUpdateConfigOperationRequest, Operator, RequestContext};
use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use keel_models::models::clusters::ClusterKey;
use keel_models::models::operations::{OperationKey, OperationState, UpdateConfigOperation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub fn routes() -> Router<Operator> {
    Router::new()
        .route(
            "/clusters/:account_id/:cluster_name/operations",
            get(list_operations),
        )
        .route(
            "/clusters/:account_id/:cluster_name/operations/update-config",
            post(create_update_config_operation),
        )
        .route(
            "/clusters/:account_id/:cluster_name/operations/:operation_id",
            get(get_operation),
        )
}

/// An operation with its configuration documents rendered as text.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OperationView {
    pub id: Uuid,
    pub account_id: String,
    pub cluster_name: String,
    pub operation_type: String,
    pub created_at: DateTime<Utc>,
    pub created_by: String,
    pub updated_at: DateTime<Utc>,
    pub state: OperationState,
    pub prev_config: String,
    pub config: String,
}

impl From<UpdateConfigOperation> for OperationView {
    fn from(op: UpdateConfigOperation) -> Self {
        OperationView {
            id: op.id,
            account_id: op.account_id,
            cluster_name: op.cluster_name,
            operation_type: op.operation_type,
            created_at: op.created_at,
            created_by: op.created_by,
            updated_at: op.updated_at,
            state: op.state,
            prev_config: String::from_utf8_lossy(&op.prev_config).into_owned(),
            config: String::from_utf8_lossy(&op.config).into_owned(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct OperationPath {
    account_id: String,
    cluster_name: String,
    operation_id: String,
}

impl TryFrom<OperationPath> for OperationKey {
    type Error = Error;

    fn try_from(path: OperationPath) -> Result<Self> {
        let operation_id = Uuid::parse_str(&path.operation_id).map_err(|_| {
            Error::Validation(format!("invalid operation ID: {}", path.operation_id))
        })?;
        Ok(OperationKey {
            account_id: path.account_id,
            cluster_name: path.cluster_name,
            operation_id,
        })
    }
}

fn request_context(headers: &HeaderMap) -> RequestContext {
    RequestContext::new(
        headers
            .get(USER_HEADER)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string),
    )
}

async fn create_update_config_operation(
    State(operator): State<Operator>,
    Path(path): Path<ClusterPath>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<impl IntoResponse> {
    let ctx = request_context(&headers);
    let req = CreateUpdateConfigOperationRequest {
        cluster_key: path.into(),
        config: body.to_vec(),
    };
    let key = operator.create_update_config_operation(&ctx, req).await?;
    Ok((StatusCode::CREATED, Json(key)))
}

async fn get_operation(
    State(operator): State<Operator>,
    Path(path): Path<OperationPath>,
) -> Result<Json<OperationView>> {
    let key = OperationKey::try_from(path)?;
    let operation = operator.get_operation(&key).await?;
    Ok(Json(operation.into()))
}

async fn list_operations(
    State(operator): State<Operator>,
    Path(path): Path<ClusterPath>,
) -> Result<Json<Vec<OperationView>>> {
    let key = ClusterKey::from(path);
    let operations = operator.list_operations(&key).await?;
    Ok(Json(operations.into_iter().map(OperationView::from).collect()))
}

/*
 * Copyright (c) 2025 Dylan Storey
 * Licensed under the Elastic License 2.0.
 * See LICENSE file in the project root for full license text.
 */

//! Version 1 of the operator API.
//!
//! Every route below is relative to `/api/v1`. Errors are answered with the
//! status code of their kind and a `{"error": "..."}` body.

mod agents;
mod clusters;
mod operations;

use crate::ops::Operator;
use axum::Router;
use keel_models::models::clusters::ClusterKey;
use serde::Deserialize;

/// Header naming the user on whose behalf a request is made
pub const USER_HEADER: &str = "x-keel-user";

pub fn routes() -> Router<Operator> {
    Router::new()
        .merge(clusters::routes())
        .merge(operations::routes())
        .merge(agents::routes())
}

/// Path segments naming a cluster.
#[derive(Debug, Deserialize)]
pub(crate) struct ClusterPath {
    account_id: String,
    cluster_name: String,
}

impl From<ClusterPath> for ClusterKey {
    fn from(path: ClusterPath) -> Self {
        ClusterKey::new(path.account_id, path.cluster_name)
    }
}

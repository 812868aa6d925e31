/*
 * Copyright (c) 2025 Dylan Storey
 * Licensed under the Elastic License 2.0.
 * See LICENSE file in the project root for full license text.
 */

//! # API Routes Aggregator Module
//!
//! Builds the operator's HTTP router: probes and metrics at the root, the
//! versioned API under `/api/v1`.

pub mod v1;

use crate::metrics;
use crate::ops::Operator;
use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::Router;
use keel_utils::logging::prelude::*;
use tower_http::trace::TraceLayer;

/// Configures the main router with every API route.
pub fn configure_api_routes(operator: Operator) -> Router {
    Router::new()
        .nest("/api/v1", v1::routes())
        .route("/healthz", get(healthz))
        .route("/metrics", get(metrics_handler))
        .layer(TraceLayer::new_for_http())
        .with_state(operator)
}

/// Health check endpoint handler
async fn healthz() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}

/// Prometheus exposition of the operator's metrics
async fn metrics_handler() -> impl IntoResponse {
    match metrics::encode_metrics() {
        Ok(body) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            body,
        )
            .into_response(),
        Err(e) => {
            error!("Failed to encode metrics: {}", e);
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

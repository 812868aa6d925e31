/*
 * Copyright (c) 2025 Dylan Storey
 * Licensed under the Elastic License 2.0.
 * See LICENSE file in the project root for full license text.
 */

use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use keel_operator::rpc::http::HttpAgentRepository;
use keel_operator::rpc::{AgentRepository, RpcError, Version, VersionQuery};

/// Serves `app` on an ephemeral local port and returns the port.
async fn spawn_agent(app: Router) -> u16 {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    port
}

#[tokio::test]
async fn test_reported_version() {
    let app = Router::new()
        .route("/healthz", get(|| async { "OK" }))
        .route(
            "/version",
            get(|| async {
                Json(Version {
                    version: "7.1.0".to_string(),
                })
            }),
        );
    let repo = HttpAgentRepository::new(spawn_agent(app).await);

    let client = repo.get_client("127.0.0.1").await.unwrap();
    assert_eq!(
        client.get_version().await,
        VersionQuery::Reported(Version {
            version: "7.1.0".to_string()
        })
    );
    client.close().await;
}

#[tokio::test]
async fn test_missing_version_endpoint_is_unsupported() {
    let app = Router::new().route("/healthz", get(|| async { "OK" }));
    let repo = HttpAgentRepository::new(spawn_agent(app).await);

    let client = repo.get_client("127.0.0.1").await.unwrap();
    assert_eq!(client.get_version().await, VersionQuery::Unsupported);
}

#[tokio::test]
async fn test_not_implemented_is_unsupported() {
    let app = Router::new()
        .route("/healthz", get(|| async { "OK" }))
        .route("/version", get(|| async { StatusCode::NOT_IMPLEMENTED }));
    let repo = HttpAgentRepository::new(spawn_agent(app).await);

    let client = repo.get_client("127.0.0.1").await.unwrap();
    assert_eq!(client.get_version().await, VersionQuery::Unsupported);
}

#[tokio::test]
async fn test_server_error_is_a_failure() {
    let app = Router::new()
        .route("/healthz", get(|| async { "OK" }))
        .route("/version", get(|| async { StatusCode::INTERNAL_SERVER_ERROR }));
    let repo = HttpAgentRepository::new(spawn_agent(app).await);

    let client = repo.get_client("127.0.0.1").await.unwrap();
    assert!(matches!(
        client.get_version().await,
        VersionQuery::Failed(RpcError::Transport(_))
    ));
}

#[tokio::test]
async fn test_unhealthy_agent_is_unavailable() {
    let app = Router::new().route(
        "/healthz",
        get(|| async { StatusCode::SERVICE_UNAVAILABLE }),
    );
    let repo = HttpAgentRepository::new(spawn_agent(app).await);

    assert!(matches!(
        repo.get_client("127.0.0.1").await,
        Err(RpcError::Unavailable(_))
    ));
}

#[tokio::test]
async fn test_unreachable_agent_is_unavailable() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);

    let repo = HttpAgentRepository::new(port);
    assert!(matches!(
        repo.get_client("127.0.0.1").await,
        Err(RpcError::Unavailable(_))
    ));
}

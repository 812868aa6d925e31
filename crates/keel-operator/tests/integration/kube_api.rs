/*
 * Copyright (c) 2025 Dylan Storey
 * Licensed under the Elastic License 2.0.
 * See LICENSE file in the project root for full license text.
 */

use axum::body::Bytes;
use axum::extract::{Path, RawQuery, State};
use axum::http::StatusCode;
use axum::routing::{get, patch, post};
use axum::{Json, Router};
use keel_models::models::cluster_configuration::{ServicePort, ServiceType};
use keel_operator::k8s::{KubeConfigObjectStore, KubeServiceConfigurator};
use keel_operator::storage::{ConfigObject, ConfigObjectStore, RenderedService, ServiceConfigurator};
use kube::{Client, Config};
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

/// Minimal stand-in for the Kubernetes API: config maps are never found,
/// writes are echoed back with a fresh resource version.
#[derive(Clone, Default)]
struct FakeApi {
    requests: Arc<Mutex<Vec<String>>>,
}

impl FakeApi {
    fn record(&self, request: String) {
        self.requests.lock().unwrap().push(request);
    }

    fn requests(&self) -> Vec<String> {
        self.requests.lock().unwrap().clone()
    }
}

fn with_resource_version(body: &[u8], version: &str) -> Json<Value> {
    let mut object: Value = serde_json::from_slice(body).unwrap();
    object["metadata"]["resourceVersion"] = json!(version);
    Json(object)
}

async fn missing_config_map(
    State(api): State<FakeApi>,
    Path((namespace, name)): Path<(String, String)>,
) -> (StatusCode, Json<Value>) {
    api.record(format!("GET {}/{}", namespace, name));
    (
        StatusCode::NOT_FOUND,
        Json(json!({
            "kind": "Status",
            "apiVersion": "v1",
            "status": "Failure",
            "message": format!("configmaps \"{}\" not found", name),
            "reason": "NotFound",
            "code": 404,
        })),
    )
}

async fn create_config_map(
    State(api): State<FakeApi>,
    Path(namespace): Path<String>,
    body: Bytes,
) -> Json<Value> {
    api.record(format!("POST {}", namespace));
    with_resource_version(&body, "1")
}

async fn replace_config_map(
    State(api): State<FakeApi>,
    Path((namespace, name)): Path<(String, String)>,
    body: Bytes,
) -> Json<Value> {
    api.record(format!("PUT {}/{}", namespace, name));
    with_resource_version(&body, "2")
}

async fn apply_service(
    State(api): State<FakeApi>,
    Path((namespace, name)): Path<(String, String)>,
    RawQuery(query): RawQuery,
    body: Bytes,
) -> Json<Value> {
    api.record(format!(
        "PATCH {}/{}?{}",
        namespace,
        name,
        query.unwrap_or_default()
    ));
    with_resource_version(&body, "7")
}

/// Serves the fake API on an ephemeral local port and returns a client for it.
async fn spawn_api(api: FakeApi) -> Client {
    let app = Router::new()
        .route(
            "/api/v1/namespaces/:namespace/configmaps/:name",
            get(missing_config_map).put(replace_config_map),
        )
        .route(
            "/api/v1/namespaces/:namespace/configmaps",
            post(create_config_map),
        )
        .route(
            "/api/v1/namespaces/:namespace/services/:name",
            patch(apply_service),
        )
        .with_state(api);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    let config = Config::new(format!("http://127.0.0.1:{}", port).parse().unwrap());
    Client::try_from(config).unwrap()
}

#[tokio::test]
async fn test_missing_config_map_is_created() {
    let api = FakeApi::default();
    let store = KubeConfigObjectStore::new(spawn_api(api.clone()).await);

    let object = store
        .get_or_create("cluster-configuration", "kube-system")
        .await
        .unwrap();
    assert_eq!(object.name, "cluster-configuration");
    assert!(object.data.is_empty());
    assert_eq!(object.resource_version.as_deref(), Some("1"));
    assert_eq!(
        api.requests(),
        vec![
            "GET kube-system/cluster-configuration".to_string(),
            "POST kube-system".to_string(),
        ]
    );
}

#[tokio::test]
async fn test_config_map_update_replaces_object() {
    let api = FakeApi::default();
    let store = KubeConfigObjectStore::new(spawn_api(api.clone()).await);

    let mut object = ConfigObject::empty("cluster-configuration", "kube-system");
    object
        .data
        .insert("acme.prod".to_string(), "kind: ClusterConfiguration".to_string());
    object.resource_version = Some("1".to_string());

    let replaced = store.update(&object).await.unwrap();
    assert_eq!(replaced.data, object.data);
    assert_eq!(replaced.resource_version.as_deref(), Some("2"));
    assert_eq!(
        api.requests(),
        vec!["PUT kube-system/cluster-configuration".to_string()]
    );
}

#[tokio::test]
async fn test_service_is_applied_server_side() {
    let api = FakeApi::default();
    let configurator = KubeServiceConfigurator::new(spawn_api(api.clone()).await);

    let service = RenderedService {
        name: "keel-site".to_string(),
        namespace: "kube-system".to_string(),
        service_type: ServiceType::NodePort,
        annotations: BTreeMap::new(),
        ports: vec![ServicePort {
            name: "web".to_string(),
            port: 3009,
            node_port: Some(32009),
        }],
    };
    configurator.apply_service(&service).await.unwrap();

    let requests = api.requests();
    assert_eq!(requests.len(), 1);
    assert!(requests[0].starts_with("PATCH kube-system/keel-site?"));
    assert!(requests[0].contains("fieldManager=keel-operator"));
    assert!(requests[0].contains("force=true"));
}

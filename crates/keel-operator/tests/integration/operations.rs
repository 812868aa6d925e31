/*
 * Copyright (c) 2025 Dylan Storey
 * Licensed under the Elastic License 2.0.
 * See LICENSE file in the project root for full license text.
 */

use crate::fixtures::{
    backend_with_ledger, cluster_key, register, registered_backend, FakeAgentRepository,
};
use async_trait::async_trait;
use keel_models::models::cluster_configuration::{ClusterConfiguration, ServiceType};
use keel_models::models::clusters::ClusterKey;
use keel_models::models::operations::{
    OperationKey, OperationState, UpdateConfigOperation, OPERATION_UPDATE_CONFIG,
};
use keel_operator::error::{Error, Result};
use keel_operator::ops::{
    CreateUpdateConfigOperationRequest, RegisterClusterRequest, RequestContext,
    UpdateClusterConfigRequest,
};
use keel_operator::storage::{ClusterStore, OperationLedger, ServiceConfigurator, ServiceRef};
use std::sync::Arc;

const EXISTING: &str = "\
kind: ClusterConfiguration
version: v1
spec:
  global:
    cloudProvider: aws
    serviceCIDR: 10.100.0.0/16
";

const PATCH: &str = "\
spec:
  global:
    podCIDR: 10.244.0.0/16
    cloudProvider: gce
";

fn agents() -> Arc<FakeAgentRepository> {
    Arc::new(FakeAgentRepository::new())
}

fn alice() -> RequestContext {
    RequestContext::new(Some("alice".to_string()))
}

fn update_config_request(config: &str) -> CreateUpdateConfigOperationRequest {
    CreateUpdateConfigOperationRequest {
        cluster_key: cluster_key(),
        config: config.as_bytes().to_vec(),
    }
}

fn parse(config: &[u8]) -> ClusterConfiguration {
    ClusterConfiguration::unmarshal(config).expect("Failed to parse configuration")
}

#[tokio::test]
async fn test_operation_snapshots_previous_configuration() {
    let backend = registered_backend(agents()).await;
    backend
        .operator
        .update_cluster_configuration(UpdateClusterConfigRequest {
            cluster_key: cluster_key(),
            config: EXISTING.as_bytes().to_vec(),
        })
        .await
        .expect("Failed to seed configuration");

    let key = backend
        .operator
        .create_update_config_operation(&alice(), update_config_request(PATCH))
        .await
        .expect("Failed to create operation");
    assert_eq!(key.account_id, "acme");
    assert_eq!(key.cluster_name, "prod");

    let operation = backend.operator.get_operation(&key).await.unwrap();
    assert_eq!(operation.operation_type, OPERATION_UPDATE_CONFIG);
    assert_eq!(operation.state, OperationState::InProgress);
    assert_eq!(operation.created_by, "alice");
    assert_eq!(operation.created_at, operation.updated_at);

    let existing = parse(EXISTING.as_bytes());
    assert_eq!(parse(&operation.prev_config), existing);
    let merged = parse(&operation.config);
    assert_eq!(merged, existing.merge(&parse(PATCH.as_bytes())));
    let global = merged.spec.global.unwrap();
    assert_eq!(global.cloud_provider.as_deref(), Some("gce"));
    assert_eq!(global.service_cidr.as_deref(), Some("10.100.0.0/16"));
    assert_eq!(global.pod_cidr.as_deref(), Some("10.244.0.0/16"));

    // Recording the operation does not apply it
    let live = backend
        .operator
        .get_cluster_configuration(&cluster_key())
        .await
        .unwrap();
    assert_eq!(live, existing);
}

#[tokio::test]
async fn test_cluster_configurations_are_independent() {
    let backend = registered_backend(agents()).await;
    let first = ClusterKey::new("acme", "a");
    let second = ClusterKey::new("acme", "b");
    for key in [&first, &second] {
        backend
            .operator
            .register_cluster(RegisterClusterRequest {
                account_id: key.account_id.clone(),
                cluster_name: key.cluster_name.clone(),
                servers: vec![],
            })
            .await
            .unwrap();
    }

    backend
        .operator
        .update_cluster_configuration(UpdateClusterConfigRequest {
            cluster_key: first.clone(),
            config: b"spec:\n  global:\n    cloudProvider: aws\n".to_vec(),
        })
        .await
        .unwrap();

    let updated = backend.operator.get_cluster_configuration(&first).await.unwrap();
    let global = updated.spec.global.unwrap();
    assert_eq!(global.cloud_provider.as_deref(), Some("aws"));
    let untouched = backend.operator.get_cluster_configuration(&second).await.unwrap();
    assert_eq!(untouched, ClusterConfiguration::default());

    // The other cluster's operation snapshots its own, still empty, document
    let key = backend
        .operator
        .create_update_config_operation(
            &alice(),
            CreateUpdateConfigOperationRequest {
                cluster_key: second,
                config: PATCH.as_bytes().to_vec(),
            },
        )
        .await
        .unwrap();
    let operation = backend.operator.get_operation(&key).await.unwrap();
    assert_eq!(parse(&operation.prev_config), ClusterConfiguration::default());
}

#[tokio::test]
async fn test_first_read_creates_empty_config_map() {
    let backend = registered_backend(agents()).await;
    assert!(backend
        .objects
        .peek("cluster-configuration", "kube-system")
        .await
        .is_none());

    let key = backend
        .operator
        .create_update_config_operation(&RequestContext::default(), update_config_request(PATCH))
        .await
        .unwrap();

    let object = backend
        .objects
        .peek("cluster-configuration", "kube-system")
        .await
        .expect("config map was not created");
    assert!(object.data.is_empty());

    let operation = backend.operator.get_operation(&key).await.unwrap();
    assert_eq!(operation.created_by, "system");
    assert_eq!(parse(&operation.prev_config), ClusterConfiguration::default());
    assert_eq!(parse(&operation.config), parse(PATCH.as_bytes()));
}

#[tokio::test]
async fn test_one_update_in_flight_per_cluster() {
    let backend = registered_backend(agents()).await;
    let first = backend
        .operator
        .create_update_config_operation(&alice(), update_config_request(PATCH))
        .await
        .unwrap();

    let second = backend
        .operator
        .create_update_config_operation(&alice(), update_config_request(PATCH))
        .await;
    assert!(matches!(second, Err(Error::Conflict(_))));

    // Another cluster is unaffected
    let other = ClusterKey::new("acme", "staging");
    backend.store.upsert_cluster(&other, &[]).await.unwrap();
    backend
        .operator
        .create_update_config_operation(
            &alice(),
            CreateUpdateConfigOperationRequest {
                cluster_key: other,
                config: PATCH.as_bytes().to_vec(),
            },
        )
        .await
        .expect("Operations of other clusters must not conflict");

    backend
        .store
        .set_operation_state(&first, OperationState::Completed)
        .await
        .unwrap();
    let third = backend
        .operator
        .create_update_config_operation(&alice(), update_config_request(PATCH))
        .await
        .expect("A completed operation must not block new ones");

    let listed = backend.operator.list_operations(&cluster_key()).await.unwrap();
    assert_eq!(listed.len(), 2);
    assert_eq!(listed[0].id, third.operation_id);
    assert_eq!(listed[1].state, OperationState::Completed);
}

#[tokio::test]
async fn test_rejected_requests_record_nothing() {
    let backend = registered_backend(agents()).await;

    let unknown = backend
        .operator
        .create_update_config_operation(
            &alice(),
            CreateUpdateConfigOperationRequest {
                cluster_key: ClusterKey::new("acme", "missing"),
                config: PATCH.as_bytes().to_vec(),
            },
        )
        .await;
    assert!(matches!(unknown, Err(Error::NotFound(_))));

    let malformed_key = backend
        .operator
        .create_update_config_operation(
            &alice(),
            CreateUpdateConfigOperationRequest {
                cluster_key: ClusterKey::new("", "prod"),
                config: PATCH.as_bytes().to_vec(),
            },
        )
        .await;
    assert!(matches!(malformed_key, Err(Error::Validation(_))));

    let malformed_patch = backend
        .operator
        .create_update_config_operation(&alice(), update_config_request("spec: [unclosed"))
        .await;
    assert!(matches!(malformed_patch, Err(Error::Validation(_))));

    let wrong_kind = backend
        .operator
        .create_update_config_operation(&alice(), update_config_request("kind: Deployment\n"))
        .await;
    assert!(matches!(wrong_kind, Err(Error::Validation(_))));

    assert!(backend
        .operator
        .list_operations(&cluster_key())
        .await
        .unwrap()
        .is_empty());
}

struct FailingLedger;

#[async_trait]
impl OperationLedger for FailingLedger {
    async fn create_operation(&self, _operation: UpdateConfigOperation) -> Result<OperationKey> {
        Err(Error::Storage("ledger unavailable".to_string()))
    }

    async fn get_operation(&self, key: &OperationKey) -> Result<UpdateConfigOperation> {
        Err(Error::NotFound(format!("operation {} not found", key)))
    }

    async fn list_operations(&self, _key: &ClusterKey) -> Result<Vec<UpdateConfigOperation>> {
        Ok(vec![])
    }

    async fn set_operation_state(
        &self,
        key: &OperationKey,
        _state: OperationState,
    ) -> Result<UpdateConfigOperation> {
        Err(Error::NotFound(format!("operation {} not found", key)))
    }
}

#[tokio::test]
async fn test_ledger_failure_leaves_configuration_untouched() {
    let backend = backend_with_ledger(agents(), Some(Arc::new(FailingLedger)));
    register(&backend.operator).await;

    let result = backend
        .operator
        .create_update_config_operation(&alice(), update_config_request(PATCH))
        .await;
    assert!(matches!(result, Err(Error::Storage(_))));

    assert!(backend.store.list_operations(&cluster_key()).await.unwrap().is_empty());
    let object = backend
        .objects
        .peek("cluster-configuration", "kube-system")
        .await
        .expect("config map was not created");
    assert!(!object.data.contains_key("spec.acme.prod"));
}

const WITH_SERVICE: &str = "\
spec:
  controllerService:
    type: NodePort
    annotations:
      lb-internal: \"true\"
    ports:
      - name: web
        port: 3009
";

#[tokio::test]
async fn test_service_configuration_is_applied_once() {
    let backend = registered_backend(agents()).await;

    backend
        .operator
        .update_cluster_configuration(UpdateClusterConfigRequest {
            cluster_key: cluster_key(),
            config: WITH_SERVICE.as_bytes().to_vec(),
        })
        .await
        .unwrap();
    assert_eq!(backend.services.apply_count(), 1);

    let applied = backend
        .services
        .get_service(&ServiceRef::default())
        .await
        .unwrap()
        .expect("service was not applied");
    assert_eq!(applied.name, "keel-site");
    assert_eq!(applied.service_type, ServiceType::NodePort);
    assert_eq!(applied.ports.len(), 1);

    backend
        .operator
        .update_service_configuration(&cluster_key())
        .await
        .unwrap();
    assert_eq!(backend.services.apply_count(), 1);

    backend
        .operator
        .update_cluster_configuration(UpdateClusterConfigRequest {
            cluster_key: cluster_key(),
            config: WITH_SERVICE.replace("\"true\"", "\"false\"").into_bytes(),
        })
        .await
        .unwrap();
    assert_eq!(backend.services.apply_count(), 2);
}

#[tokio::test]
async fn test_configuration_without_service_section_applies_nothing() {
    let backend = registered_backend(agents()).await;
    backend
        .operator
        .update_cluster_configuration(UpdateClusterConfigRequest {
            cluster_key: cluster_key(),
            config: EXISTING.as_bytes().to_vec(),
        })
        .await
        .unwrap();
    backend
        .operator
        .update_service_configuration(&cluster_key())
        .await
        .unwrap();
    assert_eq!(backend.services.apply_count(), 0);
}

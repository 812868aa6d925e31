/*
 * Copyright (c) 2025 Dylan Storey
 * Licensed under the Elastic License 2.0.
 * See LICENSE file in the project root for full license text.
 */

//! # Storage Collaborators
//!
//! The operator never talks to a database or to the Kubernetes API directly.
//! It consumes the traits defined here:
//!
//! | Trait | Responsibility | Implementations |
//! |---|---|---|
//! | [`ClusterStore`] | cluster existence and server inventory | [`memory::MemoryClusterStore`], [`crate::dal::DAL`] |
//! | [`OperationLedger`] | append-only operation records, one in-flight update-config per cluster | [`memory::MemoryClusterStore`], [`crate::dal::DAL`] |
//! | [`ClusterConfigStore`] | current cluster configuration | [`configmap::ConfigMapClusterConfigStore`] |
//! | [`ConfigObjectStore`] | get-or-create of the backing config map | [`memory::MemoryConfigObjectStore`], [`crate::k8s::KubeConfigObjectStore`] |
//! | [`ServiceConfigurator`] | the controller service rendered from configuration | [`memory::MemoryServiceConfigurator`], [`crate::k8s::KubeServiceConfigurator`] |

pub mod configmap;
pub mod memory;

use crate::error::Result;
use async_trait::async_trait;
use keel_models::models::cluster_configuration::{
    ClusterConfiguration, ControllerService, ServicePort, ServiceType,
};
use keel_models::models::clusters::{Cluster, ClusterKey, Server};
use keel_models::models::operations::{OperationKey, OperationState, UpdateConfigOperation};
use keel_utils::config::Kubernetes;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[async_trait]
pub trait ClusterStore: Send + Sync {
    /// Resolves a registered cluster, failing with `NotFound` when absent.
    async fn get_cluster(&self, key: &ClusterKey) -> Result<Cluster>;

    /// Registers a cluster or replaces its server inventory.
    async fn upsert_cluster(&self, key: &ClusterKey, servers: &[Server]) -> Result<Cluster>;
}

#[async_trait]
pub trait ClusterConfigStore: Send + Sync {
    async fn get_cluster_configuration(&self, key: &ClusterKey) -> Result<ClusterConfiguration>;

    async fn update_cluster_configuration(
        &self,
        key: &ClusterKey,
        config: &ClusterConfiguration,
    ) -> Result<()>;
}

/// Append-only record of cluster operations.
///
/// Implementations must reject a new update-config operation with
/// `Error::Conflict` while another update-config operation of the same cluster
/// is still in progress.
#[async_trait]
pub trait OperationLedger: Send + Sync {
    async fn create_operation(&self, operation: UpdateConfigOperation) -> Result<OperationKey>;

    async fn get_operation(&self, key: &OperationKey) -> Result<UpdateConfigOperation>;

    /// Lists the operations of a cluster, newest first.
    async fn list_operations(&self, key: &ClusterKey) -> Result<Vec<UpdateConfigOperation>>;

    /// Moves an operation to a new state. Used by the operation executor.
    async fn set_operation_state(
        &self,
        key: &OperationKey,
        state: OperationState,
    ) -> Result<UpdateConfigOperation>;
}

/// Names the config map holding the serialized cluster configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigMapRef {
    pub name: String,
    pub namespace: String,
    /// Prefix of the per-cluster data keys, see [`configmap::data_key`]
    pub spec_key: String,
}

impl Default for ConfigMapRef {
    fn default() -> Self {
        Self {
            name: "cluster-configuration".to_string(),
            namespace: "kube-system".to_string(),
            spec_key: "spec".to_string(),
        }
    }
}

impl From<&Kubernetes> for ConfigMapRef {
    fn from(settings: &Kubernetes) -> Self {
        Self {
            name: settings.config_map_name.clone(),
            namespace: settings.config_map_namespace.clone(),
            spec_key: settings.config_map_spec_key.clone(),
        }
    }
}

/// A named string map, the storage shape of a config map.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigObject {
    pub name: String,
    pub namespace: String,
    pub data: BTreeMap<String, String>,
    /// Opaque version used for optimistic concurrency, when the store has one
    pub resource_version: Option<String>,
}

impl ConfigObject {
    pub fn empty(name: &str, namespace: &str) -> Self {
        Self {
            name: name.to_string(),
            namespace: namespace.to_string(),
            ..Default::default()
        }
    }
}

#[async_trait]
pub trait ConfigObjectStore: Send + Sync {
    /// Returns the named object, creating it empty when it does not exist.
    async fn get_or_create(&self, name: &str, namespace: &str) -> Result<ConfigObject>;

    async fn update(&self, object: &ConfigObject) -> Result<ConfigObject>;
}

/// Names the controller service rendered from the configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceRef {
    pub name: String,
    pub namespace: String,
}

impl Default for ServiceRef {
    fn default() -> Self {
        Self {
            name: "keel-site".to_string(),
            namespace: "kube-system".to_string(),
        }
    }
}

impl From<&Kubernetes> for ServiceRef {
    fn from(settings: &Kubernetes) -> Self {
        Self {
            name: settings.service_name.clone(),
            namespace: settings.service_namespace.clone(),
        }
    }
}

/// Desired (or observed) shape of the controller service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenderedService {
    pub name: String,
    pub namespace: String,
    pub service_type: ServiceType,
    pub annotations: BTreeMap<String, String>,
    pub ports: Vec<ServicePort>,
}

impl RenderedService {
    /// Renders the controller service section of a configuration.
    /// An unset service type renders as `LoadBalancer`.
    pub fn render(service: &ServiceRef, config: &ControllerService) -> Self {
        Self {
            name: service.name.clone(),
            namespace: service.namespace.clone(),
            service_type: config.service_type.unwrap_or(ServiceType::LoadBalancer),
            annotations: config.annotations.clone().unwrap_or_default(),
            ports: config.ports.clone().unwrap_or_default(),
        }
    }

    /// Whether an observed service already has everything this one asks for.
    ///
    /// Node ports left unset here are allocated by the cluster and match any
    /// observed value. Annotations added by other parties are ignored.
    pub fn is_satisfied_by(&self, current: &RenderedService) -> bool {
        if self.service_type != current.service_type || self.ports.len() != current.ports.len() {
            return false;
        }
        let annotations_match = self
            .annotations
            .iter()
            .all(|(key, value)| current.annotations.get(key) == Some(value));
        let ports_match = self.ports.iter().zip(&current.ports).all(|(want, have)| {
            want.name == have.name
                && want.port == have.port
                && (want.node_port.is_none() || want.node_port == have.node_port)
        });
        annotations_match && ports_match
    }
}

#[async_trait]
pub trait ServiceConfigurator: Send + Sync {
    /// Reads the currently applied service, `None` when it does not exist.
    async fn get_service(&self, service: &ServiceRef) -> Result<Option<RenderedService>>;

    async fn apply_service(&self, service: &RenderedService) -> Result<()>;
}

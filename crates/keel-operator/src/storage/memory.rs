/*
 * Copyright (c) 2025 Dylan Storey
 * Licensed under the Elastic License 2.0.
 * See LICENSE file in the project root for full license text.
 */

//! In-process implementations of the storage collaborators.
//!
//! Used when the operator runs with `storage = "memory"` and without
//! Kubernetes, and by the test suites.

use super::{
    ClusterStore, ConfigObject, ConfigObjectStore, OperationLedger, RenderedService,
    ServiceConfigurator, ServiceRef,
};
use crate::error::{Error, Result};
use async_trait::async_trait;
use chrono::Utc;
use keel_models::models::clusters::{Cluster, ClusterKey, Server};
use keel_models::models::operations::{
    OperationKey, OperationState, UpdateConfigOperation, OPERATION_UPDATE_CONFIG,
};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::RwLock;

#[derive(Default)]
struct Inventory {
    clusters: HashMap<ClusterKey, Cluster>,
    operations: Vec<UpdateConfigOperation>,
}

/// Cluster inventory and operation ledger kept in memory.
#[derive(Default)]
pub struct MemoryClusterStore {
    inner: RwLock<Inventory>,
}

impl MemoryClusterStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ClusterStore for MemoryClusterStore {
    async fn get_cluster(&self, key: &ClusterKey) -> Result<Cluster> {
        let inner = self.inner.read().await;
        inner
            .clusters
            .get(key)
            .cloned()
            .ok_or_else(|| Error::NotFound(format!("cluster {} not found", key)))
    }

    async fn upsert_cluster(&self, key: &ClusterKey, servers: &[Server]) -> Result<Cluster> {
        let mut inner = self.inner.write().await;
        let cluster = inner
            .clusters
            .entry(key.clone())
            .or_insert_with(|| Cluster {
                key: key.clone(),
                created_at: Utc::now(),
                servers: vec![],
            });
        cluster.servers = servers.to_vec();
        Ok(cluster.clone())
    }
}

#[async_trait]
impl OperationLedger for MemoryClusterStore {
    async fn create_operation(&self, operation: UpdateConfigOperation) -> Result<OperationKey> {
        let mut inner = self.inner.write().await;
        let cluster_key = operation.cluster_key();
        if !inner.clusters.contains_key(&cluster_key) {
            return Err(Error::NotFound(format!("cluster {} not found", cluster_key)));
        }
        let in_flight = inner.operations.iter().find(|existing| {
            existing.cluster_key() == cluster_key
                && existing.operation_type == OPERATION_UPDATE_CONFIG
                && existing.state == OperationState::InProgress
        });
        if let Some(existing) = in_flight {
            return Err(Error::Conflict(format!(
                "operation {} is already updating the configuration of cluster {}",
                existing.id, cluster_key
            )));
        }
        let key = operation.key();
        inner.operations.push(operation);
        Ok(key)
    }

    async fn get_operation(&self, key: &OperationKey) -> Result<UpdateConfigOperation> {
        let inner = self.inner.read().await;
        inner
            .operations
            .iter()
            .find(|op| op.key() == *key)
            .cloned()
            .ok_or_else(|| Error::NotFound(format!("operation {} not found", key)))
    }

    async fn list_operations(&self, key: &ClusterKey) -> Result<Vec<UpdateConfigOperation>> {
        let inner = self.inner.read().await;
        Ok(inner
            .operations
            .iter()
            .rev()
            .filter(|op| op.cluster_key() == *key)
            .cloned()
            .collect())
    }

    async fn set_operation_state(
        &self,
        key: &OperationKey,
        state: OperationState,
    ) -> Result<UpdateConfigOperation> {
        let mut inner = self.inner.write().await;
        let operation = inner
            .operations
            .iter_mut()
            .find(|op| op.key() == *key)
            .ok_or_else(|| Error::NotFound(format!("operation {} not found", key)))?;
        operation.state = state;
        operation.updated_at = Utc::now();
        Ok(operation.clone())
    }
}

/// Config maps kept in memory, keyed by namespace and name.
#[derive(Default)]
pub struct MemoryConfigObjectStore {
    objects: RwLock<HashMap<(String, String), ConfigObject>>,
    revision: AtomicUsize,
}

impl MemoryConfigObjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the stored object without creating it.
    pub async fn peek(&self, name: &str, namespace: &str) -> Option<ConfigObject> {
        let objects = self.objects.read().await;
        objects
            .get(&(namespace.to_string(), name.to_string()))
            .cloned()
    }

    fn next_revision(&self) -> String {
        (self.revision.fetch_add(1, Ordering::SeqCst) + 1).to_string()
    }
}

#[async_trait]
impl ConfigObjectStore for MemoryConfigObjectStore {
    async fn get_or_create(&self, name: &str, namespace: &str) -> Result<ConfigObject> {
        let mut objects = self.objects.write().await;
        let object = objects
            .entry((namespace.to_string(), name.to_string()))
            .or_insert_with(|| ConfigObject {
                resource_version: Some(self.next_revision()),
                ..ConfigObject::empty(name, namespace)
            });
        Ok(object.clone())
    }

    async fn update(&self, object: &ConfigObject) -> Result<ConfigObject> {
        let mut objects = self.objects.write().await;
        let key = (object.namespace.clone(), object.name.clone());
        let stored = objects.get_mut(&key).ok_or_else(|| {
            Error::NotFound(format!(
                "config map {}/{} not found",
                object.namespace, object.name
            ))
        })?;
        if object.resource_version.is_some() && object.resource_version != stored.resource_version
        {
            return Err(Error::Conflict(format!(
                "config map {}/{} was modified concurrently",
                object.namespace, object.name
            )));
        }
        stored.data = object.data.clone();
        stored.resource_version = Some(self.next_revision());
        Ok(stored.clone())
    }
}

/// Controller services kept in memory. Counts applies.
#[derive(Default)]
pub struct MemoryServiceConfigurator {
    services: RwLock<HashMap<(String, String), RenderedService>>,
    applies: AtomicUsize,
}

impl MemoryServiceConfigurator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn apply_count(&self) -> usize {
        self.applies.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ServiceConfigurator for MemoryServiceConfigurator {
    async fn get_service(&self, service: &ServiceRef) -> Result<Option<RenderedService>> {
        let services = self.services.read().await;
        Ok(services
            .get(&(service.namespace.clone(), service.name.clone()))
            .cloned())
    }

    async fn apply_service(&self, service: &RenderedService) -> Result<()> {
        let mut services = self.services.write().await;
        services.insert(
            (service.namespace.clone(), service.name.clone()),
            service.clone(),
        );
        self.applies.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/*
 * Copyright (c) 2025 Dylan Storey
 * Licensed under the Elastic License 2.0.
 * See LICENSE file in the project root for full license text.
 */

//! # Data Access Layer
//!
//! PostgreSQL-backed cluster inventory and operation ledger.
//!
//! Queries are synchronous diesel calls. The [`ClusterStore`] and
//! [`OperationLedger`] implementations run them on tokio's blocking pool.
//!
//! The ledger's one-in-flight rule is enforced by the partial unique index
//! `operations_one_update_config_in_flight`; a violation surfaces as
//! `Error::Conflict`.

use crate::db::ConnectionPool;
use crate::error::{Error, Result};
use crate::storage::{ClusterStore, OperationLedger};
use async_trait::async_trait;
use keel_models::models::clusters::{Cluster, ClusterKey, Server};
use keel_models::models::operations::{OperationKey, OperationState, UpdateConfigOperation};

mod clusters;
mod operations;

pub use clusters::ClustersDAL;
pub use operations::OperationsDAL;

#[derive(Clone)]
pub struct DAL {
    pub pool: ConnectionPool,
}

impl DAL {
    pub fn new(pool: ConnectionPool) -> Self {
        DAL { pool }
    }

    pub fn clusters(&self) -> ClustersDAL {
        ClustersDAL { dal: self }
    }

    pub fn operations(&self) -> OperationsDAL {
        OperationsDAL { dal: self }
    }

    /// Runs a query on the blocking pool.
    async fn blocking<T, F>(&self, query: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&DAL) -> Result<T> + Send + 'static,
    {
        let dal = self.clone();
        tokio::task::spawn_blocking(move || query(&dal))
            .await
            .map_err(|e| Error::Storage(format!("database task failed: {}", e)))?
    }
}

#[async_trait]
impl ClusterStore for DAL {
    async fn get_cluster(&self, key: &ClusterKey) -> Result<Cluster> {
        let key = key.clone();
        self.blocking(move |dal| dal.clusters().get(&key)).await
    }

    async fn upsert_cluster(&self, key: &ClusterKey, servers: &[Server]) -> Result<Cluster> {
        let key = key.clone();
        let servers = servers.to_vec();
        self.blocking(move |dal| dal.clusters().upsert(&key, &servers))
            .await
    }
}

#[async_trait]
impl OperationLedger for DAL {
    async fn create_operation(&self, operation: UpdateConfigOperation) -> Result<OperationKey> {
        self.blocking(move |dal| dal.operations().create(&operation))
            .await
    }

    async fn get_operation(&self, key: &OperationKey) -> Result<UpdateConfigOperation> {
        let key = key.clone();
        self.blocking(move |dal| dal.operations().get(&key)).await
    }

    async fn list_operations(&self, key: &ClusterKey) -> Result<Vec<UpdateConfigOperation>> {
        let key = key.clone();
        self.blocking(move |dal| dal.operations().list(&key)).await
    }

    async fn set_operation_state(
        &self,
        key: &OperationKey,
        state: OperationState,
    ) -> Result<UpdateConfigOperation> {
        let key = key.clone();
        self.blocking(move |dal| dal.operations().set_state(&key, state))
            .await
    }
}

/*
 * Copyright (c) 2025 Dylan Storey
 * Licensed under the Elastic License 2.0.
 * See LICENSE file in the project root for full license text.
 */

//! Configuration operations of the operator.

use super::{CreateUpdateConfigOperationRequest, Operator, RequestContext, UpdateClusterConfigRequest};
use crate::error::{Error, Result};
use crate::metrics;
use crate::storage::RenderedService;
use keel_models::models::cluster_configuration::ClusterConfiguration;
use keel_models::models::clusters::{Cluster, ClusterKey};
use keel_models::models::operations::{OperationKey, UpdateConfigOperation};
use keel_utils::logging::prelude::*;

fn result_label<T>(result: &Result<T>) -> &'static str {
    match result {
        Ok(_) => "created",
        Err(Error::Validation(_)) => "invalid",
        Err(Error::NotFound(_)) => "not_found",
        Err(Error::Conflict(_)) => "conflict",
        Err(_) => "error",
    }
}

fn parse_patch(config: &[u8]) -> Result<ClusterConfiguration> {
    ClusterConfiguration::unmarshal(config)
        .map_err(|e| Error::Validation(format!("invalid cluster configuration: {}", e)))
}

impl Operator {
    /// Checks the key and resolves the cluster it names.
    pub(crate) async fn resolve_cluster(&self, key: &ClusterKey) -> Result<Cluster> {
        key.check().map_err(Error::Validation)?;
        self.backend.clusters.get_cluster(key).await
    }

    /// Records a configuration change as a tracked operation.
    ///
    /// The patch is merged into the current configuration. Both the current
    /// and the merged documents are stored on the operation. The live
    /// configuration is left untouched; applying it is up to the operation's
    /// executor.
    #[tracing::instrument(skip(self, ctx, req), fields(cluster = %req.cluster_key))]
    pub async fn create_update_config_operation(
        &self,
        ctx: &RequestContext,
        req: CreateUpdateConfigOperationRequest,
    ) -> Result<OperationKey> {
        let result = self.record_update_config_operation(ctx, &req).await;
        metrics::update_config_operations_total()
            .with_label_values(&[result_label(&result)])
            .inc();
        if let Ok(key) = &result {
            info!(
                "Created update-config operation {} for cluster {} by {}",
                key.operation_id,
                req.cluster_key,
                ctx.actor()
            );
        }
        result
    }

    async fn record_update_config_operation(
        &self,
        ctx: &RequestContext,
        req: &CreateUpdateConfigOperationRequest,
    ) -> Result<OperationKey> {
        let cluster = self.resolve_cluster(&req.cluster_key).await?;
        let existing = self
            .backend
            .configs
            .get_cluster_configuration(&cluster.key)
            .await?;
        let patch = parse_patch(&req.config)?;
        let merged = existing.merge(&patch);

        let operation = UpdateConfigOperation::new(
            &cluster.key,
            ctx.actor(),
            existing.marshal()?,
            merged.marshal()?,
        );
        self.backend.ledger.create_operation(operation).await
    }

    #[tracing::instrument(skip(self, key), fields(cluster = %key))]
    pub async fn get_cluster_configuration(&self, key: &ClusterKey) -> Result<ClusterConfiguration> {
        let cluster = self.resolve_cluster(key).await?;
        self.backend
            .configs
            .get_cluster_configuration(&cluster.key)
            .await
    }

    /// Replaces the stored configuration and re-renders the controller
    /// service from it.
    #[tracing::instrument(skip(self, req), fields(cluster = %req.cluster_key))]
    pub async fn update_cluster_configuration(&self, req: UpdateClusterConfigRequest) -> Result<()> {
        let cluster = self.resolve_cluster(&req.cluster_key).await?;
        let config = parse_patch(&req.config)?;
        self.backend
            .configs
            .update_cluster_configuration(&cluster.key, &config)
            .await?;
        info!("Updated configuration of cluster {}", cluster.key);
        self.update_service_configuration(&cluster.key).await
    }

    /// Brings the controller service in line with the stored configuration.
    ///
    /// A configuration without a controller service section leaves the
    /// service alone. The service is only applied when the applied one
    /// differs from the rendered one.
    #[tracing::instrument(skip(self, key), fields(cluster = %key))]
    pub async fn update_service_configuration(&self, key: &ClusterKey) -> Result<()> {
        let cluster = self.resolve_cluster(key).await?;
        let config = self
            .backend
            .configs
            .get_cluster_configuration(&cluster.key)
            .await?;
        let Some(controller) = config.spec.controller_service.as_ref() else {
            debug!(
                "No controller service configured for cluster {}",
                cluster.key
            );
            return Ok(());
        };

        let desired = RenderedService::render(&self.service, controller);
        let current = self.backend.services.get_service(&self.service).await?;
        if current
            .as_ref()
            .is_some_and(|current| desired.is_satisfied_by(current))
        {
            debug!(
                "Service {}/{} is up to date",
                desired.namespace, desired.name
            );
            return Ok(());
        }

        self.backend.services.apply_service(&desired).await?;
        metrics::service_applies_total().inc();
        info!(
            "Applied service {}/{} for cluster {}",
            desired.namespace, desired.name, cluster.key
        );
        Ok(())
    }

    pub async fn get_operation(&self, key: &OperationKey) -> Result<UpdateConfigOperation> {
        self.resolve_cluster(&key.cluster_key()).await?;
        self.backend.ledger.get_operation(key).await
    }

    /// Lists the operations of a cluster, newest first.
    pub async fn list_operations(&self, key: &ClusterKey) -> Result<Vec<UpdateConfigOperation>> {
        let cluster = self.resolve_cluster(key).await?;
        self.backend.ledger.list_operations(&cluster.key).await
    }
}

/*
 * Copyright (c) 2025 Dylan Storey
 * Licensed under the Elastic License 2.0.
 * See LICENSE file in the project root for full license text.
 */

use super::{Operator, RegisterClusterRequest};
use crate::error::{Error, Result};
use crate::rpc::status::{collect_agent_status_with_timeouts, StatusList};
use keel_models::models::clusters::{Cluster, ClusterKey};
use keel_utils::logging::prelude::*;
use tokio_util::sync::CancellationToken;

impl Operator {
    /// Registers a cluster, replacing the server inventory of a known one.
    #[tracing::instrument(skip(self, req), fields(account = %req.account_id, cluster = %req.cluster_name))]
    pub async fn register_cluster(&self, req: RegisterClusterRequest) -> Result<Cluster> {
        let key = ClusterKey::new(req.account_id, req.cluster_name);
        key.check().map_err(Error::Validation)?;
        let cluster = self
            .backend
            .clusters
            .upsert_cluster(&key, &req.servers)
            .await?;
        info!(
            "Registered cluster {} with {} servers",
            cluster.key,
            cluster.servers.len()
        );
        Ok(cluster)
    }

    /// Queries the agent of every server of a cluster.
    ///
    /// Only resolving the cluster can fail. Agent failures are reported per
    /// server in the returned list.
    #[tracing::instrument(skip(self, cancel, key), fields(cluster = %key))]
    pub async fn collect_agent_status(
        &self,
        cancel: &CancellationToken,
        key: &ClusterKey,
    ) -> Result<StatusList> {
        let cluster = self.resolve_cluster(key).await?;
        Ok(collect_agent_status_with_timeouts(
            cancel,
            &cluster.servers,
            self.backend.agents.clone(),
            self.status_timeouts,
        )
        .await)
    }
}

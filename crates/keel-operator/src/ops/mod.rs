/*
 * Copyright (c) 2025 Dylan Storey
 * Licensed under the Elastic License 2.0.
 * See LICENSE file in the project root for full license text.
 */

//! # Operator Service
//!
//! The entry points behind the HTTP API and the CLI:
//!
//! - configuration reads and direct writes
//! - creation of tracked update-config operations
//! - rendering of the controller service from configuration
//! - cluster registration and agent status collection
//!
//! The operator holds only shared handles to its collaborators. It takes no
//! locks of its own; the one-in-flight rule for update-config operations is
//! enforced by the [`OperationLedger`].

mod cluster_config;
mod clusters;

use crate::rpc::status::StatusTimeouts;
use crate::rpc::AgentRepository;
use crate::storage::{
    ClusterConfigStore, ClusterStore, OperationLedger, ServiceConfigurator, ServiceRef,
};
use keel_models::models::clusters::ClusterKey;
use serde::Deserialize;
use std::sync::Arc;

/// Actor recorded on operations created without an authenticated user.
pub const SYSTEM_ACTOR: &str = "system";

/// Storage and RPC collaborators of the operator.
#[derive(Clone)]
pub struct Collaborators {
    pub clusters: Arc<dyn ClusterStore>,
    pub configs: Arc<dyn ClusterConfigStore>,
    pub ledger: Arc<dyn OperationLedger>,
    pub services: Arc<dyn ServiceConfigurator>,
    pub agents: Arc<dyn AgentRepository>,
}

#[derive(Clone)]
pub struct Operator {
    backend: Collaborators,
    service: ServiceRef,
    status_timeouts: StatusTimeouts,
}

impl Operator {
    pub fn new(backend: Collaborators, service: ServiceRef, status_timeouts: StatusTimeouts) -> Self {
        Self {
            backend,
            service,
            status_timeouts,
        }
    }

    pub fn collaborators(&self) -> &Collaborators {
        &self.backend
    }
}

/// Caller identity attached to a request.
#[derive(Debug, Clone, Default)]
pub struct RequestContext {
    pub user: Option<String>,
}

impl RequestContext {
    pub fn new(user: Option<String>) -> Self {
        Self { user }
    }

    /// The user to record as an operation's creator.
    pub fn actor(&self) -> &str {
        self.user
            .as_deref()
            .filter(|user| !user.trim().is_empty())
            .unwrap_or(SYSTEM_ACTOR)
    }
}

/// Request to record a configuration change as an operation.
#[derive(Debug, Clone)]
pub struct CreateUpdateConfigOperationRequest {
    pub cluster_key: ClusterKey,
    /// Serialized configuration patch
    pub config: Vec<u8>,
}

/// Request to replace the stored configuration directly.
#[derive(Debug, Clone)]
pub struct UpdateClusterConfigRequest {
    pub cluster_key: ClusterKey,
    /// Serialized configuration document
    pub config: Vec<u8>,
}

/// Request to register a cluster and its servers.
#[derive(Debug, Clone, Deserialize)]
pub struct RegisterClusterRequest {
    pub account_id: String,
    pub cluster_name: String,
    #[serde(default)]
    pub servers: Vec<keel_models::models::clusters::Server>,
}

/*
 * Copyright (c) 2025 Dylan Storey
 * Licensed under the Elastic License 2.0.
 * See LICENSE file in the project root for full license text.
 */

//! # Agent RPC
//!
//! The per-node agents expose a minimal surface: a version query. The operator
//! reaches them through an [`AgentRepository`], which hands out one
//! [`AgentClient`] per node address.
//!
//! Agents that predate the version query answer it with "not implemented".
//! That answer is [`VersionQuery::Unsupported`], a regular outcome rather than
//! an error.
//!
//! Timeouts and cancellation are applied by the caller around these futures,
//! see [`status`].

pub mod http;
pub mod status;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Version reported by an agent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Version {
    pub version: String,
}

/// Outcome of a version query.
#[derive(Debug, Clone, PartialEq)]
pub enum VersionQuery {
    Reported(Version),
    /// The agent does not implement the version query
    Unsupported,
    Failed(RpcError),
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum RpcError {
    /// No client could be obtained for the agent
    #[error("agent unavailable: {0}")]
    Unavailable(String),
    #[error("timed out after {0:?}")]
    Timeout(Duration),
    #[error("canceled")]
    Canceled,
    #[error("transport error: {0}")]
    Transport(String),
    /// The query terminated without reporting a result
    #[error("status query aborted")]
    Aborted,
}

#[async_trait]
pub trait AgentClient: Send + Sync {
    async fn get_version(&self) -> VersionQuery;

    /// Releases the client.
    async fn close(&self);
}

#[async_trait]
pub trait AgentRepository: Send + Sync {
    /// Obtains a client for the agent at `address`.
    async fn get_client(&self, address: &str) -> Result<Box<dyn AgentClient>, RpcError>;
}

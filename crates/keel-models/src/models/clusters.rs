/*
 * Copyright (c) 2025 Dylan Storey
 * Licensed under the Elastic License 2.0.
 * See LICENSE file in the project root for full license text.
 */

//! # Clusters Module
//!
//! Cluster identity and server inventory.
//!
//! - `ClusterKey`: (account, cluster name) pair addressing one cluster
//! - `Cluster`: a registered cluster with its servers
//! - `Server`: one node of a cluster, as seen by the agent status broadcaster
//!
//! `ClusterRecord`/`NewClusterRecord` and `ServerRecord`/`NewServerRecord` are
//! the diesel row types backing the `clusters` and `cluster_servers` tables.

use chrono::{DateTime, Utc};
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Identifies a cluster within an account.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ClusterKey {
    pub account_id: String,
    pub cluster_name: String,
}

impl ClusterKey {
    pub fn new(account_id: impl Into<String>, cluster_name: impl Into<String>) -> Self {
        Self {
            account_id: account_id.into(),
            cluster_name: cluster_name.into(),
        }
    }

    /// Validates that both parts of the key are set.
    pub fn check(&self) -> Result<(), String> {
        if self.account_id.trim().is_empty() {
            return Err("Account ID cannot be empty".to_string());
        }
        if self.cluster_name.trim().is_empty() {
            return Err("Cluster name cannot be empty".to_string());
        }
        Ok(())
    }
}

impl fmt::Display for ClusterKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.account_id, self.cluster_name)
    }
}

/// A node of the cluster running an agent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Server {
    pub hostname: String,
    pub advertise_ip: String,
}

impl Server {
    pub fn new(hostname: impl Into<String>, advertise_ip: impl Into<String>) -> Self {
        Self {
            hostname: hostname.into(),
            advertise_ip: advertise_ip.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cluster {
    pub key: ClusterKey,
    pub created_at: DateTime<Utc>,
    pub servers: Vec<Server>,
}

#[derive(Queryable, Selectable, Debug, Clone)]
#[diesel(table_name = crate::schema::clusters)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct ClusterRecord {
    pub account_id: String,
    pub cluster_name: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Insertable, Debug, Clone)]
#[diesel(table_name = crate::schema::clusters)]
pub struct NewClusterRecord {
    pub account_id: String,
    pub cluster_name: String,
}

impl From<&ClusterKey> for NewClusterRecord {
    fn from(key: &ClusterKey) -> Self {
        NewClusterRecord {
            account_id: key.account_id.clone(),
            cluster_name: key.cluster_name.clone(),
        }
    }
}

#[derive(Queryable, Selectable, Debug, Clone)]
#[diesel(table_name = crate::schema::cluster_servers)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct ServerRecord {
    pub id: Uuid,
    pub account_id: String,
    pub cluster_name: String,
    pub hostname: String,
    pub advertise_ip: String,
}

impl From<ServerRecord> for Server {
    fn from(record: ServerRecord) -> Self {
        Server {
            hostname: record.hostname,
            advertise_ip: record.advertise_ip,
        }
    }
}

#[derive(Insertable, Debug, Clone)]
#[diesel(table_name = crate::schema::cluster_servers)]
pub struct NewServerRecord {
    pub account_id: String,
    pub cluster_name: String,
    pub hostname: String,
    pub advertise_ip: String,
}

impl NewServerRecord {
    pub fn new(key: &ClusterKey, server: &Server) -> Result<Self, String> {
        if server.hostname.trim().is_empty() {
            return Err("Server hostname cannot be empty".to_string());
        }
        if server.advertise_ip.trim().is_empty() {
            return Err("Server advertise IP cannot be empty".to_string());
        }
        Ok(NewServerRecord {
            account_id: key.account_id.clone(),
            cluster_name: key.cluster_name.clone(),
            hostname: server.hostname.clone(),
            advertise_ip: server.advertise_ip.clone(),
        })
    }
}

impl ClusterRecord {
    /// Assembles the cluster from its row and its server rows.
    pub fn into_cluster(self, servers: Vec<ServerRecord>) -> Cluster {
        Cluster {
            key: ClusterKey::new(self.account_id, self.cluster_name),
            created_at: self.created_at,
            servers: servers.into_iter().map(Server::from).collect(),
        }
    }
}

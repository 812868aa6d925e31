/*
 * Copyright (c) 2025 Dylan Storey
 * Licensed under the Elastic License 2.0.
 * See LICENSE file in the project root for full license text.
 */

//! # Operations Module
//!
//! Cluster operations recorded in the operation ledger.
//!
//! An `UpdateConfigOperation` captures a configuration change: the snapshot of
//! the configuration before the change (`prev_config`) and the merged
//! configuration to be applied (`config`), both as serialized documents. It is
//! created in the `InProgress` state; an executor outside the operator moves it
//! to `Completed` or `Failed`.

use crate::models::clusters::ClusterKey;
use chrono::{DateTime, Utc};
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Operation type tag of configuration update operations.
pub const OPERATION_UPDATE_CONFIG: &str = "update-config";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OperationState {
    #[serde(rename = "update_config_in_progress")]
    InProgress,
    #[serde(rename = "completed")]
    Completed,
    #[serde(rename = "failed")]
    Failed,
}

impl OperationState {
    pub fn as_str(&self) -> &'static str {
        match self {
            OperationState::InProgress => "update_config_in_progress",
            OperationState::Completed => "completed",
            OperationState::Failed => "failed",
        }
    }

    /// Whether the executor has finished with the operation.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, OperationState::InProgress)
    }
}

impl fmt::Display for OperationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OperationState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "update_config_in_progress" => Ok(OperationState::InProgress),
            "completed" => Ok(OperationState::Completed),
            "failed" => Ok(OperationState::Failed),
            other => Err(format!("Unknown operation state: {}", other)),
        }
    }
}

/// Addresses a single operation of a cluster.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OperationKey {
    pub account_id: String,
    pub cluster_name: String,
    pub operation_id: Uuid,
}

impl OperationKey {
    pub fn cluster_key(&self) -> ClusterKey {
        ClusterKey::new(self.account_id.clone(), self.cluster_name.clone())
    }
}

impl fmt::Display for OperationKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{}/{}",
            self.account_id, self.cluster_name, self.operation_id
        )
    }
}

/// A recorded configuration update.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UpdateConfigOperation {
    pub id: Uuid,
    pub account_id: String,
    pub cluster_name: String,
    pub operation_type: String,
    pub created_at: DateTime<Utc>,
    pub created_by: String,
    pub updated_at: DateTime<Utc>,
    pub state: OperationState,
    /// Configuration before the change
    pub prev_config: Vec<u8>,
    /// Configuration after the change
    pub config: Vec<u8>,
}

impl UpdateConfigOperation {
    /// Builds a fresh in-progress operation with a new identifier.
    pub fn new(
        cluster_key: &ClusterKey,
        created_by: impl Into<String>,
        prev_config: Vec<u8>,
        config: Vec<u8>,
    ) -> Self {
        let now = Utc::now();
        UpdateConfigOperation {
            id: Uuid::new_v4(),
            account_id: cluster_key.account_id.clone(),
            cluster_name: cluster_key.cluster_name.clone(),
            operation_type: OPERATION_UPDATE_CONFIG.to_string(),
            created_at: now,
            created_by: created_by.into(),
            updated_at: now,
            state: OperationState::InProgress,
            prev_config,
            config,
        }
    }

    pub fn key(&self) -> OperationKey {
        OperationKey {
            account_id: self.account_id.clone(),
            cluster_name: self.cluster_name.clone(),
            operation_id: self.id,
        }
    }

    pub fn cluster_key(&self) -> ClusterKey {
        ClusterKey::new(self.account_id.clone(), self.cluster_name.clone())
    }
}

/// Row of the `operations` table.
#[derive(Queryable, Selectable, Identifiable, Debug, Clone)]
#[diesel(table_name = crate::schema::operations)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct OperationRecord {
    pub id: Uuid,
    pub account_id: String,
    pub cluster_name: String,
    pub operation_type: String,
    pub created_at: DateTime<Utc>,
    pub created_by: String,
    pub updated_at: DateTime<Utc>,
    pub state: String,
    pub prev_config: Vec<u8>,
    pub config: Vec<u8>,
}

#[derive(Insertable, Debug, Clone)]
#[diesel(table_name = crate::schema::operations)]
pub struct NewOperation {
    pub id: Uuid,
    pub account_id: String,
    pub cluster_name: String,
    pub operation_type: String,
    pub created_at: DateTime<Utc>,
    pub created_by: String,
    pub updated_at: DateTime<Utc>,
    pub state: String,
    pub prev_config: Vec<u8>,
    pub config: Vec<u8>,
}

impl From<&UpdateConfigOperation> for NewOperation {
    fn from(op: &UpdateConfigOperation) -> Self {
        NewOperation {
            id: op.id,
            account_id: op.account_id.clone(),
            cluster_name: op.cluster_name.clone(),
            operation_type: op.operation_type.clone(),
            created_at: op.created_at,
            created_by: op.created_by.clone(),
            updated_at: op.updated_at,
            state: op.state.as_str().to_string(),
            prev_config: op.prev_config.clone(),
            config: op.config.clone(),
        }
    }
}

impl TryFrom<OperationRecord> for UpdateConfigOperation {
    type Error = String;

    fn try_from(record: OperationRecord) -> Result<Self, Self::Error> {
        if record.operation_type != OPERATION_UPDATE_CONFIG {
            return Err(format!(
                "Operation {} has type {}, not {}",
                record.id, record.operation_type, OPERATION_UPDATE_CONFIG
            ));
        }
        Ok(UpdateConfigOperation {
            id: record.id,
            account_id: record.account_id,
            cluster_name: record.cluster_name,
            operation_type: record.operation_type,
            created_at: record.created_at,
            created_by: record.created_by,
            updated_at: record.updated_at,
            state: record.state.parse()?,
            prev_config: record.prev_config,
            config: record.config,
        })
    }
}

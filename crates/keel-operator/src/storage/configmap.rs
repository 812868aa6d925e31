/*
 * Copyright (c) 2025 Dylan Storey
 * Licensed under the Elastic License 2.0.
 * See LICENSE file in the project root for full license text.
 */

//! Cluster configuration stored as a YAML document inside a config map.

use super::{ClusterConfigStore, ConfigMapRef, ConfigObjectStore};
use crate::error::{Error, Result};
use async_trait::async_trait;
use keel_models::models::cluster_configuration::ClusterConfiguration;
use keel_models::models::clusters::ClusterKey;
use keel_utils::logging::prelude::*;
use std::fmt::Write;
use std::sync::Arc;

/// Longest data key a config map accepts.
const MAX_DATA_KEY_LENGTH: usize = 253;

/// Attempts at writing a document before a concurrent writer's conflict is
/// returned to the caller.
const UPDATE_ATTEMPTS: usize = 5;

/// [`ClusterConfigStore`] over any [`ConfigObjectStore`].
///
/// Every cluster's document lives under its own data key of the shared config
/// map, see [`data_key`]. A missing config map or data key reads as an empty
/// configuration.
pub struct ConfigMapClusterConfigStore {
    objects: Arc<dyn ConfigObjectStore>,
    config_map: ConfigMapRef,
}

impl ConfigMapClusterConfigStore {
    pub fn new(objects: Arc<dyn ConfigObjectStore>, config_map: ConfigMapRef) -> Self {
        Self {
            objects,
            config_map,
        }
    }
}

/// Data key holding a cluster's document: `<spec_key>.<account>.<cluster>`.
///
/// Bytes of the account and cluster name outside `[-a-zA-Z0-9]` are written
/// as `_xx` (lowercase hex), so two clusters never share a key.
pub fn data_key(spec_key: &str, key: &ClusterKey) -> Result<String> {
    let data_key = format!(
        "{}.{}.{}",
        spec_key,
        escape(&key.account_id),
        escape(&key.cluster_name)
    );
    if data_key.len() > MAX_DATA_KEY_LENGTH {
        return Err(Error::Validation(format!(
            "cluster {} does not fit a config map key ({} > {} characters)",
            key,
            data_key.len(),
            MAX_DATA_KEY_LENGTH
        )));
    }
    Ok(data_key)
}

fn escape(part: &str) -> String {
    let mut escaped = String::with_capacity(part.len());
    for byte in part.bytes() {
        if byte.is_ascii_alphanumeric() || byte == b'-' {
            escaped.push(byte as char);
        } else {
            let _ = write!(escaped, "_{:02x}", byte);
        }
    }
    escaped
}

fn document(bytes: Vec<u8>) -> Result<String> {
    String::from_utf8(bytes)
        .map_err(|e| Error::Storage(format!("configuration document is not UTF-8: {}", e)))
}

#[async_trait]
impl ClusterConfigStore for ConfigMapClusterConfigStore {
    async fn get_cluster_configuration(&self, key: &ClusterKey) -> Result<ClusterConfiguration> {
        let data_key = data_key(&self.config_map.spec_key, key)?;
        let object = self
            .objects
            .get_or_create(&self.config_map.name, &self.config_map.namespace)
            .await?;
        let spec = object
            .data
            .get(&data_key)
            .map(String::as_str)
            .unwrap_or_default();
        debug!(
            "Read configuration of cluster {} from config map {}/{} key {} ({} bytes)",
            key,
            self.config_map.namespace,
            self.config_map.name,
            data_key,
            spec.len()
        );
        Ok(ClusterConfiguration::unmarshal(spec.as_bytes())?)
    }

    async fn update_cluster_configuration(
        &self,
        key: &ClusterKey,
        config: &ClusterConfiguration,
    ) -> Result<()> {
        let data_key = data_key(&self.config_map.spec_key, key)?;
        let spec = document(config.marshal()?)?;

        let mut attempt = 1;
        loop {
            let mut object = self
                .objects
                .get_or_create(&self.config_map.name, &self.config_map.namespace)
                .await?;
            object.data.insert(data_key.clone(), spec.clone());
            match self.objects.update(&object).await {
                Ok(_) => break,
                // Another cluster's document changed in between, write on top of it
                Err(Error::Conflict(message)) if attempt < UPDATE_ATTEMPTS => {
                    debug!(
                        "Config map {}/{} changed while updating cluster {}, retrying: {}",
                        self.config_map.namespace, self.config_map.name, key, message
                    );
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
        info!(
            "Updated configuration of cluster {} in config map {}/{} key {}",
            key, self.config_map.namespace, self.config_map.name, data_key
        );
        Ok(())
    }
}

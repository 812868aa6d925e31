/*
 * Copyright (c) 2025 Dylan Storey
 * Licensed under the Elastic License 2.0.
 * See LICENSE file in the project root for full license text.
 */

use super::{api_error, with_retries};
use crate::error::Result;
use crate::storage::{ConfigObject, ConfigObjectStore};
use async_trait::async_trait;
use k8s_openapi::api::core::v1::ConfigMap;
use keel_utils::logging::prelude::*;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use kube::api::PostParams;
use kube::{Api, Client};

/// Config maps read and written through the Kubernetes API.
#[derive(Clone)]
pub struct KubeConfigObjectStore {
    client: Client,
}

impl KubeConfigObjectStore {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

pub(crate) fn to_config_map(object: &ConfigObject) -> ConfigMap {
    ConfigMap {
        metadata: ObjectMeta {
            name: Some(object.name.clone()),
            namespace: Some(object.namespace.clone()),
            resource_version: object.resource_version.clone(),
            ..Default::default()
        },
        data: Some(object.data.clone()),
        ..Default::default()
    }
}

pub(crate) fn from_config_map(config_map: ConfigMap, name: &str, namespace: &str) -> ConfigObject {
    ConfigObject {
        name: config_map.metadata.name.unwrap_or_else(|| name.to_string()),
        namespace: config_map
            .metadata
            .namespace
            .unwrap_or_else(|| namespace.to_string()),
        data: config_map.data.unwrap_or_default(),
        resource_version: config_map.metadata.resource_version,
    }
}

#[async_trait]
impl ConfigObjectStore for KubeConfigObjectStore {
    async fn get_or_create(&self, name: &str, namespace: &str) -> Result<ConfigObject> {
        let api: Api<ConfigMap> = Api::namespaced(self.client.clone(), namespace);
        let what = format!("config map {}/{}", namespace, name);

        if let Some(existing) = with_retries(|| api.get_opt(name))
            .await
            .map_err(|e| api_error(e, &what))?
        {
            return Ok(from_config_map(existing, name, namespace));
        }

        info!("Creating empty {}", what);
        let empty = to_config_map(&ConfigObject::empty(name, namespace));
        let params = PostParams::default();
        match with_retries(|| api.create(&params, &empty)).await {
            Ok(created) => Ok(from_config_map(created, name, namespace)),
            // Lost a creation race, read the winner's object
            Err(kube::Error::Api(response)) if response.code == 409 => {
                let existing = with_retries(|| api.get(name))
                    .await
                    .map_err(|e| api_error(e, &what))?;
                Ok(from_config_map(existing, name, namespace))
            }
            Err(e) => Err(api_error(e, &what)),
        }
    }

    async fn update(&self, object: &ConfigObject) -> Result<ConfigObject> {
        let api: Api<ConfigMap> = Api::namespaced(self.client.clone(), &object.namespace);
        let what = format!("config map {}/{}", object.namespace, object.name);
        let config_map = to_config_map(object);
        let params = PostParams::default();

        let replaced = with_retries(|| api.replace(&object.name, &params, &config_map))
            .await
            .map_err(|e| api_error(e, &what))?;
        debug!("Replaced {}", what);
        Ok(from_config_map(replaced, &object.name, &object.namespace))
    }
}

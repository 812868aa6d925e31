/*
 * Copyright (c) 2025 Dylan Storey
 * Licensed under the Elastic License 2.0.
 * See LICENSE file in the project root for full license text.
 */

//! # Cluster Configuration
//!
//! The cluster-wide configuration document and its merge engine.
//!
//! A configuration is a versioned resource serialized as YAML:
//!
//! ```yaml
//! kind: ClusterConfiguration
//! version: v1
//! spec:
//!   global:
//!     serviceCIDR: 10.100.0.0/16
//!     featureGates:
//!       PodPriority: true
//!   kubelet:
//!     extraArgs: ["--max-pods=200"]
//!   controllerService:
//!     type: LoadBalancer
//!     ports:
//!       - name: web
//!         port: 3009
//! ```
//!
//! Every leaf is optional. A partially populated document is a *patch*:
//! [`ClusterConfiguration::merge`] replaces every leaf set in the patch and keeps
//! every other leaf of the existing document. Map and list leaves
//! (`featureGates`, `annotations`, `kubelet.config`, `extraArgs`, `ports`) are
//! replaced as a whole.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

/// Resource kind of a cluster configuration document.
pub const KIND_CLUSTER_CONFIGURATION: &str = "ClusterConfiguration";
/// The only supported resource version.
pub const VERSION_V1: &str = "v1";

/// Errors produced while (de)serializing a configuration document.
#[derive(Debug, Error)]
pub enum ConfigurationError {
    #[error("failed to decode cluster configuration: {0}")]
    Decode(#[source] serde_yaml::Error),
    #[error("failed to encode cluster configuration: {0}")]
    Encode(#[source] serde_yaml::Error),
    #[error("unsupported resource kind {0:?}, expected {KIND_CLUSTER_CONFIGURATION:?}")]
    UnsupportedKind(String),
    #[error("unsupported resource version {0:?}, expected {VERSION_V1:?}")]
    UnsupportedVersion(String),
}

/// Cluster-wide configuration document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ClusterConfiguration {
    #[serde(default = "default_kind")]
    pub kind: String,
    #[serde(default = "default_version")]
    pub version: String,
    #[serde(default)]
    pub spec: ClusterConfigurationSpec,
}

fn default_kind() -> String {
    KIND_CLUSTER_CONFIGURATION.to_string()
}

fn default_version() -> String {
    VERSION_V1.to_string()
}

impl Default for ClusterConfiguration {
    fn default() -> Self {
        Self {
            kind: default_kind(),
            version: default_version(),
            spec: ClusterConfigurationSpec::default(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ClusterConfigurationSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub global: Option<Global>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kubelet: Option<Kubelet>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub controller_service: Option<ControllerService>,
}

/// Cluster-global settings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct Global {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cloud_provider: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cloud_config: Option<String>,
    #[serde(rename = "serviceCIDR", default, skip_serializing_if = "Option::is_none")]
    pub service_cidr: Option<String>,
    #[serde(rename = "podCIDR", default, skip_serializing_if = "Option::is_none")]
    pub pod_cidr: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pod_subnet_size: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service_node_port_range: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub proxy_port_range: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub high_availability: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub flannel_backend: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub feature_gates: Option<BTreeMap<String, bool>>,
}

/// Kubelet component settings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct Kubelet {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extra_args: Option<Vec<String>>,
    /// Free-form kubelet configuration passed through verbatim.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config: Option<serde_json::Value>,
}

/// Settings of the service fronting the cluster controller.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ControllerService {
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub service_type: Option<ServiceType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub annotations: Option<BTreeMap<String, String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ports: Option<Vec<ServicePort>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ServiceType {
    ClusterIP,
    NodePort,
    LoadBalancer,
}

impl ServiceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ServiceType::ClusterIP => "ClusterIP",
            ServiceType::NodePort => "NodePort",
            ServiceType::LoadBalancer => "LoadBalancer",
        }
    }
}

impl std::str::FromStr for ServiceType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ClusterIP" => Ok(ServiceType::ClusterIP),
            "NodePort" => Ok(ServiceType::NodePort),
            "LoadBalancer" => Ok(ServiceType::LoadBalancer),
            other => Err(format!("Unsupported service type: {}", other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ServicePort {
    pub name: String,
    pub port: i32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub node_port: Option<i32>,
}

/// Incoming value wins when set.
fn pick<T: Clone>(existing: &Option<T>, incoming: &Option<T>) -> Option<T> {
    incoming.clone().or_else(|| existing.clone())
}

/// Merges two optional sections leaf by leaf.
fn merge_section<T: Clone>(
    existing: &Option<T>,
    incoming: &Option<T>,
    merge: impl Fn(&T, &T) -> T,
) -> Option<T> {
    match (existing, incoming) {
        (Some(existing), Some(incoming)) => Some(merge(existing, incoming)),
        (None, Some(incoming)) => Some(incoming.clone()),
        (existing, None) => existing.clone(),
    }
}

impl ClusterConfiguration {
    /// Returns a new configuration with every setting of `incoming` applied on
    /// top of `self`. Neither input is modified.
    pub fn merge(&self, incoming: &ClusterConfiguration) -> ClusterConfiguration {
        ClusterConfiguration {
            kind: self.kind.clone(),
            version: self.version.clone(),
            spec: self.spec.merge(&incoming.spec),
        }
    }

    /// Serializes the configuration as a YAML document.
    pub fn marshal(&self) -> Result<Vec<u8>, ConfigurationError> {
        serde_yaml::to_string(self)
            .map(String::into_bytes)
            .map_err(ConfigurationError::Encode)
    }

    /// Parses a YAML document. Blank input is an empty configuration.
    pub fn unmarshal(data: &[u8]) -> Result<ClusterConfiguration, ConfigurationError> {
        if data.iter().all(u8::is_ascii_whitespace) {
            return Ok(ClusterConfiguration::default());
        }
        let config: ClusterConfiguration =
            serde_yaml::from_slice(data).map_err(ConfigurationError::Decode)?;
        if config.kind != KIND_CLUSTER_CONFIGURATION {
            return Err(ConfigurationError::UnsupportedKind(config.kind));
        }
        if config.version != VERSION_V1 {
            return Err(ConfigurationError::UnsupportedVersion(config.version));
        }
        Ok(config)
    }
}

impl ClusterConfigurationSpec {
    pub fn merge(&self, incoming: &ClusterConfigurationSpec) -> ClusterConfigurationSpec {
        ClusterConfigurationSpec {
            global: merge_section(&self.global, &incoming.global, Global::merge),
            kubelet: merge_section(&self.kubelet, &incoming.kubelet, Kubelet::merge),
            controller_service: merge_section(
                &self.controller_service,
                &incoming.controller_service,
                ControllerService::merge,
            ),
        }
    }
}

impl Global {
    pub fn merge(&self, incoming: &Global) -> Global {
        Global {
            cloud_provider: pick(&self.cloud_provider, &incoming.cloud_provider),
            cloud_config: pick(&self.cloud_config, &incoming.cloud_config),
            service_cidr: pick(&self.service_cidr, &incoming.service_cidr),
            pod_cidr: pick(&self.pod_cidr, &incoming.pod_cidr),
            pod_subnet_size: pick(&self.pod_subnet_size, &incoming.pod_subnet_size),
            service_node_port_range: pick(
                &self.service_node_port_range,
                &incoming.service_node_port_range,
            ),
            proxy_port_range: pick(&self.proxy_port_range, &incoming.proxy_port_range),
            high_availability: pick(&self.high_availability, &incoming.high_availability),
            flannel_backend: pick(&self.flannel_backend, &incoming.flannel_backend),
            feature_gates: pick(&self.feature_gates, &incoming.feature_gates),
        }
    }
}

impl Kubelet {
    pub fn merge(&self, incoming: &Kubelet) -> Kubelet {
        Kubelet {
            extra_args: pick(&self.extra_args, &incoming.extra_args),
            config: pick(&self.config, &incoming.config),
        }
    }
}

impl ControllerService {
    pub fn merge(&self, incoming: &ControllerService) -> ControllerService {
        ControllerService {
            service_type: pick(&self.service_type, &incoming.service_type),
            annotations: pick(&self.annotations, &incoming.annotations),
            ports: pick(&self.ports, &incoming.ports),
        }
    }
}

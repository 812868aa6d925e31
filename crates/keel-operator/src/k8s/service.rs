/*
 * Copyright (c) 2025 Dylan Storey
 * Licensed under the Elastic License 2.0.
 * See LICENSE file in the project root for full license text.
 */

use super::{api_error, with_retries};
use crate::error::Result;
use crate::storage::{RenderedService, ServiceConfigurator, ServiceRef};
use async_trait::async_trait;
use k8s_openapi::api::core::v1::Service;
use keel_models::models::cluster_configuration::{ServicePort, ServiceType};
use keel_utils::logging::prelude::*;
use kube::api::{Patch, PatchParams};
use kube::{Api, Client};

/// Field manager owning the fields the operator applies.
pub const FIELD_MANAGER: &str = "keel-operator";

/// Applies the controller service with server-side apply.
#[derive(Clone)]
pub struct KubeServiceConfigurator {
    client: Client,
}

impl KubeServiceConfigurator {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

/// Builds the apply patch for a rendered service. Only the fields owned by
/// the operator are included.
pub fn service_manifest(service: &RenderedService) -> serde_json::Value {
    let ports = service
        .ports
        .iter()
        .map(|port| {
            let mut value = serde_json::json!({
                "name": port.name,
                "port": port.port,
                "protocol": "TCP",
            });
            if let Some(node_port) = port.node_port {
                value["nodePort"] = node_port.into();
            }
            value
        })
        .collect::<Vec<_>>();

    serde_json::json!({
        "apiVersion": "v1",
        "kind": "Service",
        "metadata": {
            "name": service.name,
            "namespace": service.namespace,
            "annotations": service.annotations,
        },
        "spec": {
            "type": service.service_type.as_str(),
            "ports": ports,
        },
    })
}

fn observed_service(service: &ServiceRef, observed: Service) -> Option<RenderedService> {
    let spec = observed.spec.unwrap_or_default();
    let service_type = match spec.type_.as_deref().unwrap_or("ClusterIP").parse::<ServiceType>() {
        Ok(service_type) => service_type,
        Err(e) => {
            warn!("Ignoring service {}/{}: {}", service.namespace, service.name, e);
            return None;
        }
    };
    Some(RenderedService {
        name: service.name.clone(),
        namespace: service.namespace.clone(),
        service_type,
        annotations: observed.metadata.annotations.unwrap_or_default(),
        ports: spec
            .ports
            .unwrap_or_default()
            .into_iter()
            .map(|port| ServicePort {
                name: port.name.unwrap_or_default(),
                port: port.port,
                node_port: port.node_port,
            })
            .collect(),
    })
}

#[async_trait]
impl ServiceConfigurator for KubeServiceConfigurator {
    async fn get_service(&self, service: &ServiceRef) -> Result<Option<RenderedService>> {
        let api: Api<Service> = Api::namespaced(self.client.clone(), &service.namespace);
        let what = format!("service {}/{}", service.namespace, service.name);
        let observed = with_retries(|| api.get_opt(&service.name))
            .await
            .map_err(|e| api_error(e, &what))?;
        Ok(observed.and_then(|observed| observed_service(service, observed)))
    }

    async fn apply_service(&self, service: &RenderedService) -> Result<()> {
        let api: Api<Service> = Api::namespaced(self.client.clone(), &service.namespace);
        let what = format!("service {}/{}", service.namespace, service.name);
        let manifest = service_manifest(service);
        let params = PatchParams::apply(FIELD_MANAGER).force();
        let patch = Patch::Apply(&manifest);

        with_retries(|| api.patch(&service.name, &params, &patch))
            .await
            .map_err(|e| api_error(e, &what))?;
        info!("Applied {} as {}", what, service.service_type.as_str());
        Ok(())
    }
}

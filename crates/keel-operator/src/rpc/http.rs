/*
 * Copyright (c) 2025 Dylan Storey
 * Licensed under the Elastic License 2.0.
 * See LICENSE file in the project root for full license text.
 */

//! Agent clients speaking plain HTTP.
//!
//! Dialing probes `GET /healthz` on the agent. The version query is
//! `GET /version`, answered with `{"version": "..."}`. Agents without the
//! endpoint answer 404 or 501, which reads as [`VersionQuery::Unsupported`].

use super::{AgentClient, AgentRepository, RpcError, Version, VersionQuery};
use async_trait::async_trait;
use keel_utils::logging::prelude::*;
use reqwest::StatusCode;
use url::Url;

pub struct HttpAgentRepository {
    client: reqwest::Client,
    port: u16,
}

impl HttpAgentRepository {
    /// Creates a repository for agents listening on `port`.
    pub fn new(port: u16) -> Self {
        Self {
            client: reqwest::Client::new(),
            port,
        }
    }

    fn base_url(&self, address: &str) -> Result<Url, RpcError> {
        let host = if address.contains(':') && !address.starts_with('[') {
            format!("[{}]", address)
        } else {
            address.to_string()
        };
        Url::parse(&format!("http://{}:{}", host, self.port))
            .map_err(|e| RpcError::Unavailable(format!("invalid agent address {}: {}", address, e)))
    }
}

#[async_trait]
impl AgentRepository for HttpAgentRepository {
    async fn get_client(&self, address: &str) -> Result<Box<dyn AgentClient>, RpcError> {
        let base_url = self.base_url(address)?;
        let health_url = base_url
            .join("healthz")
            .map_err(|e| RpcError::Unavailable(e.to_string()))?;

        let response = self
            .client
            .get(health_url)
            .send()
            .await
            .map_err(|e| RpcError::Unavailable(e.to_string()))?;
        if !response.status().is_success() {
            return Err(RpcError::Unavailable(format!(
                "agent at {} is unhealthy: {}",
                address,
                response.status()
            )));
        }

        Ok(Box::new(HttpAgentClient {
            client: self.client.clone(),
            base_url,
        }))
    }
}

pub struct HttpAgentClient {
    client: reqwest::Client,
    base_url: Url,
}

#[async_trait]
impl AgentClient for HttpAgentClient {
    async fn get_version(&self) -> VersionQuery {
        let url = match self.base_url.join("version") {
            Ok(url) => url,
            Err(e) => return VersionQuery::Failed(RpcError::Transport(e.to_string())),
        };
        let response = match self.client.get(url).send().await {
            Ok(response) => response,
            Err(e) => return VersionQuery::Failed(RpcError::Transport(e.to_string())),
        };

        match response.status() {
            StatusCode::NOT_FOUND | StatusCode::NOT_IMPLEMENTED => VersionQuery::Unsupported,
            status if status.is_success() => match response.json::<Version>().await {
                Ok(version) => VersionQuery::Reported(version),
                Err(e) => VersionQuery::Failed(RpcError::Transport(format!(
                    "malformed version response: {}",
                    e
                ))),
            },
            status => VersionQuery::Failed(RpcError::Transport(format!(
                "version query returned {}",
                status
            ))),
        }
    }

    async fn close(&self) {
        // Connections are pooled by the shared reqwest client
        trace!("Released agent client for {}", self.base_url);
    }
}

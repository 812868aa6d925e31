/*
 * Copyright (c) 2025 Dylan Storey
 * Licensed under the Elastic License 2.0.
 * See LICENSE file in the project root for full license text.
 */

//! # Kubernetes Module
//!
//! Kubernetes-backed storage collaborators:
//!
//! - [`KubeConfigObjectStore`]: get-or-create and update of config maps
//! - [`KubeServiceConfigurator`]: server-side apply of the controller service
//!
//! Transient API failures (429, 500, 503, 504) are retried with exponential
//! backoff. Everything else is returned to the caller.

mod config_map;
mod service;

pub use config_map::KubeConfigObjectStore;
pub use service::{service_manifest, KubeServiceConfigurator, FIELD_MANAGER};

use crate::error::{Error, Result};
use backoff::ExponentialBackoffBuilder;
use keel_utils::logging::prelude::*;
use kube::config::{KubeConfigOptions, Kubeconfig};
use kube::{Client, Config, Error as KubeError};
use std::time::Duration;

/// Retry configuration for Kubernetes operations
struct RetryConfig {
    max_elapsed_time: Duration,
    initial_interval: Duration,
    max_interval: Duration,
    multiplier: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_elapsed_time: Duration::from_secs(60),
            initial_interval: Duration::from_millis(500),
            max_interval: Duration::from_secs(10),
            multiplier: 2.0,
        }
    }
}

/// Determines if a Kubernetes error is retryable
fn is_retryable_error(error: &KubeError) -> bool {
    match error {
        KubeError::Api(api_err) => {
            matches!(api_err.code, 429 | 500 | 503 | 504)
                || matches!(
                    api_err.reason.as_str(),
                    "ServiceUnavailable" | "InternalError" | "Timeout"
                )
        }
        _ => false,
    }
}

/// Executes a Kubernetes operation with retries
async fn with_retries<F, Fut, T>(operation: F) -> std::result::Result<T, KubeError>
where
    F: Fn() -> Fut,
    Fut: std::future::Future<Output = std::result::Result<T, KubeError>>,
{
    let config = RetryConfig::default();
    let backoff = ExponentialBackoffBuilder::new()
        .with_initial_interval(config.initial_interval)
        .with_max_interval(config.max_interval)
        .with_multiplier(config.multiplier)
        .with_max_elapsed_time(Some(config.max_elapsed_time))
        .build();

    let operation_with_backoff = || async {
        match operation().await {
            Ok(value) => Ok(value),
            Err(error) if is_retryable_error(&error) => {
                warn!("Retryable Kubernetes API error: {}", error);
                Err(backoff::Error::Transient {
                    err: error,
                    retry_after: None,
                })
            }
            Err(error) => Err(backoff::Error::Permanent(error)),
        }
    };

    backoff::future::retry(backoff, operation_with_backoff).await
}

/// Maps API status codes onto the operator's error kinds.
fn api_error(error: KubeError, what: &str) -> Error {
    match &error {
        KubeError::Api(response) if response.code == 404 => {
            Error::NotFound(format!("{} not found", what))
        }
        KubeError::Api(response) if response.code == 409 => {
            Error::Conflict(format!("{}: {}", what, response.message))
        }
        _ => Error::Kube(error),
    }
}

/// Creates a Kubernetes client from a kubeconfig file, or from the in-cluster
/// environment when no path is given.
pub async fn create_client(kubeconfig_path: Option<&str>) -> Result<Client> {
    let config = match kubeconfig_path {
        Some(path) => {
            let kubeconfig = Kubeconfig::read_from(path)
                .map_err(|e| Error::Storage(format!("failed to read kubeconfig {}: {}", path, e)))?;
            Config::from_custom_kubeconfig(kubeconfig, &KubeConfigOptions::default())
                .await
                .map_err(|e| Error::Storage(format!("invalid kubeconfig {}: {}", path, e)))?
        }
        None => Config::infer()
            .await
            .map_err(|e| Error::Storage(format!("failed to infer Kubernetes config: {}", e)))?,
    };
    info!("Connecting to Kubernetes API at {}", config.cluster_url);
    Ok(Client::try_from(config)?)
}

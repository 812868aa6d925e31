/*
 * Copyright (c) 2025 Dylan Storey
 * Licensed under the Elastic License 2.0.
 * See LICENSE file in the project root for full license text.
 */

//! # Keel Config Module
//! Common configuration framework for the keel crates.
//!
//! # Variable Naming Convention
//!
//! - Struct fields use snake_case (e.g., `database`, `dial_timeout_ms`)
//! - Environment variables use SCREAMING_SNAKE_CASE and are prefixed with "KEEL__"
//!   (e.g., `KEEL__AGENT__DIAL_TIMEOUT_MS`)
//! - Configuration file keys use snake_case (e.g., `agent.dial_timeout_ms`)
//!
//! # Configuration Overriding
//!
//! Values are loaded in the following order (later sources take precedence):
//!
//! 1. Default values from the embedded `default.toml` file
//! 2. Values from an optional external configuration file (if provided)
//! 3. Environment variables
//!
//! # Available Environment Variables
//!
//! - `KEEL__LOG__LEVEL`: "trace", "debug", "info", "warn", "error" (default "info")
//! - `KEEL__LOG__FORMAT`: "text" or "json" (default "text")
//! - `KEEL__OPERATOR__LISTEN_ADDR`: HTTP listen address (default "0.0.0.0:3100")
//! - `KEEL__OPERATOR__STORAGE`: "memory" or "postgres" (default "memory")
//! - `KEEL__DATABASE__URL`: PostgreSQL connection URL
//! - `KEEL__DATABASE__SCHEMA`: optional PostgreSQL schema
//! - `KEEL__AGENT__PORT`: port the node agents listen on (default 3012)
//! - `KEEL__AGENT__DIAL_TIMEOUT_MS`: agent dial timeout (default 5000)
//! - `KEEL__AGENT__REQUEST_TIMEOUT_MS`: agent request timeout (default 5000)
//! - `KEEL__KUBERNETES__ENABLED`: back configuration with the cluster's config map
//! - `KEEL__KUBERNETES__KUBECONFIG_PATH`: optional kubeconfig path
//! - `KEEL__TELEMETRY__ENABLED`: export traces over OTLP

use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::time::Duration;

// Include the default settings file as a string constant
const DEFAULT_SETTINGS: &str = include_str!("../default.toml");

/// Represents the main settings structure for the application
#[derive(Debug, Deserialize, Clone)]
pub struct Settings {
    /// Logging configuration
    pub log: Log,
    /// Operator service configuration
    pub operator: Operator,
    /// Database configuration
    pub database: Database,
    /// Node agent configuration
    pub agent: Agent,
    /// Kubernetes configuration
    pub kubernetes: Kubernetes,
    /// Telemetry configuration
    pub telemetry: Telemetry,
}

/// Represents the logging configuration
#[derive(Debug, Deserialize, Clone)]
pub struct Log {
    /// Log level (e.g., "info", "debug", "warn", "error")
    pub level: String,
    /// Log format: "text" for human-readable, "json" for structured JSON
    #[serde(default = "default_log_format")]
    pub format: String,
}

fn default_log_format() -> String {
    "text".to_string()
}

/// Storage backend for the cluster inventory and the operation ledger
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    Memory,
    Postgres,
}

/// Represents the operator service configuration
#[derive(Debug, Deserialize, Clone)]
pub struct Operator {
    /// Address the HTTP API binds to
    pub listen_addr: String,
    /// Storage backend
    pub storage: StorageBackend,
}

/// Represents the database configuration
#[derive(Debug, Deserialize, Clone)]
pub struct Database {
    /// Database connection URL
    pub url: String,
    /// Optional schema name for multi-tenant isolation
    pub schema: Option<String>,
}

/// Represents the node agent configuration
#[derive(Debug, Deserialize, Clone)]
pub struct Agent {
    /// Port the agents serve their RPC surface on
    pub port: u16,
    /// Timeout for obtaining an agent client, in milliseconds
    pub dial_timeout_ms: u64,
    /// Timeout for a single agent request, in milliseconds
    pub request_timeout_ms: u64,
}

impl Agent {
    pub fn dial_timeout(&self) -> Duration {
        Duration::from_millis(self.dial_timeout_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

/// Represents the Kubernetes configuration
#[derive(Debug, Deserialize, Clone)]
pub struct Kubernetes {
    /// Whether cluster configuration is backed by the in-cluster config map
    pub enabled: bool,
    /// Kubeconfig path; in-cluster configuration is used when unset
    pub kubeconfig_path: Option<String>,
    /// Name of the config map holding the cluster configuration
    pub config_map_name: String,
    /// Namespace of the config map holding the cluster configuration
    pub config_map_namespace: String,
    /// Prefix of the per-cluster data keys holding serialized configurations
    pub config_map_spec_key: String,
    /// Name of the controller service rendered from the configuration
    pub service_name: String,
    /// Namespace of the controller service
    pub service_namespace: String,
}

/// Represents the telemetry (OpenTelemetry) configuration
#[derive(Debug, Deserialize, Clone)]
pub struct Telemetry {
    /// Whether telemetry is enabled
    #[serde(default)]
    pub enabled: bool,
    /// OTLP endpoint for trace export (gRPC)
    #[serde(default = "default_otlp_endpoint")]
    pub otlp_endpoint: String,
    /// Service name for traces
    #[serde(default = "default_service_name")]
    pub service_name: String,
    /// Sampling rate (0.0 to 1.0)
    #[serde(default = "default_sampling_rate")]
    pub sampling_rate: f64,
}

/// Resolved telemetry configuration handed to `telemetry::init`
#[derive(Debug, Clone)]
pub struct ResolvedTelemetry {
    pub enabled: bool,
    pub otlp_endpoint: String,
    pub service_name: String,
    pub sampling_rate: f64,
}

impl Telemetry {
    /// Resolves the telemetry settings, clamping the sampling rate into [0, 1].
    pub fn resolve(&self) -> ResolvedTelemetry {
        ResolvedTelemetry {
            enabled: self.enabled,
            otlp_endpoint: self.otlp_endpoint.clone(),
            service_name: self.service_name.clone(),
            sampling_rate: self.sampling_rate.clamp(0.0, 1.0),
        }
    }
}

fn default_otlp_endpoint() -> String {
    "http://localhost:4317".to_string()
}

fn default_service_name() -> String {
    "keel-operator".to_string()
}

fn default_sampling_rate() -> f64 {
    0.1
}

impl Settings {
    /// Creates a new `Settings` instance
    ///
    /// # Arguments
    ///
    /// * `file` - An optional path to a configuration file
    ///
    /// # Returns
    ///
    /// Returns a `Result` containing the `Settings` instance or a `ConfigError`
    pub fn new(file: Option<String>) -> Result<Self, ConfigError> {
        let mut s = Config::builder()
            .add_source(File::from_str(DEFAULT_SETTINGS, config::FileFormat::Toml));

        s = match file {
            Some(x) => s.add_source(File::with_name(x.as_str())),
            None => s,
        };

        // Environment variables, prefixed with "KEEL" and using "__" as a separator
        s = s.add_source(Environment::with_prefix("KEEL").separator("__"));

        s.build()?.try_deserialize()
    }
}

/*
 * Copyright (c) 2025 Dylan Storey
 * Licensed under the Elastic License 2.0.
 * See LICENSE file in the project root for full license text.
 */

//! # Metrics Module
//!
//! Prometheus metrics for the keel operator: configuration operations, service
//! re-rendering and agent status collection.

use prometheus::{
    CounterVec, Encoder, Histogram, HistogramOpts, IntCounter, Opts, Registry, TextEncoder,
};
use std::sync::OnceLock;

/// Global Prometheus registry for all operator metrics
static REGISTRY: OnceLock<Registry> = OnceLock::new();

fn registry() -> &'static Registry {
    REGISTRY.get_or_init(Registry::new)
}

/// Update-config operation requests
/// Labels: result (created/invalid/not_found/conflict/error)
pub fn update_config_operations_total() -> &'static CounterVec {
    static COUNTER: OnceLock<CounterVec> = OnceLock::new();
    COUNTER.get_or_init(|| {
        let opts = Opts::new(
            "keel_update_config_operations_total",
            "Total number of update-config operation requests by result",
        );
        let counter = CounterVec::new(opts, &["result"])
            .expect("Failed to create update-config operations counter");
        registry()
            .register(Box::new(counter.clone()))
            .expect("Failed to register update-config operations counter");
        counter
    })
}

/// Controller service applies
pub fn service_applies_total() -> &'static IntCounter {
    static COUNTER: OnceLock<IntCounter> = OnceLock::new();
    COUNTER.get_or_init(|| {
        let counter = IntCounter::new(
            "keel_service_applies_total",
            "Total number of controller service applies",
        )
        .expect("Failed to create service applies counter");
        registry()
            .register(Box::new(counter.clone()))
            .expect("Failed to register service applies counter");
        counter
    })
}

/// Agent status results
/// Labels: status (Deployed/Offline)
pub fn agent_status_total() -> &'static CounterVec {
    static COUNTER: OnceLock<CounterVec> = OnceLock::new();
    COUNTER.get_or_init(|| {
        let opts = Opts::new(
            "keel_agent_status_total",
            "Total number of agent status results by status",
        );
        let counter =
            CounterVec::new(opts, &["status"]).expect("Failed to create agent status counter");
        registry()
            .register(Box::new(counter.clone()))
            .expect("Failed to register agent status counter");
        counter
    })
}

/// Wall-clock duration of one fleet status collection
pub fn agent_status_collection_duration_seconds() -> &'static Histogram {
    static HISTOGRAM: OnceLock<Histogram> = OnceLock::new();
    HISTOGRAM.get_or_init(|| {
        let opts = HistogramOpts::new(
            "keel_agent_status_collection_duration_seconds",
            "Agent status collection latency distribution in seconds",
        )
        .buckets(vec![0.01, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0]);
        let histogram = Histogram::with_opts(opts)
            .expect("Failed to create status collection duration histogram");
        registry()
            .register(Box::new(histogram.clone()))
            .expect("Failed to register status collection duration histogram");
        histogram
    })
}

/// Encodes all registered metrics in Prometheus text format
pub fn encode_metrics() -> Result<String, prometheus::Error> {
    // Touch every metric so the exposition lists them before first use
    let _ = update_config_operations_total();
    let _ = service_applies_total();
    let _ = agent_status_total();
    let _ = agent_status_collection_duration_seconds();

    let encoder = TextEncoder::new();
    let mut buffer = vec![];
    encoder.encode(&registry().gather(), &mut buffer)?;
    Ok(String::from_utf8_lossy(&buffer).into_owned())
}

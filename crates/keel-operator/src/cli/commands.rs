/*
 * Copyright (c) 2025 Dylan Storey
 * Licensed under the Elastic License 2.0.
 * See LICENSE file in the project root for full license text.
 */

use crate::api;
use crate::dal::DAL;
use crate::db::create_shared_connection_pool;
use crate::k8s::{self, KubeConfigObjectStore, KubeServiceConfigurator};
use crate::ops::{Collaborators, Operator};
use crate::rpc::http::HttpAgentRepository;
use crate::rpc::status::{collect_agent_status_with_timeouts, StatusTimeouts};
use crate::storage::configmap::ConfigMapClusterConfigStore;
use crate::storage::memory::{
    MemoryClusterStore, MemoryConfigObjectStore, MemoryServiceConfigurator,
};
use crate::storage::{
    ClusterStore, ConfigMapRef, ConfigObjectStore, OperationLedger, ServiceConfigurator,
    ServiceRef,
};
use keel_models::models::clusters::Server;
use keel_utils::config::{Settings, StorageBackend};
use keel_utils::logging::prelude::*;
use std::sync::Arc;
use tokio::signal;
use tokio_util::sync::CancellationToken;

/// Connections kept by the operator's database pool
const DATABASE_POOL_SIZE: u32 = 5;

/// Wires the operator's collaborators from settings.
pub async fn build_operator(settings: &Settings) -> Result<Operator, Box<dyn std::error::Error>> {
    let (clusters, ledger): (Arc<dyn ClusterStore>, Arc<dyn OperationLedger>) =
        match settings.operator.storage {
            StorageBackend::Memory => {
                info!("Using in-memory cluster inventory and operation ledger");
                let store = Arc::new(MemoryClusterStore::new());
                let clusters: Arc<dyn ClusterStore> = store.clone();
                let ledger: Arc<dyn OperationLedger> = store;
                (clusters, ledger)
            }
            StorageBackend::Postgres => {
                info!("Creating database connection pool");
                let pool = create_shared_connection_pool(
                    &settings.database.url,
                    DATABASE_POOL_SIZE,
                    settings.database.schema.as_deref(),
                )?;
                pool.setup_schema()?;
                pool.run_migrations()?;
                let dal = Arc::new(DAL::new(pool));
                let clusters: Arc<dyn ClusterStore> = dal.clone();
                let ledger: Arc<dyn OperationLedger> = dal;
                (clusters, ledger)
            }
        };

    let (objects, services): (Arc<dyn ConfigObjectStore>, Arc<dyn ServiceConfigurator>) =
        if settings.kubernetes.enabled {
            let client = k8s::create_client(settings.kubernetes.kubeconfig_path.as_deref()).await?;
            let objects: Arc<dyn ConfigObjectStore> =
                Arc::new(KubeConfigObjectStore::new(client.clone()));
            let services: Arc<dyn ServiceConfigurator> =
                Arc::new(KubeServiceConfigurator::new(client));
            (objects, services)
        } else {
            info!("Kubernetes disabled, keeping configuration in memory");
            let objects: Arc<dyn ConfigObjectStore> = Arc::new(MemoryConfigObjectStore::new());
            let services: Arc<dyn ServiceConfigurator> =
                Arc::new(MemoryServiceConfigurator::new());
            (objects, services)
        };

    let configs = Arc::new(ConfigMapClusterConfigStore::new(
        objects,
        ConfigMapRef::from(&settings.kubernetes),
    ));
    let agents = Arc::new(HttpAgentRepository::new(settings.agent.port));

    Ok(Operator::new(
        Collaborators {
            clusters,
            configs,
            ledger,
            services,
            agents,
        },
        ServiceRef::from(&settings.kubernetes),
        StatusTimeouts::from(&settings.agent),
    ))
}

/// Starts the operator API server and runs it until ctrl+c.
pub async fn serve(settings: &Settings) -> Result<(), Box<dyn std::error::Error>> {
    info!("Starting Keel Operator");
    let operator = build_operator(settings).await?;

    info!("Configuring API routes");
    let app = api::configure_api_routes(operator);

    let addr = &settings.operator.listen_addr;
    info!("Starting server on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;

    info!("Keel Operator is now running");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    info!("Keel Operator stopped");
    Ok(())
}

async fn shutdown_signal() {
    wait_for_signal(signal::ctrl_c()).await
}

/// Resolves once `signal` fires. Never resolves when the handler could not be
/// installed, so the server keeps running.
async fn wait_for_signal<F>(signal: F)
where
    F: std::future::Future<Output = std::io::Result<()>>,
{
    if let Err(e) = signal.await {
        error!("Failed to listen for ctrl+c: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Received shutdown signal, draining connections");
}

/// Queries the agents of `servers`, prints the status table and returns
/// whether every agent is active.
pub async fn agent_status(
    settings: &Settings,
    servers: Vec<Server>,
    port: Option<u16>,
) -> Result<bool, Box<dyn std::error::Error>> {
    let port = port.unwrap_or(settings.agent.port);
    let agents = Arc::new(HttpAgentRepository::new(port));

    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, canceling agent queries");
            on_interrupt.cancel();
        }
    });

    let statuses = collect_agent_status_with_timeouts(
        &cancel,
        &servers,
        agents,
        StatusTimeouts::from(&settings.agent),
    )
    .await;
    println!("{}", statuses);
    Ok(statuses.agents_active())
}

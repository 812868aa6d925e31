/*
 * Copyright (c) 2025 Dylan Storey
 * Licensed under the Elastic License 2.0.
 * See LICENSE file in the project root for full license text.
 */

use async_trait::async_trait;
use keel_models::models::clusters::{ClusterKey, Server};
use keel_operator::ops::{Collaborators, Operator, RegisterClusterRequest};
use keel_operator::rpc::status::StatusTimeouts;
use keel_operator::rpc::{AgentClient, AgentRepository, RpcError, Version, VersionQuery};
use keel_operator::storage::configmap::ConfigMapClusterConfigStore;
use keel_operator::storage::memory::{
    MemoryClusterStore, MemoryConfigObjectStore, MemoryServiceConfigurator,
};
use keel_operator::storage::{ConfigMapRef, OperationLedger, ServiceRef};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// How a fake agent answers.
#[derive(Debug, Clone)]
pub enum Behavior {
    Healthy(&'static str),
    /// Answers the version query with "not implemented"
    Unsupported,
    DialHang,
    DialError,
    QueryHang,
    QueryError,
    /// The status query panics while dialing
    Panic,
    /// Reports the version but never finishes releasing the client
    CloseHang(&'static str),
}

/// Agents keyed by address. Unknown addresses fail to dial.
#[derive(Default)]
pub struct FakeAgentRepository {
    behaviors: HashMap<String, Behavior>,
    closed: Arc<AtomicUsize>,
}

impl FakeAgentRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_agent(mut self, address: &str, behavior: Behavior) -> Self {
        self.behaviors.insert(address.to_string(), behavior);
        self
    }

    /// Number of clients closed so far.
    pub fn closed(&self) -> usize {
        self.closed.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl AgentRepository for FakeAgentRepository {
    async fn get_client(&self, address: &str) -> Result<Box<dyn AgentClient>, RpcError> {
        match self.behaviors.get(address) {
            None | Some(Behavior::DialError) => Err(RpcError::Unavailable(format!(
                "connection refused: {}",
                address
            ))),
            Some(Behavior::DialHang) => std::future::pending().await,
            Some(Behavior::Panic) => panic!("agent repository crashed"),
            Some(behavior) => Ok(Box::new(FakeAgentClient {
                behavior: behavior.clone(),
                closed: self.closed.clone(),
            })),
        }
    }
}

struct FakeAgentClient {
    behavior: Behavior,
    closed: Arc<AtomicUsize>,
}

#[async_trait]
impl AgentClient for FakeAgentClient {
    async fn get_version(&self) -> VersionQuery {
        match self.behavior {
            Behavior::Healthy(version) | Behavior::CloseHang(version) => {
                VersionQuery::Reported(Version {
                    version: version.to_string(),
                })
            }
            Behavior::Unsupported => VersionQuery::Unsupported,
            Behavior::QueryHang => std::future::pending().await,
            _ => VersionQuery::Failed(RpcError::Transport("stream reset".to_string())),
        }
    }

    async fn close(&self) {
        if let Behavior::CloseHang(_) = self.behavior {
            std::future::pending::<()>().await;
        }
        self.closed.fetch_add(1, Ordering::SeqCst);
    }
}

/// An operator over in-memory collaborators, with handles to inspect them.
pub struct TestBackend {
    pub operator: Operator,
    pub store: Arc<MemoryClusterStore>,
    pub objects: Arc<MemoryConfigObjectStore>,
    pub services: Arc<MemoryServiceConfigurator>,
}

pub fn cluster_key() -> ClusterKey {
    ClusterKey::new("acme", "prod")
}

pub fn servers() -> Vec<Server> {
    vec![
        Server::new("node-1", "10.0.0.1"),
        Server::new("node-2", "10.0.0.2"),
        Server::new("node-3", "10.0.0.3"),
    ]
}

/// Builds a backend whose ledger is `ledger` instead of the memory store.
pub fn backend_with_ledger(
    agents: Arc<dyn AgentRepository>,
    ledger: Option<Arc<dyn OperationLedger>>,
) -> TestBackend {
    let store = Arc::new(MemoryClusterStore::new());
    let objects = Arc::new(MemoryConfigObjectStore::new());
    let services = Arc::new(MemoryServiceConfigurator::new());
    let ledger: Arc<dyn OperationLedger> = match ledger {
        Some(ledger) => ledger,
        None => store.clone(),
    };

    let operator = Operator::new(
        Collaborators {
            clusters: store.clone(),
            configs: Arc::new(ConfigMapClusterConfigStore::new(
                objects.clone(),
                ConfigMapRef::default(),
            )),
            ledger,
            services: services.clone(),
            agents,
        },
        ServiceRef::default(),
        StatusTimeouts::default(),
    );

    TestBackend {
        operator,
        store,
        objects,
        services,
    }
}

pub fn memory_backend(agents: Arc<dyn AgentRepository>) -> TestBackend {
    backend_with_ledger(agents, None)
}

/// A memory backend with the `acme/prod` cluster registered.
pub async fn registered_backend(agents: Arc<dyn AgentRepository>) -> TestBackend {
    let backend = memory_backend(agents);
    register(&backend.operator).await;
    backend
}

pub async fn register(operator: &Operator) {
    let key = cluster_key();
    operator
        .register_cluster(RegisterClusterRequest {
            account_id: key.account_id,
            cluster_name: key.cluster_name,
            servers: servers(),
        })
        .await
        .expect("Failed to register cluster");
}

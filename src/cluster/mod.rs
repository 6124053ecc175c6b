//! # Cluster access
//!
//! Everything that talks to the orchestrator's control plane sits behind the
//! [`ClusterClient`] trait. The poller and the action executor only ever see
//! the trait, so tests drive them with an in-memory fake.
//!
//! ```text
//!   Poller ──┐                         ┌── KubeClusterClient (kube-rs)
//!            ├── ClusterConnection ────┤
//! Executor ──┘    (connected flag)     └── MockClusterClient (tests)
//! ```
//!
//! Calls are single request/response operations. A failed call fails as a
//! whole; there is no partial-call state to model.

pub mod k8s;

#[cfg(test)]
pub mod mock;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::core::v1::Pod;
use thiserror::Error;
use tracing::{error, info};

pub use k8s::{ClusterSource, KubeClusterClient};

/// Errors reported by a cluster client
#[derive(Error, Debug)]
pub enum ClusterError {
    #[error("Failed to load cluster configuration: {0}")]
    Config(String),

    #[error("Kubernetes API error: {0}")]
    Kube(#[from] kube::Error),

    #[error("Cluster call timed out after {0:?}")]
    Timeout(Duration),

    #[error("Cluster client has not been initialized")]
    NotInitialized,

    #[error("Cluster API error: {0}")]
    Api(String),
}

/// Capability interface over the cluster control plane.
///
/// `connect` (re)initializes the underlying client and probes the API
/// server; the remaining calls assume a prior successful `connect`.
#[async_trait]
pub trait ClusterClient: Send + Sync {
    async fn connect(&self) -> Result<(), ClusterError>;

    async fn list_pods(&self, namespace: &str) -> Result<Vec<Pod>, ClusterError>;

    async fn list_deployments(&self, namespace: &str) -> Result<Vec<Deployment>, ClusterError>;

    async fn patch_deployment_replicas(
        &self,
        name: &str,
        namespace: &str,
        replicas: i32,
    ) -> Result<(), ClusterError>;

    async fn delete_pod(&self, name: &str, namespace: &str) -> Result<(), ClusterError>;
}

/// Shared handle pairing a cluster client with its last known connectivity.
///
/// The flag only changes on `reconnect`; the poller calls it on every cycle
/// while disconnected, so the retry interval equals the poll cadence.
pub struct ClusterConnection {
    client: Arc<dyn ClusterClient>,
    connected: AtomicBool,
}

impl ClusterConnection {
    pub fn new(client: Arc<dyn ClusterClient>) -> Self {
        Self {
            client,
            connected: AtomicBool::new(false),
        }
    }

    pub fn client(&self) -> &dyn ClusterClient {
        self.client.as_ref()
    }

    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    /// Try to (re)initialize the client. Returns the new connectivity state.
    pub async fn reconnect(&self) -> bool {
        match self.client.connect().await {
            Ok(()) => {
                if !self.connected.swap(true, Ordering::SeqCst) {
                    info!("Connected to cluster");
                }
                true
            }
            Err(e) => {
                self.connected.store(false, Ordering::SeqCst);
                error!("Failed to connect to cluster: {}", e);
                false
            }
        }
    }
}

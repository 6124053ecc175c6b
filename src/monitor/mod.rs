//! # Pod monitoring engine
//!
//! ```text
//!              ┌──────────────┐  list pods   ┌──────────────────┐
//!   Poller ───▶│ ClusterClient│◀──────────── │  ActionExecutor  │
//!     │        └──────────────┘  scale/delete└──────────────────┘
//!     │ replace                                 ▲        │ results
//!     ▼                                         │        ▼
//!  StateStore ◀──── read ──── Monitor (facade) ─┘    Broadcaster ──▶ subscribers
//!     ▲                          │                       ▲
//!     └────────── read ──────────┼───────────────────────┘
//!                                ▼
//!                       NamespaceRegistry
//! ```
//!
//! The poller and the broadcaster run on their own timers (see
//! [`Scheduler`]). Requests go through [`Monitor`], which reads the mirror
//! directly and hands mutations to the executor.

pub mod broadcast;
pub mod convert;
pub mod executor;
pub mod model;
pub mod poller;
pub mod registry;
pub mod scheduler;
pub mod store;

pub use broadcast::{Broadcaster, NotificationLevel, PushEvent, Subscription};
pub use executor::{ActionError, ActionExecutor};
pub use model::{
    ActionEvent, ActionKind, ActionOutcome, BulkAction, BulkOutcome, BulkSummary,
    ContainerRecord, HealthReport, MonitoringStats, PodAction, PodPhase, PodRecord, Snapshot,
};
pub use poller::{PollReport, Poller};
pub use registry::NamespaceRegistry;
pub use scheduler::Scheduler;
pub use store::StateStore;

use std::sync::Arc;

use chrono::Utc;
use tracing::info;

use crate::cluster::{ClusterClient, ClusterConnection};
use crate::config::{validate_namespace_configs, ConfigError, MonitorConfig, NamespaceConfig};

/// State shared by the poller, the executor and the broadcaster
pub struct MonitorState {
    pub store: StateStore,
    pub registry: NamespaceRegistry,
    pub connection: ClusterConnection,
}

impl MonitorState {
    pub fn new(client: Arc<dyn ClusterClient>, namespaces: Vec<NamespaceConfig>) -> Self {
        Self {
            store: StateStore::new(),
            registry: NamespaceRegistry::new(namespaces),
            connection: ClusterConnection::new(client),
        }
    }

    /// Aggregates over the current mirror, computed on every call
    pub fn stats(&self) -> MonitoringStats {
        let counts = self.store.phase_counts();
        MonitoringStats {
            total_pods: counts.total,
            running_pods: counts.running,
            pending_pods: counts.pending,
            failed_pods: counts.failed,
            last_update: self.store.last_update(),
            namespaces: self.registry.names(),
        }
    }

    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            pods: self.store.all_pods(),
            stats: self.stats(),
            connected: self.connection.is_connected(),
            timestamp: Utc::now(),
        }
    }
}

/// Request-facing surface over the mirror, the registry and the executor
pub struct Monitor {
    state: Arc<MonitorState>,
    executor: ActionExecutor,
    broadcaster: Arc<Broadcaster>,
    config: MonitorConfig,
}

impl Monitor {
    pub fn new(
        client: Arc<dyn ClusterClient>,
        namespaces: Vec<NamespaceConfig>,
        config: MonitorConfig,
    ) -> Self {
        let state = Arc::new(MonitorState::new(client, namespaces));
        Self {
            executor: ActionExecutor::new(state.clone()),
            broadcaster: Arc::new(Broadcaster::new(state.clone())),
            state,
            config,
        }
    }

    pub fn state(&self) -> &Arc<MonitorState> {
        &self.state
    }

    pub fn broadcaster(&self) -> &Arc<Broadcaster> {
        &self.broadcaster
    }

    pub fn poller(&self) -> Poller {
        Poller::new(self.state.clone()).with_notifier(self.broadcaster.clone())
    }

    /// Connect and, when that works, fill the mirror once
    pub async fn initialize(&self) -> bool {
        info!(
            "Monitoring namespaces: {}",
            self.state.registry.names().join(", ")
        );
        let connected = self.state.connection.reconnect().await;
        if connected {
            self.poller().tick().await;
        }
        connected
    }

    /// Spawn the poll and broadcast loops
    pub fn start_background(&self) -> Scheduler {
        Scheduler::start(self.poller(), self.broadcaster.clone(), &self.config)
    }

    // =========================================================================
    // Reads
    // =========================================================================

    pub fn all_pods(&self) -> Vec<PodRecord> {
        self.state.store.all_pods()
    }

    pub fn pods_in_namespace(&self, namespace: &str) -> Vec<PodRecord> {
        self.state.store.pods_in_namespace(namespace)
    }

    pub fn stats(&self) -> MonitoringStats {
        self.state.stats()
    }

    pub fn snapshot(&self) -> Snapshot {
        self.state.snapshot()
    }

    pub fn namespaces(&self) -> Vec<NamespaceConfig> {
        self.state.registry.list()
    }

    pub fn is_connected(&self) -> bool {
        self.state.connection.is_connected()
    }

    pub fn health(&self) -> HealthReport {
        HealthReport {
            success: true,
            connected: self.is_connected(),
            timestamp: Utc::now(),
            namespaces: self.state.registry.len(),
            total_pods: self.state.store.len(),
            subscribers: self.broadcaster.subscriber_count(),
        }
    }

    // =========================================================================
    // Writes
    // =========================================================================

    /// Replace the monitored namespace list wholesale
    pub fn update_namespaces(&self, namespaces: Vec<NamespaceConfig>) -> Result<(), ConfigError> {
        validate_namespace_configs(&namespaces)?;
        let enabled: Vec<&str> = namespaces
            .iter()
            .filter(|ns| ns.enabled)
            .map(|ns| ns.name.as_str())
            .collect();
        info!("Updated monitoring namespaces: {}", enabled.join(", "));
        self.state.registry.replace_all(namespaces);
        Ok(())
    }

    /// Run one action and relay its result to subscribers.
    ///
    /// `Err` means the action was malformed and never attempted; an attempted
    /// action that did not succeed comes back as `Ok` with `success: false`.
    pub async fn execute_action(&self, action: PodAction) -> Result<ActionOutcome, ActionError> {
        ActionExecutor::validate(&action)?;
        let outcome = self.executor.execute(&action).await;
        self.broadcaster
            .publish_action_result(ActionEvent::new(&action, outcome.clone()));
        Ok(outcome)
    }

    /// Run one action across several namespaces and relay the aggregate
    pub async fn execute_bulk(&self, bulk: BulkAction) -> BulkOutcome {
        let outcome = self.executor.execute_bulk(&bulk).await;
        self.broadcaster.publish_bulk_result(outcome.clone());
        outcome
    }

    /// Shorthand for an unfiltered action on one namespace
    pub async fn namespace_action(
        &self,
        action: ActionKind,
        namespace: impl Into<String>,
    ) -> Result<ActionOutcome, ActionError> {
        self.execute_action(PodAction::new(action, namespace)).await
    }

    /// Shorthand for a bulk action over a namespace list
    pub async fn bulk_namespaces(&self, action: ActionKind, namespaces: Vec<String>) -> BulkOutcome {
        self.execute_bulk(BulkAction { action, namespaces }).await
    }
}

//! Periodic full refresh of the pod mirror.
//!
//! One cycle lists pods for every enabled namespace, converts them and swaps
//! the result into the [`StateStore`](super::store::StateStore) as a single
//! step. A namespace whose listing fails is left out of the new map; the
//! other namespaces are unaffected.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::watch;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info, warn};

use super::broadcast::{Broadcaster, NotificationLevel};
use super::convert::pod_record;
use super::store::PodMap;
use super::MonitorState;

/// What one poll cycle did
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollReport {
    /// Not connected; a reconnect was attempted instead of a fetch
    Reconnect { connected: bool },
    /// A new map was published
    Refreshed {
        pods: usize,
        failed_namespaces: Vec<String>,
    },
}

pub struct Poller {
    state: Arc<MonitorState>,
    notifier: Option<Arc<Broadcaster>>,
}

impl Poller {
    pub fn new(state: Arc<MonitorState>) -> Self {
        Self {
            state,
            notifier: None,
        }
    }

    /// Announce connectivity changes to subscribers
    pub fn with_notifier(mut self, broadcaster: Arc<Broadcaster>) -> Self {
        self.notifier = Some(broadcaster);
        self
    }

    /// Run one cycle
    pub async fn tick(&self) -> PollReport {
        let connection = &self.state.connection;
        if !connection.is_connected() {
            let connected = connection.reconnect().await;
            if connected {
                if let Some(notifier) = &self.notifier {
                    notifier.notify("Connected to cluster", NotificationLevel::Success);
                }
            }
            return PollReport::Reconnect { connected };
        }

        let mut pods = PodMap::new();
        let mut failed_namespaces = Vec::new();

        for namespace in self.state.registry.enabled() {
            match connection.client().list_pods(&namespace).await {
                Ok(items) => {
                    let now = Utc::now();
                    for pod in &items {
                        let record = pod_record(pod, now);
                        pods.insert(record.key(), record);
                    }
                    debug!("Fetched {} pods from namespace {}", items.len(), namespace);
                }
                Err(e) => {
                    warn!("Failed to fetch pods from namespace {}: {}", namespace, e);
                    failed_namespaces.push(namespace);
                }
            }
        }

        let count = pods.len();
        let previous = self.state.store.replace(pods);
        if previous != count {
            info!("Pod count changed: {} -> {}", previous, count);
        }

        PollReport::Refreshed {
            pods: count,
            failed_namespaces,
        }
    }

    /// Run cycles on a fixed cadence until shutdown is signalled
    pub async fn run(self, period: Duration, mut shutdown: watch::Receiver<bool>) {
        let mut ticker = interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        info!("Poller started, refreshing every {}s", period.as_secs());

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.tick().await;
                }
                changed = shutdown.changed() => {
                    // A dropped sender counts as shutdown
                    if changed.is_err() || *shutdown.borrow() {
                        info!("Poller shutting down");
                        break;
                    }
                }
            }
        }
    }
}

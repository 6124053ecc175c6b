//! Push fan-out to live subscribers.
//!
//! Each subscriber owns a bounded channel. Publishing walks the subscriber
//! set once and pushes the same event to every channel, so the mirror is
//! read once per publish no matter how many clients are attached.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, watch};
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info, trace, warn};
use uuid::Uuid;

use super::model::{ActionEvent, ActionKind, ActionOutcome, BulkOutcome, Snapshot};
use super::MonitorState;

/// Events queued per subscriber before pushes to it are dropped
pub const SUBSCRIBER_BUFFER: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationLevel {
    Info,
    Success,
    Warning,
    Error,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    pub message: String,
    #[serde(rename = "type")]
    pub level: NotificationLevel,
    pub timestamp: DateTime<Utc>,
}

/// Rejected push-channel request, echoed back to the caller
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestFailure {
    pub success: bool,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action: Option<ActionKind>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespaces: Option<Vec<String>>,
}

/// Everything the server pushes over the subscription channel
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "kebab-case")]
pub enum PushEvent {
    // Broadcast to every subscriber
    PodsUpdate(Snapshot),
    ActionResult(ActionEvent),
    BulkActionResult(BulkOutcome),
    Notification(Notification),

    // Replies to the requesting subscriber only
    SubscriptionConfirmed {
        #[serde(default)]
        namespaces: Option<Vec<String>>,
    },
    PodsData(Snapshot),
    ActionCompleted(ActionOutcome),
    ActionError(RequestFailure),
    BulkActionCompleted(BulkOutcome),
    BulkActionError(RequestFailure),
}

impl PushEvent {
    pub fn name(&self) -> &'static str {
        match self {
            PushEvent::PodsUpdate(_) => "pods-update",
            PushEvent::ActionResult(_) => "action-result",
            PushEvent::BulkActionResult(_) => "bulk-action-result",
            PushEvent::Notification(_) => "notification",
            PushEvent::SubscriptionConfirmed { .. } => "subscription-confirmed",
            PushEvent::PodsData(_) => "pods-data",
            PushEvent::ActionCompleted(_) => "action-completed",
            PushEvent::ActionError(_) => "action-error",
            PushEvent::BulkActionCompleted(_) => "bulk-action-completed",
            PushEvent::BulkActionError(_) => "bulk-action-error",
        }
    }
}

/// Handle returned to a new subscriber
pub struct Subscription {
    pub id: Uuid,
    pub events: mpsc::Receiver<PushEvent>,
}

pub struct Broadcaster {
    state: Arc<MonitorState>,
    subscribers: DashMap<Uuid, mpsc::Sender<PushEvent>>,
}

impl Broadcaster {
    pub fn new(state: Arc<MonitorState>) -> Self {
        Self {
            state,
            subscribers: DashMap::new(),
        }
    }

    /// Register a subscriber; its channel already holds a `pods-update`
    pub fn subscribe(&self) -> Subscription {
        let (tx, rx) = mpsc::channel(SUBSCRIBER_BUFFER);
        let id = Uuid::new_v4();

        if tx
            .try_send(PushEvent::PodsUpdate(self.state.snapshot()))
            .is_err()
        {
            warn!("Failed to queue initial pod update for subscriber {}", id);
        }

        self.subscribers.insert(id, tx);
        info!(
            "Subscriber connected: {} (Total: {})",
            id,
            self.subscribers.len()
        );

        Subscription { id, events: rx }
    }

    pub fn unsubscribe(&self, id: &Uuid) {
        if self.subscribers.remove(id).is_some() {
            info!(
                "Subscriber disconnected: {} (Total: {})",
                id,
                self.subscribers.len()
            );
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }

    /// Push one event to every live subscriber. Returns how many got it.
    pub fn publish(&self, event: PushEvent) -> usize {
        let mut delivered = 0;
        let mut closed = Vec::new();

        for entry in self.subscribers.iter() {
            match entry.value().try_send(event.clone()) {
                Ok(()) => delivered += 1,
                Err(mpsc::error::TrySendError::Full(_)) => {
                    warn!(
                        "Subscriber {} is lagging, dropped {}",
                        entry.key(),
                        event.name()
                    );
                }
                Err(mpsc::error::TrySendError::Closed(_)) => closed.push(*entry.key()),
            }
        }

        // Removal happens after the walk; DashMap shards are locked while iterating
        for id in closed {
            self.unsubscribe(&id);
        }

        trace!("Published {} to {} subscribers", event.name(), delivered);
        delivered
    }

    /// Periodic snapshot push; skipped when nobody is listening
    pub fn tick(&self) -> usize {
        if self.subscribers.is_empty() {
            return 0;
        }
        self.publish(PushEvent::PodsUpdate(self.state.snapshot()))
    }

    pub fn publish_action_result(&self, event: ActionEvent) -> usize {
        self.publish(PushEvent::ActionResult(event))
    }

    pub fn publish_bulk_result(&self, outcome: BulkOutcome) -> usize {
        self.publish(PushEvent::BulkActionResult(outcome))
    }

    pub fn notify(&self, message: impl Into<String>, level: NotificationLevel) -> usize {
        self.publish(PushEvent::Notification(Notification {
            message: message.into(),
            level,
            timestamp: Utc::now(),
        }))
    }

    /// Push snapshots on a fixed cadence until shutdown is signalled
    pub async fn run(self: Arc<Self>, period: Duration, mut shutdown: watch::Receiver<bool>) {
        let mut ticker = interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        info!("Broadcaster started, pushing every {}s", period.as_secs());

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let delivered = self.tick();
                    if delivered > 0 {
                        debug!("Pushed pod update to {} subscribers", delivered);
                    }
                }
                changed = shutdown.changed() => {
                    // A dropped sender counts as shutdown
                    if changed.is_err() || *shutdown.borrow() {
                        info!("Broadcaster shutting down");
                        break;
                    }
                }
            }
        }
    }
}

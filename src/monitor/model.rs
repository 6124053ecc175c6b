//! Records mirrored from the cluster and the payloads derived from them.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Reported pod phase
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PodPhase {
    Running,
    Pending,
    Failed,
    Succeeded,
    Unknown,
}

impl PodPhase {
    /// Map a reported phase; anything unrecognised is `Unknown`
    pub fn from_reported(phase: Option<&str>) -> Self {
        match phase {
            Some("Running") => PodPhase::Running,
            Some("Pending") => PodPhase::Pending,
            Some("Failed") => PodPhase::Failed,
            Some("Succeeded") => PodPhase::Succeeded,
            _ => PodPhase::Unknown,
        }
    }
}

/// One container inside a mirrored pod
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContainerRecord {
    pub name: String,
    pub ready: bool,
    pub restart_count: i32,
    /// `Running`, `Waiting: <reason>`, `Terminated: <reason>` or `Unknown`
    pub state: String,
    pub image: String,
}

/// Point-in-time snapshot of one pod, keyed by `namespace/name`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PodRecord {
    pub name: String,
    pub namespace: String,
    /// Phase string as reported, `Unknown` when absent
    pub status: String,
    pub phase: PodPhase,
    pub ready: bool,
    /// Sum of the containers' restart counts
    pub restarts: i32,
    pub age: String,
    pub node: String,
    pub ip: String,
    pub labels: BTreeMap<String, String>,
    pub containers: Vec<ContainerRecord>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl PodRecord {
    pub fn key(&self) -> String {
        pod_key(&self.namespace, &self.name)
    }
}

pub fn pod_key(namespace: &str, name: &str) -> String {
    format!("{}/{}", namespace, name)
}

/// Aggregates recomputed from the mirror on every call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MonitoringStats {
    pub total_pods: usize,
    pub running_pods: usize,
    pub pending_pods: usize,
    pub failed_pods: usize,
    pub last_update: DateTime<Utc>,
    pub namespaces: Vec<String>,
}

/// Payload published to subscribers and returned by on-demand pulls
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Snapshot {
    pub pods: Vec<PodRecord>,
    pub stats: MonitoringStats,
    pub connected: bool,
    pub timestamp: DateTime<Utc>,
}

/// Health probe payload
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthReport {
    pub success: bool,
    pub connected: bool,
    pub timestamp: DateTime<Utc>,
    pub namespaces: usize,
    pub total_pods: usize,
    pub subscribers: usize,
}

// ============================================================================
// Actions
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActionKind {
    Start,
    Stop,
    Restart,
}

impl ActionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActionKind::Start => "start",
            ActionKind::Stop => "stop",
            ActionKind::Restart => "restart",
        }
    }

    pub(crate) fn past_tense(&self) -> &'static str {
        match self {
            ActionKind::Start => "Started",
            ActionKind::Stop => "Stopped",
            ActionKind::Restart => "Restarted",
        }
    }
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ActionKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "start" => Ok(ActionKind::Start),
            "stop" => Ok(ActionKind::Stop),
            "restart" => Ok(ActionKind::Restart),
            other => Err(format!("Unknown action: {}", other)),
        }
    }
}

/// A logical lifecycle request against one namespace
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PodAction {
    pub action: ActionKind,
    pub namespace: String,
    /// Substring filter on target names; absent means every target
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pod_name: Option<String>,
    /// Replica count used by `start`; defaults to 1
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub replicas: Option<i32>,
}

impl PodAction {
    pub fn new(action: ActionKind, namespace: impl Into<String>) -> Self {
        Self {
            action,
            namespace: namespace.into(),
            pod_name: None,
            replicas: None,
        }
    }

    pub fn with_pod_name(mut self, pod_name: impl Into<String>) -> Self {
        self.pod_name = Some(pod_name.into());
        self
    }

    pub fn with_replicas(mut self, replicas: i32) -> Self {
        self.replicas = Some(replicas);
        self
    }

    pub(crate) fn matches(&self, target: &str) -> bool {
        self.pod_name
            .as_deref()
            .map_or(true, |filter| target.contains(filter))
    }
}

/// Outcome of one single-namespace action
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionOutcome {
    pub success: bool,
    pub message: String,
    #[serde(default)]
    pub affected_pods: Vec<String>,
}

impl ActionOutcome {
    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
            affected_pods: Vec::new(),
        }
    }
}

/// The same action applied to several namespaces in order
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BulkAction {
    pub action: ActionKind,
    pub namespaces: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NamespaceOutcome {
    pub namespace: String,
    #[serde(flatten)]
    pub outcome: ActionOutcome,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NamespaceError {
    pub namespace: String,
    pub error: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BulkSummary {
    pub total: usize,
    pub successful: usize,
    pub failed: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BulkOutcome {
    pub success: bool,
    pub action: ActionKind,
    pub message: String,
    pub namespaces: Vec<String>,
    pub results: Vec<NamespaceOutcome>,
    pub errors: Vec<NamespaceError>,
    pub summary: BulkSummary,
    pub timestamp: DateTime<Utc>,
}

/// Action result as relayed to every subscriber
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionEvent {
    #[serde(flatten)]
    pub outcome: ActionOutcome,
    pub action: ActionKind,
    pub namespace: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pod_name: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl ActionEvent {
    pub fn new(action: &PodAction, outcome: ActionOutcome) -> Self {
        Self {
            outcome,
            action: action.action,
            namespace: action.namespace.clone(),
            pod_name: action.pod_name.clone(),
            timestamp: Utc::now(),
        }
    }
}

//! Projection of raw cluster pods into [`PodRecord`]s.
//!
//! Pure functions; the capture time is passed in so age bucketing is
//! deterministic under test.

use chrono::{DateTime, Utc};
use k8s_openapi::api::core::v1::{ContainerStatus, Pod};

use super::model::{ContainerRecord, PodPhase, PodRecord};

const UNKNOWN: &str = "unknown";

/// Convert one reported pod, stamping it with `now`
pub fn pod_record(pod: &Pod, now: DateTime<Utc>) -> PodRecord {
    let status = pod.status.as_ref();

    let containers: Vec<ContainerRecord> = status
        .and_then(|s| s.container_statuses.as_ref())
        .map(|list| list.iter().map(container_record).collect())
        .unwrap_or_default();

    let reported_phase = status.and_then(|s| s.phase.as_deref());
    let created = pod.metadata.creation_timestamp.as_ref().map(|t| t.0);

    PodRecord {
        name: pod.metadata.name.clone().unwrap_or_else(|| UNKNOWN.to_string()),
        namespace: pod
            .metadata
            .namespace
            .clone()
            .unwrap_or_else(|| UNKNOWN.to_string()),
        status: reported_phase.unwrap_or("Unknown").to_string(),
        phase: PodPhase::from_reported(reported_phase),
        ready: is_pod_ready(pod),
        restarts: containers.iter().map(|c| c.restart_count).sum(),
        age: created
            .map(|created| format_age(now - created))
            .unwrap_or_else(|| UNKNOWN.to_string()),
        node: pod
            .spec
            .as_ref()
            .and_then(|s| s.node_name.clone())
            .unwrap_or_else(|| UNKNOWN.to_string()),
        ip: status
            .and_then(|s| s.pod_ip.clone())
            .unwrap_or_else(|| UNKNOWN.to_string()),
        labels: pod.metadata.labels.clone().unwrap_or_default(),
        containers,
        created_at: created.unwrap_or(now),
        updated_at: now,
    }
}

fn container_record(container: &ContainerStatus) -> ContainerRecord {
    ContainerRecord {
        name: container.name.clone(),
        ready: container.ready,
        restart_count: container.restart_count,
        state: container_state(container),
        image: if container.image.is_empty() {
            UNKNOWN.to_string()
        } else {
            container.image.clone()
        },
    }
}

/// running > waiting > terminated > unknown
pub fn container_state(container: &ContainerStatus) -> String {
    let Some(state) = container.state.as_ref() else {
        return "Unknown".to_string();
    };

    if state.running.is_some() {
        "Running".to_string()
    } else if let Some(waiting) = &state.waiting {
        format!("Waiting: {}", waiting.reason.as_deref().unwrap_or("Unknown"))
    } else if let Some(terminated) = &state.terminated {
        format!(
            "Terminated: {}",
            terminated.reason.as_deref().unwrap_or("Unknown")
        )
    } else {
        "Unknown".to_string()
    }
}

/// True iff a `Ready` condition reports status exactly `"True"`
pub fn is_pod_ready(pod: &Pod) -> bool {
    pod.status
        .as_ref()
        .and_then(|s| s.conditions.as_ref())
        .and_then(|conds| conds.iter().find(|c| c.type_ == "Ready"))
        .is_some_and(|c| c.status == "True")
}

/// Largest whole unit only: `3d`, `5h`, `12m`, or `<1m`
pub fn format_age(elapsed: chrono::Duration) -> String {
    let minutes = elapsed.num_minutes();
    let hours = minutes / 60;
    let days = hours / 24;

    if days > 0 {
        format!("{}d", days)
    } else if hours > 0 {
        format!("{}h", hours)
    } else if minutes > 0 {
        format!("{}m", minutes)
    } else {
        "<1m".to_string()
    }
}

//! Translation of start/stop/restart intents into cluster mutations.
//!
//! - **start** scales every deployment sitting at zero replicas back up
//! - **stop** scales every deployment with replicas down to zero
//! - **restart** deletes the mirrored pods and leaves recreation to their
//!   owning controllers
//!
//! Targets are processed one after another and a client error aborts the
//! branch. Bulk actions run namespaces sequentially and isolate failures per
//! namespace.

use std::sync::Arc;

use chrono::Utc;
use thiserror::Error;
use tracing::{debug, error, info, warn};

use super::model::{
    ActionKind, ActionOutcome, BulkAction, BulkOutcome, BulkSummary, NamespaceError,
    NamespaceOutcome, PodAction,
};
use super::MonitorState;
use crate::cluster::ClusterError;
use crate::config::validate_namespace_name;

/// Replica count used by `start` when the caller does not ask for one
pub const DEFAULT_START_REPLICAS: i32 = 1;

#[derive(Error, Debug)]
pub enum ActionError {
    #[error("Not connected to cluster")]
    NotConnected,

    #[error("Failed to {action} pods: {source}")]
    Cluster {
        action: ActionKind,
        #[source]
        source: ClusterError,
    },

    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

pub struct ActionExecutor {
    state: Arc<MonitorState>,
}

impl ActionExecutor {
    pub fn new(state: Arc<MonitorState>) -> Self {
        Self { state }
    }

    /// Check the parts of an action that do not need the cluster
    pub fn validate(action: &PodAction) -> Result<(), ActionError> {
        validate_namespace_name(&action.namespace)
            .map_err(|e| ActionError::InvalidRequest(e.to_string()))?;
        if let Some(replicas) = action.replicas {
            if replicas < 1 {
                return Err(ActionError::InvalidRequest(format!(
                    "replicas must be at least 1, got {}",
                    replicas
                )));
            }
        }
        Ok(())
    }

    /// Run one action; every failure comes back as `success: false`
    pub async fn execute(&self, action: &PodAction) -> ActionOutcome {
        match self.try_execute(action).await {
            Ok(outcome) => outcome,
            Err(e) => {
                error!(
                    "Failed to execute {} on {}/{}: {}",
                    action.action,
                    action.namespace,
                    action.pod_name.as_deref().unwrap_or("all"),
                    e
                );
                ActionOutcome::failure(e.to_string())
            }
        }
    }

    /// Run one action, surfacing failures as errors
    pub async fn try_execute(&self, action: &PodAction) -> Result<ActionOutcome, ActionError> {
        Self::validate(action)?;
        if !self.state.connection.is_connected() {
            return Err(ActionError::NotConnected);
        }

        let result = match action.action {
            ActionKind::Start => {
                let target = action.replicas.unwrap_or(DEFAULT_START_REPLICAS);
                self.scale(action, |replicas| replicas == 0, target).await
            }
            ActionKind::Stop => self.scale(action, |replicas| replicas > 0, 0).await,
            ActionKind::Restart => self.restart(action).await,
        };

        let affected = result.map_err(|source| ActionError::Cluster {
            action: action.action,
            source,
        })?;

        let noun = match action.action {
            ActionKind::Restart => "pods",
            ActionKind::Start | ActionKind::Stop => "deployments",
        };
        Ok(ActionOutcome {
            success: true,
            message: format!(
                "{} {} {} in namespace {}",
                action.action.past_tense(),
                affected.len(),
                noun,
                action.namespace
            ),
            affected_pods: affected,
        })
    }

    /// Patch every matching deployment whose replica count passes `select`
    async fn scale(
        &self,
        action: &PodAction,
        select: impl Fn(i32) -> bool,
        target: i32,
    ) -> Result<Vec<String>, ClusterError> {
        let client = self.state.connection.client();
        let deployments = client.list_deployments(&action.namespace).await?;
        let mut affected = Vec::new();

        for deployment in &deployments {
            let Some(name) = deployment.metadata.name.as_deref() else {
                continue;
            };
            if !action.matches(name) {
                continue;
            }

            let current = deployment
                .spec
                .as_ref()
                .and_then(|s| s.replicas)
                .unwrap_or(0);
            if !select(current) {
                continue;
            }

            client
                .patch_deployment_replicas(name, &action.namespace, target)
                .await?;
            debug!(
                "Scaled {}/{} from {} to {} replicas",
                action.namespace, name, current, target
            );
            affected.push(name.to_string());
        }

        Ok(affected)
    }

    /// Delete the mirrored pods; recreation is not awaited
    async fn restart(&self, action: &PodAction) -> Result<Vec<String>, ClusterError> {
        let client = self.state.connection.client();
        let pods = self.state.store.pods_in_namespace(&action.namespace);
        let mut affected = Vec::new();

        for pod in pods.iter().filter(|pod| action.matches(&pod.name)) {
            client.delete_pod(&pod.name, &action.namespace).await?;
            debug!("Deleted pod {}/{}", action.namespace, pod.name);
            affected.push(pod.name.clone());
        }

        Ok(affected)
    }

    /// Apply one action to each namespace in order, isolating failures
    pub async fn execute_bulk(&self, bulk: &BulkAction) -> BulkOutcome {
        info!(
            "Executing bulk {} on {} namespaces: {}",
            bulk.action,
            bulk.namespaces.len(),
            bulk.namespaces.join(", ")
        );

        let mut results = Vec::new();
        let mut errors = Vec::new();

        for namespace in &bulk.namespaces {
            let action = PodAction::new(bulk.action, namespace.as_str());
            match self.try_execute(&action).await {
                Ok(outcome) => results.push(NamespaceOutcome {
                    namespace: namespace.clone(),
                    outcome,
                }),
                Err(e) => {
                    warn!("Bulk {} failed for namespace {}: {}", bulk.action, namespace, e);
                    errors.push(NamespaceError {
                        namespace: namespace.clone(),
                        error: e.to_string(),
                    });
                }
            }
        }

        let summary = BulkSummary {
            total: bulk.namespaces.len(),
            successful: results.iter().filter(|r| r.outcome.success).count(),
            failed: errors.len(),
        };

        BulkOutcome {
            success: errors.is_empty(),
            action: bulk.action,
            message: format!(
                "Bulk {} completed on {} namespaces",
                bulk.action,
                bulk.namespaces.len()
            ),
            namespaces: bulk.namespaces.clone(),
            results,
            errors,
            summary,
            timestamp: Utc::now(),
        }
    }
}

//! In-memory cluster used by unit tests (no I/O).

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use k8s_openapi::api::apps::v1::{Deployment, DeploymentSpec};
use k8s_openapi::api::core::v1::{
    ContainerState, ContainerStateRunning, ContainerStatus, Pod, PodCondition, PodSpec, PodStatus,
};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;

use super::{ClusterClient, ClusterError};

#[derive(Default)]
pub struct MockClusterClient {
    reachable: AtomicBool,
    connect_attempts: AtomicUsize,
    pods: Mutex<HashMap<String, Vec<Pod>>>,
    deployments: Mutex<HashMap<String, Vec<Deployment>>>,
    failing: Mutex<HashSet<String>>,
    stalled: Mutex<HashSet<String>>,
    patches: Mutex<Vec<(String, String, i32)>>,
    deletions: Mutex<Vec<(String, String)>>,
}

impl MockClusterClient {
    pub fn new() -> Self {
        Self {
            reachable: AtomicBool::new(true),
            ..Default::default()
        }
    }

    pub fn set_reachable(&self, reachable: bool) {
        self.reachable.store(reachable, Ordering::SeqCst);
    }

    pub fn connect_attempts(&self) -> usize {
        self.connect_attempts.load(Ordering::SeqCst)
    }

    pub fn set_pods(&self, namespace: &str, pods: Vec<Pod>) {
        self.pods
            .lock()
            .unwrap()
            .insert(namespace.to_string(), pods);
    }

    pub fn set_deployments(&self, namespace: &str, deployments: Vec<Deployment>) {
        self.deployments
            .lock()
            .unwrap()
            .insert(namespace.to_string(), deployments);
    }

    /// Every call scoped to `namespace` fails from now on
    pub fn fail_namespace(&self, namespace: &str) {
        self.failing.lock().unwrap().insert(namespace.to_string());
    }

    /// Every call scoped to `namespace` times out from now on
    pub fn stall_namespace(&self, namespace: &str) {
        self.stalled.lock().unwrap().insert(namespace.to_string());
    }

    pub fn heal_namespace(&self, namespace: &str) {
        self.failing.lock().unwrap().remove(namespace);
        self.stalled.lock().unwrap().remove(namespace);
    }

    pub fn patches(&self) -> Vec<(String, String, i32)> {
        self.patches.lock().unwrap().clone()
    }

    pub fn deletions(&self) -> Vec<(String, String)> {
        self.deletions.lock().unwrap().clone()
    }

    fn check(&self, namespace: &str) -> Result<(), ClusterError> {
        if self.stalled.lock().unwrap().contains(namespace) {
            return Err(ClusterError::Timeout(Duration::from_secs(10)));
        }
        if self.failing.lock().unwrap().contains(namespace) {
            return Err(ClusterError::Api(format!(
                "namespace {} is unavailable",
                namespace
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl ClusterClient for MockClusterClient {
    async fn connect(&self) -> Result<(), ClusterError> {
        self.connect_attempts.fetch_add(1, Ordering::SeqCst);
        if self.reachable.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(ClusterError::Config("cluster unreachable".to_string()))
        }
    }

    async fn list_pods(&self, namespace: &str) -> Result<Vec<Pod>, ClusterError> {
        self.check(namespace)?;
        Ok(self
            .pods
            .lock()
            .unwrap()
            .get(namespace)
            .cloned()
            .unwrap_or_default())
    }

    async fn list_deployments(&self, namespace: &str) -> Result<Vec<Deployment>, ClusterError> {
        self.check(namespace)?;
        Ok(self
            .deployments
            .lock()
            .unwrap()
            .get(namespace)
            .cloned()
            .unwrap_or_default())
    }

    async fn patch_deployment_replicas(
        &self,
        name: &str,
        namespace: &str,
        replicas: i32,
    ) -> Result<(), ClusterError> {
        self.check(namespace)?;
        let mut deployments = self.deployments.lock().unwrap();
        let target = deployments
            .get_mut(namespace)
            .and_then(|list| {
                list.iter_mut()
                    .find(|d| d.metadata.name.as_deref() == Some(name))
            })
            .ok_or_else(|| ClusterError::Api(format!("deployment {} not found", name)))?;
        target.spec.get_or_insert_with(Default::default).replicas = Some(replicas);
        self.patches
            .lock()
            .unwrap()
            .push((namespace.to_string(), name.to_string(), replicas));
        Ok(())
    }

    async fn delete_pod(&self, name: &str, namespace: &str) -> Result<(), ClusterError> {
        self.check(namespace)?;
        self.deletions
            .lock()
            .unwrap()
            .push((namespace.to_string(), name.to_string()));
        Ok(())
    }
}

/// A running, ready pod with one container per restart count given
pub fn pod(namespace: &str, name: &str, phase: &str, restarts: &[i32]) -> Pod {
    let containers = restarts
        .iter()
        .enumerate()
        .map(|(i, count)| ContainerStatus {
            name: format!("c{}", i),
            ready: true,
            restart_count: *count,
            image: format!("registry.local/app:{}", i),
            state: Some(ContainerState {
                running: Some(ContainerStateRunning::default()),
                ..Default::default()
            }),
            ..Default::default()
        })
        .collect();

    Pod {
        metadata: ObjectMeta {
            name: Some(name.to_string()),
            namespace: Some(namespace.to_string()),
            ..Default::default()
        },
        spec: Some(PodSpec {
            node_name: Some("node-1".to_string()),
            ..Default::default()
        }),
        status: Some(PodStatus {
            phase: Some(phase.to_string()),
            pod_ip: Some("10.1.0.7".to_string()),
            conditions: Some(vec![PodCondition {
                type_: "Ready".to_string(),
                status: "True".to_string(),
                ..Default::default()
            }]),
            container_statuses: Some(containers),
            ..Default::default()
        }),
    }
}

pub fn deployment(name: &str, replicas: Option<i32>) -> Deployment {
    Deployment {
        metadata: ObjectMeta {
            name: Some(name.to_string()),
            ..Default::default()
        },
        spec: Some(DeploymentSpec {
            replicas,
            ..Default::default()
        }),
        ..Default::default()
    }
}

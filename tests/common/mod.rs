//! Fake cluster shared by the integration tests

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use k8s_openapi::api::apps::v1::{Deployment, DeploymentSpec};
use k8s_openapi::api::core::v1::{Pod, PodStatus};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;

use podpulse::cluster::{ClusterClient, ClusterError};
use podpulse::config::{MonitorConfig, NamespaceConfig};
use podpulse::monitor::Monitor;

#[derive(Default)]
pub struct FakeCluster {
    pods: Mutex<HashMap<String, Vec<Pod>>>,
    deployments: Mutex<HashMap<String, Vec<Deployment>>>,
    down: Mutex<bool>,
}

impl FakeCluster {
    pub fn with_pod(self, namespace: &str, name: &str, phase: &str) -> Self {
        self.pods
            .lock()
            .unwrap()
            .entry(namespace.to_string())
            .or_default()
            .push(Pod {
                metadata: ObjectMeta {
                    name: Some(name.to_string()),
                    namespace: Some(namespace.to_string()),
                    ..Default::default()
                },
                spec: None,
                status: Some(PodStatus {
                    phase: Some(phase.to_string()),
                    ..Default::default()
                }),
            });
        self
    }

    pub fn with_deployment(self, namespace: &str, name: &str, replicas: i32) -> Self {
        self.deployments
            .lock()
            .unwrap()
            .entry(namespace.to_string())
            .or_default()
            .push(Deployment {
                metadata: ObjectMeta {
                    name: Some(name.to_string()),
                    ..Default::default()
                },
                spec: Some(DeploymentSpec {
                    replicas: Some(replicas),
                    ..Default::default()
                }),
                ..Default::default()
            });
        self
    }

    pub fn down(self) -> Self {
        *self.down.lock().unwrap() = true;
        self
    }

    pub fn replicas(&self, namespace: &str, name: &str) -> Option<i32> {
        self.deployments
            .lock()
            .unwrap()
            .get(namespace)?
            .iter()
            .find(|d| d.metadata.name.as_deref() == Some(name))?
            .spec
            .as_ref()?
            .replicas
    }
}

#[async_trait]
impl ClusterClient for FakeCluster {
    async fn connect(&self) -> Result<(), ClusterError> {
        if *self.down.lock().unwrap() {
            return Err(ClusterError::Config("no route to cluster".to_string()));
        }
        Ok(())
    }

    async fn list_pods(&self, namespace: &str) -> Result<Vec<Pod>, ClusterError> {
        Ok(self
            .pods
            .lock()
            .unwrap()
            .get(namespace)
            .cloned()
            .unwrap_or_default())
    }

    async fn list_deployments(&self, namespace: &str) -> Result<Vec<Deployment>, ClusterError> {
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
        let mut deployments = self.deployments.lock().unwrap();
        let target = deployments
            .get_mut(namespace)
            .and_then(|list| {
                list.iter_mut()
                    .find(|d| d.metadata.name.as_deref() == Some(name))
            })
            .ok_or_else(|| ClusterError::Api(format!("deployment {} not found", name)))?;
        target.spec.get_or_insert_with(Default::default).replicas = Some(replicas);
        Ok(())
    }

    async fn delete_pod(&self, name: &str, namespace: &str) -> Result<(), ClusterError> {
        if let Some(list) = self.pods.lock().unwrap().get_mut(namespace) {
            list.retain(|p| p.metadata.name.as_deref() != Some(name));
        }
        Ok(())
    }
}

/// Monitor over `cluster`, connected and populated once
pub async fn monitor(cluster: Arc<FakeCluster>, namespaces: &[&str]) -> Arc<Monitor> {
    let namespaces = namespaces.iter().map(|n| NamespaceConfig::new(*n)).collect();
    let monitor = Arc::new(Monitor::new(cluster, namespaces, MonitorConfig::default()));
    monitor.initialize().await;
    monitor
}

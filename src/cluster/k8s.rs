//! kube-rs backed [`ClusterClient`].

use std::future::Future;
use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::core::v1::Pod;
use kube::api::{DeleteParams, ListParams, Patch, PatchParams};
use kube::config::{KubeConfigOptions, Kubeconfig};
use kube::{Api, Client, Config};
use serde_json::json;
use tokio::sync::RwLock;
use tokio::time::timeout;
use tracing::debug;

use super::{ClusterClient, ClusterError};

/// Where the cluster credentials come from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClusterSource {
    /// Explicit kubeconfig file
    ConfigFile(PathBuf),
    /// Service account mounted into the pod
    InCluster,
    /// kube-rs default discovery (KUBECONFIG, ~/.kube/config, ...)
    Default,
}

impl ClusterSource {
    /// Pick a source: explicit file, then in-cluster, then default discovery.
    pub fn detect(kubeconfig: Option<&Path>, service_host: Option<&str>) -> Self {
        if let Some(path) = kubeconfig {
            let expanded = shellexpand::tilde(&path.to_string_lossy()).into_owned();
            return ClusterSource::ConfigFile(PathBuf::from(expanded));
        }
        match service_host {
            Some(host) if !host.trim().is_empty() => ClusterSource::InCluster,
            _ => ClusterSource::Default,
        }
    }

    async fn load_config(&self) -> Result<Config, ClusterError> {
        let result = match self {
            ClusterSource::ConfigFile(path) => match Kubeconfig::read_from(path) {
                Ok(kubeconfig) => {
                    Config::from_custom_kubeconfig(kubeconfig, &KubeConfigOptions::default())
                        .await
                        .map_err(|e| e.to_string())
                }
                Err(e) => Err(e.to_string()),
            },
            ClusterSource::InCluster => Config::incluster().map_err(|e| e.to_string()),
            ClusterSource::Default => Config::infer().await.map_err(|e| e.to_string()),
        };
        result.map_err(ClusterError::Config)
    }
}

impl std::fmt::Display for ClusterSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ClusterSource::ConfigFile(path) => write!(f, "kubeconfig {}", path.display()),
            ClusterSource::InCluster => write!(f, "in-cluster service account"),
            ClusterSource::Default => write!(f, "default discovery"),
        }
    }
}

/// Cluster client over the Kubernetes API.
///
/// The inner `kube::Client` is rebuilt on every `connect`, so a cluster that
/// was unreachable at startup is picked up once it comes back.
pub struct KubeClusterClient {
    source: ClusterSource,
    request_timeout: Duration,
    client: RwLock<Option<Client>>,
}

impl KubeClusterClient {
    pub fn new(source: ClusterSource, request_timeout: Duration) -> Self {
        Self {
            source,
            request_timeout,
            client: RwLock::new(None),
        }
    }

    async fn client(&self) -> Result<Client, ClusterError> {
        self.client
            .read()
            .await
            .clone()
            .ok_or(ClusterError::NotInitialized)
    }

    async fn bounded<T, F>(&self, call: F) -> Result<T, ClusterError>
    where
        F: Future<Output = Result<T, kube::Error>>,
    {
        match timeout(self.request_timeout, call).await {
            Ok(result) => result.map_err(ClusterError::from),
            Err(_) => Err(ClusterError::Timeout(self.request_timeout)),
        }
    }
}

#[async_trait]
impl ClusterClient for KubeClusterClient {
    async fn connect(&self) -> Result<(), ClusterError> {
        let mut config = self.source.load_config().await?;
        config.connect_timeout = Some(self.request_timeout);
        config.read_timeout = Some(self.request_timeout);
        config.write_timeout = Some(self.request_timeout);

        let client = Client::try_from(config)?;
        let version = self.bounded(client.apiserver_version()).await?;
        debug!(
            "API server {}.{} ({}) via {}",
            version.major, version.minor, version.git_version, self.source
        );

        *self.client.write().await = Some(client);
        Ok(())
    }

    async fn list_pods(&self, namespace: &str) -> Result<Vec<Pod>, ClusterError> {
        let api: Api<Pod> = Api::namespaced(self.client().await?, namespace);
        let list = self.bounded(api.list(&ListParams::default())).await?;
        Ok(list.items)
    }

    async fn list_deployments(&self, namespace: &str) -> Result<Vec<Deployment>, ClusterError> {
        let api: Api<Deployment> = Api::namespaced(self.client().await?, namespace);
        let list = self.bounded(api.list(&ListParams::default())).await?;
        Ok(list.items)
    }

    async fn patch_deployment_replicas(
        &self,
        name: &str,
        namespace: &str,
        replicas: i32,
    ) -> Result<(), ClusterError> {
        let api: Api<Deployment> = Api::namespaced(self.client().await?, namespace);
        let patch = json!({ "spec": { "replicas": replicas } });
        self.bounded(api.patch(name, &PatchParams::default(), &Patch::Merge(&patch)))
            .await?;
        Ok(())
    }

    async fn delete_pod(&self, name: &str, namespace: &str) -> Result<(), ClusterError> {
        let api: Api<Pod> = Api::namespaced(self.client().await?, namespace);
        self.bounded(api.delete(name, &DeleteParams::default()))
            .await?;
        Ok(())
    }
}

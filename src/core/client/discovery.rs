//! Cluster discovery strategies. Exactly one is active per process,
//! chosen from configuration at startup.

use std::collections::BTreeSet;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use kube::config::{KubeConfigOptions, Kubeconfig};
use kube::Config;
use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::core::client::cluster::{generate_cluster_id, ClusterDescriptor, ClusterDiscoverer};
use crate::core::client::kube_client::{config_for_url, with_timeouts};

pub const DEFAULT_CLUSTER_URL: &str = "http://localhost:8001/";
const MOCK_CLUSTER_COUNT: usize = 3;

/// Fixed list of API server URLs.
pub struct StaticClusterDiscoverer {
    clusters: Vec<ClusterDescriptor>,
}

impl StaticClusterDiscoverer {
    pub fn new(urls: &[String], token: Option<&str>, timeout: Duration) -> Result<Self> {
        let clusters = urls
            .iter()
            .map(|url| {
                // local proxies (kubectl proxy) need no credentials
                let token = token.filter(|_| !is_local(url));
                let config = config_for_url(url, token, timeout)?;
                Ok(ClusterDescriptor {
                    id: generate_cluster_id(url),
                    api_server_url: url.clone(),
                    config: Some(config),
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self { clusters })
    }

    /// No URLs configured: use in-cluster / default kubeconfig settings,
    /// falling back to a local `kubectl proxy`.
    pub async fn from_environment(timeout: Duration) -> Result<Self> {
        match Config::infer().await {
            Ok(config) => {
                let url = config.cluster_url.to_string();
                info!("Using inferred cluster configuration for {}", url);
                Ok(Self {
                    clusters: vec![ClusterDescriptor {
                        id: generate_cluster_id(&url),
                        api_server_url: url,
                        config: Some(with_timeouts(config, timeout)),
                    }],
                })
            }
            Err(e) => {
                debug!("No inferable cluster configuration: {}", e);
                info!("Falling back to {}", DEFAULT_CLUSTER_URL);
                Self::new(&[DEFAULT_CLUSTER_URL.to_string()], None, timeout)
            }
        }
    }
}

fn is_local(url: &str) -> bool {
    reqwest::Url::parse(url)
        .ok()
        .and_then(|u| u.host_str().map(|h| h == "localhost" || h == "127.0.0.1"))
        .unwrap_or(false)
}

#[async_trait]
impl ClusterDiscoverer for StaticClusterDiscoverer {
    async fn get_clusters(&self) -> Result<Vec<ClusterDescriptor>> {
        Ok(self.clusters.clone())
    }
}

/// Every context of a kubeconfig file (or a selected subset) is a cluster;
/// the context name is the cluster id. The file is re-read on every call.
pub struct KubeconfigDiscoverer {
    path: PathBuf,
    contexts: BTreeSet<String>,
    timeout: Duration,
}

impl KubeconfigDiscoverer {
    pub fn new(path: impl Into<PathBuf>, contexts: BTreeSet<String>, timeout: Duration) -> Self {
        Self {
            path: path.into(),
            contexts,
            timeout,
        }
    }
}

#[async_trait]
impl ClusterDiscoverer for KubeconfigDiscoverer {
    async fn get_clusters(&self) -> Result<Vec<ClusterDescriptor>> {
        let kubeconfig = Kubeconfig::read_from(&self.path)
            .with_context(|| format!("failed to read kubeconfig {}", self.path.display()))?;

        let mut clusters = Vec::new();
        for context in &kubeconfig.contexts {
            let name = &context.name;
            if !self.contexts.is_empty() && !self.contexts.contains(name) {
                continue;
            }

            let options = KubeConfigOptions {
                context: Some(name.clone()),
                ..Default::default()
            };
            match Config::from_custom_kubeconfig(kubeconfig.clone(), &options).await {
                Ok(config) => clusters.push(ClusterDescriptor::with_config(
                    name.clone(),
                    with_timeouts(config, self.timeout),
                )),
                Err(e) => warn!("Skipping kubeconfig context {}: {}", name, e),
            }
        }

        debug!("Kubeconfig {} yields {} cluster(s)", self.path.display(), clusters.len());
        Ok(clusters)
    }
}

#[derive(Debug, Deserialize)]
struct RegistryResponse {
    #[serde(default)]
    items: Vec<RegistryCluster>,
}

#[derive(Debug, Deserialize)]
struct RegistryCluster {
    id: String,
    api_server_url: String,
    #[serde(default)]
    lifecycle_status: Option<String>,
}

/// Cluster list served by an HTTP cluster registry
/// (`GET <registry>/kubernetes-clusters`). Only clusters in `ready`
/// lifecycle state are returned.
pub struct ClusterRegistryDiscoverer {
    http: reqwest::Client,
    registry_url: String,
    token: Option<String>,
    timeout: Duration,
}

impl ClusterRegistryDiscoverer {
    pub fn new(registry_url: &str, token: Option<String>, timeout: Duration) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("failed to build registry HTTP client")?;

        Ok(Self {
            http,
            registry_url: registry_url.trim_end_matches('/').to_string(),
            token,
            timeout,
        })
    }
}

#[async_trait]
impl ClusterDiscoverer for ClusterRegistryDiscoverer {
    async fn get_clusters(&self) -> Result<Vec<ClusterDescriptor>> {
        let url = format!("{}/kubernetes-clusters", self.registry_url);
        let mut request = self.http.get(&url);
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }

        let response: RegistryResponse = request
            .send()
            .await
            .with_context(|| format!("cluster registry request to {} failed", url))?
            .error_for_status()?
            .json()
            .await
            .context("invalid cluster registry response")?;

        Ok(ready_clusters(response, self.token.as_deref(), self.timeout))
    }
}

/// Entries with an unusable API server URL are skipped, the rest stay listed.
fn ready_clusters(
    response: RegistryResponse,
    token: Option<&str>,
    timeout: Duration,
) -> Vec<ClusterDescriptor> {
    response
        .items
        .into_iter()
        .filter(|c| c.lifecycle_status.as_deref() == Some("ready"))
        .filter_map(|c| match config_for_url(&c.api_server_url, token, timeout) {
            Ok(config) => Some(ClusterDescriptor {
                id: c.id,
                api_server_url: c.api_server_url,
                config: Some(config),
            }),
            Err(e) => {
                warn!("Skipping registry cluster {}: {:#}", c.id, e);
                None
            }
        })
        .collect()
}

/// Fixed set of fake clusters served by the mock provider.
#[derive(Default)]
pub struct MockDiscoverer;

#[async_trait]
impl ClusterDiscoverer for MockDiscoverer {
    async fn get_clusters(&self) -> Result<Vec<ClusterDescriptor>> {
        Ok((0..MOCK_CLUSTER_COUNT)
            .map(|i| {
                ClusterDescriptor::new(
                    format!("mock-cluster-{i}"),
                    format!("https://kube-{i}.example.org"),
                )
            })
            .collect())
    }
}

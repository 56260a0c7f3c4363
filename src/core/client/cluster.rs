//! Cluster descriptors and the two collaborator seams of the update loop:
//! discovering clusters and querying their state.

use std::fmt;

use async_trait::async_trait;

use crate::core::state::cluster_snapshot::ClusterSnapshot;
use crate::errors::ProviderError;

/// A cluster to poll, as returned by a discoverer.
#[derive(Clone)]
pub struct ClusterDescriptor {
    /// Stable id, used as key everywhere
    pub id: String,
    pub api_server_url: String,
    /// Connection settings and credentials. `None` for clusters that are not
    /// reached over the Kubernetes API (mock clusters).
    pub config: Option<kube::Config>,
}

impl ClusterDescriptor {
    pub fn new(id: impl Into<String>, api_server_url: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            api_server_url: api_server_url.into(),
            config: None,
        }
    }

    pub fn with_config(id: impl Into<String>, config: kube::Config) -> Self {
        Self {
            id: id.into(),
            api_server_url: config.cluster_url.to_string(),
            config: Some(config),
        }
    }
}

// credentials stay out of logs
impl fmt::Debug for ClusterDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClusterDescriptor")
            .field("id", &self.id)
            .field("api_server_url", &self.api_server_url)
            .finish_non_exhaustive()
    }
}

/// Derives a cluster id from an API server URL,
/// e.g. `https://kube-1.example.org:443` → `kube-1-example-org-443`.
pub fn generate_cluster_id(url: &str) -> String {
    let trimmed = url
        .strip_prefix("https://")
        .or_else(|| url.strip_prefix("http://"))
        .unwrap_or(url)
        .trim_end_matches('/');

    trimmed
        .to_lowercase()
        .chars()
        .map(|c| if c.is_ascii_lowercase() || c.is_ascii_digit() { c } else { '-' })
        .collect()
}

/// Source of the cluster list, consulted once per scheduling tick.
#[async_trait]
pub trait ClusterDiscoverer: Send + Sync {
    async fn get_clusters(&self) -> anyhow::Result<Vec<ClusterDescriptor>>;
}

/// Produces a complete snapshot of one cluster.
#[async_trait]
pub trait ClusterStateProvider: Send + Sync {
    async fn query(&self, cluster: &ClusterDescriptor) -> Result<ClusterSnapshot, ProviderError>;

    /// Called once per tick with the discovered clusters; per-cluster state
    /// for anything else can be dropped.
    fn retain_clusters(&self, _clusters: &[ClusterDescriptor]) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cluster_ids_from_urls() {
        assert_eq!(generate_cluster_id("http://localhost:8001/"), "localhost-8001");
        assert_eq!(
            generate_cluster_id("https://Kube-1.Example.org"),
            "kube-1-example-org"
        );
        assert_eq!(generate_cluster_id("10.0.0.1:6443"), "10-0-0-1-6443");
    }

    #[test]
    fn debug_output_hides_config() {
        let descriptor = ClusterDescriptor::new("c1", "https://c1.example.org");
        let printed = format!("{descriptor:?}");
        assert!(printed.contains("c1"));
        assert!(!printed.contains("config"));
    }
}

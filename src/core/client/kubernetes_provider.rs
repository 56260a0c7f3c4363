use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use kube::Client;
use tracing::{debug, warn};

use crate::core::client::cluster::{ClusterDescriptor, ClusterStateProvider};
use crate::core::client::kube_client::build_kube_client;
use crate::core::client::mappers::assemble_snapshot;
use crate::core::client::metrics::merge_metrics;
use crate::core::client::nodes::fetch_nodes;
use crate::core::client::pods::fetch_pods;
use crate::core::state::cluster_snapshot::ClusterSnapshot;
use crate::errors::ProviderError;

/// Number of API calls one query makes (nodes, pods, node and pod metrics)
const REQUESTS_PER_QUERY: u32 = 4;

/// Longest a single cluster query may take.
pub fn query_budget(query_timeout: Duration) -> Duration {
    query_timeout * REQUESTS_PER_QUERY
}

/// Queries clusters through the Kubernetes API.
///
/// Clients are built once per cluster and reused across polls. A client is
/// dropped when its query fails, so the next poll picks up fresh settings
/// (e.g. a rotated token), and when its cluster is no longer discovered.
pub struct KubernetesStateProvider {
    clients: Mutex<HashMap<(String, String), Client>>,
    query_timeout: Duration,
}

impl KubernetesStateProvider {
    pub fn new(query_timeout: Duration) -> Self {
        Self {
            clients: Mutex::new(HashMap::new()),
            query_timeout,
        }
    }

    fn clients(&self) -> MutexGuard<'_, HashMap<(String, String), Client>> {
        self.clients
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn client_for(&self, cluster: &ClusterDescriptor) -> Result<Client, ProviderError> {
        let key = cache_key(cluster);
        let mut clients = self.clients();

        if let Some(client) = clients.get(&key) {
            return Ok(client.clone());
        }

        let config = cluster.config.clone().ok_or_else(|| {
            ProviderError::Api(format!("cluster {} has no connection settings", cluster.id))
        })?;
        let client = build_kube_client(config)?;
        clients.insert(key, client.clone());
        Ok(client)
    }

    fn evict(&self, cluster: &ClusterDescriptor) {
        if self.clients().remove(&cache_key(cluster)).is_some() {
            debug!("Dropped cached client of cluster {}", cluster.id);
        }
    }
}

fn cache_key(cluster: &ClusterDescriptor) -> (String, String) {
    (cluster.id.clone(), cluster.api_server_url.clone())
}

#[async_trait]
impl ClusterStateProvider for KubernetesStateProvider {
    async fn query(&self, cluster: &ClusterDescriptor) -> Result<ClusterSnapshot, ProviderError> {
        let client = self.client_for(cluster)?;

        let query = async {
            let nodes = fetch_nodes(&client).await?;
            let pods = fetch_pods(&client).await?;
            let mut snapshot =
                assemble_snapshot(&cluster.id, &cluster.api_server_url, &nodes, &pods);

            if let Err(e) = merge_metrics(&client, &mut snapshot).await {
                debug!("No usage metrics for cluster {}: {:#}", cluster.id, e);
            }
            Ok::<_, ProviderError>(snapshot)
        };

        let result = match tokio::time::timeout(query_budget(self.query_timeout), query).await {
            Ok(result) => result,
            Err(_) => {
                warn!("⏱️ Query of cluster {} exceeded its time budget", cluster.id);
                Err(ProviderError::Timeout)
            }
        };

        if result.is_err() {
            self.evict(cluster);
        }
        result
    }

    fn retain_clusters(&self, clusters: &[ClusterDescriptor]) {
        let current: HashSet<(String, String)> = clusters.iter().map(cache_key).collect();
        let mut clients = self.clients();
        let before = clients.len();
        clients.retain(|key, _| current.contains(key));

        if clients.len() < before {
            debug!("Dropped {} client(s) of vanished clusters", before - clients.len());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::client::kube_client::config_for_url;

    #[tokio::test]
    async fn cluster_without_settings_is_rejected() {
        let provider = KubernetesStateProvider::new(Duration::from_secs(1));
        let cluster = ClusterDescriptor::new("mock-cluster-0", "https://kube-0.example.org");

        let err = provider.query(&cluster).await.unwrap_err();
        assert!(err.short_message().contains("no connection settings"));
    }

    fn reachable(id: &str) -> ClusterDescriptor {
        let url = format!("http://{id}.example.org");
        let config = config_for_url(&url, None, Duration::from_secs(1)).unwrap();
        ClusterDescriptor::with_config(id, config)
    }

    #[tokio::test]
    async fn clients_of_vanished_clusters_are_dropped() {
        let provider = KubernetesStateProvider::new(Duration::from_secs(1));
        let (c1, c2) = (reachable("c1"), reachable("c2"));
        provider.client_for(&c1).unwrap();
        provider.client_for(&c2).unwrap();
        assert_eq!(provider.clients().len(), 2);

        provider.retain_clusters(&[c2.clone()]);

        let clients = provider.clients();
        assert_eq!(clients.len(), 1);
        assert!(clients.contains_key(&cache_key(&c2)));
    }

    #[tokio::test]
    async fn failed_query_drops_the_cached_client() {
        let provider = KubernetesStateProvider::new(Duration::from_millis(200));
        // nothing listens on this port
        let config = config_for_url("http://127.0.0.1:9", None, Duration::from_millis(200)).unwrap();
        let cluster = ClusterDescriptor::with_config("c1", config);

        assert!(provider.query(&cluster).await.is_err());
        assert!(provider.clients().is_empty());
    }
}

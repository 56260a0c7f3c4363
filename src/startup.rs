//! Wiring of the store, discoverer and provider chosen by configuration.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use tracing::info;

use crate::config::{AppConfig, DiscoverySource};
use crate::core::client::cluster::{ClusterDiscoverer, ClusterStateProvider};
use crate::core::client::discovery::{
    ClusterRegistryDiscoverer, KubeconfigDiscoverer, MockDiscoverer, StaticClusterDiscoverer,
};
use crate::core::client::kubernetes_provider::{query_budget, KubernetesStateProvider};
use crate::core::client::mock_provider::MockStateProvider;
use crate::core::store::memory_store::MemoryStore;
use crate::core::store::redis_store::{RedisStore, DEFAULT_LOCK_TTL};
use crate::core::store::Store;
use crate::scheduler::tasks::cluster_update::task::{system_clock, UpdateContext};

/// Headroom of the update lock lease over one cluster query.
const LOCK_TTL_MARGIN: Duration = Duration::from_secs(5);

/// The lease is renewed between clusters, so it has to outlast the slowest
/// possible query.
pub fn update_lock_ttl(config: &AppConfig) -> Duration {
    DEFAULT_LOCK_TTL.max(query_budget(config.query_timeout()) + LOCK_TTL_MARGIN)
}

pub async fn build_store(config: &AppConfig) -> Result<Arc<dyn Store>> {
    match &config.redis_url {
        Some(url) => {
            let lock_ttl = update_lock_ttl(config);
            info!("Update lock lease is {}s", lock_ttl.as_secs());
            Ok(Arc::new(RedisStore::connect(url).await?.with_lock_ttl(lock_ttl)))
        }
        None => {
            info!("Using in-memory store (single replica)");
            Ok(Arc::new(MemoryStore::new()))
        }
    }
}

pub async fn build_discoverer(config: &AppConfig) -> Result<Arc<dyn ClusterDiscoverer>> {
    let timeout = config.query_timeout();
    let discoverer: Arc<dyn ClusterDiscoverer> = match config.discovery_source() {
        DiscoverySource::Mock => {
            info!("Using mock clusters");
            Arc::new(MockDiscoverer)
        }
        DiscoverySource::Registry(url) => {
            info!("Discovering clusters from registry {}", url);
            Arc::new(ClusterRegistryDiscoverer::new(
                &url,
                config.cluster_token.clone(),
                timeout,
            )?)
        }
        DiscoverySource::Kubeconfig(path) => {
            info!("Discovering clusters from kubeconfig {}", path.display());
            Arc::new(KubeconfigDiscoverer::new(
                path,
                config.kubeconfig_contexts.clone(),
                timeout,
            ))
        }
        DiscoverySource::Static(urls) if urls.is_empty() => {
            Arc::new(StaticClusterDiscoverer::from_environment(timeout).await?)
        }
        DiscoverySource::Static(urls) => {
            info!("Polling {} configured cluster(s)", urls.len());
            Arc::new(StaticClusterDiscoverer::new(
                &urls,
                config.cluster_token.as_deref(),
                timeout,
            )?)
        }
    };
    Ok(discoverer)
}

pub fn build_provider(config: &AppConfig) -> Arc<dyn ClusterStateProvider> {
    if config.mock {
        Arc::new(MockStateProvider)
    } else {
        Arc::new(KubernetesStateProvider::new(config.query_timeout()))
    }
}

pub async fn build_update_context(config: &AppConfig, store: Arc<dyn Store>) -> Result<UpdateContext> {
    Ok(UpdateContext {
        store,
        discoverer: build_discoverer(config).await?,
        provider: build_provider(config),
        query_interval: config.query_interval(),
        clock: system_clock(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn mock_setup_polls_mock_clusters() {
        let config = AppConfig::from_lookup(|key| (key == "MOCK").then(|| "true".to_string())).unwrap();
        let store = build_store(&config).await.unwrap();
        assert_eq!(store.kind(), "memory");

        let ctx = build_update_context(&config, store.clone()).await.unwrap();
        let clusters = ctx.discoverer.get_clusters().await.unwrap();
        assert_eq!(clusters.len(), 3);

        let snapshot = ctx.provider.query(&clusters[0]).await.unwrap();
        assert_eq!(snapshot.id, "mock-cluster-0");
    }

    #[test]
    fn lock_lease_outlasts_a_full_query() {
        let config = AppConfig::from_lookup(|_| None).unwrap();
        let ttl = update_lock_ttl(&config);
        assert!(ttl > query_budget(config.query_timeout()));
        assert!(ttl >= DEFAULT_LOCK_TTL);

        let quick = AppConfig::from_lookup(|key| (key == "QUERY_TIMEOUT").then(|| "1".to_string())).unwrap();
        assert_eq!(update_lock_ttl(&quick), DEFAULT_LOCK_TTL);
    }
}

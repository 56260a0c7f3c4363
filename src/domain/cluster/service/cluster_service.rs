use anyhow::Result;
use serde_json::Value;

use crate::core::store::Store;
use crate::domain::cluster::dto::cluster_summary::{health_label, ClusterSummary};

/// Every known cluster with its polling status.
pub async fn list_clusters(store: &dyn Store) -> Result<Vec<ClusterSummary>> {
    let mut summaries = Vec::new();
    for id in store.get_cluster_ids().await? {
        let status = store.get_cluster_status(&id).await?.unwrap_or_default();
        let has_data = store.get_cluster_data(&id).await?.is_some();
        summaries.push(ClusterSummary {
            health: health_label(status.health()),
            id,
            status,
            has_data,
        });
    }
    Ok(summaries)
}

/// Stored snapshot document of one cluster.
pub async fn get_cluster(store: &dyn Store, cluster_id: String) -> Result<Option<Value>> {
    store.get_cluster_data(&cluster_id).await
}

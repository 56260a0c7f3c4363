use anyhow::Result;
use serde::Serialize;

use crate::core::state::server_status::ServerStatus;
use crate::core::store::Store;

#[derive(Debug, Serialize)]
pub struct SystemStatus {
    pub version: &'static str,
    pub store: &'static str,
    pub cluster_count: usize,
    pub shutting_down: bool,
}

pub async fn status(store: &dyn Store, server: &ServerStatus) -> Result<SystemStatus> {
    Ok(SystemStatus {
        version: env!("CARGO_PKG_VERSION"),
        store: store.kind(),
        cluster_count: store.get_cluster_ids().await?.len(),
        shutting_down: server.is_shutting_down(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;

    use crate::core::store::memory_store::MemoryStore;

    #[tokio::test]
    async fn reports_store_and_cluster_count() {
        let store = MemoryStore::new();
        store
            .set_cluster_ids(&BTreeSet::from(["a".to_string(), "b".to_string()]))
            .await
            .unwrap();
        let server = ServerStatus::new();
        server.begin_shutdown();

        let status = status(&store, &server).await.unwrap();
        assert_eq!(status.store, store.kind());
        assert_eq!(status.cluster_count, 2);
        assert!(status.shutting_down);
    }
}

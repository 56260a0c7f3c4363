use std::sync::Arc;

use crate::config::AppConfig;
use crate::core::state::server_status::ServerStatus;
use crate::core::store::Store;

/// Generates service methods that forward to store-backed domain functions.
macro_rules! delegate_store_service {
    ($(fn $name:ident($($arg:ident : $typ:ty),*) -> $ret:ty => $path:path;)+) => {
        $(
            pub async fn $name(&self, $($arg: $typ),*) -> anyhow::Result<$ret> {
                $path(self.store.as_ref(), $($arg),*).await
            }
        )+
    };
}

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn Store>,
    pub config: Arc<AppConfig>,
    pub server_status: Arc<ServerStatus>,
    pub cluster_service: Arc<ClusterService>,
    pub system_service: Arc<SystemService>,
}

pub fn build_app_state(
    config: AppConfig,
    store: Arc<dyn Store>,
    server_status: Arc<ServerStatus>,
) -> AppState {
    AppState {
        cluster_service: Arc::new(ClusterService::new(store.clone())),
        system_service: Arc::new(SystemService::new(store.clone(), server_status.clone())),
        store,
        config: Arc::new(config),
        server_status,
    }
}

#[derive(Clone)]
pub struct ClusterService {
    store: Arc<dyn Store>,
}

impl ClusterService {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    delegate_store_service! {
        fn list_clusters() -> Vec<crate::domain::cluster::dto::cluster_summary::ClusterSummary> => crate::domain::cluster::service::cluster_service::list_clusters;
        fn get_cluster(cluster_id: String) -> Option<serde_json::Value> => crate::domain::cluster::service::cluster_service::get_cluster;
    }
}

#[derive(Clone)]
pub struct SystemService {
    store: Arc<dyn Store>,
    server_status: Arc<ServerStatus>,
}

impl SystemService {
    pub fn new(store: Arc<dyn Store>, server_status: Arc<ServerStatus>) -> Self {
        Self {
            store,
            server_status,
        }
    }

    pub async fn status(
        &self,
    ) -> anyhow::Result<crate::domain::system::service::status_service::SystemStatus> {
        crate::domain::system::service::status_service::status(
            self.store.as_ref(),
            &self.server_status,
        )
        .await
    }
}

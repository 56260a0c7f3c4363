//! Cluster routes (/api/v1/clusters/*)

use axum::{routing::get, Router};

use crate::api::controller::cluster::ClusterController;
use crate::app_state::AppState;

pub fn cluster_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(ClusterController::list_clusters))
        .route("/{cluster_id}", get(ClusterController::get_cluster))
}

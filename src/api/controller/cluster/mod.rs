//! Cluster controller: stored cluster state as JSON

use axum::extract::{Path, State};
use axum::Json;
use serde_json::Value;

use crate::api::dto::ApiResponse;
use crate::api::util::json::{to_json, to_json_found};
use crate::app_state::AppState;
use crate::domain::cluster::dto::cluster_summary::ClusterSummary;
use crate::errors::AppError;

pub struct ClusterController;

impl ClusterController {
    pub async fn list_clusters(
        State(state): State<AppState>,
    ) -> Result<Json<ApiResponse<Vec<ClusterSummary>>>, AppError> {
        to_json(state.cluster_service.list_clusters().await)
    }

    pub async fn get_cluster(
        State(state): State<AppState>,
        Path(cluster_id): Path<String>,
    ) -> Result<Json<ApiResponse<Value>>, AppError> {
        let what = format!("cluster {}", cluster_id);
        to_json_found(state.cluster_service.get_cluster(cluster_id).await, &what)
    }
}

use serde::Serialize;

use crate::core::state::cluster_status::{ClusterHealth, ClusterStatus};

/// One row of the cluster list.
#[derive(Debug, Clone, Serialize)]
pub struct ClusterSummary {
    pub id: String,
    pub health: &'static str,
    pub status: ClusterStatus,
    pub has_data: bool,
}

pub fn health_label(health: ClusterHealth) -> &'static str {
    match health {
        ClusterHealth::NeverQueried => "never-queried",
        ClusterHealth::Healthy => "healthy",
        ClusterHealth::BackingOff => "backing-off",
    }
}

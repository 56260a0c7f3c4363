//! Settings exposed to the dashboard UI
use serde::Serialize;

use crate::config::AppConfig;

#[derive(Debug, Serialize)]
pub struct UiConfigDto {
    pub node_link_url_template: Option<String>,
    pub pod_link_url_template: Option<String>,
    pub query_interval_secs: f64,
}

impl From<&AppConfig> for UiConfigDto {
    fn from(config: &AppConfig) -> Self {
        Self {
            node_link_url_template: config.node_link_url_template.clone(),
            pod_link_url_template: config.pod_link_url_template.clone(),
            query_interval_secs: config.query_interval_secs,
        }
    }
}

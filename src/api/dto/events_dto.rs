use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct EventsQuery {
    /// Whitespace separated cluster ids; all clusters when absent
    pub cluster_ids: Option<String>,
}

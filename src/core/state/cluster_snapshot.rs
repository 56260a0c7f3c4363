use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use serde_with::skip_serializing_none;

/// Complete observed state of one cluster at a point in time.
///
/// Providers always hand over a whole snapshot; it replaces the previous
/// one and is never merged into it. Maps are ordered so that two snapshots
/// of an unchanged cluster serialize identically.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ClusterSnapshot {
    pub id: String,
    pub api_server_url: String,
    /// node name → node
    pub nodes: BTreeMap<String, NodeView>,
    /// `namespace/name` → pod without (known) node
    pub unassigned_pods: BTreeMap<String, PodView>,
}

#[skip_serializing_none]
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NodeView {
    pub name: String,
    #[serde(default)]
    pub labels: BTreeMap<String, String>,
    #[serde(default)]
    pub status: NodeStatusView,
    /// Resource usage from the metrics API, when available
    pub usage: Option<BTreeMap<String, String>>,
    /// `namespace/name` → pod scheduled on this node
    #[serde(default)]
    pub pods: BTreeMap<String, PodView>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NodeStatusView {
    #[serde(default)]
    pub addresses: Vec<NodeAddressView>,
    #[serde(default)]
    pub capacity: BTreeMap<String, String>,
    #[serde(default)]
    pub allocatable: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeAddressView {
    #[serde(rename = "type")]
    pub type_: String,
    pub address: String,
}

#[skip_serializing_none]
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PodView {
    pub name: String,
    pub namespace: String,
    #[serde(default)]
    pub labels: BTreeMap<String, String>,
    pub phase: Option<String>,
    #[serde(rename = "startTime")]
    pub start_time: Option<String>,
    /// Deletion timestamp (unix seconds) of a terminating pod
    pub deleted: Option<i64>,
    #[serde(default)]
    pub containers: Vec<ContainerView>,
}

#[skip_serializing_none]
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ContainerView {
    pub name: String,
    pub image: Option<String>,
    #[serde(default)]
    pub resources: ResourcesView,
    pub ready: Option<bool>,
    #[serde(rename = "restartCount")]
    pub restart_count: Option<i32>,
    /// Container state as reported by the kubelet (`running`, `waiting`, ...)
    pub state: Option<Value>,
}

#[skip_serializing_none]
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResourcesView {
    #[serde(default)]
    pub requests: BTreeMap<String, String>,
    #[serde(default)]
    pub limits: BTreeMap<String, String>,
    pub usage: Option<BTreeMap<String, String>>,
}

pub fn pod_key(namespace: &str, name: &str) -> String {
    format!("{namespace}/{name}")
}

impl ClusterSnapshot {
    pub fn new(id: impl Into<String>, api_server_url: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            api_server_url: api_server_url.into(),
            ..Default::default()
        }
    }

    pub fn pod_count(&self) -> usize {
        self.nodes.values().map(|n| n.pods.len()).sum::<usize>() + self.unassigned_pods.len()
    }

    /// Looks up a pod on any node or among the unassigned ones.
    pub fn pod_mut(&mut self, namespace: &str, name: &str) -> Option<&mut PodView> {
        let key = pod_key(namespace, name);
        if self.unassigned_pods.contains_key(&key) {
            return self.unassigned_pods.get_mut(&key);
        }
        self.nodes
            .values_mut()
            .find_map(|node| node.pods.get_mut(&key))
    }
}

//! Resource usage from the `metrics.k8s.io` API.
//!
//! The metrics server is optional in a cluster, so callers treat any error
//! here as "no usage data" rather than a failed query.

use std::collections::BTreeMap;

use anyhow::{Context, Result};
use http::{Method, Request as HttpRequest};
use kube::Client;
use serde::Deserialize;
use tracing::debug;

use crate::core::state::cluster_snapshot::{pod_key, ClusterSnapshot};

const NODE_METRICS_PATH: &str = "/apis/metrics.k8s.io/v1beta1/nodes";
const POD_METRICS_PATH: &str = "/apis/metrics.k8s.io/v1beta1/pods";

#[derive(Debug, Deserialize)]
pub struct MetricsList<T> {
    #[serde(default = "Vec::new")]
    pub items: Vec<T>,
}

#[derive(Debug, Deserialize)]
pub struct MetricsMetadata {
    pub name: String,
    #[serde(default)]
    pub namespace: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct NodeMetrics {
    pub metadata: MetricsMetadata,
    #[serde(default)]
    pub usage: BTreeMap<String, String>,
}

#[derive(Debug, Deserialize)]
pub struct PodMetrics {
    pub metadata: MetricsMetadata,
    #[serde(default)]
    pub containers: Vec<ContainerMetrics>,
}

#[derive(Debug, Deserialize)]
pub struct ContainerMetrics {
    pub name: String,
    #[serde(default)]
    pub usage: BTreeMap<String, String>,
}

async fn fetch_metrics<T>(client: &Client, path: &str) -> Result<MetricsList<T>>
where
    T: serde::de::DeserializeOwned,
{
    let req = HttpRequest::builder()
        .method(Method::GET)
        .uri(path)
        .body(vec![])
        .map_err(|e| anyhow::anyhow!("Failed to build request: {}", e))?;

    let body = client.request_text(req).await?;
    let parsed: MetricsList<T> = serde_json::from_str(&body)?;
    debug!("Fetched {} metrics item(s) from {}", parsed.items.len(), path);
    Ok(parsed)
}

/// Fetch node and pod usage and fold it into the snapshot.
///
/// Both lists are requested; each one that arrives is applied even if the
/// other failed. The first error is returned.
pub async fn merge_metrics(client: &Client, snapshot: &mut ClusterSnapshot) -> Result<()> {
    let (nodes, pods) = futures::join!(
        fetch_metrics::<NodeMetrics>(client, NODE_METRICS_PATH),
        fetch_metrics::<PodMetrics>(client, POD_METRICS_PATH),
    );
    apply_metrics(snapshot, nodes, pods)
}

fn apply_metrics(
    snapshot: &mut ClusterSnapshot,
    nodes: Result<MetricsList<NodeMetrics>>,
    pods: Result<MetricsList<PodMetrics>>,
) -> Result<()> {
    let nodes = nodes
        .map(|list| apply_node_metrics(snapshot, &list.items))
        .context("node metrics");
    let pods = pods
        .map(|list| apply_pod_metrics(snapshot, &list.items))
        .context("pod metrics");
    nodes.and(pods)
}

pub fn apply_node_metrics(snapshot: &mut ClusterSnapshot, metrics: &[NodeMetrics]) {
    for item in metrics {
        if let Some(node) = snapshot.nodes.get_mut(&item.metadata.name) {
            node.usage = Some(item.usage.clone());
        }
    }
}

/// Container usage goes to the matching container; pods that are not in the
/// snapshot are ignored.
pub fn apply_pod_metrics(snapshot: &mut ClusterSnapshot, metrics: &[PodMetrics]) {
    for item in metrics {
        let namespace = item.metadata.namespace.as_deref().unwrap_or("default");
        let Some(pod) = snapshot.pod_mut(namespace, &item.metadata.name) else {
            debug!("No pod {} for metrics", pod_key(namespace, &item.metadata.name));
            continue;
        };

        for usage in &item.containers {
            if let Some(container) = pod.containers.iter_mut().find(|c| c.name == usage.name) {
                container.resources.usage = Some(usage.usage.clone());
            }
        }
    }
}

//! Deterministic fake cluster state for demos and UI development.
//!
//! The same cluster and the same wall-clock second always yield the same
//! snapshot. Node 8 and every 17th pod come and go on fixed periods so the
//! UI sees deltas without any randomness.

use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::Utc;
use serde_json::json;

use crate::core::client::cluster::{ClusterDescriptor, ClusterStateProvider};
use crate::core::state::cluster_snapshot::{
    pod_key, ClusterSnapshot, ContainerView, NodeStatusView, NodeView, PodView, ResourcesView,
};
use crate::errors::ProviderError;

const NODES_PER_CLUSTER: u64 = 10;
const MAX_PODS_PER_NODE: u64 = 32;
const FLAPPING_NODE: u64 = 8;
const NODE_PERIOD_SECONDS: i64 = 13;
const POD_PERIOD_SECONDS: i64 = 7;

const POD_NAMES: [&str; 8] = [
    "agent-cooper",
    "black-lodge",
    "bob",
    "bobby-briggs",
    "laura-palmer",
    "leland-palmer",
    "log-lady",
    "sheriff-truman",
];
const POD_PHASES: [&str; 3] = ["Pending", "Running", "Running"];
const LABEL_CHOICES: [(&str, [&str; 2]); 2] = [("env", ["prod", "dev"]), ("owner", ["x-wing", "iris"])];

#[derive(Default)]
pub struct MockStateProvider;

#[async_trait]
impl ClusterStateProvider for MockStateProvider {
    async fn query(&self, cluster: &ClusterDescriptor) -> Result<ClusterSnapshot, ProviderError> {
        mock_snapshot(cluster, Utc::now().timestamp())
    }
}

/// Integer mixing function; spreads small inputs over the whole range.
pub fn hash_int(x: u64) -> u64 {
    let x = ((x >> 16) ^ x).wrapping_mul(0x45d9f3b);
    let x = ((x >> 16) ^ x).wrapping_mul(0x45d9f3b);
    (x >> 16) ^ x
}

fn is_off_phase(now_secs: i64, period: i64) -> bool {
    (now_secs / period) % 2 == 0
}

/// Snapshot of mock cluster `mock-cluster-<n>` at `now_secs` (unix seconds).
pub fn mock_snapshot(cluster: &ClusterDescriptor, now_secs: i64) -> Result<ClusterSnapshot, ProviderError> {
    let index: u64 = cluster
        .id
        .rsplit('-')
        .next()
        .and_then(|suffix| suffix.parse().ok())
        .ok_or_else(|| ProviderError::Api(format!("not a mock cluster id: {}", cluster.id)))?;

    let mut snapshot = ClusterSnapshot::new(
        format!("mock-cluster-{index}"),
        format!("https://kube-{index}.example.org"),
    );

    for i in 0..NODES_PER_CLUSTER {
        if i == FLAPPING_NODE && is_off_phase(now_secs, NODE_PERIOD_SECONDS) {
            continue;
        }

        let mut node = NodeView {
            name: format!("node-{i}"),
            labels: master_labels(index, i),
            status: NodeStatusView {
                addresses: Vec::new(),
                capacity: resources(&[("cpu", "4"), ("memory", "32Gi"), ("pods", "110")]),
                allocatable: resources(&[("cpu", "3800m"), ("memory", "31Gi")]),
            },
            usage: None,
            pods: BTreeMap::new(),
        };

        for j in 0..hash_int((index + 1) * (i + 1)) % MAX_PODS_PER_NODE {
            if j % 17 == 0 && is_off_phase(now_secs, POD_PERIOD_SECONDS) {
                continue;
            }
            let pod = mock_pod(index, i, j);
            node.pods.insert(pod_key(&pod.namespace, &pod.name), pod);
        }

        snapshot.nodes.insert(node.name.clone(), node);
    }

    let pod = mock_pod(index, 11, index);
    snapshot
        .unassigned_pods
        .insert(pod_key(&pod.namespace, &pod.name), pod);

    Ok(snapshot)
}

fn master_labels(index: u64, node: u64) -> BTreeMap<String, String> {
    let mut labels = BTreeMap::new();
    if node < 2 {
        let (key, value) = match index {
            0 => ("kubernetes.io/role", "master"),
            1 => ("node-role.kubernetes.io/master", ""),
            _ => ("master", "true"),
        };
        labels.insert(key.to_string(), value.to_string());
    }
    labels
}

fn resources(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

fn mock_pod(index: u64, i: u64, j: u64) -> PodView {
    let mut labels = BTreeMap::new();
    for (li, (key, values)) in LABEL_CHOICES.iter().enumerate() {
        let choice = hash_int((index + 1) * (i + 1) * (j + 1) * (li as u64 + 1)) % (values.len() as u64 + 1);
        if choice != 0 {
            labels.insert(key.to_string(), values[choice as usize - 1].to_string());
        }
    }

    let phase = POD_PHASES[(hash_int((index + 1) * (i + 1) * (j + 1)) % POD_PHASES.len() as u64) as usize];
    let running = phase == "Running";

    let containers = (0..1 + j % 2)
        .map(|_| {
            let mut container = ContainerView {
                name: "myapp".to_string(),
                image: Some(format!("foo/bar/{j}")),
                resources: ResourcesView {
                    requests: resources(&[("cpu", "100m"), ("memory", "100Mi")]),
                    limits: BTreeMap::new(),
                    usage: None,
                },
                ready: Some(true),
                restart_count: None,
                state: Some(json!({ "running": {} })),
            };
            if running && j % 13 == 0 {
                container.ready = Some(false);
                container.state = Some(json!({ "waiting": { "reason": "CrashLoopBackOff" } }));
            } else if running && j % 7 == 0 {
                container.restart_count = Some(3);
            }
            container
        })
        .collect();

    PodView {
        name: format!(
            "{}-{i}-{j}",
            POD_NAMES[(hash_int((i + 1) * (j + 1)) % POD_NAMES.len() as u64) as usize]
        ),
        namespace: if j < 3 { "kube-system" } else { "default" }.to_string(),
        labels,
        phase: Some(phase.to_string()),
        start_time: None,
        deleted: (running && j % 17 == 0).then_some(123),
        containers,
    }
}

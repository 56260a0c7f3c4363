/// Maps kube-rs / k8s-openapi types → snapshot views
use std::collections::BTreeMap;

use chrono::DateTime;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::Time;

use crate::core::client::kube_resources::{ContainerStatus, K8sContainer, Node, Pod, Quantity};
use crate::core::state::cluster_snapshot::{
    pod_key, ClusterSnapshot, ContainerView, NodeAddressView, NodeStatusView, NodeView, PodView,
    ResourcesView,
};

/// Builds a complete snapshot from listed nodes and pods.
///
/// Pods whose node is unset or not among `nodes` land in `unassigned_pods`.
pub fn assemble_snapshot(
    cluster_id: &str,
    api_server_url: &str,
    nodes: &[Node],
    pods: &[Pod],
) -> ClusterSnapshot {
    let mut snapshot = ClusterSnapshot::new(cluster_id, api_server_url);

    for node in nodes {
        let view = map_node(node);
        snapshot.nodes.insert(view.name.clone(), view);
    }

    for pod in pods {
        let view = map_pod(pod);
        let key = pod_key(&view.namespace, &view.name);
        let node_name = pod.spec.as_ref().and_then(|s| s.node_name.as_deref());

        match node_name.and_then(|name| snapshot.nodes.get_mut(name)) {
            Some(node) => {
                node.pods.insert(key, view);
            }
            None => {
                snapshot.unassigned_pods.insert(key, view);
            }
        }
    }

    snapshot
}

/// Converts a k8s-openapi Node object into a NodeView (without pods)
pub fn map_node(node: &Node) -> NodeView {
    let metadata = &node.metadata;
    let status = node.status.as_ref();

    let addresses = status
        .and_then(|s| s.addresses.as_ref())
        .map(|addresses| {
            addresses
                .iter()
                .map(|addr| NodeAddressView {
                    type_: addr.type_.clone(),
                    address: addr.address.clone(),
                })
                .collect()
        })
        .unwrap_or_default();

    NodeView {
        name: metadata.name.clone().unwrap_or_default(),
        labels: metadata.labels.clone().unwrap_or_default(),
        status: NodeStatusView {
            addresses,
            capacity: quantities(status.and_then(|s| s.capacity.as_ref())),
            allocatable: quantities(status.and_then(|s| s.allocatable.as_ref())),
        },
        usage: None,
        pods: BTreeMap::new(),
    }
}

/// Converts a k8s-openapi Pod object into a PodView
pub fn map_pod(pod: &Pod) -> PodView {
    let metadata = &pod.metadata;
    let status = pod.status.as_ref();

    let statuses: &[ContainerStatus] = status
        .and_then(|s| s.container_statuses.as_deref())
        .unwrap_or(&[]);

    let containers = pod
        .spec
        .as_ref()
        .map(|spec| {
            spec.containers
                .iter()
                .map(|c| map_container(c, statuses.iter().find(|s| s.name == c.name)))
                .collect()
        })
        .unwrap_or_default();

    PodView {
        name: metadata.name.clone().unwrap_or_default(),
        namespace: metadata.namespace.clone().unwrap_or_default(),
        labels: metadata.labels.clone().unwrap_or_default(),
        phase: status.and_then(|s| s.phase.clone()),
        start_time: status
            .and_then(|s| s.start_time.as_ref())
            .and_then(time_to_string),
        deleted: metadata
            .deletion_timestamp
            .as_ref()
            .and_then(time_to_string)
            .and_then(|ts| DateTime::parse_from_rfc3339(&ts).ok())
            .map(|dt| dt.timestamp()),
        containers,
    }
}

fn map_container(container: &K8sContainer, status: Option<&ContainerStatus>) -> ContainerView {
    let resources = container.resources.as_ref();

    ContainerView {
        name: container.name.clone(),
        image: container.image.clone(),
        resources: ResourcesView {
            requests: quantities(resources.and_then(|r| r.requests.as_ref())),
            limits: quantities(resources.and_then(|r| r.limits.as_ref())),
            usage: None,
        },
        ready: status.map(|s| s.ready),
        restart_count: status.map(|s| s.restart_count),
        state: status
            .and_then(|s| s.state.as_ref())
            .and_then(|state| serde_json::to_value(state).ok()),
    }
}

fn quantities(map: Option<&BTreeMap<String, Quantity>>) -> BTreeMap<String, String> {
    map.map(|m| m.iter().map(|(k, q)| (k.clone(), q.0.clone())).collect())
        .unwrap_or_default()
}

/// RFC3339 text of an API timestamp, as it appears on the wire
fn time_to_string(time: &Time) -> Option<String> {
    serde_json::to_value(time)
        .ok()
        .and_then(|v| v.as_str().map(str::to_owned))
}

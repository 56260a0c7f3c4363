/// Kubernetes resource types read by the cluster provider
pub use k8s_openapi::api::core::v1::{
    Container as K8sContainer,
    ContainerStatus,
    Node,
    NodeStatus,
    Pod,
};
pub use k8s_openapi::apimachinery::pkg::api::resource::Quantity;

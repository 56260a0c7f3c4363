// Cluster discovery and state providers
pub mod cluster;
pub mod discovery;
pub mod kubernetes_provider;
pub mod mock_provider;

// Kube-rs based Kubernetes client
pub mod kube_client;
pub mod kube_resources;
pub mod mappers;
pub mod metrics;
pub mod nodes;
pub mod pods;

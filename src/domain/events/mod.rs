//! Viewer-facing event protocol: what a dashboard connection receives.

pub mod event;
pub mod service;
pub mod subscription;

pub const CLUSTER_STATUS: &str = "clusterstatus";
pub const CLUSTER_UPDATE: &str = "clusterupdate";
pub const CLUSTER_DELTA: &str = "clusterdelta";
pub const BOOTSTRAP_END: &str = "bootstrapend";

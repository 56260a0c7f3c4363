pub mod cluster_snapshot;
pub mod cluster_status;
pub mod server_status;

//! API route declarations (e.g., /api/v1/*)

pub mod cluster_routes;
pub mod config_routes;
pub mod system_routes;

pub mod cluster_update;

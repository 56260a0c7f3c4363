pub mod cluster_summary;

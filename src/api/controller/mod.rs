pub mod cluster;
pub mod config;
pub mod events;
pub mod system;

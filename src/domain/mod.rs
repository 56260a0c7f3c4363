pub mod cluster;
pub mod events;
pub mod system;

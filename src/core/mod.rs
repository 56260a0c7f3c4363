pub mod backoff;
pub mod client;
pub mod delta;
pub mod state;
pub mod store;

//! Shared store: key/value state, pub/sub fan-out and the update lock.
//!
//! Two implementations share the [`Store`] contract:
//! - [`memory_store::MemoryStore`] for a single replica (lock always granted,
//!   events fanned out in-process)
//! - [`redis_store::RedisStore`] for several replicas behind a load balancer
//!   (lease based lock, events fanned out through a Redis channel)

pub mod memory_store;
pub mod redis_store;

use std::collections::BTreeSet;
use std::fmt;

use anyhow::{Context, Result};
use async_trait::async_trait;
use futures::stream::BoxStream;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::core::state::cluster_status::ClusterStatus;

pub const CLUSTER_IDS_KEY: &str = "cluster-ids";

/// Name of the lock guarding the update loop.
pub const UPDATE_LOCK: &str = "update";

pub fn cluster_status_key(cluster_id: &str) -> String {
    format!("clusters:{cluster_id}:status")
}

pub fn cluster_data_key(cluster_id: &str) -> String {
    format!("clusters:{cluster_id}:data")
}

/// A published message as seen by listeners.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoreEvent {
    pub event_type: String,
    pub payload: Value,
}

impl StoreEvent {
    pub fn new(event_type: impl Into<String>, payload: Value) -> Self {
        Self {
            event_type: event_type.into(),
            payload,
        }
    }
}

/// Proof of ownership of the update lock.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LockHandle {
    pub resource: String,
    pub token: String,
}

impl LockHandle {
    pub fn new(resource: impl Into<String>) -> Self {
        Self {
            resource: resource.into(),
            token: uuid::Uuid::new_v4().to_string(),
        }
    }
}

impl fmt::Display for LockHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.resource, self.token)
    }
}

/// Endless stream of published events for one listener.
pub type EventStream = BoxStream<'static, StoreEvent>;

#[async_trait]
pub trait Store: Send + Sync {
    /// Short name for logs and the status endpoint
    fn kind(&self) -> &'static str;

    async fn get(&self, key: &str) -> Result<Option<Value>>;

    async fn set(&self, key: &str, value: Value) -> Result<()>;

    /// Tries to take the update lock without waiting.
    ///
    /// `Ok(None)` means another replica currently holds it. A granted lock
    /// expires on its own if the holder disappears.
    async fn acquire_lock(&self) -> Result<Option<LockHandle>>;

    /// Renews the lease of a held lock.
    ///
    /// `Ok(false)` means the lease already ran out and the lock may belong to
    /// another replica now; the holder must stop writing.
    async fn extend_lock(&self, lock: &LockHandle) -> Result<bool>;

    /// Gives the lock back. Safe to call after the lease already expired.
    async fn release_lock(&self, lock: LockHandle) -> Result<()>;

    /// Delivers the event to every listener active right now, at most once.
    async fn publish(&self, event_type: &str, payload: Value) -> Result<()>;

    /// Registers a new listener. The listener is active as soon as this
    /// returns and stays registered until the stream is dropped.
    async fn listen(&self) -> Result<EventStream>;

    // ---------------------------
    // Typed cluster accessors
    // ---------------------------

    async fn get_cluster_ids(&self) -> Result<Vec<String>> {
        match self.get(CLUSTER_IDS_KEY).await? {
            Some(value) => serde_json::from_value(value).context("malformed cluster id list"),
            None => Ok(Vec::new()),
        }
    }

    async fn set_cluster_ids(&self, cluster_ids: &BTreeSet<String>) -> Result<()> {
        let sorted: Vec<&String> = cluster_ids.iter().collect();
        self.set(CLUSTER_IDS_KEY, serde_json::to_value(sorted)?).await
    }

    async fn get_cluster_status(&self, cluster_id: &str) -> Result<Option<ClusterStatus>> {
        match self.get(&cluster_status_key(cluster_id)).await? {
            Some(value) => serde_json::from_value(value)
                .map(Some)
                .with_context(|| format!("malformed status of cluster {cluster_id}")),
            None => Ok(None),
        }
    }

    async fn set_cluster_status(&self, cluster_id: &str, status: &ClusterStatus) -> Result<()> {
        self.set(&cluster_status_key(cluster_id), serde_json::to_value(status)?)
            .await
    }

    async fn get_cluster_data(&self, cluster_id: &str) -> Result<Option<Value>> {
        self.get(&cluster_data_key(cluster_id)).await
    }

    async fn set_cluster_data(&self, cluster_id: &str, data: Value) -> Result<()> {
        self.set(&cluster_data_key(cluster_id), data).await
    }
}

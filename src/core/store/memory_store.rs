use std::collections::HashMap;
use std::pin::Pin;
use std::sync::{Arc, Mutex, MutexGuard};
use std::task::{Context, Poll};

use anyhow::Result;
use async_trait::async_trait;
use futures::Stream;
use serde_json::Value;
use tokio::sync::{mpsc, RwLock};
use tracing::debug;

use crate::core::store::{EventStream, LockHandle, Store, StoreEvent, UPDATE_LOCK};

/// In-process store for a single replica.
///
/// The update lock is always granted. Listener registration and publishing
/// go through the same mutex, so a listener that registers while an event is
/// being published either gets that event or only later ones, never a gap.
pub struct MemoryStore {
    data: RwLock<HashMap<String, Value>>,
    listeners: Arc<Mutex<Listeners>>,
}

#[derive(Default)]
struct Listeners {
    next_id: u64,
    senders: HashMap<u64, mpsc::UnboundedSender<StoreEvent>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            data: RwLock::new(HashMap::new()),
            listeners: Arc::new(Mutex::new(Listeners::default())),
        }
    }

    pub fn shared(self) -> Arc<Self> {
        Arc::new(self)
    }

    /// Number of currently registered listeners.
    pub fn listener_count(&self) -> usize {
        lock_listeners(&self.listeners).senders.len()
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

// a panic while holding the guard leaves the map itself consistent
fn lock_listeners(listeners: &Mutex<Listeners>) -> MutexGuard<'_, Listeners> {
    listeners.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[async_trait]
impl Store for MemoryStore {
    fn kind(&self) -> &'static str {
        "memory"
    }

    async fn get(&self, key: &str) -> Result<Option<Value>> {
        Ok(self.data.read().await.get(key).cloned())
    }

    async fn set(&self, key: &str, value: Value) -> Result<()> {
        self.data.write().await.insert(key.to_string(), value);
        Ok(())
    }

    async fn acquire_lock(&self) -> Result<Option<LockHandle>> {
        Ok(Some(LockHandle::new(UPDATE_LOCK)))
    }

    async fn extend_lock(&self, _lock: &LockHandle) -> Result<bool> {
        Ok(true)
    }

    async fn release_lock(&self, _lock: LockHandle) -> Result<()> {
        Ok(())
    }

    async fn publish(&self, event_type: &str, payload: Value) -> Result<()> {
        let event = StoreEvent::new(event_type, payload);
        let mut listeners = lock_listeners(&self.listeners);

        // closed receivers are dropped here as a fallback to the Drop hook
        listeners
            .senders
            .retain(|_, sender| sender.send(event.clone()).is_ok());
        Ok(())
    }

    async fn listen(&self) -> Result<EventStream> {
        let (tx, rx) = mpsc::unbounded_channel();

        let id = {
            let mut listeners = lock_listeners(&self.listeners);
            let id = listeners.next_id;
            listeners.next_id += 1;
            listeners.senders.insert(id, tx);
            id
        };
        debug!("Memory store listener {} registered", id);

        Ok(Box::pin(MemoryListener {
            id,
            rx,
            listeners: Arc::clone(&self.listeners),
        }))
    }
}

/// Receiving end of one listener. Deregisters itself when dropped.
struct MemoryListener {
    id: u64,
    rx: mpsc::UnboundedReceiver<StoreEvent>,
    listeners: Arc<Mutex<Listeners>>,
}

impl Stream for MemoryListener {
    type Item = StoreEvent;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<StoreEvent>> {
        // the registry keeps our sender alive, so this never yields `None`
        self.get_mut().rx.poll_recv(cx)
    }
}

impl Drop for MemoryListener {
    fn drop(&mut self) {
        lock_listeners(&self.listeners).senders.remove(&self.id);
        debug!("Memory store listener {} removed", self.id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::state::cluster_status::ClusterStatus;
    use futures::StreamExt;
    use serde_json::json;
    use std::collections::BTreeSet;
    use std::time::Duration;

    #[tokio::test]
    async fn get_and_set_roundtrip() {
        let store = MemoryStore::new();
        assert_eq!(store.get("missing").await.unwrap(), None);

        store.set("k", json!({"a": 1})).await.unwrap();
        assert_eq!(store.get("k").await.unwrap(), Some(json!({"a": 1})));
    }

    #[tokio::test]
    async fn lock_is_always_granted_and_release_is_idempotent() {
        let store = MemoryStore::new();
        let a = store.acquire_lock().await.unwrap().unwrap();
        let b = store.acquire_lock().await.unwrap().unwrap();
        assert_ne!(a.token, b.token);
        assert!(store.extend_lock(&a).await.unwrap());

        store.release_lock(a.clone()).await.unwrap();
        store.release_lock(a).await.unwrap();
    }

    #[tokio::test]
    async fn every_listener_gets_every_event() {
        let store = MemoryStore::new();
        let mut first = store.listen().await.unwrap();
        let mut second = store.listen().await.unwrap();

        store.publish("clusterdelta", json!({"cluster_id": "c1"})).await.unwrap();
        store.publish("clusterstatus", json!({"cluster_id": "c2"})).await.unwrap();

        for listener in [&mut first, &mut second] {
            let a = listener.next().await.unwrap();
            let b = listener.next().await.unwrap();
            assert_eq!(a.event_type, "clusterdelta");
            assert_eq!(b.event_type, "clusterstatus");
            assert_eq!(b.payload["cluster_id"], json!("c2"));
        }
    }

    #[tokio::test]
    async fn late_listeners_get_no_replay() {
        let store = MemoryStore::new();
        store.publish("clusterupdate", json!({"id": "c1"})).await.unwrap();

        let mut late = store.listen().await.unwrap();
        let pending = tokio::time::timeout(Duration::from_millis(50), late.next()).await;
        assert!(pending.is_err(), "late listener must not see older events");
    }

    #[tokio::test]
    async fn dropped_listener_is_deregistered() {
        let store = MemoryStore::new();
        let listener = store.listen().await.unwrap();
        let _kept = store.listen().await.unwrap();
        assert_eq!(store.listener_count(), 2);

        drop(listener);
        assert_eq!(store.listener_count(), 1);

        store.publish("clusterdelta", json!({})).await.unwrap();
        assert_eq!(store.listener_count(), 1);
    }

    #[tokio::test]
    async fn concurrent_listeners_do_not_lose_events() {
        let store = Arc::new(MemoryStore::new());
        let mut tasks = Vec::new();

        for _ in 0..16 {
            let listener = store.listen().await.unwrap();
            tasks.push(tokio::spawn(async move {
                listener.take(100).collect::<Vec<_>>().await.len()
            }));
        }

        let publisher = Arc::clone(&store);
        tokio::spawn(async move {
            for i in 0..100 {
                publisher.publish("clusterdelta", json!({"i": i})).await.unwrap();
            }
        })
        .await
        .unwrap();

        for task in tasks {
            assert_eq!(task.await.unwrap(), 100);
        }
    }

    #[tokio::test]
    async fn typed_cluster_accessors() {
        let store = MemoryStore::new();
        assert!(store.get_cluster_ids().await.unwrap().is_empty());
        assert_eq!(store.get_cluster_status("c1").await.unwrap(), None);

        let ids: BTreeSet<String> = ["c2".to_string(), "c1".to_string()].into();
        store.set_cluster_ids(&ids).await.unwrap();
        assert_eq!(store.get_cluster_ids().await.unwrap(), vec!["c1", "c2"]);
        assert_eq!(store.get("cluster-ids").await.unwrap(), Some(json!(["c1", "c2"])));

        let status = ClusterStatus::default();
        store.set_cluster_status("c1", &status).await.unwrap();
        assert_eq!(store.get_cluster_status("c1").await.unwrap(), Some(status));

        store.set_cluster_data("c1", json!({"id": "c1"})).await.unwrap();
        assert_eq!(
            store.get("clusters:c1:data").await.unwrap(),
            Some(json!({"id": "c1"}))
        );
    }
}

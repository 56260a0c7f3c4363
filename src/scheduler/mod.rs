//! Update scheduler: one loop per replica. Only the replica holding the
//! update lock polls clusters during a tick; the others idle and retry.

pub mod tasks;

use std::panic::AssertUnwindSafe;
use std::time::Duration;

use futures::FutureExt;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use crate::core::backoff::jittered_interval;
use crate::scheduler::tasks::cluster_update::task::{self, UpdateContext};

/// Base pause between ticks, jittered to [1s, 2s)
const TICK_PAUSE: Duration = Duration::from_secs(1);

/// Runs update ticks until `shutdown` turns true (or its sender is dropped).
pub async fn run(ctx: UpdateContext, mut shutdown: watch::Receiver<bool>) {
    info!("🚀 Update scheduler started (store: {})", ctx.store.kind());
    let mut leader = false;

    loop {
        if *shutdown.borrow() {
            break;
        }

        match ctx.store.acquire_lock().await {
            Ok(Some(lock)) => {
                if !leader {
                    info!("Acquired update lock, polling clusters");
                    leader = true;
                }

                match AssertUnwindSafe(task::run(&ctx, &lock)).catch_unwind().await {
                    Ok(Ok(report)) => debug!("Tick handled {} cluster(s)", report.outcomes.len()),
                    Ok(Err(e)) => error!("❌ Failed to update clusters: {:#}", e),
                    Err(_) => error!("❌ Update tick panicked"),
                }

                if let Err(e) = ctx.store.release_lock(lock).await {
                    warn!("Failed to release update lock: {:#}", e);
                }
            }
            Ok(None) => {
                if leader {
                    info!("Update lock held by another replica");
                    leader = false;
                }
                debug!("Update lock not acquired");
            }
            Err(e) => {
                leader = false;
                error!("❌ Failed to acquire update lock: {:#}", e);
            }
        }

        tokio::select! {
            _ = tokio::time::sleep(jittered_interval(TICK_PAUSE)) => {}
            changed = shutdown.changed() => {
                if changed.is_err() {
                    break;
                }
            }
        }
    }

    info!("Update scheduler stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use anyhow::Result;
    use async_trait::async_trait;
    use serde_json::Value;

    use crate::core::client::cluster::{ClusterDescriptor, ClusterStateProvider};
    use crate::core::client::discovery::MockDiscoverer;
    use crate::core::client::mock_provider::MockStateProvider;
    use crate::core::state::cluster_snapshot::ClusterSnapshot;
    use crate::core::store::memory_store::MemoryStore;
    use crate::core::store::{EventStream, LockHandle, Store};
    use crate::errors::ProviderError;
    use crate::scheduler::tasks::cluster_update::task::system_clock;

    /// Memory store whose first `failing_sets` writes fail. Counts lock releases.
    #[derive(Default)]
    struct FlakyStore {
        inner: MemoryStore,
        failing_sets: AtomicUsize,
        releases: AtomicUsize,
    }

    impl FlakyStore {
        fn failing(sets: usize) -> Self {
            Self {
                failing_sets: AtomicUsize::new(sets),
                ..Default::default()
            }
        }

        fn releases(&self) -> usize {
            self.releases.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl Store for FlakyStore {
        fn kind(&self) -> &'static str {
            "flaky"
        }

        async fn get(&self, key: &str) -> Result<Option<Value>> {
            self.inner.get(key).await
        }

        async fn set(&self, key: &str, value: Value) -> Result<()> {
            let failing = self
                .failing_sets
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .is_ok();
            if failing {
                anyhow::bail!("store unavailable");
            }
            self.inner.set(key, value).await
        }

        async fn acquire_lock(&self) -> Result<Option<LockHandle>> {
            self.inner.acquire_lock().await
        }

        async fn extend_lock(&self, lock: &LockHandle) -> Result<bool> {
            self.inner.extend_lock(lock).await
        }

        async fn release_lock(&self, lock: LockHandle) -> Result<()> {
            self.releases.fetch_add(1, Ordering::SeqCst);
            self.inner.release_lock(lock).await
        }

        async fn publish(&self, event_type: &str, payload: Value) -> Result<()> {
            self.inner.publish(event_type, payload).await
        }

        async fn listen(&self) -> Result<EventStream> {
            self.inner.listen().await
        }
    }

    /// Panics on its first query, then serves mock clusters.
    #[derive(Default)]
    struct PanicOnceProvider {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl ClusterStateProvider for PanicOnceProvider {
        async fn query(&self, cluster: &ClusterDescriptor) -> Result<ClusterSnapshot, ProviderError> {
            if self.calls.fetch_add(1, Ordering::SeqCst) == 0 {
                panic!("provider bug");
            }
            MockStateProvider.query(cluster).await
        }
    }

    fn context(store: Arc<dyn Store>, provider: Arc<dyn ClusterStateProvider>) -> UpdateContext {
        UpdateContext {
            store,
            discoverer: Arc::new(MockDiscoverer),
            provider,
            query_interval: Duration::from_secs(5),
            clock: system_clock(),
        }
    }

    async fn wait_for_cluster_ids(store: &dyn Store) -> Vec<String> {
        for _ in 0..250 {
            let ids = store.get_cluster_ids().await.unwrap();
            if !ids.is_empty() {
                return ids;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        Vec::new()
    }

    #[tokio::test]
    async fn polls_until_shutdown() {
        let store = MemoryStore::new().shared();
        let ctx = context(store.clone(), Arc::new(MockStateProvider));
        let (tx, rx) = watch::channel(false);
        let handle = tokio::spawn(run(ctx, rx));

        let ids = wait_for_cluster_ids(store.as_ref()).await;
        assert_eq!(ids, vec!["mock-cluster-0", "mock-cluster-1", "mock-cluster-2"]);
        assert!(store.get_cluster_data("mock-cluster-0").await.unwrap().is_some());

        tx.send(true).unwrap();
        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .expect("scheduler should stop on shutdown")
            .unwrap();
    }

    #[tokio::test]
    async fn stops_when_shutdown_sender_is_gone() {
        let ctx = context(MemoryStore::new().shared(), Arc::new(MockStateProvider));
        let (tx, rx) = watch::channel(false);
        let handle = tokio::spawn(run(ctx, rx));
        drop(tx);

        tokio::time::timeout(Duration::from_secs(3), handle)
            .await
            .expect("scheduler should stop")
            .unwrap();
    }

    #[tokio::test]
    async fn failed_tick_releases_lock_and_loop_goes_on() {
        let store = Arc::new(FlakyStore::failing(1));
        let ctx = context(store.clone(), Arc::new(MockStateProvider));
        let (tx, rx) = watch::channel(false);
        let handle = tokio::spawn(run(ctx, rx));

        let ids = wait_for_cluster_ids(store.as_ref()).await;
        assert_eq!(ids.len(), 3, "a later tick should complete");
        assert!(store.releases() >= 1);

        tx.send(true).unwrap();
        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .unwrap()
            .unwrap();
    }

    #[tokio::test]
    async fn panicking_tick_releases_lock_and_loop_goes_on() {
        let store = Arc::new(FlakyStore::default());
        let ctx = context(store.clone(), Arc::new(PanicOnceProvider::default()));
        let (tx, rx) = watch::channel(false);
        let handle = tokio::spawn(run(ctx, rx));

        let ids = wait_for_cluster_ids(store.as_ref()).await;
        assert_eq!(ids.len(), 3, "a later tick should complete");
        assert!(store.releases() >= 1);

        tx.send(true).unwrap();
        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .unwrap()
            .unwrap();
    }
}

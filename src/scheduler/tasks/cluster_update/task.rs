use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Result};
use chrono::{DateTime, Utc};
use serde_json::{json, Value};
use tracing::{debug, error, info, warn};

use crate::core::backoff::calculate_backoff;
use crate::core::client::cluster::{ClusterDescriptor, ClusterDiscoverer, ClusterStateProvider};
use crate::core::delta::diff;
use crate::core::state::cluster_status::ClusterStatus;
use crate::core::store::{LockHandle, Store};
use crate::domain::events::{CLUSTER_DELTA, CLUSTER_STATUS, CLUSTER_UPDATE};
use crate::errors::ProviderError;

/// Source of the current time.
pub type Clock = Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;

pub fn system_clock() -> Clock {
    Arc::new(Utc::now)
}

/// Collaborators of one update tick.
#[derive(Clone)]
pub struct UpdateContext {
    pub store: Arc<dyn Store>,
    pub discoverer: Arc<dyn ClusterDiscoverer>,
    pub provider: Arc<dyn ClusterStateProvider>,
    pub query_interval: Duration,
    pub clock: Clock,
}

impl UpdateContext {
    fn now(&self) -> DateTime<Utc> {
        (self.clock)()
    }
}

/// What a tick did with one cluster.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClusterOutcome {
    /// Polled within the last query interval
    NotDue,
    /// Backing off until `next_retry_time`
    BackingOff,
    Failed { tries: u32 },
    Discovered,
    Updated { operations: usize },
    Unchanged,
}

#[derive(Debug, Default)]
pub struct TickReport {
    pub outcomes: Vec<(String, ClusterOutcome)>,
}

impl TickReport {
    pub fn outcome(&self, cluster_id: &str) -> Option<&ClusterOutcome> {
        self.outcomes
            .iter()
            .find(|(id, _)| id == cluster_id)
            .map(|(_, outcome)| outcome)
    }
}

/// Polls every due cluster once and publishes what changed.
///
/// Per-cluster query failures are booked as backoff and never fail the tick;
/// store failures do. The lease of `lock` is renewed before every write
/// phase and the tick stops as soon as it is lost.
pub async fn run(ctx: &UpdateContext, lock: &LockHandle) -> Result<TickReport> {
    // --- Step 1: Discover clusters ---
    let clusters = match ctx.discoverer.get_clusters().await {
        Ok(clusters) => {
            ctx.provider.retain_clusters(&clusters);
            clusters
        }
        Err(e) => {
            error!("❌ Failed to discover clusters: {:#}", e);
            Vec::new()
        }
    };

    // --- Step 2: Update each cluster ---
    let mut report = TickReport::default();
    let mut cluster_ids = BTreeSet::new();
    for cluster in &clusters {
        ensure_lock(ctx, lock).await?;
        cluster_ids.insert(cluster.id.clone());
        let outcome = update_cluster(ctx, cluster).await?;
        report.outcomes.push((cluster.id.clone(), outcome));
    }

    // --- Step 3: Persist the cluster id set ---
    ensure_lock(ctx, lock).await?;
    ctx.store.set_cluster_ids(&cluster_ids).await?;

    debug!("Update tick finished for {} cluster(s)", cluster_ids.len());
    Ok(report)
}

async fn ensure_lock(ctx: &UpdateContext, lock: &LockHandle) -> Result<()> {
    if !ctx.store.extend_lock(lock).await? {
        bail!("update lock {} lost, another replica may be polling", lock);
    }
    Ok(())
}

async fn update_cluster(ctx: &UpdateContext, cluster: &ClusterDescriptor) -> Result<ClusterOutcome> {
    let now = ctx.now();
    let mut status = ctx
        .store
        .get_cluster_status(&cluster.id)
        .await?
        .unwrap_or_default();

    if !status.is_query_due(now, ctx.query_interval) {
        return Ok(match status.backoff {
            Some(_) => ClusterOutcome::BackingOff,
            None => ClusterOutcome::NotDue,
        });
    }

    let data = match query_cluster(ctx, cluster).await {
        Ok(data) => data,
        Err(e) => {
            let tries = status.backoff.as_ref().map_or(0, |b| b.tries) + 1;
            let delay = calculate_backoff(tries);
            // the wait starts when the failure is seen, not when the poll began
            status.record_failure(ctx.now(), delay);
            error!(
                "❌ Failed to query cluster {} ({}): {} (try {}, wait {:.0} seconds)",
                cluster.id,
                cluster.api_server_url,
                e.short_message(),
                tries,
                delay.as_secs_f64()
            );

            ctx.store.set_cluster_status(&cluster.id, &status).await?;
            publish_status(ctx.store.as_ref(), &cluster.id, &status).await?;
            return Ok(ClusterOutcome::Failed { tries });
        }
    };

    if let Some(cleared) = status.record_success(now) {
        info!(
            "✅ Cluster {} ({}) recovered after {} tries",
            cluster.id, cluster.api_server_url, cleared.tries
        );
    }

    let outcome = match ctx.store.get_cluster_data(&cluster.id).await? {
        Some(previous) => {
            let delta = diff(&previous, &data);
            ctx.store
                .publish(
                    CLUSTER_DELTA,
                    json!({ "cluster_id": cluster.id, "delta": delta }),
                )
                .await?;

            if delta.is_empty() {
                ClusterOutcome::Unchanged
            } else {
                ctx.store.set_cluster_data(&cluster.id, data).await?;
                ClusterOutcome::Updated {
                    operations: delta.len(),
                }
            }
        }
        None => {
            info!("Discovered new cluster {} ({})", cluster.id, cluster.api_server_url);
            ctx.store.publish(CLUSTER_UPDATE, data.clone()).await?;
            ctx.store.set_cluster_data(&cluster.id, data).await?;
            ClusterOutcome::Discovered
        }
    };

    ctx.store.set_cluster_status(&cluster.id, &status).await?;
    Ok(outcome)
}

/// Queries the provider and turns the snapshot into its stored document form.
async fn query_cluster(
    ctx: &UpdateContext,
    cluster: &ClusterDescriptor,
) -> Result<Value, ProviderError> {
    let snapshot = ctx.provider.query(cluster).await?;
    if snapshot.id != cluster.id {
        warn!(
            "Snapshot of cluster {} reports id {}, storing under {}",
            cluster.id, snapshot.id, cluster.id
        );
    }

    let mut data = serde_json::to_value(&snapshot)?;
    data["id"] = Value::String(cluster.id.clone());
    Ok(data)
}

async fn publish_status(store: &dyn Store, cluster_id: &str, status: &ClusterStatus) -> Result<()> {
    store
        .publish(
            CLUSTER_STATUS,
            json!({ "cluster_id": cluster_id, "status": status }),
        )
        .await
}

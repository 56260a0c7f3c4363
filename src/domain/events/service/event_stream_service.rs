use std::sync::Arc;

use anyhow::Result;
use futures::stream::{self, BoxStream, StreamExt};
use tracing::{debug, warn};

use crate::core::store::{Store, StoreEvent};
use crate::domain::events::event::ViewerEvent;
use crate::domain::events::subscription::Subscription;

/// Current state of every subscribed cluster: a status event per cluster,
/// followed by its full snapshot when one is stored, then `bootstrapend`.
pub async fn bootstrap_events(
    store: &dyn Store,
    subscription: &Subscription,
) -> Result<Vec<ViewerEvent>> {
    let mut events = Vec::new();

    for cluster_id in store.get_cluster_ids().await? {
        if !subscription.matches(&cluster_id) {
            continue;
        }

        let status = store
            .get_cluster_status(&cluster_id)
            .await?
            .unwrap_or_default();
        events.push(ViewerEvent::ClusterStatus {
            cluster_id: cluster_id.clone(),
            status,
        });

        if let Some(data) = store.get_cluster_data(&cluster_id).await? {
            events.push(ViewerEvent::ClusterUpdate(data));
        }
    }

    events.push(ViewerEvent::BootstrapEnd);
    Ok(events)
}

/// Maps a published store event to what the viewer should see, if anything.
pub fn live_event(event: StoreEvent, subscription: &Subscription) -> Option<ViewerEvent> {
    let event_type = event.event_type.clone();
    match ViewerEvent::from_store_event(event) {
        Ok(Some(viewer_event)) => viewer_event
            .cluster_id()
            .is_some_and(|id| subscription.matches(id))
            .then_some(viewer_event),
        Ok(None) => None,
        Err(e) => {
            warn!("Dropping {} event: {:#}", event_type, e);
            None
        }
    }
}

/// Complete event stream of one viewer connection: bootstrap, then live
/// events until the stream is dropped.
///
/// The store listener is registered before the bootstrap is read, so an
/// update published in between is delivered (possibly twice) rather than
/// lost. Viewers apply events idempotently.
pub async fn viewer_events(
    store: Arc<dyn Store>,
    subscription: Subscription,
) -> Result<BoxStream<'static, ViewerEvent>> {
    let live = store.listen().await?;
    let bootstrap = bootstrap_events(store.as_ref(), &subscription).await?;
    debug!(
        "Viewer bootstrap with {} event(s) for {:?}",
        bootstrap.len(),
        subscription.cluster_ids()
    );

    let live = live.filter_map(move |event| futures::future::ready(live_event(event, &subscription)));
    Ok(stream::iter(bootstrap).chain(live).boxed())
}

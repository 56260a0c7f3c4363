use anyhow::{Context, Result};
use axum::response::sse::Event;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::core::delta::EditScript;
use crate::core::state::cluster_status::ClusterStatus;
use crate::core::store::StoreEvent;
use crate::domain::events::{BOOTSTRAP_END, CLUSTER_DELTA, CLUSTER_STATUS, CLUSTER_UPDATE};

/// One message on a viewer stream.
#[derive(Debug, Clone, PartialEq)]
pub enum ViewerEvent {
    ClusterStatus {
        cluster_id: String,
        status: ClusterStatus,
    },
    /// Full snapshot document, carrying its cluster id as `id`
    ClusterUpdate(Value),
    ClusterDelta {
        cluster_id: String,
        delta: EditScript,
    },
    BootstrapEnd,
}

#[derive(Deserialize)]
struct StatusPayload {
    cluster_id: String,
    status: ClusterStatus,
}

#[derive(Deserialize)]
struct DeltaPayload {
    cluster_id: String,
    delta: EditScript,
}

impl ViewerEvent {
    /// Decodes a store event. Event types viewers don't know are `Ok(None)`.
    pub fn from_store_event(event: StoreEvent) -> Result<Option<Self>> {
        let decoded = match event.event_type.as_str() {
            CLUSTER_STATUS => {
                let p: StatusPayload = serde_json::from_value(event.payload)
                    .context("malformed clusterstatus payload")?;
                ViewerEvent::ClusterStatus {
                    cluster_id: p.cluster_id,
                    status: p.status,
                }
            }
            CLUSTER_UPDATE => ViewerEvent::ClusterUpdate(event.payload),
            CLUSTER_DELTA => {
                let p: DeltaPayload = serde_json::from_value(event.payload)
                    .context("malformed clusterdelta payload")?;
                ViewerEvent::ClusterDelta {
                    cluster_id: p.cluster_id,
                    delta: p.delta,
                }
            }
            _ => return Ok(None),
        };
        Ok(Some(decoded))
    }

    pub fn event_type(&self) -> &'static str {
        match self {
            ViewerEvent::ClusterStatus { .. } => CLUSTER_STATUS,
            ViewerEvent::ClusterUpdate(_) => CLUSTER_UPDATE,
            ViewerEvent::ClusterDelta { .. } => CLUSTER_DELTA,
            ViewerEvent::BootstrapEnd => BOOTSTRAP_END,
        }
    }

    /// Cluster the event is about; `None` for protocol events.
    pub fn cluster_id(&self) -> Option<&str> {
        match self {
            ViewerEvent::ClusterStatus { cluster_id, .. }
            | ViewerEvent::ClusterDelta { cluster_id, .. } => Some(cluster_id),
            ViewerEvent::ClusterUpdate(data) => data.get("id").and_then(Value::as_str),
            ViewerEvent::BootstrapEnd => None,
        }
    }

    /// The `data:` line content. Empty for `bootstrapend`.
    pub fn data(&self) -> String {
        match self {
            ViewerEvent::ClusterStatus { cluster_id, status } => {
                json!({ "cluster_id": cluster_id, "status": status }).to_string()
            }
            ViewerEvent::ClusterUpdate(data) => data.to_string(),
            ViewerEvent::ClusterDelta { cluster_id, delta } => {
                json!({ "cluster_id": cluster_id, "delta": delta }).to_string()
            }
            ViewerEvent::BootstrapEnd => String::new(),
        }
    }

    /// Wire frame as written to the event stream.
    pub fn to_frame(&self) -> String {
        format!("event: {}\ndata: {}\n\n", self.event_type(), self.data())
    }

    pub fn to_sse(&self) -> Event {
        Event::default().event(self.event_type()).data(self.data())
    }
}

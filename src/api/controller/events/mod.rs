//! Events controller: the server-sent event stream viewers connect to

use std::convert::Infallible;

use axum::extract::{Query, State};
use axum::http::{header, HeaderName};
use axum::response::sse::{KeepAlive, Sse};
use axum::response::IntoResponse;
use futures::StreamExt;
use tracing::debug;
use uuid::Uuid;

use crate::api::dto::events_dto::EventsQuery;
use crate::app_state::AppState;
use crate::domain::events::service::event_stream_service::viewer_events;
use crate::domain::events::subscription::Subscription;
use crate::errors::{store_error, AppError};

const X_ACCEL_BUFFERING: HeaderName = HeaderName::from_static("x-accel-buffering");

/// Logs the end of a viewer connection when the response stream is dropped.
struct ViewerConnection(Uuid);

impl Drop for ViewerConnection {
    fn drop(&mut self) {
        debug!("Viewer {} disconnected", self.0);
    }
}

pub struct EventsController;

impl EventsController {
    pub async fn stream(
        State(state): State<AppState>,
        Query(query): Query<EventsQuery>,
    ) -> Result<impl IntoResponse, AppError> {
        let subscription = Subscription::from_query(query.cluster_ids.as_deref());
        let events = viewer_events(state.store.clone(), subscription)
            .await
            .map_err(store_error)?;

        let connection = ViewerConnection(Uuid::new_v4());
        debug!("Viewer {} connected", connection.0);

        // streams end once the server stops, so graceful shutdown can finish
        let server_status = state.server_status.clone();
        let stream = events
            .take_until(async move { server_status.stopped().await })
            .map(move |event| {
                let _ = &connection;
                Ok::<_, Infallible>(event.to_sse())
            });

        Ok((
            [
                (header::CACHE_CONTROL, "no-cache"),
                (X_ACCEL_BUFFERING, "no"),
            ],
            Sse::new(stream).keep_alive(KeepAlive::default()),
        ))
    }
}

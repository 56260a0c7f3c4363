use axum::{
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Router,
};
use tower_http::cors::CorsLayer;

use crate::api::controller::events::EventsController;
use crate::app_state::AppState;

/// Build the main application router
pub fn app_router() -> Router<AppState> {
    // Cluster, System and Config subrouters live under /api/v1
    let api_v1 = Router::new()
        .nest("/clusters", crate::api::routes::cluster_routes::cluster_routes())
        .nest("/system", crate::api::routes::system_routes::system_routes())
        .nest("/config", crate::api::routes::config_routes::config_routes());

    Router::new()
        // Health check (load balancer)
        .route("/health", get(health_check))
        // Viewer event stream
        .route("/events", get(EventsController::stream))
        // API v1
        .nest("/api/v1", api_v1)
        // Fallback handler for 404
        .fallback(handler_404)
        .layer(CorsLayer::very_permissive())
}

// Fails once shutdown started so the replica is taken out of rotation
async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    if state.server_status.is_shutting_down() {
        (StatusCode::SERVICE_UNAVAILABLE, "SHUTTING DOWN")
    } else {
        (StatusCode::OK, "OK")
    }
}

// Handler for 404 Not Found
async fn handler_404() -> impl IntoResponse {
    (
        StatusCode::NOT_FOUND,
        "The requested resource was not found",
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;
    use std::sync::Arc;

    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use serde_json::{json, Value};
    use tower::ServiceExt;

    use crate::app_state::build_app_state;
    use crate::config::AppConfig;
    use crate::core::state::server_status::ServerStatus;
    use crate::core::store::memory_store::MemoryStore;
    use crate::core::store::Store;

    async fn app() -> (Router, Arc<MemoryStore>, Arc<ServerStatus>) {
        let store = MemoryStore::new().shared();
        store
            .set_cluster_ids(&BTreeSet::from(["c1".to_string()]))
            .await
            .unwrap();
        store
            .set_cluster_data("c1", json!({ "id": "c1", "nodes": {} }))
            .await
            .unwrap();

        let config = AppConfig::from_lookup(|key| match key {
            "NODE_LINK_URL_TEMPLATE" => Some("https://nodes/{cluster}/{name}".to_string()),
            _ => None,
        })
        .unwrap();
        let server_status = Arc::new(ServerStatus::new());
        let state = build_app_state(config, store.clone(), server_status.clone());
        (app_router().with_state(state), store, server_status)
    }

    async fn get(router: &Router, uri: &str) -> (StatusCode, Vec<u8>) {
        let response = router
            .clone()
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, body.to_vec())
    }

    #[tokio::test]
    async fn health_turns_unavailable_on_shutdown() {
        let (router, _, server_status) = app().await;
        assert_eq!(get(&router, "/health").await.0, StatusCode::OK);

        server_status.begin_shutdown();
        assert_eq!(get(&router, "/health").await.0, StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn cluster_endpoints() {
        let (router, _, _) = app().await;

        let (status, body) = get(&router, "/api/v1/clusters").await;
        assert_eq!(status, StatusCode::OK);
        let body: Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(body["data"][0]["id"], "c1");

        let (status, body) = get(&router, "/api/v1/clusters/c1").await;
        assert_eq!(status, StatusCode::OK);
        let body: Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(body["data"]["id"], "c1");

        let (status, _) = get(&router, "/api/v1/clusters/c9").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn config_and_fallback() {
        let (router, _, _) = app().await;

        let (status, body) = get(&router, "/api/v1/config").await;
        assert_eq!(status, StatusCode::OK);
        let body: Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(body["data"]["node_link_url_template"], "https://nodes/{cluster}/{name}");

        assert_eq!(get(&router, "/nope").await.0, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn event_stream_bootstraps_and_ends_on_stop() {
        let (router, _, server_status) = app().await;
        let response = router
            .clone()
            .oneshot(Request::builder().uri("/events?cluster_ids=c1").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()["cache-control"], "no-cache");
        assert_eq!(response.headers()["x-accel-buffering"], "no");
        assert!(response.headers()["content-type"]
            .to_str()
            .unwrap()
            .starts_with("text/event-stream"));

        // the stream stays open for live events until the server stops
        let stopper = {
            let server_status = server_status.clone();
            tokio::spawn(async move {
                tokio::time::sleep(std::time::Duration::from_millis(200)).await;
                server_status.stop();
            })
        };
        let body = tokio::time::timeout(
            std::time::Duration::from_secs(5),
            to_bytes(response.into_body(), usize::MAX),
        )
        .await
        .expect("stream should end after stop")
        .unwrap();
        stopper.await.unwrap();
        let text = String::from_utf8(body.to_vec()).unwrap();
        assert!(text.contains("event: clusterstatus\n"));
        assert!(text.contains("event: clusterupdate\n"));
        assert!(text.contains("event: bootstrapend\n"));
    }
}

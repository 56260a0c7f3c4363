use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tracing::{error, info};

use kube_ops_view::app_state::build_app_state;
use kube_ops_view::config::AppConfig;
use kube_ops_view::core::state::server_status::ServerStatus;
use kube_ops_view::logging::init_tracing;
use kube_ops_view::routes::app_router;
use kube_ops_view::scheduler;
use kube_ops_view::startup::{build_store, build_update_context};

#[tokio::main]
async fn main() -> Result<()> {
    // --- Configuration & logging ---
    let config = AppConfig::from_env()?;
    let _log_guard = init_tracing(config.debug, config.log_dir.as_deref())?;
    info!(
        "Starting kube-ops-view {} (query interval {}s)",
        env!("CARGO_PKG_VERSION"),
        config.query_interval_secs
    );

    // --- Store & background update loop ---
    let store = build_store(&config).await?;
    let server_status = Arc::new(ServerStatus::new());
    let update_context = build_update_context(&config, store.clone()).await?;
    let scheduler = tokio::spawn(scheduler::run(update_context, server_status.subscribe()));

    // --- HTTP server ---
    let grace_period = config.shutdown_grace_period();
    let addr = SocketAddr::from(([0, 0, 0, 0], config.server_port));
    let app = app_router().with_state(build_app_state(config, store, server_status.clone()));

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;
    info!("🚀 Listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(server_status.clone(), grace_period))
        .await
        .context("HTTP server failed")?;

    if let Err(e) = scheduler.await {
        error!("❌ Update scheduler task failed: {}", e);
    }

    info!("Shutdown complete");
    Ok(())
}

/// Fails health checks for the grace period after a termination signal,
/// then stops background work and open viewer streams.
async fn shutdown_signal(server_status: Arc<ServerStatus>, grace_period: Duration) {
    wait_for_termination().await;

    info!("Received termination signal, draining for {:?}", grace_period);
    server_status.begin_shutdown();
    tokio::time::sleep(grace_period).await;
    server_status.stop();
}

async fn wait_for_termination() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("❌ Failed to listen for ctrl-c: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!("❌ Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}

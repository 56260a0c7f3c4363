use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::watch;

/// Process lifecycle shared by the HTTP layer and the background tasks.
///
/// Shutdown happens in two steps: `begin_shutdown` makes the health check
/// fail so the load balancer drains this replica, `stop` ends the scheduler
/// and all open viewer streams.
#[derive(Debug)]
pub struct ServerStatus {
    shutting_down: AtomicBool,
    stop: watch::Sender<bool>,
}

impl ServerStatus {
    pub fn new() -> Self {
        let (stop, _) = watch::channel(false);
        Self {
            shutting_down: AtomicBool::new(false),
            stop,
        }
    }

    pub fn is_shutting_down(&self) -> bool {
        self.shutting_down.load(Ordering::SeqCst)
    }

    pub fn begin_shutdown(&self) {
        self.shutting_down.store(true, Ordering::SeqCst);
    }

    pub fn stop(&self) {
        self.begin_shutdown();
        self.stop.send_replace(true);
    }

    /// Receiver that turns `true` once `stop` is called.
    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.stop.subscribe()
    }

    /// Resolves once `stop` has been called.
    pub async fn stopped(&self) {
        let mut rx = self.subscribe();
        // the sender lives in self, so wait_for only fails if self is gone
        let _ = rx.wait_for(|stopped| *stopped).await;
    }
}

impl Default for ServerStatus {
    fn default() -> Self {
        Self::new()
    }
}

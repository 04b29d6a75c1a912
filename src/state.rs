// Luna MCP gateway - Application state

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use crate::dispatch::Dispatcher;

/// Central application state. Clone-friendly; everything shared sits behind `Arc`.
#[derive(Clone)]
pub struct AppState {
    pub dispatcher: Arc<Dispatcher>,
    pub start_time: Instant,
    /// `true` once startup composition has finished.
    pub ready: Arc<AtomicBool>,
    /// Whether GitHub OAuth application credentials are configured.
    pub github_oauth: bool,
}

// ── readiness helpers ───────────────────────────────────────────────────────
impl AppState {
    pub fn new(dispatcher: Arc<Dispatcher>, github_oauth: bool) -> Self {
        Self {
            dispatcher,
            start_time: Instant::now(),
            ready: Arc::new(AtomicBool::new(false)),
            github_oauth,
        }
    }

    pub fn is_ready(&self) -> bool {
        self.ready.load(Ordering::Relaxed)
    }

    pub fn mark_ready(&self) {
        self.ready.store(true, Ordering::Relaxed);
        tracing::info!("Gateway marked as READY");
    }
}

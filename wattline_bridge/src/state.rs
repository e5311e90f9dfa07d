//! Shared bridge state: fan-out channel and the latest forwarded line.

use std::sync::atomic::AtomicUsize;
use std::sync::Arc;
use tokio::sync::{broadcast, RwLock};
use tracing::{trace, warn};

// Subscribers further behind than this skip ahead.
const FANOUT_CAPACITY: usize = 64;

#[derive(Clone)]
pub struct AppState {
    // Every validated line goes out to all subscribers
    pub lines: broadcast::Sender<String>,

    // Last forwarded line, sent first to new subscribers
    pub last_line: Arc<RwLock<Option<String>>>,

    pub client_count: Arc<AtomicUsize>,
    pub auth_token: Option<String>,
}

impl AppState {
    pub fn new(auth_token: Option<String>) -> Self {
        let (lines, _) = broadcast::channel(FANOUT_CAPACITY);
        Self {
            lines,
            last_line: Arc::new(RwLock::new(None)),
            client_count: Arc::new(AtomicUsize::new(0)),
            auth_token,
        }
    }

    /// Validates `line` as JSON and forwards it. Returns false if it was dropped.
    pub async fn publish(&self, line: &str) -> bool {
        let line = line.trim();
        if line.is_empty() {
            return false;
        }
        if let Err(e) = serde_json::from_str::<serde_json::Value>(line) {
            warn!(error = %e, line, "invalid JSON from source, dropping");
            return false;
        }
        *self.last_line.write().await = Some(line.to_string());
        // No receivers is fine; the cache still serves the next subscriber.
        let delivered = self.lines.send(line.to_string()).unwrap_or(0);
        trace!(delivered, "forwarded line");
        true
    }
}

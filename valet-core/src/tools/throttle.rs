//! Per-operation minimum call spacing
//!
//! Callers are delayed, never rejected. Each operation name has its own
//! async mutex holding the last start instant; a caller holds that mutex
//! across its wait so that check-and-update is atomic per operation and
//! concurrent callers queue in arrival order.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::Mutex as AsyncMutex;
use tokio::time::Instant;
use tracing::debug;

type Slot = Arc<AsyncMutex<Option<Instant>>>;

/// Last-start table shared by every rate-limited operation
#[derive(Debug, Default)]
pub struct Throttle {
    slots: Mutex<HashMap<String, Slot>>,
}

impl Throttle {
    /// Create an empty table
    pub fn new() -> Self {
        Self::default()
    }

    fn slot(&self, operation: &str) -> Slot {
        let mut slots = self
            .slots
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        slots
            .entry(operation.to_string())
            .or_insert_with(|| Arc::new(AsyncMutex::new(None)))
            .clone()
    }

    /// Wait until `operation` may start again, record the start, and return it.
    ///
    /// The returned instant is the recorded start; callers run their body
    /// immediately after.
    pub async fn pace(&self, operation: &str, min_interval: Duration) -> Instant {
        let slot = self.slot(operation);
        let mut last_start = slot.lock().await;

        if let Some(last) = *last_start {
            let ready_at = last + min_interval;
            let now = Instant::now();
            if ready_at > now {
                debug!(
                    operation,
                    wait_ms = (ready_at - now).as_millis() as u64,
                    "Rate limit wait"
                );
                tokio::time::sleep_until(ready_at).await;
            }
        }

        let started = Instant::now();
        *last_start = Some(started);
        started
    }

    /// Last recorded start of `operation`, if any
    pub async fn last_start(&self, operation: &str) -> Option<Instant> {
        *self.slot(operation).lock().await
    }
}

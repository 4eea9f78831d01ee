use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use dashmap::DashMap;
use serde_json::Value;
use tokio::sync::oneshot;

use envbus_core::error::{BusError, Result};

/// Settled outcome of one request.
pub type Outcome = Result<Value>;

struct PendingRequest {
    tx: oneshot::Sender<Outcome>,
    method: String,
    created_at: Instant,
}

/// Receiving half of a registered request.
#[derive(Debug)]
pub struct PendingHandle {
    id: String,
    rx: oneshot::Receiver<Outcome>,
}

impl PendingHandle {
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Wait for the matching response (or teardown).
    pub async fn wait(self) -> Outcome {
        // Sender dropped without settling only happens on `forget`.
        self.rx.await.unwrap_or(Err(BusError::Disposed))
    }
}

/// Correlation registry:
/// - `request_id -> pending completion`
/// - ids are `<prefix>_<n>` with a monotonically increasing counter
pub struct CorrelationRegistry {
    prefix: String,
    pending: DashMap<String, PendingRequest>,
    seq: AtomicU64,
}

impl CorrelationRegistry {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            pending: DashMap::new(),
            seq: AtomicU64::new(0),
        }
    }

    /// Next id, unused among pending requests of this endpoint.
    pub fn next_request_id(&self) -> String {
        let n = self.seq.fetch_add(1, Ordering::Relaxed);
        format!("{}_{}", self.prefix, n)
    }

    pub fn register(&self, id: String, method: &str) -> PendingHandle {
        let (tx, rx) = oneshot::channel();
        self.pending.insert(
            id.clone(),
            PendingRequest {
                tx,
                method: method.to_string(),
                created_at: Instant::now(),
            },
        );
        tracing::trace!(request_id = %id, method, "registered pending request");
        PendingHandle { id, rx }
    }

    /// Complete with a value. Returns the round-trip time, or `None` for an
    /// id nobody is waiting on.
    pub fn resolve(&self, id: &str, data: Value) -> Option<Duration> {
        self.settle(id, Ok(data))
    }

    /// Complete with an error. Same return contract as [`resolve`](Self::resolve).
    pub fn reject(&self, id: &str, err: BusError) -> Option<Duration> {
        self.settle(id, Err(err))
    }

    fn settle(&self, id: &str, outcome: Outcome) -> Option<Duration> {
        let Some((_, pending)) = self.pending.remove(id) else {
            tracing::debug!(request_id = %id, "response for unknown or already settled request id");
            return None;
        };
        let elapsed = pending.created_at.elapsed();
        if pending.tx.send(outcome).is_err() {
            tracing::debug!(request_id = %id, method = %pending.method, "caller stopped waiting");
        }
        Some(elapsed)
    }

    /// Drop a pending request without settling it; a later response for
    /// `id` becomes an unknown-id no-op.
    pub fn forget(&self, id: &str) -> bool {
        self.pending.remove(id).is_some()
    }

    /// Reject every pending request. Returns how many were abandoned.
    pub fn abandon_all(&self, reason: BusError) -> usize {
        let ids: Vec<String> = self.pending.iter().map(|e| e.key().clone()).collect();
        let mut n = 0;
        for id in ids {
            if let Some((_, pending)) = self.pending.remove(&id) {
                let _ = pending.tx.send(Err(reason.clone()));
                n += 1;
            }
        }
        n
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    pub fn is_pending(&self, id: &str) -> bool {
        self.pending.contains_key(id)
    }
}

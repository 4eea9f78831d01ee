//! In-process window pair.
//!
//! Mirrors browser `postMessage` rules: a post whose target origin does not
//! match the recipient's origin is silently not delivered, and the recipient
//! sees the sender's origin on every event.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::mpsc;

use envbus_core::error::{BusError, Result};
use envbus_core::protocol::TargetOrigin;

use super::{Inbound, PostMessage, RawEvent};

/// One side of a memory window pair.
pub struct MemoryPort {
    own_origin: String,
    peer_origin: String,
    peer_tx: mpsc::UnboundedSender<RawEvent>,
    posted: AtomicU64,
}

impl MemoryPort {
    pub fn origin(&self) -> &str {
        &self.own_origin
    }

    /// Number of `post_message` calls made through this port.
    pub fn posted(&self) -> u64 {
        self.posted.load(Ordering::Relaxed)
    }

    /// Deliver a frame to the peer claiming an arbitrary sender origin.
    /// Stands in for a foreign window sharing the peer's event stream.
    pub fn post_as(&self, origin: &str, data: String) -> Result<()> {
        self.peer_tx
            .send(RawEvent {
                origin: origin.to_string(),
                data,
            })
            .map_err(|_| BusError::Transport("peer detached".into()))
    }
}

impl PostMessage for MemoryPort {
    fn post_message(&self, data: String, target_origin: &TargetOrigin) -> Result<()> {
        self.posted.fetch_add(1, Ordering::Relaxed);
        if !target_origin.accepts(&self.peer_origin) {
            tracing::debug!(
                target_origin = %target_origin,
                peer_origin = %self.peer_origin,
                "post not delivered: target origin does not match recipient"
            );
            return Ok(());
        }
        self.peer_tx
            .send(RawEvent {
                origin: self.own_origin.clone(),
                data,
            })
            .map_err(|_| BusError::Transport("peer detached".into()))
    }
}

/// Build two connected windows with the given origins.
///
/// Returns `((port_a, inbound_a), (port_b, inbound_b))`: posting on `port_a`
/// arrives on `inbound_b` and vice versa.
pub fn pair(origin_a: &str, origin_b: &str) -> ((Arc<MemoryPort>, Inbound), (Arc<MemoryPort>, Inbound)) {
    let (tx_a, rx_a) = mpsc::unbounded_channel();
    let (tx_b, rx_b) = mpsc::unbounded_channel();

    let a = Arc::new(MemoryPort {
        own_origin: origin_a.to_string(),
        peer_origin: origin_b.to_string(),
        peer_tx: tx_b,
        posted: AtomicU64::new(0),
    });
    let b = Arc::new(MemoryPort {
        own_origin: origin_b.to_string(),
        peer_origin: origin_a.to_string(),
        peer_tx: tx_a,
        posted: AtomicU64::new(0),
    });

    ((a, rx_a), (b, rx_b))
}

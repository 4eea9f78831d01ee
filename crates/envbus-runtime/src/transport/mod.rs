//! Transport layer (post-message style).
//!
//! The bus only needs a one-way "post this string to that target origin"
//! primitive plus a stream of inbound `{ origin, data }` events. `adapter`
//! adds origin validation and JSON (de)serialization on top; `memory` is an
//! in-process window pair used by tests and the demo binary.

pub mod adapter;
pub mod memory;

use tokio::sync::mpsc;

use envbus_core::error::Result;
use envbus_core::protocol::TargetOrigin;

pub use adapter::TransportAdapter;

/// One inbound event as delivered by the environment.
#[derive(Debug, Clone)]
pub struct RawEvent {
    /// Origin of the sending window, as vouched for by the environment.
    pub origin: String,
    pub data: String,
}

/// Inbound event stream handed to an endpoint.
pub type Inbound = mpsc::UnboundedReceiver<RawEvent>;

/// The raw one-way send primitive.
pub trait PostMessage: Send + Sync {
    /// Post `data` to the peer, restricted to `target_origin` unless wildcard.
    fn post_message(&self, data: String, target_origin: &TargetOrigin) -> Result<()>;
}

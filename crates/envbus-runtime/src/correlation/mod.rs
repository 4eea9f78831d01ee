//! Request/response correlation.
//!
//! Every outgoing `REQUEST` gets a fresh id and a pending completion; the
//! inbound loop settles it when the matching `RESPONSE` arrives.

mod registry;

pub use registry::{CorrelationRegistry, Outcome, PendingHandle};

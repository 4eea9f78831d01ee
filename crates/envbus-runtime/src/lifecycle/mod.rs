//! Lifecycle and handshake.
//!
//! `CONNECTING -> CONNECTED -> DISPOSED`. The channel side polls the envelope
//! with init requests until one is answered; the envelope side answers every
//! init request once its implementation is built.

pub(crate) mod handshake;
mod state;

pub use handshake::{from_fn, EnvelopeInitializer, RetryPolicy};
pub use state::{Lifecycle, LifecycleState};

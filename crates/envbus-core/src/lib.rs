//! envbus core: wire contracts and error types for the envelope bus.
//!
//! This crate defines the message envelope, handshake payload and error
//! surface shared by the runtime and by anything speaking the protocol from
//! another process. It carries no runtime dependencies so it can be reused in
//! multiple contexts.
//!
//! # Guarantees
//! Panics, `unwrap`, and `expect` are compile-denied here.
//! All fallible paths surface as `BusError`/`Result`; a malformed frame from
//! the sandbox must never take the host down.

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]

pub mod error;
pub mod protocol;

/// Shared result type.
pub use error::{BusError, ErrorCode, RemoteError, Result};

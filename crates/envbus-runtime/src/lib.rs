//! envbus runtime library entry.
//!
//! This crate wires the transport adapter, correlation registry, capability
//! proxy, shared-value store and lifecycle into a bus endpoint usable from
//! either side of a channel/envelope connection. It is consumed by the demo
//! binary (`main.rs`) and by integration tests.

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]

pub mod api;
pub mod config;
pub mod correlation;
pub mod endpoint;
pub mod lifecycle;
pub mod locator;
pub mod obs;
pub mod shared;
pub mod transport;

pub use api::{ApiContract, NotificationMethod, RequestHandlers, RequestMethod, SharedValue};
pub use endpoint::{BusEndpoint, ChannelOptions, EnvelopeOptions, PeerInfo, Role};
pub use lifecycle::{EnvelopeInitializer, LifecycleState, RetryPolicy};

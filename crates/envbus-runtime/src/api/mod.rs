//! Capability contracts, local handler tables and the typed proxy.
//!
//! No reflection: a capability is declared once as typed descriptors, the
//! local side registers one handler per request name, and the dispatcher
//! routes incoming requests by name.

pub mod contract;
pub mod handlers;
pub mod listeners;
pub mod proxy;

pub use contract::{ApiContract, NotificationMethod, RequestMethod, SharedValue};
pub use handlers::{RequestHandler, RequestHandlers};
pub use listeners::{Listener, ListenerSet, Subscription};
pub use proxy::{Notifications, Requests, SharedValues};

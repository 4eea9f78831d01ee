//! Shared value channel: named values replicated between both endpoints.
//!
//! Last write wins on each side independently; there is no ordering vector,
//! so two concurrent sets may leave the sides briefly disagreeing until the
//! next update lands.

mod store;

pub use store::SharedValueStore;

//! Top-level facade crate for envbus.
//!
//! Re-exports the protocol types and the runtime so users can depend on a single crate.

pub mod core {
    pub use envbus_core::*;
}

pub mod runtime {
    pub use envbus_runtime::*;
}

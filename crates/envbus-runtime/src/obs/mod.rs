//! Lightweight in-process metrics (dependency-free).
//!
//! Each endpoint owns a `BusMetrics`; hosts can render it in Prometheus text
//! format from whatever surface they already expose.

pub mod metrics;

pub use metrics::BusMetrics;

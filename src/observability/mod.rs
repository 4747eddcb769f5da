//! # Observability
//!
//! - `metrics`: Prometheus metrics collection
//!
//! Tracing subscriber setup lives in [`crate::runtime::initialization`].

pub mod metrics;

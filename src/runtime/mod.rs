//! # Runtime
//!
//! Process-level plumbing around the reconcilers.
//!
//! - `initialization`: rustls, tracing, metrics, HTTP server, Kubernetes client, reconcilers
//! - `watch_loop`: Email and EmailSenderConfig controllers and their reconcile entry points
//! - `error_policy`: per-resource Fibonacci backoff and watch error classification

pub mod error_policy;
pub mod initialization;
pub mod watch_loop;

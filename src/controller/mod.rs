//! # Controller
//!
//! Core controller modules for the Email Dispatch Controller.
//!
//! - `backoff`: Fibonacci backoff for store-error requeues
//! - `reconciler`: Email and EmailSenderConfig reconciliation logic
//! - `server`: HTTP server for metrics and health checks

pub mod backoff;
pub mod reconciler;
pub mod server;

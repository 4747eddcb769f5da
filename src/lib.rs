//! Email Dispatch Controller Library
//!
//! A Kubernetes controller that delivers declaratively requested emails.
//! Users create an `Email` naming an `EmailSenderConfig`; the controller
//! resolves the sender identity and API token, hands the email to the
//! provider and records the outcome in the Email's status.
//!
//! ## Quick Start
//!
//! ```rust
//! use email_dispatch_controller::prelude::*;
//! ```
//!
//! This brings commonly used types and traits into scope. For more specific imports,
//! use the individual modules.

pub mod config;
pub mod constants;
pub mod controller;
pub mod crd;
pub mod observability;
pub mod prelude;
pub mod runtime;
pub mod sender;
pub mod store;

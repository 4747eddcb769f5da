//! # Custom Resource Definitions
//!
//! CRD types for the Email Dispatch Controller.
//!
//! ## Module Structure
//!
//! - `email.rs` - `Email` resource, its status and the delivery state enum
//! - `sender_config.rs` - `EmailSenderConfig` resource
//!
//! The API token itself lives in a core `v1/Secret`; see
//! [`crate::constants::DEFAULT_API_TOKEN_KEY`].

mod email;
mod sender_config;

pub use email::{DeliveryStatus, Email, EmailSpec, EmailStatus};
pub use sender_config::{EmailSenderConfig, EmailSenderConfigSpec, EmailSenderConfigStatus};

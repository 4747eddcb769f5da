//! # Prelude
//!
//! Re-exports commonly used types and traits for convenience.
//!
//! ## Usage
//!
//! ```rust
//! use email_dispatch_controller::prelude::*;
//! ```
//!
//! This brings into scope:
//! - All CRD types (Email, EmailSenderConfig, etc.)
//! - The store and sender seams with their implementations
//! - Reconciler types (EmailReconciler, ReconcileOutcome, etc.)
//! - Controller configuration

// CRD types - most commonly used
pub use crate::crd::*;

// Seams the reconcilers are built on
pub use crate::sender::{EmailSender, MailerSendClient, OutboundEmail, SendError, SendReceipt};
pub use crate::store::{InMemoryStore, KubeStore, ObjectKey, ResourceStore, StoreError, StoreOp};

// Reconciler types - core controller functionality
pub use crate::controller::reconciler::{
    EmailReconciler, FailureReason, ReconcileOutcome, Reconciler, ReconcilerError,
    ResolutionError, SenderConfigObservation, SenderConfigReconciler, ValidationFinding,
};

// Config types - for configuration management
pub use crate::config::{ControllerConfig, LogFormat};

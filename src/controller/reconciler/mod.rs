//! # Reconciler
//!
//! Core reconciliation logic for Email and EmailSenderConfig resources.
//!
//! ## Module Structure
//!
//! - `types.rs` - Shared context, outcomes, errors and per-key locks
//! - `email.rs` - `EmailReconciler`: resolve, send, write status
//! - `sender_config.rs` - `SenderConfigReconciler`: observe and validate
//! - `resolve.rs` - Email → EmailSenderConfig → Secret resolution
//! - `status.rs` - Status construction and settled-state checks
//! - `validation.rs` - Advisory EmailSenderConfig validation

mod email;
mod resolve;
mod sender_config;
pub mod status;
mod types;
pub mod validation;

pub use email::EmailReconciler;
pub use resolve::ResolutionError;
pub use sender_config::{SenderConfigObservation, SenderConfigReconciler};
pub use types::{
    BackoffState, FailureReason, KeyedLocks, ReconcileOutcome, Reconciler, ReconcilerError,
};
pub use validation::ValidationFinding;

//! # Sender Configuration Validation
//!
//! Advisory checks on an EmailSenderConfig. Findings are logged, never
//! written to status and never block delivery attempts.

use regex::Regex;
use std::sync::LazyLock;
use thiserror::Error;

// Deliberately loose: one `@`, no whitespace, a dot in the domain
static EMAIL_ADDRESS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$")
        .expect("Failed to compile EMAIL_ADDRESS regex - this should never happen")
});

/// A problem with an EmailSenderConfig that will make sends fail
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationFinding {
    #[error("senderEmail \"{0}\" is not a valid email address")]
    InvalidSenderEmail(String),
    #[error("apiTokenSecretRef is empty")]
    EmptySecretRef,
    #[error("API token Secret \"{0}\" does not exist")]
    SecretMissing(String),
    #[error("API token Secret \"{secret}\" has no key \"{key}\"")]
    TokenKeyMissing { secret: String, key: String },
}

/// Whether `address` looks like a deliverable email address
#[must_use]
pub fn is_valid_email_address(address: &str) -> bool {
    EMAIL_ADDRESS.is_match(address.trim())
}

/// Validate the sender address of a configuration
pub fn validate_sender_email(address: &str) -> Option<ValidationFinding> {
    (!is_valid_email_address(address))
        .then(|| ValidationFinding::InvalidSenderEmail(address.to_string()))
}

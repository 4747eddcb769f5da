//! # Email Sender
//!
//! The outbound side of the controller: hand one fully resolved email to an
//! email provider and report the provider's message identifier.
//!
//! - [`EmailSender`] - the seam the reconciler calls
//! - [`MailerSendClient`] - MailerSend-compatible HTTP implementation
//!
//! Implementations perform exactly one attempt per call; retries are driven by
//! the next reconciliation, not here.

use async_trait::async_trait;
use thiserror::Error;

mod mailersend;

pub use mailersend::MailerSendClient;

/// One email ready to be handed to the provider
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundEmail {
    pub from: String,
    pub to: String,
    pub subject: String,
    /// HTML body, passed through untouched
    pub html: String,
}

/// Provider acknowledgement of an accepted email
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SendReceipt {
    pub message_id: String,
}

/// Failure of a single send attempt
#[derive(Debug, Error)]
pub enum SendError {
    /// Network failure, timeout or an unreadable response
    #[error("request to email provider failed: {0}")]
    Transport(#[from] reqwest::Error),
    /// The provider answered with something other than 202 Accepted
    #[error("email provider returned HTTP {status}: {body}")]
    Rejected { status: u16, body: String },
    /// 202 Accepted without a message identifier in headers or body
    #[error("email provider accepted the request but returned no message id")]
    MissingMessageId,
}

/// Delivers one email through an email provider
#[async_trait]
pub trait EmailSender: Send + Sync {
    /// Send `email` authenticated with `api_token`
    ///
    /// # Errors
    /// Returns [`SendError`] when the request cannot be made or the provider
    /// does not accept the email.
    async fn send(&self, api_token: &str, email: &OutboundEmail) -> Result<SendReceipt, SendError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejected_display_carries_raw_body() {
        let err = SendError::Rejected {
            status: 422,
            body: r#"{"message":"The from.email must be verified."}"#.to_string(),
        };
        let text = err.to_string();
        assert!(text.contains("422"));
        assert!(text.contains("The from.email must be verified."));
    }
}

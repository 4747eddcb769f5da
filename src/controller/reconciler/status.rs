//! # Status Management
//!
//! Builds the Email status written after each reconciliation.
//!
//! A status is always derived from the latest outcome alone and replaces the
//! previous one as a whole.

use crate::crd::{DeliveryStatus, Email, EmailStatus};
use crate::sender::SendError;

/// Status of an Email the provider accepted
#[must_use]
pub fn delivered_status(message_id: impl Into<String>, generation: Option<i64>) -> EmailStatus {
    EmailStatus {
        delivery_status: DeliveryStatus::Sent,
        message_id: message_id.into(),
        error: String::new(),
        observed_generation: generation,
    }
}

/// Status of an Email that could not be resolved or delivered
#[must_use]
pub fn failed_status(error: impl Into<String>, generation: Option<i64>) -> EmailStatus {
    EmailStatus {
        delivery_status: DeliveryStatus::Failed,
        message_id: String::new(),
        error: error.into(),
        observed_generation: generation,
    }
}

/// Status error text for a failed send attempt
#[must_use]
pub fn send_failure_message(error: &SendError) -> String {
    format!("failed to send email: {error}")
}

/// Whether the current status already records a terminal outcome for the
/// Email's current generation
#[must_use]
pub fn is_settled(email: &Email) -> bool {
    email.status.as_ref().is_some_and(|status| {
        status.delivery_status.is_terminal()
            && status.observed_generation == email.metadata.generation
    })
}

/// Whether the current status records a delivery for the current generation
#[must_use]
pub fn is_delivered(email: &Email) -> bool {
    is_settled(email)
        && email
            .status
            .as_ref()
            .is_some_and(|status| status.delivery_status == DeliveryStatus::Sent)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crd::EmailSpec;

    fn email_with(status: Option<EmailStatus>, generation: i64) -> Email {
        let mut email = Email::new(
            "welcome",
            EmailSpec {
                sender_config_ref: "cfg-a".to_string(),
                recipient_email: "x@y.com".to_string(),
                subject: "Hi".to_string(),
                body: "<p>hi</p>".to_string(),
            },
        );
        email.metadata.generation = Some(generation);
        email.status = status;
        email
    }

    #[test]
    fn test_delivered_status_clears_error() {
        let status = delivered_status("m-1", Some(2));
        assert_eq!(status.delivery_status, DeliveryStatus::Sent);
        assert_eq!(status.message_id, "m-1");
        assert!(status.error.is_empty());
        assert_eq!(status.observed_generation, Some(2));
    }

    #[test]
    fn test_failed_status_clears_message_id() {
        let status = failed_status("boom", Some(1));
        assert_eq!(status.delivery_status, DeliveryStatus::Failed);
        assert!(status.message_id.is_empty());
        assert_eq!(status.error, "boom");
    }

    #[test]
    fn test_send_failure_message_includes_body() {
        let error = SendError::Rejected {
            status: 422,
            body: "{\"message\":\"bad\"}".to_string(),
        };
        let message = send_failure_message(&error);
        assert!(message.starts_with("failed to send email: "));
        assert!(message.contains("{\"message\":\"bad\"}"));
    }

    #[test]
    fn test_settled_requires_matching_generation() {
        assert!(!is_settled(&email_with(None, 1)));
        assert!(!is_settled(&email_with(Some(EmailStatus::default()), 1)));
        assert!(is_settled(&email_with(Some(failed_status("x", Some(1))), 1)));
        assert!(!is_settled(&email_with(Some(failed_status("x", Some(1))), 2)));
    }

    #[test]
    fn test_delivered_only_for_sent() {
        assert!(is_delivered(&email_with(
            Some(delivered_status("m-1", Some(3))),
            3
        )));
        assert!(!is_delivered(&email_with(
            Some(failed_status("x", Some(3))),
            3
        )));
        assert!(!is_delivered(&email_with(
            Some(delivered_status("m-1", Some(2))),
            3
        )));
    }
}

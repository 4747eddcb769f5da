//! # Email
//!
//! A user-declared request to send one email.

use serde::{Deserialize, Serialize};

/// Email Custom Resource Definition
///
/// # Example
///
/// ```yaml
/// apiVersion: example.com/v1
/// kind: Email
/// metadata:
///   name: welcome-alice
///   namespace: default
/// spec:
///   senderConfigRef: transactional
///   recipientEmail: alice@example.org
///   subject: Welcome aboard
///   body: "<p>Hello Alice</p>"
/// ```
#[derive(
    kube::CustomResource, Debug, Clone, PartialEq, Deserialize, Serialize, schemars::JsonSchema,
)]
#[kube(
    kind = "Email",
    group = "example.com",
    version = "v1",
    namespaced,
    status = "crate::crd::EmailStatus",
    shortname = "em",
    printcolumn = r#"{"name":"Status", "type":"string", "jsonPath":".status.deliveryStatus"}, {"name":"Recipient", "type":"string", "jsonPath":".spec.recipientEmail"}, {"name":"MessageId", "type":"string", "jsonPath":".status.messageId"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct EmailSpec {
    /// Name of the EmailSenderConfig (same namespace) to send with
    pub sender_config_ref: String,
    /// Recipient address
    pub recipient_email: String,
    /// Subject line
    pub subject: String,
    /// HTML body
    pub body: String,
}

/// Delivery state of an Email
///
/// Serialized as `""` (pending), `"Sent"` or `"Failed"`.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize, schemars::JsonSchema,
)]
pub enum DeliveryStatus {
    /// Not reconciled yet
    #[default]
    #[serde(rename = "")]
    Pending,
    /// Accepted by the email provider
    Sent,
    /// Resolution or delivery failed; see `status.error`
    Failed,
}

impl DeliveryStatus {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            DeliveryStatus::Pending => "",
            DeliveryStatus::Sent => "Sent",
            DeliveryStatus::Failed => "Failed",
        }
    }

    /// Sent and Failed are terminal for a given generation
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        !matches!(self, DeliveryStatus::Pending)
    }
}

/// Observed state of an Email
///
/// Always written as a whole; every reconciliation replaces the previous outcome.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct EmailStatus {
    #[serde(default)]
    pub delivery_status: DeliveryStatus,
    /// Provider message identifier, empty until sent
    #[serde(default)]
    pub message_id: String,
    /// Failure detail, empty unless Failed
    #[serde(default)]
    pub error: String,
    /// Generation of the spec this status was computed from
    #[serde(default)]
    pub observed_generation: Option<i64>,
}

//! # EmailSenderConfig
//!
//! Named sender identity plus a reference to the Secret holding its API token.

use serde::{Deserialize, Serialize};

/// EmailSenderConfig Custom Resource Definition
///
/// # Example
///
/// ```yaml
/// apiVersion: example.com/v1
/// kind: EmailSenderConfig
/// metadata:
///   name: transactional
///   namespace: default
/// spec:
///   senderEmail: noreply@example.com
///   apiTokenSecretRef: mailersend-token
/// ```
#[derive(
    kube::CustomResource, Debug, Clone, PartialEq, Deserialize, Serialize, schemars::JsonSchema,
)]
#[kube(
    kind = "EmailSenderConfig",
    group = "example.com",
    version = "v1",
    namespaced,
    status = "crate::crd::EmailSenderConfigStatus",
    shortname = "esc",
    printcolumn = r#"{"name":"Sender", "type":"string", "jsonPath":".spec.senderEmail"}, {"name":"Secret", "type":"string", "jsonPath":".spec.apiTokenSecretRef"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct EmailSenderConfigSpec {
    /// Address emails are sent from
    pub sender_email: String,
    /// Name of the Secret (same namespace) holding the provider API token
    pub api_token_secret_ref: String,
}

/// Reserved for validation results; the controller does not write it yet.
#[allow(
    clippy::empty_structs_with_brackets,
    reason = "Status must serialize as an object, not null"
)]
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize, schemars::JsonSchema)]
pub struct EmailSenderConfigStatus {}

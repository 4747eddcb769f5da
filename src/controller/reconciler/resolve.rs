//! # Reference Resolution
//!
//! Follows Email → EmailSenderConfig → Secret and extracts the API token.
//!
//! All references are same-namespace name lookups. A dangling reference is a
//! [`ResolutionError`] and ends up in the Email's status; only failures of the
//! store itself abort the reconciliation.

use crate::crd::{Email, EmailSenderConfig};
use crate::store::{ObjectKey, ResourceStore, StoreError};
use k8s_openapi::api::core::v1::Secret;
use thiserror::Error;
use zeroize::Zeroizing;

/// A reference that could not be followed to a usable credential
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResolutionError {
    #[error("spec.senderConfigRef is empty")]
    EmptySenderConfigRef,
    #[error("EmailSenderConfig \"{0}\" not found")]
    SenderConfigNotFound(ObjectKey),
    #[error("EmailSenderConfig \"{0}\" has an empty apiTokenSecretRef")]
    EmptySecretRef(ObjectKey),
    #[error("API token Secret \"{0}\" not found")]
    SecretNotFound(ObjectKey),
    #[error("API token Secret \"{secret}\" has no key \"{key}\"")]
    TokenKeyMissing { secret: ObjectKey, key: String },
    #[error("API token Secret \"{secret}\" key \"{key}\" is not valid UTF-8")]
    TokenNotUtf8 { secret: ObjectKey, key: String },
}

/// Why resolution stopped: an unreachable store or a broken reference
#[derive(Debug)]
pub(crate) enum ResolveFailure {
    Store(StoreError),
    Unresolved(ResolutionError),
}

impl From<StoreError> for ResolveFailure {
    fn from(error: StoreError) -> Self {
        ResolveFailure::Store(error)
    }
}

impl From<ResolutionError> for ResolveFailure {
    fn from(error: ResolutionError) -> Self {
        ResolveFailure::Unresolved(error)
    }
}

/// Everything needed to send one Email
pub(crate) struct ResolvedSender {
    pub sender_email: String,
    pub api_token: Zeroizing<String>,
}

impl std::fmt::Debug for ResolvedSender {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResolvedSender")
            .field("sender_email", &self.sender_email)
            .field("api_token", &"***")
            .finish()
    }
}

/// Fetch the EmailSenderConfig an Email points at
pub(crate) async fn sender_config_for(
    store: &dyn ResourceStore,
    email_key: &ObjectKey,
    email: &Email,
) -> Result<EmailSenderConfig, ResolveFailure> {
    let name = email.spec.sender_config_ref.trim();
    if name.is_empty() {
        return Err(ResolutionError::EmptySenderConfigRef.into());
    }
    let config_key = email_key.sibling(name);
    store
        .get_sender_config(&config_key)
        .await?
        .ok_or_else(|| ResolutionError::SenderConfigNotFound(config_key).into())
}

/// Key of the Secret an EmailSenderConfig points at
pub(crate) fn secret_key_for(
    config_key: &ObjectKey,
    config: &EmailSenderConfig,
) -> Result<ObjectKey, ResolutionError> {
    let name = config.spec.api_token_secret_ref.trim();
    if name.is_empty() {
        return Err(ResolutionError::EmptySecretRef(config_key.clone()));
    }
    Ok(config_key.sibling(name))
}

/// Read the API token stored under `token_key`
///
/// `data` wins over `stringData`; the latter is only populated on objects that
/// have not been round-tripped through the API server.
pub(crate) fn api_token_from(
    secret_key: &ObjectKey,
    secret: &Secret,
    token_key: &str,
) -> Result<Zeroizing<String>, ResolutionError> {
    if let Some(bytes) = secret.data.as_ref().and_then(|data| data.get(token_key)) {
        return String::from_utf8(bytes.0.clone())
            .map(Zeroizing::new)
            .map_err(|_err| ResolutionError::TokenNotUtf8 {
                secret: secret_key.clone(),
                key: token_key.to_string(),
            });
    }
    secret
        .string_data
        .as_ref()
        .and_then(|data| data.get(token_key))
        .map(|token| Zeroizing::new(token.clone()))
        .ok_or_else(|| ResolutionError::TokenKeyMissing {
            secret: secret_key.clone(),
            key: token_key.to_string(),
        })
}

/// Resolve the sender address and API token for an Email
pub(crate) async fn resolve_sender(
    store: &dyn ResourceStore,
    email_key: &ObjectKey,
    email: &Email,
    token_key: &str,
) -> Result<ResolvedSender, ResolveFailure> {
    let config = sender_config_for(store, email_key, email).await?;
    let config_key = email_key.sibling(email.spec.sender_config_ref.trim());
    let secret_key = secret_key_for(&config_key, &config)?;
    let secret = store
        .get_secret(&secret_key)
        .await?
        .ok_or_else(|| ResolutionError::SecretNotFound(secret_key.clone()))?;
    let api_token = api_token_from(&secret_key, &secret, token_key)?;

    Ok(ResolvedSender {
        sender_email: config.spec.sender_email,
        api_token,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use k8s_openapi::ByteString;
    use std::collections::BTreeMap;

    fn secret_with_data(entries: &[(&str, &[u8])]) -> Secret {
        Secret {
            data: Some(
                entries
                    .iter()
                    .map(|(k, v)| ((*k).to_string(), ByteString(v.to_vec())))
                    .collect(),
            ),
            ..Secret::default()
        }
    }

    #[test]
    fn test_token_read_from_data() {
        let key = ObjectKey::new("mail", "tok-a");
        let secret = secret_with_data(&[("apiToken", b"mlsn.abc".as_slice())]);
        let token = api_token_from(&key, &secret, "apiToken").unwrap();
        assert_eq!(token.as_str(), "mlsn.abc");
    }

    #[test]
    fn test_token_falls_back_to_string_data() {
        let key = ObjectKey::new("mail", "tok-a");
        let secret = Secret {
            string_data: Some(BTreeMap::from([(
                "apiToken".to_string(),
                "plain".to_string(),
            )])),
            ..Secret::default()
        };
        let token = api_token_from(&key, &secret, "apiToken").unwrap();
        assert_eq!(token.as_str(), "plain");
    }

    #[test]
    fn test_missing_token_key() {
        let key = ObjectKey::new("mail", "tok-a");
        let secret = secret_with_data(&[("other", b"x".as_slice())]);
        let err = api_token_from(&key, &secret, "apiToken").unwrap_err();
        assert_eq!(
            err.to_string(),
            "API token Secret \"mail/tok-a\" has no key \"apiToken\""
        );
    }

    #[test]
    fn test_non_utf8_token() {
        let key = ObjectKey::new("mail", "tok-a");
        let secret = secret_with_data(&[("apiToken", [0xff_u8, 0xfe].as_slice())]);
        let err = api_token_from(&key, &secret, "apiToken").unwrap_err();
        assert!(matches!(err, ResolutionError::TokenNotUtf8 { .. }));
    }

    #[test]
    fn test_resolution_messages_name_the_reference() {
        let err = ResolutionError::SenderConfigNotFound(ObjectKey::new("mail", "cfg-missing"));
        assert_eq!(
            err.to_string(),
            "EmailSenderConfig \"mail/cfg-missing\" not found"
        );
        let err = ResolutionError::SecretNotFound(ObjectKey::new("mail", "tok-a"));
        assert!(err.to_string().contains("tok-a"));
    }
}

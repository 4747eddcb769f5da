//! # EmailSenderConfig Reconciler
//!
//! Acknowledges EmailSenderConfig changes and runs advisory validation.
//! Writes nothing back; the findings are logged and returned to the caller.

use super::resolve::{api_token_from, secret_key_for, ResolutionError};
use super::types::ReconcilerError;
use super::validation::{validate_sender_email, ValidationFinding};
use crate::constants::DEFAULT_API_TOKEN_KEY;
use crate::store::{ObjectKey, ResourceStore};
use std::sync::Arc;
use tracing::{debug, info, info_span, warn, Instrument};

/// Result of one EmailSenderConfig reconciliation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SenderConfigObservation {
    /// The configuration no longer exists
    Gone,
    /// The configuration exists; an empty list means no problems were found
    Observed { findings: Vec<ValidationFinding> },
}

/// Reconciles EmailSenderConfig resources
pub struct SenderConfigReconciler {
    store: Arc<dyn ResourceStore>,
    api_token_key: String,
}

impl std::fmt::Debug for SenderConfigReconciler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SenderConfigReconciler")
            .field("api_token_key", &self.api_token_key)
            .finish_non_exhaustive()
    }
}

impl SenderConfigReconciler {
    #[must_use]
    pub fn new(store: Arc<dyn ResourceStore>) -> Self {
        Self {
            store,
            api_token_key: DEFAULT_API_TOKEN_KEY.to_string(),
        }
    }

    #[must_use]
    pub fn with_api_token_key(mut self, key: impl Into<String>) -> Self {
        self.api_token_key = key.into();
        self
    }

    /// Observe the EmailSenderConfig `namespace/name`
    ///
    /// # Errors
    /// Returns [`ReconcilerError::Store`] when the store cannot be read.
    pub async fn reconcile(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<SenderConfigObservation, ReconcilerError> {
        let span = info_span!(
            "sender_config.reconcile",
            resource.kind = "EmailSenderConfig",
            resource.namespace = namespace,
            resource.name = name
        );
        self.observe(&ObjectKey::new(namespace, name))
            .instrument(span)
            .await
    }

    async fn observe(&self, key: &ObjectKey) -> Result<SenderConfigObservation, ReconcilerError> {
        let Some(config) = self.store.get_sender_config(key).await? else {
            debug!("EmailSenderConfig no longer exists");
            return Ok(SenderConfigObservation::Gone);
        };

        info!(
            sender.email = config.spec.sender_email.as_str(),
            secret.name = config.spec.api_token_secret_ref.as_str(),
            "Observed EmailSenderConfig"
        );

        let mut findings: Vec<ValidationFinding> =
            validate_sender_email(&config.spec.sender_email)
                .into_iter()
                .collect();

        match secret_key_for(key, &config) {
            Err(_) => findings.push(ValidationFinding::EmptySecretRef),
            Ok(secret_key) => match self.store.get_secret(&secret_key).await? {
                None => findings.push(ValidationFinding::SecretMissing(secret_key.to_string())),
                Some(secret) => {
                    if let Err(ResolutionError::TokenKeyMissing { .. }) =
                        api_token_from(&secret_key, &secret, &self.api_token_key)
                    {
                        findings.push(ValidationFinding::TokenKeyMissing {
                            secret: secret_key.to_string(),
                            key: self.api_token_key.clone(),
                        });
                    }
                }
            },
        }

        for finding in &findings {
            warn!(finding = %finding, "EmailSenderConfig will not be able to send");
        }

        Ok(SenderConfigObservation::Observed { findings })
    }
}

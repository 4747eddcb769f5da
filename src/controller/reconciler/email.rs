//! # Email Reconciler
//!
//! Drives one Email to a terminal delivery state:
//!
//! 1. Fetch the Email (gone → nothing to do)
//! 2. Skip if it is already Sent for its current generation
//! 3. Resolve EmailSenderConfig and the API token Secret
//! 4. Hand the email to the [`EmailSender`]
//! 5. Write the outcome back as a single status patch, skipped when unchanged
//!
//! There are no internal retries. Resolution and delivery failures are
//! recorded in status; store failures abort without touching status.

use super::resolve::{resolve_sender, ResolveFailure, ResolvedSender};
use super::status::{delivered_status, failed_status, is_delivered, send_failure_message};
use super::types::{FailureReason, KeyedLocks, ReconcileOutcome, ReconcilerError};
use crate::constants::DEFAULT_API_TOKEN_KEY;
use crate::crd::{Email, EmailStatus};
use crate::observability::metrics;
use crate::sender::{EmailSender, OutboundEmail};
use crate::store::{ObjectKey, ResourceStore};
use std::sync::Arc;
use tracing::{debug, info, info_span, warn, Instrument};

/// Reconciles Email resources
pub struct EmailReconciler {
    store: Arc<dyn ResourceStore>,
    sender: Arc<dyn EmailSender>,
    api_token_key: String,
    locks: KeyedLocks,
}

impl std::fmt::Debug for EmailReconciler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EmailReconciler")
            .field("api_token_key", &self.api_token_key)
            .finish_non_exhaustive()
    }
}

impl EmailReconciler {
    #[must_use]
    pub fn new(store: Arc<dyn ResourceStore>, sender: Arc<dyn EmailSender>) -> Self {
        Self {
            store,
            sender,
            api_token_key: DEFAULT_API_TOKEN_KEY.to_string(),
            locks: KeyedLocks::default(),
        }
    }

    /// Read the API token from `key` instead of `apiToken`
    #[must_use]
    pub fn with_api_token_key(mut self, key: impl Into<String>) -> Self {
        self.api_token_key = key.into();
        self
    }

    /// Reconcile the Email `namespace/name`
    ///
    /// Reconciliations of the same Email are serialized; a second invocation
    /// waiting behind a successful send observes the Sent status and does not
    /// send again.
    ///
    /// # Errors
    /// Returns [`ReconcilerError::Store`] when the store cannot be read or the
    /// status cannot be written.
    pub async fn reconcile(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<ReconcileOutcome, ReconcilerError> {
        let key = ObjectKey::new(namespace, name);
        let lock = self.locks.lock_for(&key);

        let span = info_span!(
            "email.reconcile",
            resource.kind = "Email",
            resource.namespace = namespace,
            resource.name = name
        );
        let result = {
            let _guard = lock.lock().await;
            self.reconcile_locked(&key).instrument(span).await
        };
        self.locks.release(&key, lock);
        result
    }

    /// Number of Emails with a reconciliation in flight or waiting
    #[must_use]
    pub fn in_flight(&self) -> usize {
        self.locks.len()
    }

    async fn reconcile_locked(&self, key: &ObjectKey) -> Result<ReconcileOutcome, ReconcilerError> {
        let Some(email) = self.store.get_email(key).await? else {
            debug!("Email no longer exists, nothing to do");
            return Ok(ReconcileOutcome::Gone);
        };

        if is_delivered(&email) {
            debug!(
                resource.generation = email.metadata.generation,
                "Email already sent for this generation"
            );
            return Ok(ReconcileOutcome::AlreadyDelivered);
        }

        let generation = email.metadata.generation;
        let (status, outcome) =
            match resolve_sender(self.store.as_ref(), key, &email, &self.api_token_key).await {
                Ok(resolved) => self.deliver(&email, resolved, generation).await,
                Err(ResolveFailure::Store(e)) => return Err(e.into()),
                Err(ResolveFailure::Unresolved(e)) => {
                    let error = e.to_string();
                    warn!(error = %error, "Could not resolve sender for Email");
                    (
                        failed_status(error.clone(), generation),
                        ReconcileOutcome::Failed {
                            reason: FailureReason::from(&e),
                            error,
                        },
                    )
                }
            };

        self.write_status(key, &email, &status).await?;
        record_outcome(&outcome);
        Ok(outcome)
    }

    async fn deliver(
        &self,
        email: &Email,
        resolved: ResolvedSender,
        generation: Option<i64>,
    ) -> (EmailStatus, ReconcileOutcome) {
        let outbound = OutboundEmail {
            from: resolved.sender_email,
            to: email.spec.recipient_email.clone(),
            subject: email.spec.subject.clone(),
            html: email.spec.body.clone(),
        };

        match self.sender.send(&resolved.api_token, &outbound).await {
            Ok(receipt) => {
                info!(message.id = %receipt.message_id, "Email sent");
                (
                    delivered_status(receipt.message_id.clone(), generation),
                    ReconcileOutcome::Delivered {
                        message_id: receipt.message_id,
                    },
                )
            }
            Err(e) => {
                let error = send_failure_message(&e);
                warn!(error = %error, "Email delivery failed");
                (
                    failed_status(error.clone(), generation),
                    ReconcileOutcome::Failed {
                        reason: FailureReason::from(&e),
                        error,
                    },
                )
            }
        }
    }

    async fn write_status(
        &self,
        key: &ObjectKey,
        email: &Email,
        status: &EmailStatus,
    ) -> Result<(), ReconcilerError> {
        if email.status.as_ref() == Some(status) {
            debug!("Skipping status update - status unchanged");
            return Ok(());
        }
        self.store.patch_email_status(key, status).await?;
        Ok(())
    }
}

fn record_outcome(outcome: &ReconcileOutcome) {
    match outcome {
        ReconcileOutcome::Delivered { .. } => metrics::increment_emails_sent(),
        ReconcileOutcome::Failed { reason, .. } => metrics::increment_emails_failed(reason.as_str()),
        ReconcileOutcome::Gone | ReconcileOutcome::AlreadyDelivered => {}
    }
}

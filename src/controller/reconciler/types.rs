//! # Types
//!
//! Core types for the reconcilers.

use super::{EmailReconciler, ResolutionError, SenderConfigReconciler};
use crate::config::ControllerConfig;
use crate::controller::backoff::FibonacciBackoff;
use crate::sender::{EmailSender, SendError};
use crate::store::{ObjectKey, ResourceStore, StoreError};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::sync::Mutex as AsyncMutex;

/// Errors that abort a reconciliation and are handed to the error policy
///
/// Resolution and delivery failures are not errors at this level; they end up
/// in the Email's status instead.
#[derive(Debug, Error)]
pub enum ReconcilerError {
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Why an Email ended up Failed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureReason {
    /// The referenced EmailSenderConfig does not exist
    SenderConfigNotFound,
    /// The Secret named by the sender configuration does not exist
    SecretNotFound,
    /// The Secret exists but holds no usable token
    InvalidCredential,
    /// A reference field is empty
    InvalidReference,
    /// The provider answered with a non-202 status
    Rejected,
    /// The request never got an answer
    Transport,
    /// The provider accepted the email but returned no message id
    MissingMessageId,
}

impl FailureReason {
    /// Label value used in metrics and logs
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureReason::SenderConfigNotFound => "sender_config_not_found",
            FailureReason::SecretNotFound => "secret_not_found",
            FailureReason::InvalidCredential => "invalid_credential",
            FailureReason::InvalidReference => "invalid_reference",
            FailureReason::Rejected => "rejected",
            FailureReason::Transport => "transport",
            FailureReason::MissingMessageId => "missing_message_id",
        }
    }
}

impl From<&ResolutionError> for FailureReason {
    fn from(error: &ResolutionError) -> Self {
        match error {
            ResolutionError::SenderConfigNotFound(_) => FailureReason::SenderConfigNotFound,
            ResolutionError::SecretNotFound(_) => FailureReason::SecretNotFound,
            ResolutionError::TokenKeyMissing { .. } | ResolutionError::TokenNotUtf8 { .. } => {
                FailureReason::InvalidCredential
            }
            ResolutionError::EmptySenderConfigRef | ResolutionError::EmptySecretRef(_) => {
                FailureReason::InvalidReference
            }
        }
    }
}

impl From<&SendError> for FailureReason {
    fn from(error: &SendError) -> Self {
        match error {
            SendError::Transport(_) => FailureReason::Transport,
            SendError::Rejected { .. } => FailureReason::Rejected,
            SendError::MissingMessageId => FailureReason::MissingMessageId,
        }
    }
}

/// Result of one Email reconciliation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReconcileOutcome {
    /// The Email no longer exists; nothing was written
    Gone,
    /// Already Sent for the current generation; nothing was sent or written
    AlreadyDelivered,
    /// The provider accepted the email
    Delivered { message_id: String },
    /// Resolution or delivery failed; the error is recorded in status
    Failed {
        reason: FailureReason,
        error: String,
    },
}

/// Backoff state for a specific resource
/// Tracks error count and backoff calculator for progressive retries
#[derive(Debug, Clone)]
pub struct BackoffState {
    pub backoff: FibonacciBackoff,
    pub error_count: u32,
    pub last_error: Instant,
}

impl BackoffState {
    #[must_use]
    pub fn new(min_secs: u64, max_secs: u64) -> Self {
        Self {
            backoff: FibonacciBackoff::new(min_secs, max_secs),
            error_count: 0,
            last_error: Instant::now(),
        }
    }

    pub fn increment_error(&mut self) {
        self.error_count = self.error_count.saturating_add(1);
        self.last_error = Instant::now();
    }

    pub fn reset(&mut self) {
        self.error_count = 0;
        self.backoff.reset();
    }
}

/// One async mutex per object key
///
/// Serializes reconciliations of the same object while letting different
/// objects proceed concurrently.
#[derive(Debug, Clone, Default)]
pub struct KeyedLocks {
    locks: Arc<Mutex<HashMap<ObjectKey, Arc<AsyncMutex<()>>>>>,
}

impl KeyedLocks {
    /// Get or create the lock for `key`
    #[must_use]
    pub fn lock_for(&self, key: &ObjectKey) -> Arc<AsyncMutex<()>> {
        let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(
            locks
                .entry(key.clone())
                .or_insert_with(|| Arc::new(AsyncMutex::new(()))),
        )
    }

    /// Hand back a lock obtained from [`KeyedLocks::lock_for`]
    ///
    /// The entry is removed once nobody else holds or waits on it, so the
    /// table only contains keys with a reconciliation in flight.
    pub fn release(&self, key: &ObjectKey, lock: Arc<AsyncMutex<()>>) {
        let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
        // One reference in the table, one in `lock`
        let unused = Arc::strong_count(&lock) == 2
            && locks.get(key).is_some_and(|entry| Arc::ptr_eq(entry, &lock));
        if unused {
            locks.remove(key);
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.locks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Shared context handed to both kube-runtime controllers
pub struct Reconciler {
    pub emails: EmailReconciler,
    pub sender_configs: SenderConfigReconciler,
    // Backoff state per resource (identified by kind/namespace/name)
    pub backoff_states: Arc<Mutex<HashMap<String, BackoffState>>>,
    backoff_min_secs: u64,
    backoff_max_secs: u64,
}

impl std::fmt::Debug for Reconciler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Reconciler")
            .field("backoff_min_secs", &self.backoff_min_secs)
            .field("backoff_max_secs", &self.backoff_max_secs)
            .finish_non_exhaustive()
    }
}

impl Reconciler {
    #[must_use]
    pub fn new(
        store: Arc<dyn ResourceStore>,
        sender: Arc<dyn EmailSender>,
        config: &ControllerConfig,
    ) -> Self {
        Self {
            emails: EmailReconciler::new(Arc::clone(&store), sender)
                .with_api_token_key(config.api_token_key.clone()),
            sender_configs: SenderConfigReconciler::new(store)
                .with_api_token_key(config.api_token_key.clone()),
            backoff_states: Arc::new(Mutex::new(HashMap::new())),
            backoff_min_secs: config.backoff_min_secs,
            backoff_max_secs: config.backoff_max_secs,
        }
    }

    /// Advance the backoff of `resource_key`, returning the delay and error count
    ///
    /// Entries of other resources that have not failed for twice the maximum
    /// delay are dropped on the way; their objects were deleted or recovered
    /// without a reconciliation this controller saw succeed.
    pub fn next_backoff(&self, resource_key: &str) -> (Duration, u32) {
        let idle_after = Duration::from_secs(self.backoff_max_secs.saturating_mul(2));
        let mut states = self
            .backoff_states
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        states.retain(|key, state| key == resource_key || state.last_error.elapsed() <= idle_after);
        let state = states
            .entry(resource_key.to_string())
            .or_insert_with(|| BackoffState::new(self.backoff_min_secs, self.backoff_max_secs));
        state.increment_error();
        (state.backoff.next_backoff(), state.error_count)
    }

    #[cfg(test)]
    fn backoff_len(&self) -> usize {
        self.backoff_states
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Forget the backoff of `resource_key` after a successful reconciliation
    pub fn reset_backoff(&self, resource_key: &str) {
        self.backoff_states
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(resource_key);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keyed_locks_share_per_key() {
        let locks = KeyedLocks::default();
        let a = ObjectKey::new("mail", "a");
        let first = locks.lock_for(&a);
        let second = locks.lock_for(&a);
        let other = locks.lock_for(&ObjectKey::new("mail", "b"));

        assert!(Arc::ptr_eq(&first, &second));
        assert!(!Arc::ptr_eq(&first, &other));
        assert_eq!(locks.len(), 2);
    }

    #[test]
    fn test_release_removes_unused_entry() {
        let locks = KeyedLocks::default();
        let a = ObjectKey::new("mail", "a");

        let lock = locks.lock_for(&a);
        locks.release(&a, lock);

        assert!(locks.is_empty());
    }

    #[test]
    fn test_release_keeps_entry_while_another_caller_holds_it() {
        let locks = KeyedLocks::default();
        let a = ObjectKey::new("mail", "a");
        let first = locks.lock_for(&a);
        let second = locks.lock_for(&a);

        locks.release(&a, first);
        assert_eq!(locks.len(), 1);

        // A caller arriving now must share the lock the waiter still holds
        let third = locks.lock_for(&a);
        assert!(Arc::ptr_eq(&second, &third));

        locks.release(&a, second);
        assert_eq!(locks.len(), 1);
        locks.release(&a, third);
        assert!(locks.is_empty());
    }

    #[test]
    fn test_release_ignores_replaced_entry() {
        let locks = KeyedLocks::default();
        let a = ObjectKey::new("mail", "a");
        let stale = Arc::new(AsyncMutex::new(()));
        let current = locks.lock_for(&a);

        locks.release(&a, stale);

        assert_eq!(locks.len(), 1);
        locks.release(&a, current);
        assert!(locks.is_empty());
    }

    struct NeverCalled;

    #[async_trait::async_trait]
    impl EmailSender for NeverCalled {
        async fn send(
            &self,
            _token: &str,
            _email: &crate::sender::OutboundEmail,
        ) -> Result<crate::sender::SendReceipt, SendError> {
            Err(SendError::MissingMessageId)
        }
    }

    fn reconciler(max_secs: u64) -> Reconciler {
        let config = ControllerConfig {
            backoff_min_secs: 5,
            backoff_max_secs: max_secs,
            ..ControllerConfig::default()
        };
        Reconciler::new(
            Arc::new(crate::store::InMemoryStore::new()),
            Arc::new(NeverCalled),
            &config,
        )
    }

    #[test]
    fn test_next_backoff_returns_duration_and_count() {
        let ctx = reconciler(300);
        assert_eq!(ctx.next_backoff("Email/mail/a"), (Duration::from_secs(5), 1));
        assert_eq!(ctx.next_backoff("Email/mail/a"), (Duration::from_secs(5), 2));
        assert_eq!(ctx.next_backoff("Email/mail/a"), (Duration::from_secs(10), 3));
    }

    #[test]
    fn test_next_backoff_keeps_recently_failed_entries() {
        let ctx = reconciler(300);
        for name in ["a", "b", "c"] {
            ctx.next_backoff(&format!("Email/mail/{name}"));
        }
        assert_eq!(ctx.backoff_len(), 3);

        ctx.reset_backoff("Email/mail/b");
        assert_eq!(ctx.backoff_len(), 2);
    }

    #[test]
    fn test_next_backoff_drops_entries_idle_past_twice_max() {
        // max 0: every other entry is idle as soon as any time has passed
        let ctx = reconciler(0);
        ctx.next_backoff("Email/mail/deleted");
        std::thread::sleep(Duration::from_millis(5));

        ctx.next_backoff("Email/mail/other");

        assert_eq!(ctx.backoff_len(), 1);
    }

    #[test]
    fn test_failure_reason_from_resolution_error() {
        let key = ObjectKey::new("mail", "tok");
        assert_eq!(
            FailureReason::from(&ResolutionError::SecretNotFound(key.clone())),
            FailureReason::SecretNotFound
        );
        assert_eq!(
            FailureReason::from(&ResolutionError::TokenNotUtf8 {
                secret: key,
                key: "apiToken".to_string()
            }),
            FailureReason::InvalidCredential
        );
        assert_eq!(
            FailureReason::from(&ResolutionError::EmptySenderConfigRef).as_str(),
            "invalid_reference"
        );
    }

    #[test]
    fn test_failure_reason_from_send_error() {
        let rejected = SendError::Rejected {
            status: 401,
            body: String::new(),
        };
        assert_eq!(FailureReason::from(&rejected), FailureReason::Rejected);
        assert_eq!(
            FailureReason::from(&SendError::MissingMessageId).as_str(),
            "missing_message_id"
        );
    }

    #[test]
    fn test_backoff_state_reset() {
        let mut state = BackoffState::new(5, 300);
        state.increment_error();
        state.backoff.next_backoff_seconds();
        state.backoff.next_backoff_seconds();
        state.reset();
        assert_eq!(state.error_count, 0);
        assert_eq!(state.backoff.next_backoff_seconds(), 5);
    }
}

//! # In-Memory Store
//!
//! Map-backed [`ResourceStore`] used by tests and local dry runs.
//!
//! Every status write is recorded so callers can assert on how many writes a
//! reconciliation issued. Store failures can be simulated for every operation
//! at once ([`InMemoryStore::set_outage`]) or for a single operation
//! ([`InMemoryStore::fail_on`]).

use super::{ObjectKey, ResourceStore, StoreError};
use crate::crd::{Email, EmailSenderConfig, EmailStatus};
use async_trait::async_trait;
use k8s_openapi::api::core::v1::Secret;
use kube::ResourceExt;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Mutex, MutexGuard, PoisonError};

#[derive(Debug, Default)]
struct State {
    emails: BTreeMap<ObjectKey, Email>,
    sender_configs: BTreeMap<ObjectKey, EmailSenderConfig>,
    secrets: BTreeMap<ObjectKey, Secret>,
    status_writes: Vec<(ObjectKey, EmailStatus)>,
    outage: Option<String>,
    failing: BTreeSet<StoreOp>,
}

/// A single [`ResourceStore`] operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum StoreOp {
    GetEmail,
    GetSenderConfig,
    GetSecret,
    PatchEmailStatus,
}

#[derive(Debug, Default)]
pub struct InMemoryStore {
    state: Mutex<State>,
}

fn key_of<K: ResourceExt>(obj: &K) -> ObjectKey {
    ObjectKey::new(
        obj.namespace().unwrap_or_else(|| "default".to_string()),
        obj.name_any(),
    )
}

impl InMemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn available(&self, op: StoreOp) -> Result<MutexGuard<'_, State>, StoreError> {
        let state = self.state();
        if let Some(reason) = &state.outage {
            return Err(StoreError::Unavailable(reason.clone()));
        }
        if state.failing.contains(&op) {
            return Err(StoreError::Unavailable(format!("{op:?} failed")));
        }
        Ok(state)
    }

    /// Insert or replace an Email; a missing generation is set to 1
    pub fn insert_email(&self, mut email: Email) -> ObjectKey {
        if email.metadata.generation.is_none() {
            email.metadata.generation = Some(1);
        }
        let key = key_of(&email);
        self.state().emails.insert(key.clone(), email);
        key
    }

    pub fn insert_sender_config(&self, config: EmailSenderConfig) -> ObjectKey {
        let key = key_of(&config);
        self.state().sender_configs.insert(key.clone(), config);
        key
    }

    pub fn insert_secret(&self, secret: Secret) -> ObjectKey {
        let key = key_of(&secret);
        self.state().secrets.insert(key.clone(), secret);
        key
    }

    pub fn remove_email(&self, key: &ObjectKey) -> Option<Email> {
        self.state().emails.remove(key)
    }

    pub fn remove_sender_config(&self, key: &ObjectKey) -> Option<EmailSenderConfig> {
        self.state().sender_configs.remove(key)
    }

    /// Current copy of an Email, including any status written so far
    #[must_use]
    pub fn email(&self, key: &ObjectKey) -> Option<Email> {
        self.state().emails.get(key).cloned()
    }

    /// Every status write issued so far, oldest first
    #[must_use]
    pub fn status_writes(&self) -> Vec<(ObjectKey, EmailStatus)> {
        self.state().status_writes.clone()
    }

    /// Make every operation fail with [`StoreError::Unavailable`] until cleared
    pub fn set_outage(&self, reason: Option<&str>) {
        self.state().outage = reason.map(str::to_string);
    }

    /// Make `op` fail with [`StoreError::Unavailable`] until [`InMemoryStore::recover`]
    pub fn fail_on(&self, op: StoreOp) {
        self.state().failing.insert(op);
    }

    /// Clear every failure injected with [`InMemoryStore::fail_on`]
    pub fn recover(&self) {
        self.state().failing.clear();
    }
}

#[async_trait]
impl ResourceStore for InMemoryStore {
    async fn get_email(&self, key: &ObjectKey) -> Result<Option<Email>, StoreError> {
        Ok(self.available(StoreOp::GetEmail)?.emails.get(key).cloned())
    }

    async fn get_sender_config(
        &self,
        key: &ObjectKey,
    ) -> Result<Option<EmailSenderConfig>, StoreError> {
        Ok(self
            .available(StoreOp::GetSenderConfig)?
            .sender_configs
            .get(key)
            .cloned())
    }

    async fn get_secret(&self, key: &ObjectKey) -> Result<Option<Secret>, StoreError> {
        Ok(self.available(StoreOp::GetSecret)?.secrets.get(key).cloned())
    }

    async fn patch_email_status(
        &self,
        key: &ObjectKey,
        status: &EmailStatus,
    ) -> Result<(), StoreError> {
        let mut state = self.available(StoreOp::PatchEmailStatus)?;
        let email = state
            .emails
            .get_mut(key)
            .ok_or_else(|| StoreError::NotFound(format!("Email {key}")))?;
        email.status = Some(status.clone());
        state.status_writes.push((key.clone(), status.clone()));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crd::{DeliveryStatus, EmailSpec};

    fn email(namespace: &str, name: &str) -> Email {
        let mut email = Email::new(
            name,
            EmailSpec {
                sender_config_ref: "cfg".to_string(),
                recipient_email: "x@y.com".to_string(),
                subject: "Hi".to_string(),
                body: "<p>hi</p>".to_string(),
            },
        );
        email.metadata.namespace = Some(namespace.to_string());
        email
    }

    #[tokio::test]
    async fn test_insert_defaults_generation() {
        let store = InMemoryStore::new();
        let key = store.insert_email(email("mail", "a"));
        let stored = store.get_email(&key).await.unwrap().unwrap();
        assert_eq!(stored.metadata.generation, Some(1));
    }

    #[tokio::test]
    async fn test_missing_objects_are_none() {
        let store = InMemoryStore::new();
        let key = ObjectKey::new("mail", "nope");
        assert!(store.get_email(&key).await.unwrap().is_none());
        assert!(store.get_sender_config(&key).await.unwrap().is_none());
        assert!(store.get_secret(&key).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_patch_replaces_status_and_records_write() {
        let store = InMemoryStore::new();
        let key = store.insert_email(email("mail", "a"));
        let status = EmailStatus {
            delivery_status: DeliveryStatus::Sent,
            message_id: "m-1".to_string(),
            error: String::new(),
            observed_generation: Some(1),
        };

        store.patch_email_status(&key, &status).await.unwrap();

        assert_eq!(store.email(&key).unwrap().status, Some(status.clone()));
        assert_eq!(store.status_writes(), vec![(key, status)]);
    }

    #[tokio::test]
    async fn test_patch_of_missing_email_fails() {
        let store = InMemoryStore::new();
        let result = store
            .patch_email_status(&ObjectKey::new("mail", "gone"), &EmailStatus::default())
            .await;
        assert!(matches!(result, Err(StoreError::NotFound(_))));
        assert!(store.status_writes().is_empty());
    }

    #[tokio::test]
    async fn test_outage_fails_every_operation() {
        let store = InMemoryStore::new();
        let key = store.insert_email(email("mail", "a"));
        store.set_outage(Some("connection refused"));

        assert!(matches!(
            store.get_email(&key).await,
            Err(StoreError::Unavailable(_))
        ));
        assert!(matches!(
            store.patch_email_status(&key, &EmailStatus::default()).await,
            Err(StoreError::Unavailable(_))
        ));

        store.set_outage(None);
        assert!(store.get_email(&key).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_fail_on_only_affects_that_operation() {
        let store = InMemoryStore::new();
        let key = store.insert_email(email("mail", "a"));
        store.fail_on(StoreOp::PatchEmailStatus);

        assert!(store.get_email(&key).await.unwrap().is_some());
        let result = store.patch_email_status(&key, &EmailStatus::default()).await;
        assert!(matches!(result, Err(StoreError::Unavailable(_))));
        assert!(store.status_writes().is_empty());

        store.recover();
        store
            .patch_email_status(&key, &EmailStatus::default())
            .await
            .unwrap();
        assert_eq!(store.status_writes().len(), 1);
    }
}

//! # Resource Store
//!
//! The declarative-state store the reconcilers read from and write status to.
//!
//! Reconcilers never talk to the Kubernetes API directly; they hold an
//! `Arc<dyn ResourceStore>` handed to them at construction:
//! - [`KubeStore`] - the Kubernetes API server (production)
//! - [`InMemoryStore`] - a map-backed store for tests and local runs
//!
//! "Not found" is not an error at this seam: lookups return `Ok(None)` so
//! callers can tell a dangling reference apart from an unreachable store.

use crate::crd::{Email, EmailSenderConfig, EmailStatus};
use async_trait::async_trait;
use k8s_openapi::api::core::v1::Secret;
use std::fmt;
use thiserror::Error;

mod kubernetes;
mod memory;

pub use kubernetes::KubeStore;
pub use memory::{InMemoryStore, StoreOp};

/// Namespace and name of a namespaced object
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectKey {
    pub namespace: String,
    pub name: String,
}

impl ObjectKey {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
        }
    }

    /// Key of another object in the same namespace
    #[must_use]
    pub fn sibling(&self, name: impl Into<String>) -> Self {
        Self::new(self.namespace.clone(), name)
    }
}

impl fmt::Display for ObjectKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.namespace, self.name)
    }
}

/// Failure of the store itself (connectivity, authorization, conflicts)
///
/// These are never folded into an Email's status; they propagate to the
/// controller's error policy, which requeues with backoff.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Kubernetes API request for {key} failed: {source}")]
    Kube {
        key: String,
        #[source]
        source: kube::Error,
    },
    #[error("{0} does not exist")]
    NotFound(String),
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// Get-by-key and status-patch access to the controller's resources
#[async_trait]
pub trait ResourceStore: Send + Sync {
    /// Fetch an Email, `None` if it does not exist
    async fn get_email(&self, key: &ObjectKey) -> Result<Option<Email>, StoreError>;

    /// Fetch an EmailSenderConfig, `None` if it does not exist
    async fn get_sender_config(
        &self,
        key: &ObjectKey,
    ) -> Result<Option<EmailSenderConfig>, StoreError>;

    /// Fetch a Secret, `None` if it does not exist
    async fn get_secret(&self, key: &ObjectKey) -> Result<Option<Secret>, StoreError>;

    /// Replace the status of an Email in one write
    async fn patch_email_status(
        &self,
        key: &ObjectKey,
        status: &EmailStatus,
    ) -> Result<(), StoreError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_object_key_display() {
        assert_eq!(ObjectKey::new("mail", "welcome").to_string(), "mail/welcome");
    }

    #[test]
    fn test_sibling_keeps_namespace() {
        let key = ObjectKey::new("mail", "welcome");
        assert_eq!(key.sibling("cfg-a"), ObjectKey::new("mail", "cfg-a"));
    }
}

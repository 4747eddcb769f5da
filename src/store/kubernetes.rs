//! # Kubernetes Store
//!
//! [`ResourceStore`] backed by the Kubernetes API server.

use super::{ObjectKey, ResourceStore, StoreError};
use crate::crd::{Email, EmailSenderConfig, EmailStatus};
use async_trait::async_trait;
use k8s_openapi::api::core::v1::Secret;
use kube::api::{Api, Patch, PatchParams};
use kube::Client;
use tracing::debug;

pub struct KubeStore {
    client: Client,
    field_manager: String,
}

impl std::fmt::Debug for KubeStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KubeStore")
            .field("field_manager", &self.field_manager)
            .finish_non_exhaustive()
    }
}

impl KubeStore {
    pub fn new(client: Client, field_manager: impl Into<String>) -> Self {
        Self {
            client,
            field_manager: field_manager.into(),
        }
    }

    fn emails(&self, namespace: &str) -> Api<Email> {
        Api::namespaced(self.client.clone(), namespace)
    }
}

fn kube_error(key: &ObjectKey) -> impl FnOnce(kube::Error) -> StoreError + '_ {
    move |source| StoreError::Kube {
        key: key.to_string(),
        source,
    }
}

#[async_trait]
impl ResourceStore for KubeStore {
    async fn get_email(&self, key: &ObjectKey) -> Result<Option<Email>, StoreError> {
        self.emails(&key.namespace)
            .get_opt(&key.name)
            .await
            .map_err(kube_error(key))
    }

    async fn get_sender_config(
        &self,
        key: &ObjectKey,
    ) -> Result<Option<EmailSenderConfig>, StoreError> {
        let api: Api<EmailSenderConfig> = Api::namespaced(self.client.clone(), &key.namespace);
        api.get_opt(&key.name).await.map_err(kube_error(key))
    }

    async fn get_secret(&self, key: &ObjectKey) -> Result<Option<Secret>, StoreError> {
        let api: Api<Secret> = Api::namespaced(self.client.clone(), &key.namespace);
        api.get_opt(&key.name).await.map_err(kube_error(key))
    }

    async fn patch_email_status(
        &self,
        key: &ObjectKey,
        status: &EmailStatus,
    ) -> Result<(), StoreError> {
        // Merge patch of the full status object: every field is rewritten together
        let patch = serde_json::json!({ "status": status });

        self.emails(&key.namespace)
            .patch_status(
                &key.name,
                &PatchParams::apply(&self.field_manager),
                &Patch::Merge(patch),
            )
            .await
            .map_err(kube_error(key))?;

        debug!(
            resource.namespace = key.namespace.as_str(),
            resource.name = key.name.as_str(),
            delivery_status = status.delivery_status.as_str(),
            "email.status.patched"
        );
        Ok(())
    }
}

//! Common test utilities
//!
//! Shared fixtures for the reconciler and Pact tests: rustls setup, resource
//! builders and a scripted [`EmailSender`].

#![allow(dead_code, reason = "Each test binary uses a different subset")]

use async_trait::async_trait;
use email_dispatch_controller::crd::{
    Email, EmailSenderConfig, EmailSenderConfigSpec, EmailSpec, EmailStatus,
};
use email_dispatch_controller::sender::{EmailSender, OutboundEmail, SendError, SendReceipt};
use email_dispatch_controller::store::{InMemoryStore, ObjectKey};
use k8s_openapi::api::core::v1::Secret;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use k8s_openapi::ByteString;
use std::collections::{BTreeMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, Once};
use std::time::Duration;

static RUSTLS_INIT: Once = Once::new();

/// Initialize rustls crypto provider for tests
///
/// Uses a `Once` to ensure it's only called once per test binary.
pub fn init_rustls() {
    RUSTLS_INIT.call_once(|| {
        email_dispatch_controller::runtime::initialization::install_crypto_provider();
    });
}

pub const NAMESPACE: &str = "mail";
pub const SENDER_EMAIL: &str = "noreply@example.com";
pub const API_TOKEN: &str = "mlsn.test-token";

fn meta(name: &str) -> ObjectMeta {
    ObjectMeta {
        name: Some(name.to_string()),
        namespace: Some(NAMESPACE.to_string()),
        ..ObjectMeta::default()
    }
}

pub fn email(name: &str, sender_config_ref: &str) -> Email {
    let mut email = Email::new(
        name,
        EmailSpec {
            sender_config_ref: sender_config_ref.to_string(),
            recipient_email: "x@y.com".to_string(),
            subject: "Hi".to_string(),
            body: "<p>hi</p>".to_string(),
        },
    );
    email.metadata = meta(name);
    email.metadata.generation = Some(1);
    email
}

pub fn email_with_status(name: &str, sender_config_ref: &str, status: EmailStatus) -> Email {
    let mut email = email(name, sender_config_ref);
    email.status = Some(status);
    email
}

pub fn sender_config(name: &str, sender_email: &str, secret_ref: &str) -> EmailSenderConfig {
    let mut config = EmailSenderConfig::new(
        name,
        EmailSenderConfigSpec {
            sender_email: sender_email.to_string(),
            api_token_secret_ref: secret_ref.to_string(),
        },
    );
    config.metadata = meta(name);
    config
}

pub fn secret(name: &str, entries: &[(&str, &[u8])]) -> Secret {
    Secret {
        metadata: meta(name),
        data: Some(
            entries
                .iter()
                .map(|(k, v)| ((*k).to_string(), ByteString(v.to_vec())))
                .collect::<BTreeMap<_, _>>(),
        ),
        ..Secret::default()
    }
}

pub fn token_secret(name: &str, token: &str) -> Secret {
    secret(name, &[("apiToken", token.as_bytes())])
}

pub fn key(name: &str) -> ObjectKey {
    ObjectKey::new(NAMESPACE, name)
}

/// Store holding `cfg-a` → `tok-a` and nothing else
pub fn store_with_sender() -> InMemoryStore {
    let store = InMemoryStore::new();
    store.insert_sender_config(sender_config("cfg-a", SENDER_EMAIL, "tok-a"));
    store.insert_secret(token_secret("tok-a", API_TOKEN));
    store
}

/// What the scripted sender answers to the next call
#[derive(Debug, Clone)]
pub enum Reply {
    Accept(String),
    Reject { status: u16, body: String },
    NoMessageId,
}

/// One recorded call to the scripted sender
#[derive(Debug, Clone)]
pub struct SentCall {
    pub api_token: String,
    pub email: OutboundEmail,
}

/// An [`EmailSender`] that plays back scripted replies and records every call
///
/// Once the script runs out every call is accepted with `m-<call number>`.
#[derive(Debug, Default)]
pub struct ScriptedSender {
    replies: Mutex<VecDeque<Reply>>,
    calls: Mutex<Vec<SentCall>>,
    delay: Option<Duration>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl ScriptedSender {
    pub fn new(replies: impl IntoIterator<Item = Reply>) -> Self {
        Self {
            replies: Mutex::new(replies.into_iter().collect()),
            ..Self::default()
        }
    }

    pub fn accepting() -> Self {
        Self::default()
    }

    /// Hold every call for `delay` before answering
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn calls(&self) -> Vec<SentCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    /// Largest number of calls that were in progress at the same time
    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl EmailSender for ScriptedSender {
    async fn send(&self, api_token: &str, email: &OutboundEmail) -> Result<SendReceipt, SendError> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);

        let call_number = {
            let mut calls = self.calls.lock().unwrap();
            calls.push(SentCall {
                api_token: api_token.to_string(),
                email: email.clone(),
            });
            calls.len()
        };

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        let reply = self.replies.lock().unwrap().pop_front();
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        match reply {
            None => Ok(SendReceipt {
                message_id: format!("m-{call_number}"),
            }),
            Some(Reply::Accept(message_id)) => Ok(SendReceipt { message_id }),
            Some(Reply::Reject { status, body }) => Err(SendError::Rejected { status, body }),
            Some(Reply::NoMessageId) => Err(SendError::MissingMessageId),
        }
    }
}

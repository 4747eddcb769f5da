//! # Initialization
//!
//! Controller initialization logic including rustls setup, tracing, metrics,
//! server startup, Kubernetes client setup and reconciler wiring.

use crate::config::{ControllerConfig, LogFormat};
use crate::controller::reconciler::Reconciler;
use crate::controller::server::{start_server, ServerState};
use crate::crd::{Email, EmailSenderConfig};
use crate::observability::metrics;
use crate::sender::MailerSendClient;
use crate::store::KubeStore;
use anyhow::{Context, Result};
use kube::api::{Api, ListParams};
use kube::Client;
use std::sync::Arc;
use tracing::{debug, error, info};
use tracing_subscriber::EnvFilter;

/// Log filter used when `RUST_LOG` is not set
pub const DEFAULT_LOG_FILTER: &str = "email_dispatch_controller=info";

/// Everything the watch loop needs
pub struct InitializationResult {
    pub emails: Api<Email>,
    pub sender_configs: Api<EmailSenderConfig>,
    pub reconciler: Arc<Reconciler>,
    pub server_state: Arc<ServerState>,
}

impl std::fmt::Debug for InitializationResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InitializationResult")
            .field("server_ready", &self.server_state.is_ready())
            .finish_non_exhaustive()
    }
}

/// Install the ring crypto provider for rustls
///
/// Must run before any TLS connection is made. Installing twice is harmless.
pub fn install_crypto_provider() {
    if let Err(_existing) = rustls::crypto::ring::default_provider().install_default() {
        debug!("rustls crypto provider already installed");
    }
}

/// Set up the global tracing subscriber
///
/// # Errors
/// Fails if a global subscriber is already installed.
pub fn init_tracing(format: LogFormat) -> Result<()> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    match format {
        LogFormat::Json => builder.json().try_init(),
        LogFormat::Text => builder.try_init(),
    }
    .map_err(|e| anyhow::anyhow!("Failed to initialize tracing subscriber: {e}"))
}

/// Initialize the controller runtime
///
/// This function handles:
/// - rustls crypto provider setup
/// - Tracing subscriber setup
/// - Metrics registration
/// - HTTP server startup
/// - Kubernetes client creation
/// - CRD availability check
/// - Reconciler setup
///
/// # Errors
/// Fails if any of the steps above fails.
pub async fn initialize(config: &ControllerConfig) -> Result<InitializationResult> {
    install_crypto_provider();
    init_tracing(config.log_format)?;

    info!("Starting Email Dispatch Controller");
    info!(
        build.timestamp = env!("BUILD_TIMESTAMP"),
        build.datetime = env!("BUILD_DATETIME"),
        build.git_hash = env!("BUILD_GIT_HASH"),
        "Build info"
    );

    metrics::register_metrics().context("Failed to register metrics")?;

    let server_state = Arc::new(ServerState::default());
    let server_port = config.metrics_port;
    let server_state_clone = Arc::clone(&server_state);
    let server_handle = tokio::spawn(async move {
        if let Err(e) = start_server(server_port, server_state_clone).await {
            error!(error = %e, "HTTP server error");
        }
    });
    wait_for_server_ready(&server_state, &server_handle, config).await?;

    let client = Client::try_default()
        .await
        .context("Failed to create Kubernetes client. Ensure kubeconfig or in-cluster config is available.")?;

    let (emails, sender_configs): (Api<Email>, Api<EmailSenderConfig>) =
        match config.watch_namespace.as_deref() {
            Some(namespace) => {
                info!(watch.namespace = namespace, "Watching a single namespace");
                (
                    Api::namespaced(client.clone(), namespace),
                    Api::namespaced(client.clone(), namespace),
                )
            }
            None => {
                info!("Watching all namespaces");
                (Api::all(client.clone()), Api::all(client.clone()))
            }
        };

    check_crds_queryable(&emails, &sender_configs).await?;

    let sender = MailerSendClient::new(
        config.mailer_api_base_url.clone(),
        config.mailer_request_timeout(),
    )
    .context("Failed to create MailerSend client")?;
    info!(
        mailer.base_url = config.mailer_api_base_url.as_str(),
        "Email provider client ready"
    );

    let store = KubeStore::new(client.clone(), config.field_manager.clone());
    let reconciler = Arc::new(Reconciler::new(Arc::new(store), Arc::new(sender), config));

    info!("Controller initialized, starting watch loop...");

    Ok(InitializationResult {
        emails,
        sender_configs,
        reconciler,
        server_state,
    })
}

/// Fail fast when the CRDs are not installed
async fn check_crds_queryable(
    emails: &Api<Email>,
    sender_configs: &Api<EmailSenderConfig>,
) -> Result<()> {
    let probe = ListParams::default().limit(1);
    let email_list = emails
        .list(&probe)
        .await
        .context("Email CRD is not queryable. Install it with `crdgen | kubectl apply -f -`")?;
    let config_list = sender_configs.list(&probe).await.context(
        "EmailSenderConfig CRD is not queryable. Install it with `crdgen | kubectl apply -f -`",
    )?;
    info!(
        emails.sample = email_list.items.len(),
        sender_configs.sample = config_list.items.len(),
        "CRDs are queryable"
    );
    Ok(())
}

/// Wait for the HTTP server to become ready
async fn wait_for_server_ready(
    server_state: &Arc<ServerState>,
    server_handle: &tokio::task::JoinHandle<()>,
    config: &ControllerConfig,
) -> Result<()> {
    let startup_timeout = config.server_startup_timeout();
    let poll_interval = config.server_poll_interval();
    let start_time = std::time::Instant::now();

    loop {
        if server_handle.is_finished() {
            return Err(anyhow::anyhow!("HTTP server failed to start"));
        }

        if server_state.is_ready() {
            info!("HTTP server is ready and accepting connections");
            return Ok(());
        }

        if start_time.elapsed() > startup_timeout {
            return Err(anyhow::anyhow!(
                "HTTP server failed to become ready within {} seconds",
                startup_timeout.as_secs()
            ));
        }

        tokio::time::sleep(poll_interval).await;
    }
}

//! # Email Dispatch Controller
//!
//! A Kubernetes controller that sends emails declared as `Email` resources
//! through a MailerSend-compatible API.
//!
//! ## Overview
//!
//! 1. **Watching Emails** - every new or changed `Email` is reconciled once per generation
//! 2. **Resolving senders** - `spec.senderConfigRef` names an `EmailSenderConfig`, whose
//!    `apiTokenSecretRef` names a Secret holding the API token
//! 3. **Sending** - one `POST /v1/email` per attempt
//! 4. **Reporting** - `status.deliveryStatus`, `status.messageId` and `status.error`
//!
//! Configuration comes from environment variables (see `config::ControllerConfig`);
//! the flags below override the most common ones.

use anyhow::Result;
use clap::Parser;
use email_dispatch_controller::config::ControllerConfig;
use email_dispatch_controller::runtime::initialization::initialize;
use email_dispatch_controller::runtime::watch_loop::run_watch_loop;

/// Email Dispatch Controller
#[derive(Debug, Parser)]
#[command(name = "email-dispatch-controller", version, about, long_about = None)]
struct Args {
    /// Only watch resources in this namespace (default: all namespaces)
    #[arg(long, short = 'n')]
    namespace: Option<String>,

    /// Port of the metrics and health probe server
    #[arg(long)]
    metrics_port: Option<u16>,

    /// Base URL of the email provider API
    #[arg(long)]
    mailer_api_base_url: Option<String>,
}

impl Args {
    fn apply(self, mut config: ControllerConfig) -> ControllerConfig {
        if let Some(namespace) = self.namespace {
            config.watch_namespace = Some(namespace);
        }
        if let Some(port) = self.metrics_port {
            config.metrics_port = port;
        }
        if let Some(base_url) = self.mailer_api_base_url {
            config.mailer_api_base_url = base_url;
        }
        config
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let config = Args::parse().apply(ControllerConfig::from_env());

    let init = initialize(&config).await?;
    run_watch_loop(
        init.emails,
        init.sender_configs,
        init.reconciler,
        init.server_state,
        &config,
    )
    .await;

    Ok(())
}

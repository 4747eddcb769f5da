//! # Watch Loop
//!
//! Runs one kube-runtime `Controller` for Email and one for EmailSenderConfig
//! side by side, and restarts them if their streams end.

use crate::config::ControllerConfig;
use crate::controller::reconciler::status::is_settled;
use crate::controller::reconciler::{Reconciler, ReconcilerError, SenderConfigObservation};
use crate::controller::server::ServerState;
use crate::crd::{Email, EmailSenderConfig};
use crate::observability::metrics;
use crate::runtime::error_policy::{
    backoff_key, handle_reconciliation_error, handle_watch_stream_error,
};
use futures::StreamExt;
use kube::api::Api;
use kube::{Resource, ResourceExt};
use kube_runtime::controller::{self, Action};
use kube_runtime::reflector::ObjectRef;
use kube_runtime::{watcher, Controller};
use std::fmt::Debug;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn, Instrument};

/// Reconcile entry point for Email events
///
/// Events that only echo a status this controller already settled for the
/// current generation are acknowledged without touching the reconciler.
///
/// # Errors
/// Propagates [`ReconcilerError`] to the error policy.
pub async fn reconcile_email(
    obj: Arc<Email>,
    ctx: Arc<Reconciler>,
) -> Result<Action, ReconcilerError> {
    let name = obj.name_any();
    let namespace = obj.namespace().unwrap_or_else(|| "default".to_string());

    if is_settled(&obj) {
        debug!(
            resource.name = name.as_str(),
            resource.namespace = namespace.as_str(),
            resource.generation = obj.metadata.generation,
            "Skipping reconciliation - status already settled for this generation"
        );
        return Ok(Action::await_change());
    }

    let start = Instant::now();
    metrics::increment_reconciliations("Email");
    let result = ctx.emails.reconcile(&namespace, &name).await;
    metrics::observe_reconciliation_duration(start.elapsed().as_secs_f64());

    let outcome = result?;
    ctx.reset_backoff(&backoff_key("Email", &namespace, &name));
    info!(
        resource.name = name.as_str(),
        resource.namespace = namespace.as_str(),
        outcome = ?outcome,
        "reconciliation.complete"
    );
    Ok(Action::await_change())
}

/// Reconcile entry point for EmailSenderConfig events
///
/// # Errors
/// Propagates [`ReconcilerError`] to the error policy.
pub async fn reconcile_sender_config(
    obj: Arc<EmailSenderConfig>,
    ctx: Arc<Reconciler>,
) -> Result<Action, ReconcilerError> {
    let name = obj.name_any();
    let namespace = obj.namespace().unwrap_or_else(|| "default".to_string());

    let start = Instant::now();
    metrics::increment_reconciliations("EmailSenderConfig");
    let result = ctx.sender_configs.reconcile(&namespace, &name).await;
    metrics::observe_reconciliation_duration(start.elapsed().as_secs_f64());

    let observation = result?;
    ctx.reset_backoff(&backoff_key("EmailSenderConfig", &namespace, &name));
    if let SenderConfigObservation::Observed { findings } = &observation {
        debug!(
            resource.name = name.as_str(),
            resource.namespace = namespace.as_str(),
            findings = findings.len(),
            "reconciliation.complete"
        );
    }
    Ok(Action::await_change())
}

type ControllerResult<K> =
    Result<(ObjectRef<K>, Action), controller::Error<ReconcilerError, watcher::Error>>;

async fn log_controller_result<K>(result: ControllerResult<K>, watch_restart_delay: Duration)
where
    K: Resource + Debug,
    K::DynamicType: Debug,
{
    match result {
        Ok((object, action)) => {
            debug!(
                resource.name = object.name.as_str(),
                resource.namespace = object.namespace.as_deref().unwrap_or_default(),
                action = ?action,
                "watch.event.success"
            );
        }
        Err(e) => {
            handle_watch_stream_error(&format!("{e:?}"), watch_restart_delay).await;
        }
    }
}

/// Run both controllers until shutdown
pub async fn run_watch_loop(
    emails: Api<Email>,
    sender_configs: Api<EmailSenderConfig>,
    reconciler: Arc<Reconciler>,
    server_state: Arc<ServerState>,
    config: &ControllerConfig,
) {
    let shutdown_state = Arc::clone(&server_state);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Received shutdown signal (SIGINT/SIGTERM), initiating graceful shutdown...");
        }
        shutdown_state.set_ready(false);
        info!("Marked server as not ready, waiting for in-flight reconciliations to complete...");
    });

    let restart_delay = config.watch_restart_delay();

    loop {
        if !server_state.is_ready() {
            info!("Shutdown requested, exiting watch loop");
            break;
        }

        let watch_span = tracing::span!(
            tracing::Level::INFO,
            "controller.watch",
            operation = "watch_loop"
        );

        let email_controller = Controller::new(emails.clone(), watcher::Config::default())
            .shutdown_on_signal()
            .run(
                reconcile_email,
                handle_reconciliation_error::<Email>,
                Arc::clone(&reconciler),
            )
            .for_each(|result| log_controller_result(result, restart_delay));

        let sender_config_controller =
            Controller::new(sender_configs.clone(), watcher::Config::default())
                .shutdown_on_signal()
                .run(
                    reconcile_sender_config,
                    handle_reconciliation_error::<EmailSenderConfig>,
                    Arc::clone(&reconciler),
                )
                .for_each(|result| log_controller_result(result, restart_delay));

        info!("Starting Email and EmailSenderConfig controllers...");
        async {
            tokio::join!(email_controller, sender_config_controller);
        }
        .instrument(watch_span)
        .await;

        if !server_state.is_ready() {
            info!("Shutdown requested, exiting watch loop");
            break;
        }

        warn!(
            delay.seconds = restart_delay.as_secs(),
            "Controller watch streams ended, restarting"
        );
        tokio::time::sleep(restart_delay).await;
    }

    info!("Controller stopped gracefully");
}

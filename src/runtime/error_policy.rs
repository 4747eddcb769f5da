//! # Error Policy
//!
//! Error handling and backoff logic for the controller watch loops.
//! This module handles reconciliation errors and watch stream errors.

use crate::controller::reconciler::{Reconciler, ReconcilerError};
use crate::observability::metrics;
use kube::{Resource, ResourceExt};
use kube_runtime::controller::Action;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

/// Key under which backoff state is tracked for one object
#[must_use]
pub fn backoff_key(kind: &str, namespace: &str, name: &str) -> String {
    format!("{kind}/{namespace}/{name}")
}

/// Handle reconciliation errors with Fibonacci backoff
///
/// Backoff state is tracked per resource so one failing object does not slow
/// down the others. A successful reconciliation clears it again.
pub fn handle_reconciliation_error<K>(
    obj: Arc<K>,
    error: &ReconcilerError,
    ctx: Arc<Reconciler>,
) -> Action
where
    K: Resource<DynamicType = ()>,
{
    let kind = K::kind(&());
    let name = obj.name_any();
    let namespace = obj.namespace().unwrap_or_else(|| "default".to_string());

    let error_span = tracing::span!(
        tracing::Level::ERROR,
        "controller.watch.reconciliation_error",
        resource.kind = %kind,
        resource.name = name.as_str(),
        resource.namespace = namespace.as_str(),
        error = %error
    );
    let _error_guard = error_span.enter();

    error!(error = ?error, "Reconciliation error");
    metrics::increment_reconciliation_errors(&kind);

    let (delay, error_count) = ctx.next_backoff(&backoff_key(&kind, &namespace, &name));

    let next_trigger_time = chrono::TimeDelta::from_std(delay)
        .ok()
        .and_then(|delay| chrono::Utc::now().checked_add_signed(delay))
        .map(|time| time.to_rfc3339())
        .unwrap_or_default();

    info!(
        backoff.seconds = delay.as_secs(),
        backoff.error_count = error_count,
        next_retry = next_trigger_time.as_str(),
        "Retrying with Fibonacci backoff"
    );

    Action::requeue(delay)
}

/// Classification of an error surfaced by a controller stream
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchErrorKind {
    /// RBAC revoked or token expired
    Unauthorized,
    /// Resource version too old; the watcher relists on its own
    Expired,
    /// API server storage reinitializing or rate limiting
    Throttled,
    /// The watched object or its CRD is gone
    NotFound,
    /// A reconciliation returned an error; already handled by the error policy
    Reconciler,
    Other,
}

/// Classify a controller stream error from its debug representation
#[must_use]
pub fn classify_watch_error(error_string: &str) -> WatchErrorKind {
    // 404 before 401: a plain-text 404 body can surface as a WatchFailed chain
    let is_not_found = error_string.contains("ObjectNotFound")
        || error_string.contains("404")
        || error_string.contains("not found");

    if error_string.contains("ReconcilerFailed") {
        WatchErrorKind::Reconciler
    } else if is_not_found {
        WatchErrorKind::NotFound
    } else if error_string.contains("401") || error_string.contains("Unauthorized") {
        WatchErrorKind::Unauthorized
    } else if error_string.contains("410")
        || error_string.contains("too old resource version")
        || error_string.contains("Expired")
    {
        WatchErrorKind::Expired
    } else if error_string.contains("429")
        || error_string.contains("storage is (re)initializing")
        || error_string.contains("TooManyRequests")
    {
        WatchErrorKind::Throttled
    } else {
        WatchErrorKind::Other
    }
}

/// Log a controller stream error and pause when the API server needs time
///
/// The kube-runtime watcher retries on its own; this only adds logging and a
/// delay for errors that would otherwise spin.
pub async fn handle_watch_stream_error(error_string: &str, watch_restart_delay: Duration) {
    let error_span = tracing::span!(
        tracing::Level::WARN,
        "controller.watch.error",
        error = %error_string
    );
    let _error_guard = error_span.enter();

    match classify_watch_error(error_string) {
        WatchErrorKind::Reconciler => {
            // Already logged by handle_reconciliation_error
        }
        WatchErrorKind::Unauthorized => {
            error!(
                "Watch authentication failed (401 Unauthorized) - RBAC may have been revoked or token expired"
            );
            warn!(
                delay.seconds = watch_restart_delay.as_secs(),
                "Waiting before retrying watch"
            );
            tokio::time::sleep(watch_restart_delay).await;
        }
        WatchErrorKind::Expired => {
            warn!("Watch resource version expired (410), watcher will relist");
        }
        WatchErrorKind::Throttled => {
            warn!(
                delay.seconds = watch_restart_delay.as_secs(),
                "API server throttling or reinitializing (429), backing off"
            );
            tokio::time::sleep(watch_restart_delay).await;
        }
        WatchErrorKind::NotFound => {
            warn!("Watched resource not found (404) - CRD may be missing");
        }
        WatchErrorKind::Other => {
            error!("Controller stream error");
            tokio::time::sleep(watch_restart_delay).await;
        }
    }
}

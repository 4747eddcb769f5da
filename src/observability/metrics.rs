//! # Metrics
//!
//! Prometheus metrics for monitoring the controller.
//!
//! ## Metrics Exposed
//!
//! - `email_dispatch_reconciliations_total{kind}` - Total number of reconciliations per resource kind
//! - `email_dispatch_reconciliation_errors_total{kind}` - Reconciliations that ended in a store error
//! - `email_dispatch_reconciliation_duration_seconds` - Duration of reconciliation operations
//! - `email_dispatch_emails_sent_total` - Emails accepted by the provider
//! - `email_dispatch_emails_failed_total{reason}` - Emails marked Failed, by failure reason
//! - `email_dispatch_send_duration_seconds` - Duration of outbound send requests

use anyhow::Result;
use prometheus::{Histogram, IntCounter, IntCounterVec, Registry};
use std::sync::LazyLock;

pub(crate) static REGISTRY: LazyLock<Registry> = LazyLock::new(Registry::new);

static RECONCILIATIONS_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        prometheus::Opts::new(
            "email_dispatch_reconciliations_total",
            "Total number of reconciliations by resource kind",
        ),
        &["kind"],
    )
    .expect("Failed to create RECONCILIATIONS_TOTAL metric - this should never happen")
});

static RECONCILIATION_ERRORS_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        prometheus::Opts::new(
            "email_dispatch_reconciliation_errors_total",
            "Total number of reconciliation errors by resource kind",
        ),
        &["kind"],
    )
    .expect("Failed to create RECONCILIATION_ERRORS_TOTAL metric - this should never happen")
});

static RECONCILIATION_DURATION: LazyLock<Histogram> = LazyLock::new(|| {
    Histogram::with_opts(
        prometheus::HistogramOpts::new(
            "email_dispatch_reconciliation_duration_seconds",
            "Duration of reconciliation in seconds",
        )
        .buckets(vec![0.05, 0.1, 0.5, 1.0, 2.0, 5.0, 10.0, 30.0]),
    )
    .expect("Failed to create RECONCILIATION_DURATION metric - this should never happen")
});

static EMAILS_SENT_TOTAL: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "email_dispatch_emails_sent_total",
        "Total number of emails accepted by the provider",
    )
    .expect("Failed to create EMAILS_SENT_TOTAL metric - this should never happen")
});

static EMAILS_FAILED_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        prometheus::Opts::new(
            "email_dispatch_emails_failed_total",
            "Total number of emails marked Failed by reason",
        ),
        &["reason"],
    )
    .expect("Failed to create EMAILS_FAILED_TOTAL metric - this should never happen")
});

static SEND_DURATION: LazyLock<Histogram> = LazyLock::new(|| {
    Histogram::with_opts(
        prometheus::HistogramOpts::new(
            "email_dispatch_send_duration_seconds",
            "Duration of outbound send requests in seconds",
        )
        .buckets(vec![0.1, 0.25, 0.5, 1.0, 2.0, 5.0, 10.0, 30.0]),
    )
    .expect("Failed to create SEND_DURATION metric - this should never happen")
});

/// Register every metric with the shared registry
///
/// # Errors
/// Fails if a metric is registered twice.
pub fn register_metrics() -> Result<()> {
    REGISTRY.register(Box::new(RECONCILIATIONS_TOTAL.clone()))?;
    REGISTRY.register(Box::new(RECONCILIATION_ERRORS_TOTAL.clone()))?;
    REGISTRY.register(Box::new(RECONCILIATION_DURATION.clone()))?;
    REGISTRY.register(Box::new(EMAILS_SENT_TOTAL.clone()))?;
    REGISTRY.register(Box::new(EMAILS_FAILED_TOTAL.clone()))?;
    REGISTRY.register(Box::new(SEND_DURATION.clone()))?;

    Ok(())
}

/// Snapshot of every registered metric family
pub fn gather() -> Vec<prometheus::proto::MetricFamily> {
    REGISTRY.gather()
}

pub fn increment_reconciliations(kind: &str) {
    RECONCILIATIONS_TOTAL.with_label_values(&[kind]).inc();
}

pub fn increment_reconciliation_errors(kind: &str) {
    RECONCILIATION_ERRORS_TOTAL.with_label_values(&[kind]).inc();
}

pub fn observe_reconciliation_duration(duration: f64) {
    RECONCILIATION_DURATION.observe(duration);
}

pub fn increment_emails_sent() {
    EMAILS_SENT_TOTAL.inc();
}

pub fn increment_emails_failed(reason: &str) {
    EMAILS_FAILED_TOTAL.with_label_values(&[reason]).inc();
}

pub fn observe_send_duration(duration: f64) {
    SEND_DURATION.observe(duration);
}

//! Telemetry logic.
//! Support structured logging and failure metrics.

use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use crate::error::FailureKind;

/// One failed verification, as reported to telemetry.
///
/// Carries no secret.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Failure<'a> {
    pub kind: FailureKind,
    /// Identity whose bind or lookup failed.
    pub username: &'a str,
    /// Directory-side detail for operators.
    pub detail: String,
}

/// Port for verification observability.
///
/// Only failures are reported. Recording a success is up to the caller.
pub trait AuthTelemetry: Send + Sync {
    /// Record a failed verification.
    fn record_failure(&self, failure: &Failure<'_>);
}

/// Tracing-based telemetry adapter.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingTelemetry;

impl TracingTelemetry {
    /// Create a new [`TracingTelemetry`].
    pub fn new() -> Self {
        Self
    }
}

impl AuthTelemetry for TracingTelemetry {
    fn record_failure(&self, failure: &Failure<'_>) {
        let kind = failure.kind.as_str();

        match failure.kind {
            // Operator side: directory down or service account misconfigured.
            FailureKind::Connection | FailureKind::ServiceAccount => {
                tracing::error!(
                    kind,
                    username = failure.username,
                    detail = %failure.detail,
                    "LDAP verification failed"
                );
            },
            FailureKind::Authentication | FailureKind::UserNotFound => {
                tracing::warn!(
                    kind,
                    username = failure.username,
                    detail = %failure.detail,
                    "LDAP verification failed"
                );
            },
        }

        metrics::counter!("ldap_verify_failures_total", "kind" => kind)
            .increment(1);
    }
}

/// Install the global subscriber, filtered by `RUST_LOG` (default `info`).
pub fn setup_logging() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

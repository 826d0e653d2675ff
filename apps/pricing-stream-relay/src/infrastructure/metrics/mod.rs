//! Prometheus Metrics Module
//!
//! Exposes relay metrics via Prometheus format for monitoring.
//!
//! # Metrics Categories
//!
//! - **Quotes**: count of quote items relayed downstream, per transport
//! - **Streams**: active and total subscription streams, per transport
//! - **Terminations**: how streams ended, per transport and reason
//! - **Latency**: downstream push durations
//!
//! # Integration
//!
//! Metrics are exposed at `/metrics` on the health server port.

use std::sync::OnceLock;
use std::time::Duration;

use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

use crate::domain::relay::TerminationReason;

// =============================================================================
// Global Metrics Handle
// =============================================================================

static PROMETHEUS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Initialize the Prometheus metrics recorder.
///
/// # Panics
///
/// Panics if the recorder cannot be installed.
#[allow(clippy::expect_used)]
pub fn init_metrics() -> PrometheusHandle {
    PROMETHEUS_HANDLE
        .get_or_init(|| {
            let builder = PrometheusBuilder::new();
            let handle = builder
                .install_recorder()
                .expect("failed to install Prometheus recorder");

            register_metrics();
            handle
        })
        .clone()
}

/// Get the Prometheus handle for rendering metrics.
///
/// Returns `None` if metrics have not been initialized.
#[must_use]
pub fn get_metrics_handle() -> Option<PrometheusHandle> {
    PROMETHEUS_HANDLE.get().cloned()
}

// =============================================================================
// Metric Registration
// =============================================================================

fn register_metrics() {
    describe_counter!(
        "pricing_relay_quotes_relayed_total",
        "Total quote items relayed to downstream consumers"
    );
    describe_counter!(
        "pricing_relay_terminations_total",
        "Total relay terminations by transport and reason"
    );
    describe_gauge!(
        "pricing_relay_active_streams",
        "Number of currently active subscription streams"
    );
    describe_histogram!(
        "pricing_relay_push_duration_seconds",
        "Time to push one item into the downstream transport"
    );
}

// =============================================================================
// Labels
// =============================================================================

/// Metric label for the downstream transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transport {
    /// gRPC server-streaming subscribers.
    Grpc,
    /// WebSocket push hub subscribers.
    Hub,
}

impl Transport {
    /// Stable lowercase label value.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Grpc => "grpc",
            Self::Hub => "hub",
        }
    }
}

// =============================================================================
// Metric Recording Functions
// =============================================================================

/// Record one quote item delivered downstream.
pub fn record_quote_relayed(transport: Transport) {
    counter!(
        "pricing_relay_quotes_relayed_total",
        "transport" => transport.as_str()
    )
    .increment(1);
}

/// Record how a relay run ended.
pub fn record_termination(transport: Transport, reason: &TerminationReason) {
    counter!(
        "pricing_relay_terminations_total",
        "transport" => transport.as_str(),
        "reason" => reason.label()
    )
    .increment(1);
}

/// Update the active stream count for a transport.
pub fn set_active_streams(transport: Transport, count: f64) {
    gauge!(
        "pricing_relay_active_streams",
        "transport" => transport.as_str()
    )
    .set(count);
}

/// Record the duration of one downstream push.
pub fn record_push_duration(transport: Transport, duration: Duration) {
    histogram!(
        "pricing_relay_push_duration_seconds",
        "transport" => transport.as_str()
    )
    .record(duration.as_secs_f64());
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transport_as_str() {
        assert_eq!(Transport::Grpc.as_str(), "grpc");
        assert_eq!(Transport::Hub.as_str(), "hub");
    }

    #[test]
    fn recording_without_recorder_is_a_no_op() {
        // No recorder installed in unit tests; these must not panic.
        record_quote_relayed(Transport::Grpc);
        record_termination(Transport::Hub, &TerminationReason::Completed);
        set_active_streams(Transport::Hub, 2.0);
        record_push_duration(Transport::Grpc, Duration::from_millis(3));
    }
}

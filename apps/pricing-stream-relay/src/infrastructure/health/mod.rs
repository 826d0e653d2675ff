//! Health Check and Metrics Endpoint
//!
//! HTTP endpoint for health checks, relay statistics, and Prometheus
//! metrics. Used by container orchestrators, load balancers, and
//! monitoring systems.
//!
//! Also home of [`RelayStats`], the process-wide stream counters the
//! transport adapters update and this endpoint reports.
//!
//! # Endpoints
//!
//! - `GET /health` - Returns JSON relay status
//! - `GET /healthz` - Kubernetes liveness probe (simple OK)
//! - `GET /readyz` - Kubernetes readiness probe
//! - `GET /metrics` - Prometheus metrics in text format

use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};
use std::time::Instant;

use axum::{Json, Router, extract::State, http::StatusCode, response::IntoResponse, routing::get};
use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

use crate::domain::relay::TerminationReason;
use crate::infrastructure::metrics::{self, Transport, get_metrics_handle};

// =============================================================================
// Relay Statistics
// =============================================================================

#[derive(Debug, Default)]
struct TransportCounters {
    active: AtomicI64,
    opened: AtomicU64,
}

/// Process-wide stream counters, updated by the transport adapters.
///
/// Also the single call site for the stream-lifecycle Prometheus metrics,
/// so the gauge and the JSON report can never disagree.
#[derive(Debug, Default)]
pub struct RelayStats {
    grpc: TransportCounters,
    hub: TransportCounters,
    completed: AtomicU64,
    cancelled: AtomicU64,
    upstream_failed: AtomicU64,
    downstream_failed: AtomicU64,
    last_failure: parking_lot::RwLock<Option<String>>,
}

impl RelayStats {
    /// Create zeroed statistics.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    const fn counters(&self, transport: Transport) -> &TransportCounters {
        match transport {
            Transport::Grpc => &self.grpc,
            Transport::Hub => &self.hub,
        }
    }

    /// Record one stream opened on `transport`.
    pub fn stream_opened(&self, transport: Transport) {
        let counters = self.counters(transport);
        let active = counters.active.fetch_add(1, Ordering::Relaxed) + 1;
        counters.opened.fetch_add(1, Ordering::Relaxed);
        #[allow(clippy::cast_precision_loss)]
        metrics::set_active_streams(transport, active as f64);
    }

    /// Record one stream closed on `transport` with its terminal reason.
    ///
    /// Termination counters are updated before the active gauge drops, so
    /// an observer never sees a drained gauge with a missing termination.
    pub fn stream_closed(&self, transport: Transport, reason: &TerminationReason) {
        match reason {
            TerminationReason::Completed => self.completed.fetch_add(1, Ordering::Relaxed),
            TerminationReason::Cancelled => self.cancelled.fetch_add(1, Ordering::Relaxed),
            TerminationReason::UpstreamFailed(_) => {
                self.upstream_failed.fetch_add(1, Ordering::Relaxed)
            }
            TerminationReason::DownstreamFailed(_) => {
                self.downstream_failed.fetch_add(1, Ordering::Relaxed)
            }
        };
        if let Some(detail) = reason.detail() {
            *self.last_failure.write() = Some(detail.to_string());
        }
        metrics::record_termination(transport, reason);

        let counters = self.counters(transport);
        let active = counters.active.fetch_sub(1, Ordering::Relaxed) - 1;
        #[allow(clippy::cast_precision_loss)]
        metrics::set_active_streams(transport, active as f64);
    }

    /// Current active stream count for `transport`.
    #[must_use]
    pub fn active(&self, transport: Transport) -> i64 {
        self.counters(transport).active.load(Ordering::Relaxed)
    }

    /// Total streams ever opened on `transport`.
    #[must_use]
    pub fn opened_total(&self, transport: Transport) -> u64 {
        self.counters(transport).opened.load(Ordering::Relaxed)
    }

    /// Snapshot of the termination counters.
    #[must_use]
    pub fn termination_counts(&self) -> TerminationCounts {
        TerminationCounts {
            completed: self.completed.load(Ordering::Relaxed),
            cancelled: self.cancelled.load(Ordering::Relaxed),
            upstream_failed: self.upstream_failed.load(Ordering::Relaxed),
            downstream_failed: self.downstream_failed.load(Ordering::Relaxed),
            last_failure: self.last_failure.read().clone(),
        }
    }
}

// =============================================================================
// Health Response Types
// =============================================================================

/// Health check response.
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    /// Always `"ok"` while the process serves traffic.
    pub status: &'static str,
    /// Relay version.
    pub version: String,
    /// Server uptime in seconds.
    pub uptime_secs: u64,
    /// Current time.
    pub current_time: DateTime<Utc>,
    /// Per-transport stream counts.
    pub streams: StreamsStatus,
    /// How streams have terminated since start.
    pub terminations: TerminationCounts,
}

/// Per-transport stream counts.
#[derive(Debug, Clone, Serialize)]
pub struct StreamsStatus {
    /// gRPC server-streaming subscribers.
    pub grpc: TransportStreams,
    /// WebSocket hub subscribers.
    pub hub: TransportStreams,
}

/// Stream counts for one transport.
#[derive(Debug, Clone, Serialize)]
pub struct TransportStreams {
    /// Currently active streams.
    pub active: i64,
    /// Streams ever opened.
    pub opened_total: u64,
}

/// Termination counters since process start.
#[derive(Debug, Clone, Serialize)]
pub struct TerminationCounts {
    /// Streams that ended because the upstream finished.
    pub completed: u64,
    /// Streams cancelled by either side.
    pub cancelled: u64,
    /// Streams ended by an upstream fault.
    pub upstream_failed: u64,
    /// Streams ended by a downstream fault or push timeout.
    pub downstream_failed: u64,
    /// Detail of the most recent failure, if any.
    pub last_failure: Option<String>,
}

// =============================================================================
// Health Server State
// =============================================================================

/// Shared state for the health server.
pub struct HealthServerState {
    version: String,
    started_at: Instant,
    stats: Arc<RelayStats>,
}

impl HealthServerState {
    /// Create new health server state.
    #[must_use]
    pub fn new(version: String, stats: Arc<RelayStats>) -> Self {
        Self {
            version,
            started_at: Instant::now(),
            stats,
        }
    }
}

// =============================================================================
// Health Server
// =============================================================================

/// Health check HTTP server.
pub struct HealthServer {
    port: u16,
    state: Arc<HealthServerState>,
    cancel: CancellationToken,
}

impl HealthServer {
    /// Create a new health server.
    #[must_use]
    pub const fn new(port: u16, state: Arc<HealthServerState>, cancel: CancellationToken) -> Self {
        Self {
            port,
            state,
            cancel,
        }
    }

    /// Run the health server until cancelled.
    ///
    /// # Errors
    ///
    /// Returns `HealthServerError` if binding fails or the HTTP server
    /// encounters a fatal error while running.
    pub async fn run(self) -> Result<(), HealthServerError> {
        let app = Router::new()
            .route("/health", get(health_handler))
            .route("/healthz", get(liveness_handler))
            .route("/readyz", get(readiness_handler))
            .route("/metrics", get(metrics_handler))
            .with_state(self.state);

        let addr = SocketAddr::from(([0, 0, 0, 0], self.port));
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| HealthServerError::BindFailed(self.port, e.to_string()))?;

        tracing::info!(port = self.port, "health server listening");

        axum::serve(listener, app)
            .with_graceful_shutdown(self.cancel.cancelled_owned())
            .await
            .map_err(|e| HealthServerError::ServerFailed(e.to_string()))?;

        tracing::info!("health server stopped");
        Ok(())
    }
}

// =============================================================================
// HTTP Handlers
// =============================================================================

async fn health_handler(State(state): State<Arc<HealthServerState>>) -> impl IntoResponse {
    let stats = &state.stats;
    let response = HealthResponse {
        status: "ok",
        version: state.version.clone(),
        uptime_secs: state.started_at.elapsed().as_secs(),
        current_time: Utc::now(),
        streams: StreamsStatus {
            grpc: TransportStreams {
                active: stats.active(Transport::Grpc),
                opened_total: stats.opened_total(Transport::Grpc),
            },
            hub: TransportStreams {
                active: stats.active(Transport::Hub),
                opened_total: stats.opened_total(Transport::Hub),
            },
        },
        terminations: stats.termination_counts(),
    };
    (StatusCode::OK, Json(response))
}

async fn liveness_handler() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}

async fn readiness_handler() -> impl IntoResponse {
    // The relay holds no standing upstream connection; once the listeners
    // are up it is ready to accept subscriptions.
    (StatusCode::OK, "READY")
}

async fn metrics_handler() -> impl IntoResponse {
    get_metrics_handle().map_or_else(
        || {
            (
                StatusCode::SERVICE_UNAVAILABLE,
                [("content-type", "text/plain")],
                "Metrics not initialized".to_string(),
            )
        },
        |handle| {
            let body = handle.render();
            (
                StatusCode::OK,
                [("content-type", "text/plain; version=0.0.4; charset=utf-8")],
                body,
            )
        },
    )
}

// =============================================================================
// Errors
// =============================================================================

/// Health server errors.
#[derive(Debug, thiserror::Error)]
pub enum HealthServerError {
    /// Failed to bind to port.
    #[error("failed to bind to port {0}: {1}")]
    BindFailed(u16, String),

    /// Server error.
    #[error("server error: {0}")]
    ServerFailed(String),
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stream_lifecycle_counters() {
        let stats = RelayStats::new();

        stats.stream_opened(Transport::Grpc);
        stats.stream_opened(Transport::Grpc);
        stats.stream_opened(Transport::Hub);
        assert_eq!(stats.active(Transport::Grpc), 2);
        assert_eq!(stats.active(Transport::Hub), 1);
        assert_eq!(stats.opened_total(Transport::Grpc), 2);

        stats.stream_closed(Transport::Grpc, &TerminationReason::Completed);
        stats.stream_closed(Transport::Hub, &TerminationReason::Cancelled);
        assert_eq!(stats.active(Transport::Grpc), 1);
        assert_eq!(stats.active(Transport::Hub), 0);

        let counts = stats.termination_counts();
        assert_eq!(counts.completed, 1);
        assert_eq!(counts.cancelled, 1);
        assert_eq!(counts.upstream_failed, 0);
        assert_eq!(counts.last_failure, None);
    }

    #[test]
    fn failures_record_last_detail() {
        let stats = RelayStats::new();
        stats.stream_opened(Transport::Hub);
        stats.stream_closed(
            Transport::Hub,
            &TerminationReason::UpstreamFailed("upstream fault: feed dropped".to_string()),
        );

        let counts = stats.termination_counts();
        assert_eq!(counts.upstream_failed, 1);
        assert_eq!(
            counts.last_failure.as_deref(),
            Some("upstream fault: feed dropped")
        );
    }

    #[test]
    fn health_response_serializes() {
        let response = HealthResponse {
            status: "ok",
            version: "0.1.0".to_string(),
            uptime_secs: 12,
            current_time: Utc::now(),
            streams: StreamsStatus {
                grpc: TransportStreams {
                    active: 1,
                    opened_total: 3,
                },
                hub: TransportStreams {
                    active: 0,
                    opened_total: 2,
                },
            },
            terminations: TerminationCounts {
                completed: 2,
                cancelled: 2,
                upstream_failed: 1,
                downstream_failed: 0,
                last_failure: Some("upstream fault: feed dropped".to_string()),
            },
        };

        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["status"], "ok");
        assert_eq!(json["streams"]["grpc"]["active"], 1);
        assert_eq!(json["terminations"]["completed"], 2);
    }
}

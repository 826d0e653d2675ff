//! WebSocket Push Hub
//!
//! Push-stream transport for browser-style consumers. A client upgrades to
//! a WebSocket at `/hub/pricing`, sends one JSON invocation naming the
//! subscription, and receives `Info:` / `Data:` text frames until the
//! stream ends or either side cancels.
//!
//! The hub's upstream is the pricing gRPC service at the configured
//! endpoint: each hub subscription dials one `Subscribe` stream and relays
//! it through the same pump the gRPC server uses. The caller-side
//! cancellation (close frame, connection drop, read error) is mapped onto
//! the relay's cancellation token by a dedicated reader task.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use axum::extract::State;
use axum::extract::ws::{CloseFrame, Message, WebSocket, WebSocketUpgrade, close_code};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::Router;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

use crate::application::ports::{DownstreamSink, QuoteStream};
use crate::application::relay::{RelayPump, RelayPumpConfig};
use crate::domain::quote::{RelayMessage, SubscriptionRequest};
use crate::domain::relay::{RelayError, TerminationReason};
use crate::infrastructure::grpc::upstream::GrpcUpstream;
use crate::infrastructure::health::RelayStats;
use crate::infrastructure::metrics::{self, Transport};

/// How long the hub waits for the client's subscribe invocation.
const INVOCATION_TIMEOUT: Duration = Duration::from_secs(10);

// =============================================================================
// Configuration
// =============================================================================

/// Configuration for the push hub server.
#[derive(Debug, Clone)]
pub struct HubServerConfig {
    /// HTTP port the hub listens on.
    pub port: u16,
    /// Address of the upstream pricing gRPC service, read once at
    /// construction.
    pub upstream_endpoint: String,
    /// Upper bound on one WebSocket push.
    pub push_timeout: Duration,
}

// =============================================================================
// Server
// =============================================================================

/// WebSocket push hub server.
pub struct HubServer {
    config: HubServerConfig,
    stats: Arc<RelayStats>,
    cancel: CancellationToken,
}

struct HubState {
    endpoint: String,
    push_timeout: Duration,
    stats: Arc<RelayStats>,
    shutdown: CancellationToken,
}

impl HubServer {
    /// Create a new hub server.
    #[must_use]
    pub const fn new(
        config: HubServerConfig,
        stats: Arc<RelayStats>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            config,
            stats,
            cancel,
        }
    }

    /// Run the hub server until cancelled.
    ///
    /// # Errors
    ///
    /// Returns `HubServerError` if binding fails or the HTTP server
    /// encounters a fatal error while running.
    pub async fn run(self) -> Result<(), HubServerError> {
        let addr = SocketAddr::from(([0, 0, 0, 0], self.config.port));
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| HubServerError::BindFailed(self.config.port, e.to_string()))?;

        tracing::info!(port = self.config.port, "hub server listening");
        self.serve(listener).await
    }

    /// Serve on an already-bound listener (also used by integration tests).
    ///
    /// # Errors
    ///
    /// Returns `HubServerError` if the HTTP server encounters a fatal error
    /// while running.
    pub async fn serve(self, listener: TcpListener) -> Result<(), HubServerError> {
        let state = Arc::new(HubState {
            endpoint: self.config.upstream_endpoint,
            push_timeout: self.config.push_timeout,
            stats: self.stats,
            shutdown: self.cancel.clone(),
        });

        let app = Router::new()
            .route("/hub/pricing", get(ws_handler))
            .with_state(state);

        axum::serve(listener, app)
            .with_graceful_shutdown(self.cancel.cancelled_owned())
            .await
            .map_err(|e| HubServerError::ServerFailed(e.to_string()))?;

        tracing::info!("hub server stopped");
        Ok(())
    }
}

// =============================================================================
// WebSocket Handling
// =============================================================================

async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<HubState>>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| serve_subscription(socket, state))
}

/// One hub subscription: invocation, relay, terminal close.
async fn serve_subscription(socket: WebSocket, state: Arc<HubState>) {
    let stream_id = uuid::Uuid::new_v4();
    let (mut ws_tx, mut ws_rx) = socket.split();

    let subscription = match read_invocation(&mut ws_rx).await {
        Ok(Some(subscription)) => subscription,
        Ok(None) => return, // client left before invoking
        Err(detail) => {
            tracing::debug!(%stream_id, detail, "rejecting hub invocation");
            let _ = ws_tx
                .send(Message::Text(format!("Error: {detail}").into()))
                .await;
            let _ = ws_tx
                .send(Message::Close(Some(CloseFrame {
                    code: close_code::POLICY,
                    reason: "invalid invocation".into(),
                })))
                .await;
            return;
        }
    };
    tracing::info!(%stream_id, subscription = %subscription, "hub subscription opened");

    // Native cancellation: close frame, connection drop, or read error.
    // The reader also keeps servicing ping/pong while the relay runs.
    let cancel = state.shutdown.child_token();
    let reader_cancel = cancel.clone();
    let reader = tokio::spawn(async move {
        while let Some(frame) = ws_rx.next().await {
            match frame {
                Ok(Message::Close(_)) | Err(_) => break,
                Ok(_) => {}
            }
        }
        reader_cancel.cancel();
    });

    state.stats.stream_opened(Transport::Hub);
    let reason = relay_subscription(&mut ws_tx, &subscription, &state, cancel).await;
    state.stats.stream_closed(Transport::Hub, &reason);

    finish(&mut ws_tx, &reason).await;
    reader.abort();

    match &reason {
        TerminationReason::Completed | TerminationReason::Cancelled => {
            tracing::info!(%stream_id, reason = reason.label(), "hub subscription ended");
        }
        TerminationReason::UpstreamFailed(detail) | TerminationReason::DownstreamFailed(detail) => {
            tracing::warn!(%stream_id, reason = reason.label(), detail, "hub subscription failed");
        }
    }
}

/// Dial the upstream service and pump its stream into the socket.
async fn relay_subscription(
    ws_tx: &mut SplitSink<WebSocket, Message>,
    subscription: &SubscriptionRequest,
    state: &HubState,
    cancel: CancellationToken,
) -> TerminationReason {
    let mut upstream = match GrpcUpstream::connect(&state.endpoint, subscription).await {
        Ok(upstream) => upstream,
        Err(err) => return err.into(),
    };

    let mut sink = HubSink { writer: ws_tx };
    if let Err(err) = sink
        .push(RelayMessage::info(format!(
            "Opened channel to: {}",
            state.endpoint
        )))
        .await
    {
        upstream.close().await;
        return err.into();
    }

    let pump = RelayPump::new(RelayPumpConfig {
        push_timeout: state.push_timeout,
        announcement: Some("Invoking stream..".to_string()),
    });
    pump.run(&mut upstream, &mut sink, cancel).await
}

/// Close the socket with the status matching the termination reason.
async fn finish(ws_tx: &mut SplitSink<WebSocket, Message>, reason: &TerminationReason) {
    match reason {
        TerminationReason::Completed | TerminationReason::Cancelled => {
            let _ = ws_tx
                .send(Message::Close(Some(CloseFrame {
                    code: close_code::NORMAL,
                    reason: "stream ended".into(),
                })))
                .await;
        }
        TerminationReason::UpstreamFailed(detail) => {
            // One terminal line, distinguishable from data frames.
            let _ = ws_tx
                .send(Message::Text(format!("Error: {detail}").into()))
                .await;
            let _ = ws_tx
                .send(Message::Close(Some(CloseFrame {
                    code: close_code::ERROR,
                    reason: "upstream failure".into(),
                })))
                .await;
        }
        TerminationReason::DownstreamFailed(detail) => {
            // The socket itself is the failed downstream; nothing to send.
            tracing::debug!(detail, "hub downstream failed; skipping close frame");
        }
    }
}

// =============================================================================
// Invocation
// =============================================================================

/// The client's subscribe invocation, camelCase on the wire.
#[derive(Debug, Deserialize)]
struct SubscribeCommand {
    uic: String,
    #[serde(rename = "assetType")]
    asset_type: String,
}

/// Wait for the first text frame and parse it as a subscribe invocation.
///
/// `Ok(None)` means the client went away before invoking; `Err` carries a
/// detail line for the rejection frame.
async fn read_invocation(
    ws_rx: &mut SplitStream<WebSocket>,
) -> Result<Option<SubscriptionRequest>, String> {
    let first_text = tokio::time::timeout(INVOCATION_TIMEOUT, async {
        while let Some(frame) = ws_rx.next().await {
            match frame {
                Ok(Message::Text(text)) => return Some(text.to_string()),
                Ok(Message::Close(_)) | Err(_) => return None,
                Ok(_) => {}
            }
        }
        None
    })
    .await;

    match first_text {
        Ok(Some(text)) => {
            let command: SubscribeCommand = serde_json::from_str(&text)
                .map_err(|err| format!("invalid subscribe invocation: {err}"))?;
            if command.uic.is_empty() || command.asset_type.is_empty() {
                return Err("uic and assetType must not be empty".to_string());
            }
            Ok(Some(SubscriptionRequest::new(
                command.uic,
                command.asset_type,
            )))
        }
        Ok(None) => Ok(None),
        Err(_) => Err("timed out waiting for subscribe invocation".to_string()),
    }
}

// =============================================================================
// Downstream Sink
// =============================================================================

/// Sink that frames relay messages as hub text frames.
struct HubSink<'a> {
    writer: &'a mut SplitSink<WebSocket, Message>,
}

#[async_trait]
impl DownstreamSink for HubSink<'_> {
    async fn push(&mut self, message: RelayMessage) -> Result<(), RelayError> {
        let started = Instant::now();
        let (frame, is_quote) = match message {
            RelayMessage::Info(text) => (format!("Info: {text}"), false),
            RelayMessage::Quote(quote) => (format!("Data: {}", quote.text), true),
        };

        self.writer
            .send(Message::Text(frame.into()))
            .await
            .map_err(|err| RelayError::DownstreamFault(format!("websocket send failed: {err}")))?;

        if is_quote {
            metrics::record_quote_relayed(Transport::Hub);
        }
        metrics::record_push_duration(Transport::Hub, started.elapsed());
        Ok(())
    }
}

// =============================================================================
// Errors
// =============================================================================

/// Hub server errors.
#[derive(Debug, thiserror::Error)]
pub enum HubServerError {
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
    fn invocation_parses_camel_case_fields() {
        let command: SubscribeCommand =
            serde_json::from_str(r#"{"uic":"211","assetType":"Stock"}"#).unwrap();
        assert_eq!(command.uic, "211");
        assert_eq!(command.asset_type, "Stock");
    }

    #[test]
    fn invocation_rejects_missing_fields() {
        assert!(serde_json::from_str::<SubscribeCommand>(r#"{"uic":"211"}"#).is_err());
    }
}

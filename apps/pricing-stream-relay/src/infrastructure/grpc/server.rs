//! gRPC Streaming Server Implementation
//!
//! Implements the `Pricing` gRPC service. One `Subscribe` call owns one
//! upstream producer stream, one relay pump task, and one capacity-1
//! response channel - the whole pipeline carries a single item in flight.

use std::pin::Pin;
use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio_stream::Stream;
use tokio_stream::wrappers::ReceiverStream;
use tokio_util::sync::CancellationToken;
use tonic::{Request, Response, Status};

use super::proto::pricing::v1::{PriceRequest, PriceResponse, pricing_server::Pricing};
use crate::application::ports::DownstreamSink;
use crate::application::relay::{RelayPump, RelayPumpConfig};
use crate::domain::quote::{RelayMessage, SubscriptionRequest};
use crate::domain::relay::{RelayError, TerminationReason};
use crate::infrastructure::health::RelayStats;
use crate::infrastructure::metrics::{self, Transport};
use crate::infrastructure::producer::UpstreamProducer;

// =============================================================================
// Type Aliases
// =============================================================================

type StreamResult<T> = Result<Response<T>, Status>;
type BoxedStream<T> = Pin<Box<dyn Stream<Item = Result<T, Status>> + Send>>;

// =============================================================================
// Server Configuration
// =============================================================================

/// Configuration for the gRPC streaming server.
#[derive(Debug, Clone, Default)]
pub struct PricingServiceConfig {
    /// Pump settings applied to every subscription stream.
    pub pump: RelayPumpConfig,
}

// =============================================================================
// Downstream Sink
// =============================================================================

/// Sink that frames relay messages as `PriceResponse` items and hands them
/// to the response channel. A vanished receiver means the client is gone,
/// so a failed send also raises the relay's cancellation token.
struct GrpcSink {
    tx: mpsc::Sender<Result<PriceResponse, Status>>,
    disconnect: CancellationToken,
}

#[async_trait]
impl DownstreamSink for GrpcSink {
    async fn push(&mut self, message: RelayMessage) -> Result<(), RelayError> {
        let started = Instant::now();
        let (line, is_quote) = match message {
            RelayMessage::Info(text) => (format!("Info: {text}"), false),
            RelayMessage::Quote(quote) => (quote.text, true),
        };

        self.tx
            .send(Ok(PriceResponse { quote: line }))
            .await
            .map_err(|_| {
                self.disconnect.cancel();
                RelayError::DownstreamFault("subscriber response channel closed".to_string())
            })?;

        if is_quote {
            metrics::record_quote_relayed(Transport::Grpc);
        }
        metrics::record_push_duration(Transport::Grpc, started.elapsed());
        Ok(())
    }
}

// =============================================================================
// Server Implementation
// =============================================================================

/// gRPC streaming service for quote subscriptions.
pub struct PricingService {
    config: PricingServiceConfig,
    producer: UpstreamProducer,
    stats: Arc<RelayStats>,
    shutdown: CancellationToken,
}

impl PricingService {
    /// Create a new gRPC streaming server.
    #[must_use]
    pub const fn new(
        config: PricingServiceConfig,
        producer: UpstreamProducer,
        stats: Arc<RelayStats>,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            config,
            producer,
            stats,
            shutdown,
        }
    }
}

#[tonic::async_trait]
impl Pricing for PricingService {
    type SubscribeStream = BoxedStream<PriceResponse>;

    async fn subscribe(
        &self,
        request: Request<PriceRequest>,
    ) -> StreamResult<Self::SubscribeStream> {
        let req = request.into_inner();
        if req.uic.is_empty() {
            return Err(Status::invalid_argument("uic must not be empty"));
        }
        if req.asset_type.is_empty() {
            return Err(Status::invalid_argument("asset_type must not be empty"));
        }

        let subscription = SubscriptionRequest::new(req.uic, req.asset_type);
        let stream_id = uuid::Uuid::new_v4();
        tracing::info!(%stream_id, subscription = %subscription, "price subscription opened");

        let mut handle = self.producer.open(subscription);

        // Capacity 1: together with the pump's single-item-in-flight loop,
        // a slow client backpressures straight into the upstream tick.
        let (tx, rx) = mpsc::channel::<Result<PriceResponse, Status>>(1);

        // Map the transport's native "client disconnected" (the response
        // receiver vanishing) onto the relay's cancellation token. Process
        // shutdown cancels through the parent token. The watcher holds a
        // sender clone, so it must be released once the relay ends or the
        // channel would never close for completed streams.
        let cancel = self.shutdown.child_token();
        let relay_done = CancellationToken::new();
        let disconnect = cancel.clone();
        let watcher_done = relay_done.clone();
        let watched = tx.clone();
        tokio::spawn(async move {
            tokio::select! {
                () = watched.closed() => disconnect.cancel(),
                () = watcher_done.cancelled() => {}
            }
        });

        let pump = RelayPump::new(self.config.pump.clone());
        let stats = Arc::clone(&self.stats);
        let error_tx = tx.clone();
        tokio::spawn(async move {
            stats.stream_opened(Transport::Grpc);
            let mut sink = GrpcSink {
                tx,
                disconnect: cancel.clone(),
            };
            let reason = pump.run(&mut handle, &mut sink, cancel).await;

            if let TerminationReason::UpstreamFailed(detail) = &reason {
                // One terminal status item, distinguishable from data.
                let _ = error_tx.send(Err(Status::internal(detail.clone()))).await;
            }

            relay_done.cancel();
            stats.stream_closed(Transport::Grpc, &reason);
            match &reason {
                TerminationReason::Completed | TerminationReason::Cancelled => {
                    tracing::info!(%stream_id, reason = reason.label(), "price subscription ended");
                }
                TerminationReason::UpstreamFailed(detail)
                | TerminationReason::DownstreamFailed(detail) => {
                    tracing::warn!(%stream_id, reason = reason.label(), detail, "price subscription failed");
                }
            }
        });

        Ok(Response::new(Box::pin(ReceiverStream::new(rx)) as Self::SubscribeStream))
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn sink_frames_quotes_verbatim_and_prefixes_info() {
        let (tx, mut rx) = mpsc::channel(4);
        let mut sink = GrpcSink {
            tx,
            disconnect: CancellationToken::new(),
        };

        sink.push(RelayMessage::info("Invoking stream..")).await.unwrap();
        sink.push(RelayMessage::Quote(crate::domain::quote::Quote {
            sequence: 1,
            text: "Quote#1 for 211-Stock".to_string(),
        }))
        .await
        .unwrap();

        let info = rx.recv().await.unwrap().unwrap();
        assert_eq!(info.quote, "Info: Invoking stream..");
        let data = rx.recv().await.unwrap().unwrap();
        assert_eq!(data.quote, "Quote#1 for 211-Stock");
    }

    #[tokio::test]
    async fn sink_raises_cancellation_when_receiver_is_gone() {
        let (tx, rx) = mpsc::channel(1);
        drop(rx);
        let disconnect = CancellationToken::new();
        let mut sink = GrpcSink {
            tx,
            disconnect: disconnect.clone(),
        };

        let err = sink
            .push(RelayMessage::info("never delivered"))
            .await
            .unwrap_err();
        assert!(matches!(err, RelayError::DownstreamFault(_)));
        assert!(disconnect.is_cancelled());
    }
}

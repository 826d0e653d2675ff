//! gRPC-Client-Backed Upstream
//!
//! Wraps a `Pricing.Subscribe` server-streaming call as a [`QuoteStream`],
//! so the push hub relays a remote pricing service through the same pump
//! the gRPC server uses for the local producer. Sequence numbers are the
//! local arrival count; the remote stream already guarantees order.

use async_trait::async_trait;
use tonic::Streaming;

use super::proto::pricing::v1::{PriceRequest, PriceResponse, pricing_client::PricingClient};
use crate::application::ports::QuoteStream;
use crate::domain::quote::{Quote, SubscriptionRequest};
use crate::domain::relay::RelayError;

/// One open upstream gRPC quote stream.
pub struct GrpcUpstream {
    stream: Streaming<PriceResponse>,
    sequence: u64,
    done: bool,
}

impl GrpcUpstream {
    /// Dial `endpoint` and open a `Subscribe` stream for `request`.
    ///
    /// # Errors
    ///
    /// Returns `UpstreamUnavailable` when the endpoint cannot be dialed or
    /// rejects the subscription outright.
    pub async fn connect(
        endpoint: &str,
        request: &SubscriptionRequest,
    ) -> Result<Self, RelayError> {
        let mut client = PricingClient::connect(endpoint.to_string())
            .await
            .map_err(|err| {
                RelayError::UpstreamUnavailable(format!("failed to dial {endpoint}: {err}"))
            })?;

        let response = client
            .subscribe(PriceRequest {
                uic: request.uic.clone(),
                asset_type: request.asset_type.clone(),
            })
            .await
            .map_err(|status| {
                RelayError::UpstreamUnavailable(format!(
                    "subscribe rejected by {endpoint}: {status}"
                ))
            })?;

        tracing::debug!(endpoint, subscription = %request, "upstream gRPC stream opened");
        Ok(Self {
            stream: response.into_inner(),
            sequence: 0,
            done: false,
        })
    }
}

#[async_trait]
impl QuoteStream for GrpcUpstream {
    async fn next(&mut self) -> Result<Option<Quote>, RelayError> {
        if self.done {
            return Ok(None);
        }

        match self.stream.message().await {
            Ok(Some(response)) => {
                let Some(sequence) = self.sequence.checked_add(1) else {
                    self.done = true;
                    return Err(RelayError::UpstreamFault(
                        "arrival counter overflow".to_string(),
                    ));
                };
                self.sequence = sequence;
                Ok(Some(Quote {
                    sequence,
                    text: response.quote,
                }))
            }
            Ok(None) => {
                self.done = true;
                Ok(None)
            }
            Err(status) => {
                self.done = true;
                Err(RelayError::UpstreamFault(format!(
                    "upstream stream failed: {status}"
                )))
            }
        }
    }

    async fn close(&mut self) {
        // Marking the stream done makes further `next` calls end-of-stream;
        // the underlying RPC is cancelled when the `Streaming` drops.
        self.done = true;
    }
}

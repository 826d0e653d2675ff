//! Relay Pump
//!
//! Bridges one upstream quote stream to one downstream sink, translating
//! cancellation and errors across the two independent asynchronous domains.
//! One pump instance serves exactly one subscription and owns its whole
//! lifecycle; nothing here is shared between subscriptions.
//!
//! # Protocol
//!
//! ```text
//! Opening ──► Streaming ──► Completed
//!                 │   │
//!                 │   └────► Failed      (upstream fault, push failure/timeout)
//!                 └────────► Cancelling ──► Completed
//! ```
//!
//! The pump is a strictly single-item-in-flight pipeline: it never calls
//! `next` again until the previous `push` resolved, so ordering and
//! exactly-once delivery fall out of the structure rather than a queue.
//! Cancellation is cooperative and checked at least once per iteration,
//! including while a push or an upstream tick is pending.

use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::application::ports::{DownstreamSink, QuoteStream};
use crate::domain::quote::RelayMessage;
use crate::domain::relay::{RelayError, TerminationReason};

// =============================================================================
// State
// =============================================================================

/// Lifecycle of one relay run.
///
/// Exclusively owned by the pump for the duration of one subscription;
/// surfaces only in trace logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelayState {
    /// The run has started but nothing has been pushed yet.
    Opening,
    /// Items are being pumped from upstream to downstream.
    Streaming,
    /// A cancellation was observed; no further pushes happen.
    Cancelling,
    /// Terminal: the stream ended cleanly (including after cancellation).
    Completed,
    /// Terminal: the stream ended with a fault on either side.
    Failed,
}

// =============================================================================
// Configuration
// =============================================================================

/// Configuration for one relay pump.
#[derive(Debug, Clone)]
pub struct RelayPumpConfig {
    /// Upper bound on a single `push` into the sink. A wedged downstream
    /// transport must not block the upstream indefinitely; exceeding this
    /// is a downstream fault.
    pub push_timeout: Duration,
    /// Optional informational line pushed before the first quote,
    /// announcing that the stream is live.
    pub announcement: Option<String>,
}

impl Default for RelayPumpConfig {
    fn default() -> Self {
        Self {
            push_timeout: Duration::from_secs(5),
            announcement: None,
        }
    }
}

// =============================================================================
// Pump
// =============================================================================

/// The subscription relay pump.
#[derive(Debug, Clone, Default)]
pub struct RelayPump {
    config: RelayPumpConfig,
}

/// Outcome of one bounded push attempt.
enum PushOutcome {
    Delivered,
    Cancelled,
    Failed(RelayError),
}

impl RelayPump {
    /// Create a pump with the given configuration.
    #[must_use]
    pub const fn new(config: RelayPumpConfig) -> Self {
        Self { config }
    }

    /// Run the relay until a terminal state is reached.
    ///
    /// Consumes items from `upstream` and republishes each to `sink`,
    /// honoring `cancel` with at most one in-flight item of latency.
    /// The upstream handle is closed on every exit path, exactly once.
    pub async fn run<U, S>(
        &self,
        upstream: &mut U,
        sink: &mut S,
        cancel: CancellationToken,
    ) -> TerminationReason
    where
        U: QuoteStream,
        S: DownstreamSink,
    {
        let reason = self.drive(upstream, sink, &cancel).await;

        // Terminal: release the upstream on every path, including faults.
        upstream.close().await;

        let state = if reason.is_failure() {
            RelayState::Failed
        } else {
            RelayState::Completed
        };
        tracing::debug!(?state, reason = reason.label(), "relay terminated");
        reason
    }

    async fn drive<U, S>(
        &self,
        upstream: &mut U,
        sink: &mut S,
        cancel: &CancellationToken,
    ) -> TerminationReason
    where
        U: QuoteStream,
        S: DownstreamSink,
    {
        tracing::trace!(state = ?RelayState::Opening, "relay run starting");

        if let Some(text) = &self.config.announcement {
            match self.push_bounded(sink, RelayMessage::info(text.clone()), cancel).await {
                PushOutcome::Delivered => {}
                PushOutcome::Cancelled => return TerminationReason::Cancelled,
                PushOutcome::Failed(err) => return err.into(),
            }
        }

        tracing::trace!(state = ?RelayState::Streaming, "relay streaming");

        loop {
            // Cancellation wins against a pending upstream tick, so honoring
            // it never takes longer than one in-flight item.
            let event = tokio::select! {
                biased;
                () = cancel.cancelled() => {
                    tracing::trace!(state = ?RelayState::Cancelling, "cancellation observed");
                    return TerminationReason::Cancelled;
                }
                event = upstream.next() => event,
            };

            match event {
                Ok(Some(quote)) => {
                    match self.push_bounded(sink, RelayMessage::Quote(quote), cancel).await {
                        PushOutcome::Delivered => {}
                        PushOutcome::Cancelled => {
                            tracing::trace!(
                                state = ?RelayState::Cancelling,
                                "cancellation observed around push"
                            );
                            return TerminationReason::Cancelled;
                        }
                        PushOutcome::Failed(err) => return err.into(),
                    }
                }
                Ok(None) => return TerminationReason::Completed,
                Err(err) => return err.into(),
            }
        }
    }

    /// Push one message, bounded by the configured timeout and by
    /// cancellation. Never pushes once the token is raised; at most the
    /// item already handed to the sink may still land.
    async fn push_bounded<S>(
        &self,
        sink: &mut S,
        message: RelayMessage,
        cancel: &CancellationToken,
    ) -> PushOutcome
    where
        S: DownstreamSink,
    {
        if cancel.is_cancelled() {
            return PushOutcome::Cancelled;
        }

        tokio::select! {
            biased;
            () = cancel.cancelled() => PushOutcome::Cancelled,
            pushed = tokio::time::timeout(self.config.push_timeout, sink.push(message)) => {
                match pushed {
                    Ok(Ok(())) => PushOutcome::Delivered,
                    // A push failure that coincides with cancellation is the
                    // consumer leaving, not a downstream fault.
                    Ok(Err(_)) if cancel.is_cancelled() => PushOutcome::Cancelled,
                    Ok(Err(err)) => PushOutcome::Failed(err),
                    Err(_) => PushOutcome::Failed(RelayError::DownstreamFault(format!(
                        "push timed out after {}ms",
                        self.config.push_timeout.as_millis()
                    ))),
                }
            }
        }
    }
}

// =============================================================================
// Tests
// =============================================================================

//! Upstream Quote Producer
//!
//! Tick-driven simulator of a live pricing feed: one quote per interval for
//! one subscription, sequence numbers starting at 1. Each `open` yields an
//! independent handle with its own counter; handles never share state, so
//! concurrent subscriptions cannot contaminate each other.
//!
//! The producer stands in for a real upstream connection. Its fault
//! injection knob (`fail_after_ticks`) simulates a broken feed mid-stream:
//! the handle reports one descriptive terminal fault and behaves as
//! end-of-stream from then on.

use std::time::Duration;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::application::ports::QuoteStream;
use crate::domain::quote::{Quote, QuoteGenerator, SubscriptionRequest};
use crate::domain::relay::RelayError;

// =============================================================================
// Configuration
// =============================================================================

/// Configuration for the upstream producer.
#[derive(Debug, Clone)]
pub struct ProducerConfig {
    /// Interval between quotes on each handle.
    pub tick_interval: Duration,
    /// If set, handles report a terminal upstream fault after this many
    /// successful quotes. `None` streams forever.
    pub fail_after_ticks: Option<u64>,
}

impl Default for ProducerConfig {
    fn default() -> Self {
        Self {
            tick_interval: Duration::from_secs(1),
            fail_after_ticks: None,
        }
    }
}

// =============================================================================
// Producer
// =============================================================================

/// Factory for per-subscription upstream streams.
#[derive(Debug, Clone, Default)]
pub struct UpstreamProducer {
    config: ProducerConfig,
}

impl UpstreamProducer {
    /// Create a producer with the given configuration.
    #[must_use]
    pub const fn new(config: ProducerConfig) -> Self {
        Self { config }
    }

    /// Open a fresh stream for one subscription.
    ///
    /// The handle owns its sequence counter and tick timer; closing it
    /// affects no other handle.
    #[must_use]
    pub fn open(&self, request: SubscriptionRequest) -> ProducerHandle {
        tracing::debug!(
            uic = %request.uic,
            asset_type = %request.asset_type,
            tick_interval_ms = self.config.tick_interval.as_millis() as u64,
            "opening upstream quote stream"
        );
        ProducerHandle {
            request,
            tick_interval: self.config.tick_interval,
            fail_after_ticks: self.config.fail_after_ticks,
            next_sequence: 1,
            closed: CancellationToken::new(),
            faulted: false,
        }
    }
}

// =============================================================================
// Handle
// =============================================================================

/// One open upstream stream: a lazy, infinite, cancellable quote sequence.
#[derive(Debug)]
pub struct ProducerHandle {
    request: SubscriptionRequest,
    tick_interval: Duration,
    fail_after_ticks: Option<u64>,
    next_sequence: u64,
    closed: CancellationToken,
    faulted: bool,
}

impl ProducerHandle {
    /// The subscription this handle streams for.
    #[must_use]
    pub const fn request(&self) -> &SubscriptionRequest {
        &self.request
    }
}

#[async_trait]
impl QuoteStream for ProducerHandle {
    async fn next(&mut self) -> Result<Option<Quote>, RelayError> {
        // A fault is reported once; afterwards the stream is simply over.
        if self.faulted || self.closed.is_cancelled() {
            return Ok(None);
        }

        // close() raised mid-wait aborts the pending tick immediately.
        tokio::select! {
            biased;
            () = self.closed.cancelled() => return Ok(None),
            () = tokio::time::sleep(self.tick_interval) => {}
        }

        if self
            .fail_after_ticks
            .is_some_and(|limit| self.next_sequence > limit)
        {
            self.faulted = true;
            let detail = format!(
                "simulated feed failure for {} after {} quotes",
                self.request,
                self.next_sequence - 1
            );
            tracing::warn!(uic = %self.request.uic, "upstream feed fault: {detail}");
            return Err(RelayError::UpstreamFault(detail));
        }

        let sequence = self.next_sequence;
        let Some(successor) = sequence.checked_add(1) else {
            // Never wrap silently: an exhausted counter is a terminal fault.
            self.faulted = true;
            return Err(RelayError::UpstreamFault(format!(
                "sequence counter overflow for {}",
                self.request
            )));
        };
        self.next_sequence = successor;

        let quote = QuoteGenerator::next(&self.request, sequence);
        tracing::debug!(sequence, text = %quote.text, "produced quote");
        Ok(Some(quote))
    }

    async fn close(&mut self) {
        if !self.closed.is_cancelled() {
            tracing::debug!(uic = %self.request.uic, "closing upstream quote stream");
            self.closed.cancel();
        }
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn fast_producer(fail_after_ticks: Option<u64>) -> UpstreamProducer {
        UpstreamProducer::new(ProducerConfig {
            tick_interval: Duration::from_millis(5),
            fail_after_ticks,
        })
    }

    #[tokio::test]
    async fn sequences_start_at_one_with_no_gaps() {
        let producer = fast_producer(None);
        let mut handle = producer.open(SubscriptionRequest::new("211", "Stock"));

        for expected in 1..=5_u64 {
            let quote = handle.next().await.unwrap().unwrap();
            assert_eq!(quote.sequence, expected);
            assert_eq!(quote.text, format!("Quote#{expected} for 211-Stock"));
        }
    }

    #[tokio::test]
    async fn handles_are_independent() {
        let producer = fast_producer(None);
        let mut first = producer.open(SubscriptionRequest::new("211", "Stock"));
        let mut second = producer.open(SubscriptionRequest::new("42", "FxSpot"));

        let a = first.next().await.unwrap().unwrap();
        let b = second.next().await.unwrap().unwrap();
        let c = first.next().await.unwrap().unwrap();

        assert_eq!(a.sequence, 1);
        assert_eq!(b.sequence, 1);
        assert_eq!(c.sequence, 2);
        assert_eq!(b.text, "Quote#1 for 42-FxSpot");
    }

    #[tokio::test]
    async fn closed_handle_ends_without_waiting_a_tick() {
        let producer = UpstreamProducer::new(ProducerConfig {
            tick_interval: Duration::from_secs(3600),
            fail_after_ticks: None,
        });
        let mut handle = producer.open(SubscriptionRequest::new("211", "Stock"));
        handle.close().await;

        let started = std::time::Instant::now();
        assert_eq!(handle.next().await.unwrap(), None);
        assert!(started.elapsed() < Duration::from_secs(1));

        // close is idempotent and the stream stays over.
        handle.close().await;
        assert_eq!(handle.next().await.unwrap(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn quotes_follow_the_tick_cadence() {
        let producer = UpstreamProducer::new(ProducerConfig {
            tick_interval: Duration::from_secs(1),
            fail_after_ticks: None,
        });
        let mut handle = producer.open(SubscriptionRequest::new("211", "Stock"));

        let started = tokio::time::Instant::now();
        let _ = handle.next().await.unwrap().unwrap();
        let _ = handle.next().await.unwrap().unwrap();

        assert_eq!(started.elapsed(), Duration::from_secs(2));
    }

    #[tokio::test]
    async fn fault_is_reported_once_then_end_of_stream() {
        let producer = fast_producer(Some(2));
        let mut handle = producer.open(SubscriptionRequest::new("211", "Stock"));

        assert_eq!(handle.next().await.unwrap().unwrap().sequence, 1);
        assert_eq!(handle.next().await.unwrap().unwrap().sequence, 2);

        let fault = handle.next().await.unwrap_err();
        match fault {
            RelayError::UpstreamFault(detail) => {
                assert!(detail.contains("211-Stock"), "unexpected detail: {detail}");
                assert!(detail.contains("after 2 quotes"), "unexpected detail: {detail}");
            }
            other => panic!("expected UpstreamFault, got {other:?}"),
        }

        // Reported exactly once; the stream is over from here on.
        assert_eq!(handle.next().await.unwrap(), None);
        assert_eq!(handle.next().await.unwrap(), None);
    }

    #[tokio::test]
    async fn sequence_overflow_is_a_terminal_fault_not_a_wrap() {
        let producer = fast_producer(None);
        let mut handle = producer.open(SubscriptionRequest::new("211", "Stock"));
        handle.next_sequence = u64::MAX;

        let fault = handle.next().await.unwrap_err();
        match fault {
            RelayError::UpstreamFault(detail) => {
                assert!(detail.contains("overflow"), "unexpected detail: {detail}");
            }
            other => panic!("expected UpstreamFault, got {other:?}"),
        }
        assert_eq!(handle.next().await.unwrap(), None);
    }
}

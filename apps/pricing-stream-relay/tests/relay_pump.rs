//! Relay Pump Integration Tests
//!
//! Exercises the pump against the real tick-driven producer, checking the
//! ordering, cancellation, and fault properties end to end below the
//! transport layer.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::time::Duration;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use pricing_stream_relay::{
    DownstreamSink, ProducerConfig, RelayError, RelayMessage, RelayPump, RelayPumpConfig,
    SubscriptionRequest, TerminationReason, UpstreamProducer,
};

/// Sink that records delivered lines and can raise the cancellation token
/// after a fixed number of quotes, emulating a consumer that walks away.
struct CollectingSink {
    lines: Vec<String>,
    quotes_seen: usize,
    cancel_after_quotes: Option<(usize, CancellationToken)>,
}

impl CollectingSink {
    fn new() -> Self {
        Self {
            lines: Vec::new(),
            quotes_seen: 0,
            cancel_after_quotes: None,
        }
    }

    fn cancelling_after(mut self, quotes: usize, token: CancellationToken) -> Self {
        self.cancel_after_quotes = Some((quotes, token));
        self
    }

    fn quote_lines(&self) -> Vec<&str> {
        self.lines
            .iter()
            .filter(|l| l.starts_with("Quote#"))
            .map(String::as_str)
            .collect()
    }
}

#[async_trait]
impl DownstreamSink for CollectingSink {
    async fn push(&mut self, message: RelayMessage) -> Result<(), RelayError> {
        match message {
            RelayMessage::Info(text) => self.lines.push(format!("Info: {text}")),
            RelayMessage::Quote(quote) => {
                self.lines.push(quote.text);
                self.quotes_seen += 1;
                if let Some((limit, token)) = &self.cancel_after_quotes
                    && self.quotes_seen >= *limit
                {
                    token.cancel();
                }
            }
        }
        Ok(())
    }
}

fn producer(tick_ms: u64, fail_after_ticks: Option<u64>) -> UpstreamProducer {
    UpstreamProducer::new(ProducerConfig {
        tick_interval: Duration::from_millis(tick_ms),
        fail_after_ticks,
    })
}

#[tokio::test]
async fn three_ticks_then_cancel_delivers_exactly_three_quotes() {
    let cancel = CancellationToken::new();
    let mut handle = producer(10, None).open(SubscriptionRequest::new("211", "Stock"));
    let mut sink = CollectingSink::new().cancelling_after(3, cancel.clone());

    let pump = RelayPump::default();
    let reason = pump.run(&mut handle, &mut sink, cancel).await;

    assert_eq!(reason, TerminationReason::Cancelled);
    assert_eq!(
        sink.quote_lines(),
        vec![
            "Quote#1 for 211-Stock",
            "Quote#2 for 211-Stock",
            "Quote#3 for 211-Stock",
        ]
    );
}

#[tokio::test]
async fn announcement_precedes_the_first_quote() {
    let cancel = CancellationToken::new();
    let mut handle = producer(10, None).open(SubscriptionRequest::new("211", "Stock"));
    let mut sink = CollectingSink::new().cancelling_after(1, cancel.clone());

    let pump = RelayPump::new(RelayPumpConfig {
        announcement: Some("Invoking stream..".to_string()),
        ..RelayPumpConfig::default()
    });
    let reason = pump.run(&mut handle, &mut sink, cancel).await;

    assert_eq!(reason, TerminationReason::Cancelled);
    assert_eq!(
        sink.lines,
        vec!["Info: Invoking stream..", "Quote#1 for 211-Stock"]
    );
}

#[tokio::test]
async fn producer_fault_ends_the_relay_after_the_delivered_quotes() {
    let mut handle = producer(10, Some(2)).open(SubscriptionRequest::new("211", "Stock"));
    let mut sink = CollectingSink::new();

    let pump = RelayPump::default();
    let reason = pump
        .run(&mut handle, &mut sink, CancellationToken::new())
        .await;

    match reason {
        TerminationReason::UpstreamFailed(detail) => {
            assert!(
                detail.contains("simulated feed failure"),
                "unexpected detail: {detail}"
            );
        }
        other => panic!("expected UpstreamFailed, got {other:?}"),
    }
    assert_eq!(
        sink.quote_lines(),
        vec!["Quote#1 for 211-Stock", "Quote#2 for 211-Stock"]
    );
}

#[tokio::test(start_paused = true)]
async fn cancellation_mid_tick_does_not_wait_for_the_tick() {
    let cancel = CancellationToken::new();
    let mut handle = producer(3_600_000, None).open(SubscriptionRequest::new("211", "Stock"));
    let mut sink = CollectingSink::new();

    let pump = RelayPump::default();
    let canceller = {
        let cancel = cancel.clone();
        async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            cancel.cancel();
        }
    };

    let (reason, ()) = tokio::join!(pump.run(&mut handle, &mut sink, cancel.clone()), canceller);

    assert_eq!(reason, TerminationReason::Cancelled);
    assert!(sink.lines.is_empty());
}

#[tokio::test]
async fn concurrent_subscriptions_do_not_share_counters() {
    let producer = producer(5, None);

    let run_one = |uic: &str| {
        let cancel = CancellationToken::new();
        let mut handle = producer.open(SubscriptionRequest::new(uic, "Stock"));
        let mut sink = CollectingSink::new().cancelling_after(3, cancel.clone());
        async move {
            let pump = RelayPump::default();
            let reason = pump.run(&mut handle, &mut sink, cancel).await;
            (reason, sink)
        }
    };

    let (first, second) = tokio::join!(run_one("211"), run_one("42"));

    assert_eq!(first.0, TerminationReason::Cancelled);
    assert_eq!(second.0, TerminationReason::Cancelled);
    assert_eq!(
        first.1.quote_lines(),
        vec![
            "Quote#1 for 211-Stock",
            "Quote#2 for 211-Stock",
            "Quote#3 for 211-Stock",
        ]
    );
    assert_eq!(
        second.1.quote_lines(),
        vec![
            "Quote#1 for 42-Stock",
            "Quote#2 for 42-Stock",
            "Quote#3 for 42-Stock",
        ]
    );
}

//! Port Interfaces
//!
//! Defines the interfaces (ports) for the two sides of the relay following
//! the Hexagonal Architecture pattern. These are the contracts that
//! infrastructure adapters implement.
//!
//! ## Driven Ports (Outbound)
//!
//! - [`DownstreamSink`]: push one item to a remote consumer; owned by the
//!   transport adapter (gRPC response writer, WebSocket hub connection).
//!
//! ## Driver-Side Streams (Inbound Data)
//!
//! - [`QuoteStream`]: a lazy, cancellable sequence of quotes with an explicit
//!   end-of-stream/fault outcome. Implemented by the tick-driven producer and
//!   by the gRPC-client-backed upstream used by the hub.

use async_trait::async_trait;

use crate::domain::quote::{Quote, RelayMessage};
use crate::domain::relay::RelayError;

/// One open upstream stream of quotes for one subscription.
///
/// # Contract
///
/// - `next` returns `Ok(Some(quote))` for each item, `Ok(None)` once the
///   stream has ended, and `Err` exactly once for a terminal fault; after a
///   fault every further call returns `Ok(None)`.
/// - `close` is idempotent, unblocks a pending `next`, and causes all
///   subsequent `next` calls to return `Ok(None)`.
#[async_trait]
pub trait QuoteStream: Send {
    /// Wait for and return the next quote.
    async fn next(&mut self) -> Result<Option<Quote>, RelayError>;

    /// Close the stream, releasing the underlying connection or timer.
    async fn close(&mut self);
}

/// Push one item to a remote consumer.
///
/// `push` may suspend for as long as the downstream transport needs; the
/// relay pump never has more than one push in flight. Errors are terminal
/// for the stream the sink belongs to.
#[async_trait]
pub trait DownstreamSink: Send {
    /// Deliver one message to the consumer.
    async fn push(&mut self, message: RelayMessage) -> Result<(), RelayError>;
}

//! gRPC Streaming Transport
//!
//! Implements the `Pricing` gRPC service that exposes the quote stream to
//! downstream clients, plus the gRPC-client-backed upstream used by the
//! push hub.
//!
//! # Architecture
//!
//! Each `Subscribe` call:
//!
//! 1. Opens one independent upstream producer stream
//! 2. Maps the client's disconnect onto the relay's cancellation token
//! 3. Runs a relay pump over a single-item channel into the response stream
//! 4. Closes the response with the status matching the termination reason

pub mod server;
pub mod upstream;

// Allow clippy warnings and missing docs in generated code
#[allow(
    missing_docs,
    clippy::all,
    clippy::pedantic,
    clippy::nursery,
    clippy::unwrap_used,
    clippy::expect_used
)]
pub mod proto {
    pub mod pricing {
        pub mod v1 {
            include!(concat!(env!("OUT_DIR"), "/pricing.v1.rs"));
        }
    }
}

pub use server::{PricingService, PricingServiceConfig};
pub use upstream::GrpcUpstream;

#![cfg_attr(
    test,
    allow(
        clippy::unwrap_used,
        clippy::expect_used,
        clippy::too_many_lines,
        clippy::default_trait_access,
        clippy::items_after_statements
    )
)]

//! Pricing Stream Relay - Quote Subscription Relay
//!
//! Relays a server-initiated stream of price quotes from an upstream
//! producer to downstream subscribers over two transports with different
//! cancellation semantics: gRPC server-streaming and a WebSocket push hub.
//! Each subscription gets its own upstream stream, its own relay pump task,
//! and its own sequence counter; nothing is shared across subscriptions.
//!
//! # Layers (inside → outside)
//!
//! - **Domain**: Quote values and relay vocabulary
//!   - `quote`: subscription identity, quote generation, relay messages
//!   - `relay`: error taxonomy and termination reasons
//!
//! - **Application**: The relay use case and its ports
//!   - `ports`: `QuoteStream` and `DownstreamSink` interfaces
//!   - `relay`: the `RelayPump` state machine
//!
//! - **Infrastructure**: Adapters and external integrations
//!   - `producer`: tick-driven upstream quote producer
//!   - `grpc`: gRPC streaming service + client-backed upstream
//!   - `hub`: WebSocket push hub
//!   - `config`: environment-variable configuration
//!   - `health`: health check HTTP endpoint and relay statistics
//!   - `metrics` / `telemetry`: Prometheus and OpenTelemetry plumbing
//!
//! # Data Flow
//!
//! ```text
//!                     ┌──────────────┐     ┌─────────────┐
//! Producer tick ─────►│  Relay Pump  │────►│    gRPC     │──► Subscriber
//!                     └──────────────┘     │   service   │
//!                                          └──────┬──────┘
//!                     ┌──────────────┐            │ gRPC stream
//! gRPC upstream ─────►│  Relay Pump  │◄───────────┘
//!                     └──────┬───────┘
//!                            └────────────► WebSocket hub ──► Browser
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::pedantic)]

// =============================================================================
// Module Declarations
// =============================================================================

/// Domain layer - Core relay types with no external dependencies.
pub mod domain;

/// Application layer - The relay pump and its port definitions.
pub mod application;

/// Infrastructure layer - Adapters and external integrations.
pub mod infrastructure;

// =============================================================================
// Re-exports
// =============================================================================

// Domain types
pub use domain::quote::{Quote, QuoteGenerator, RelayMessage, SubscriptionRequest};
pub use domain::relay::{RelayError, TerminationReason};

// Application core
pub use application::ports::{DownstreamSink, QuoteStream};
pub use application::relay::{RelayPump, RelayPumpConfig, RelayState};

// Upstream producer
pub use infrastructure::producer::{ProducerConfig, ProducerHandle, UpstreamProducer};

// Infrastructure config
pub use infrastructure::config::{
    ConfigError, RelayConfig, RelaySettings, ServerSettings, UpstreamSettings,
};

// gRPC transport (also used by integration tests)
pub use infrastructure::grpc::{
    proto::pricing::v1 as proto,
    server::{PricingService, PricingServiceConfig},
    upstream::GrpcUpstream,
};

// WebSocket hub transport
pub use infrastructure::hub::{HubServer, HubServerConfig, HubServerError};

// Health server and relay statistics
pub use infrastructure::health::{HealthServer, HealthServerError, HealthServerState, RelayStats};

// Metrics
pub use infrastructure::metrics::{Transport, init_metrics};

// Telemetry
pub use infrastructure::telemetry::{TelemetryConfig, TelemetryGuard, init as init_telemetry};

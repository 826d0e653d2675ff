//! Infrastructure Layer - Adapters and external integrations.
//!
//! This layer contains the concrete implementations of the port interfaces
//! defined in the application layer, plus the ambient plumbing.

/// Tick-driven upstream quote producer.
pub mod producer;

/// gRPC streaming server and the gRPC-client-backed upstream.
pub mod grpc;

/// WebSocket push hub transport.
pub mod hub;

/// Configuration loading.
pub mod config;

/// Health check HTTP endpoint and relay statistics.
pub mod health;

/// Prometheus metrics instrumentation.
pub mod metrics;

/// OpenTelemetry tracing integration.
pub mod telemetry;

//! Pricing Stream Relay Binary
//!
//! Starts the quote subscription relay.
//!
//! # Usage
//!
//! ```bash
//! cargo run --bin pricing-stream-relay
//! ```
//!
//! # Environment Variables
//!
//! All optional:
//! - `PRICING_GRPC_PORT`: gRPC pricing service port (default: 5000)
//! - `PRICING_HUB_PORT`: WebSocket hub port (default: 5001)
//! - `PRICING_HEALTH_PORT`: Health check HTTP port (default: 8082)
//! - `PRICING_UPSTREAM_ENDPOINT`: upstream gRPC address the hub relays from
//!   (default: <http://localhost:5000>)
//! - `PRICING_TICK_INTERVAL_MS`: producer quote interval (default: 1000)
//! - `PRICING_PUSH_TIMEOUT_MS`: downstream push bound (default: 5000)
//! - `PRICING_FAIL_AFTER_TICKS`: producer fault injection (default: unset)
//! - `OTEL_ENABLED`: Enable OpenTelemetry (default: true)
//! - `OTEL_EXPORTER_OTLP_ENDPOINT`: OTLP endpoint (default: <http://localhost:4318>)
//! - `OTEL_SERVICE_NAME`: Service name (default: pricing-stream-relay)
//! - `RUST_LOG`: Log level (default: info)

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use pricing_stream_relay::infrastructure::telemetry;
use pricing_stream_relay::proto::pricing_server::PricingServer;
use pricing_stream_relay::{
    HealthServer, HealthServerState, HubServer, HubServerConfig, PricingService,
    PricingServiceConfig, ProducerConfig, RelayConfig, RelayPumpConfig, RelayStats,
    UpstreamProducer, init_metrics,
};
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tonic::transport::Server;

/// Graceful shutdown timeout.
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(30);

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    load_dotenv();

    // Initialize telemetry (OpenTelemetry + tracing)
    let _telemetry_guard = telemetry::init();

    tracing::info!("Starting Pricing Stream Relay");

    // Initialize Prometheus metrics
    let _metrics_handle = init_metrics();

    let config = RelayConfig::from_env()?;
    log_config(&config);

    let shutdown_token = CancellationToken::new();
    let stats = Arc::new(RelayStats::new());

    // gRPC pricing service: local producer streams relayed per subscriber
    let producer = UpstreamProducer::new(ProducerConfig {
        tick_interval: config.upstream.tick_interval,
        fail_after_ticks: config.upstream.fail_after_ticks,
    });
    let pricing_service = PricingService::new(
        PricingServiceConfig {
            pump: RelayPumpConfig {
                push_timeout: config.relay.push_timeout,
                announcement: None,
            },
        },
        producer,
        Arc::clone(&stats),
        shutdown_token.clone(),
    );

    let grpc_addr: SocketAddr = format!("0.0.0.0:{}", config.server.grpc_port).parse()?;
    let grpc_shutdown = shutdown_token.clone();
    let grpc_handle = tokio::spawn(async move {
        tracing::info!(addr = %grpc_addr, "gRPC server listening");
        if let Err(e) = Server::builder()
            .add_service(PricingServer::new(pricing_service))
            .serve_with_shutdown(grpc_addr, grpc_shutdown.cancelled())
            .await
        {
            tracing::error!(error = %e, "gRPC server error");
        }
        tracing::info!("gRPC server stopped");
    });

    // WebSocket push hub: relays the gRPC stream at the configured endpoint
    let hub_server = HubServer::new(
        HubServerConfig {
            port: config.server.hub_port,
            upstream_endpoint: config.upstream.endpoint.clone(),
            push_timeout: config.relay.push_timeout,
        },
        Arc::clone(&stats),
        shutdown_token.clone(),
    );
    let hub_handle = tokio::spawn(async move {
        if let Err(e) = hub_server.run().await {
            tracing::error!(error = %e, "Hub server error");
        }
    });

    // Health endpoint
    let health_state = Arc::new(HealthServerState::new(
        env!("CARGO_PKG_VERSION").to_string(),
        Arc::clone(&stats),
    ));
    let health_server = HealthServer::new(
        config.server.health_port,
        health_state,
        shutdown_token.clone(),
    );
    let health_handle = tokio::spawn(async move {
        if let Err(e) = health_server.run().await {
            tracing::error!(error = %e, "Health server error");
        }
    });

    tracing::info!("Pricing stream relay ready");

    await_shutdown(shutdown_token).await;

    // Give the servers a bounded window to drain in-flight streams.
    let _ = tokio::time::timeout(SHUTDOWN_TIMEOUT, async {
        let _ = tokio::join!(grpc_handle, hub_handle, health_handle);
    })
    .await;

    tracing::info!("Pricing stream relay stopped");
    Ok(())
}

/// Load .env file from current directory or any ancestor directory.
fn load_dotenv() {
    if dotenvy::dotenv().is_ok() {
        return;
    }

    if let Ok(cwd) = std::env::current_dir() {
        let mut dir = cwd.as_path();
        while let Some(parent) = dir.parent() {
            let env_path = parent.join(".env");
            if env_path.exists() {
                let _ = dotenvy::from_path(&env_path);
                return;
            }
            dir = parent;
        }
    }
}

/// Log the parsed configuration.
fn log_config(config: &RelayConfig) {
    tracing::info!(
        grpc_port = config.server.grpc_port,
        hub_port = config.server.hub_port,
        health_port = config.server.health_port,
        upstream_endpoint = %config.upstream.endpoint,
        tick_interval_ms = config.upstream.tick_interval.as_millis() as u64,
        push_timeout_ms = config.relay.push_timeout.as_millis() as u64,
        fail_after_ticks = config.upstream.fail_after_ticks,
        "Configuration loaded"
    );
}

/// Wait for shutdown signal (SIGTERM or SIGINT).
#[allow(clippy::expect_used)]
async fn await_shutdown(shutdown_token: CancellationToken) {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("signal handler installation is critical for graceful shutdown");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("SIGTERM handler installation is critical for graceful shutdown")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received Ctrl+C, initiating shutdown");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, initiating shutdown");
        }
    }

    shutdown_token.cancel();

    tracing::info!(
        timeout_secs = SHUTDOWN_TIMEOUT.as_secs(),
        "Graceful shutdown started"
    );
}

//! Relay Configuration Settings
//!
//! Configuration types for the relay service, loaded from environment
//! variables once at startup. Invalid values are rejected rather than
//! silently replaced with defaults.

use std::str::FromStr;
use std::time::Duration;

// =============================================================================
// Settings Sections
// =============================================================================

/// Server port settings.
#[derive(Debug, Clone)]
pub struct ServerSettings {
    /// gRPC pricing service port.
    pub grpc_port: u16,
    /// WebSocket hub HTTP port.
    pub hub_port: u16,
    /// Health check HTTP port.
    pub health_port: u16,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            grpc_port: 5000,
            hub_port: 5001,
            health_port: 8082,
        }
    }
}

/// Upstream producer and endpoint settings.
#[derive(Debug, Clone)]
pub struct UpstreamSettings {
    /// Address of the pricing gRPC service the hub relays from.
    pub endpoint: String,
    /// Interval between quotes on each producer stream.
    pub tick_interval: Duration,
    /// Fault injection: producer streams fail after this many quotes.
    pub fail_after_ticks: Option<u64>,
}

impl Default for UpstreamSettings {
    fn default() -> Self {
        Self {
            endpoint: "http://localhost:5000".to_string(),
            tick_interval: Duration::from_secs(1),
            fail_after_ticks: None,
        }
    }
}

/// Relay pump settings.
#[derive(Debug, Clone)]
pub struct RelaySettings {
    /// Upper bound on one downstream push before the stream is failed.
    pub push_timeout: Duration,
}

impl Default for RelaySettings {
    fn default() -> Self {
        Self {
            push_timeout: Duration::from_secs(5),
        }
    }
}

// =============================================================================
// Complete Configuration
// =============================================================================

/// Complete relay configuration.
#[derive(Debug, Clone, Default)]
pub struct RelayConfig {
    /// Server port settings.
    pub server: ServerSettings,
    /// Upstream settings.
    pub upstream: UpstreamSettings,
    /// Relay pump settings.
    pub relay: RelaySettings,
}

impl RelayConfig {
    /// Create configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if a variable is set to a value that does not
    /// parse, a duration is zero, or the upstream endpoint is empty.
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let server = ServerSettings {
            grpc_port: parse_env("PRICING_GRPC_PORT", defaults.server.grpc_port)?,
            hub_port: parse_env("PRICING_HUB_PORT", defaults.server.hub_port)?,
            health_port: parse_env("PRICING_HEALTH_PORT", defaults.server.health_port)?,
        };

        let endpoint = std::env::var("PRICING_UPSTREAM_ENDPOINT")
            .unwrap_or(defaults.upstream.endpoint);
        if endpoint.is_empty() {
            return Err(ConfigError::EmptyValue(
                "PRICING_UPSTREAM_ENDPOINT".to_string(),
            ));
        }

        let upstream = UpstreamSettings {
            endpoint,
            tick_interval: parse_env_duration_millis(
                "PRICING_TICK_INTERVAL_MS",
                defaults.upstream.tick_interval,
            )?,
            fail_after_ticks: parse_env_optional("PRICING_FAIL_AFTER_TICKS")?,
        };

        let relay = RelaySettings {
            push_timeout: parse_env_duration_millis(
                "PRICING_PUSH_TIMEOUT_MS",
                defaults.relay.push_timeout,
            )?,
        };

        Ok(Self {
            server,
            upstream,
            relay,
        })
    }
}

// =============================================================================
// Errors
// =============================================================================

/// Configuration error.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Environment variable has an empty value.
    #[error("environment variable {0} cannot be empty")]
    EmptyValue(String),
    /// Environment variable is set but does not parse or is out of range.
    #[error("environment variable {key} has invalid value {value:?}")]
    InvalidValue {
        /// The variable name.
        key: String,
        /// The raw rejected value.
        value: String,
    },
}

// =============================================================================
// Parse Helpers
// =============================================================================

fn parse_env<T: FromStr>(key: &str, default: T) -> Result<T, ConfigError> {
    match std::env::var(key) {
        Ok(raw) => parse_value(key, &raw),
        Err(_) => Ok(default),
    }
}

fn parse_env_optional<T: FromStr>(key: &str) -> Result<Option<T>, ConfigError> {
    match std::env::var(key) {
        Ok(raw) => parse_value(key, &raw).map(Some),
        Err(_) => Ok(None),
    }
}

fn parse_env_duration_millis(key: &str, default: Duration) -> Result<Duration, ConfigError> {
    match std::env::var(key) {
        Ok(raw) => parse_duration_millis(key, &raw),
        Err(_) => Ok(default),
    }
}

fn parse_value<T: FromStr>(key: &str, raw: &str) -> Result<T, ConfigError> {
    raw.parse().map_err(|_| ConfigError::InvalidValue {
        key: key.to_string(),
        value: raw.to_string(),
    })
}

fn parse_duration_millis(key: &str, raw: &str) -> Result<Duration, ConfigError> {
    let millis: u64 = parse_value(key, raw)?;
    if millis == 0 {
        // A zero tick or push timeout would spin or fail every push.
        return Err(ConfigError::InvalidValue {
            key: key.to_string(),
            value: raw.to_string(),
        });
    }
    Ok(Duration::from_millis(millis))
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use test_case::test_case;

    use super::*;

    #[test]
    fn defaults_match_reference_deployment() {
        let config = RelayConfig::default();
        assert_eq!(config.server.grpc_port, 5000);
        assert_eq!(config.server.hub_port, 5001);
        assert_eq!(config.server.health_port, 8082);
        assert_eq!(config.upstream.endpoint, "http://localhost:5000");
        assert_eq!(config.upstream.tick_interval, Duration::from_secs(1));
        assert_eq!(config.upstream.fail_after_ticks, None);
        assert_eq!(config.relay.push_timeout, Duration::from_secs(5));
    }

    #[test_case("5000", Ok(5000))]
    #[test_case("0", Ok(0))]
    #[test_case("70000", Err(()))]
    #[test_case("not-a-port", Err(()))]
    fn port_values_parse_or_reject(raw: &str, expected: Result<u16, ()>) {
        let parsed: Result<u16, ConfigError> = parse_value("PRICING_GRPC_PORT", raw);
        match expected {
            Ok(port) => assert_eq!(parsed.unwrap(), port),
            Err(()) => assert!(parsed.is_err()),
        }
    }

    #[test]
    fn duration_values_parse_to_millis() {
        let parsed = parse_duration_millis("PRICING_TICK_INTERVAL_MS", "250").unwrap();
        assert_eq!(parsed, Duration::from_millis(250));
    }

    #[test]
    fn zero_durations_are_rejected() {
        let err = parse_duration_millis("PRICING_PUSH_TIMEOUT_MS", "0").unwrap_err();
        match err {
            ConfigError::InvalidValue { key, value } => {
                assert_eq!(key, "PRICING_PUSH_TIMEOUT_MS");
                assert_eq!(value, "0");
            }
            other => panic!("expected InvalidValue, got {other:?}"),
        }
    }

    #[test]
    fn invalid_value_error_names_the_variable() {
        let err: ConfigError = parse_value::<u64>("PRICING_FAIL_AFTER_TICKS", "soon").unwrap_err();
        assert_eq!(
            err.to_string(),
            "environment variable PRICING_FAIL_AFTER_TICKS has invalid value \"soon\""
        );
    }
}

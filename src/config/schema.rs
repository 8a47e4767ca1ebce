//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the bridge.
//! All types derive Serde traits for deserialization from TOML.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::upstream::Credentials;

/// Root configuration for the collector bridge.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct BridgeConfig {
    /// The server whose answers are authoritative.
    pub primary_server: Option<ServerConfig>,

    /// Extra servers that receive every record too.
    pub alternative_servers: Vec<ServerConfig>,

    /// Base64 X25519 public key for encrypted login passwords.
    pub public_key: Option<String>,

    /// Base64 X25519 private key matching `public_key`.
    pub private_key: Option<String>,

    /// Site credentials handed to the collector via /users.
    pub login_users: Vec<LoginUser>,

    /// Run without any upstream server.
    pub mock_mode: bool,

    /// Users returned by /users in mock mode.
    pub mock_users: Vec<LoginUser>,

    /// Local control surface binding.
    pub listener: ListenerConfig,

    /// Optional liveness endpoint.
    pub health_check: HealthCheckConfig,

    /// Command relay timing.
    pub bridge: RelayConfig,

    /// Reference cache TTLs and warm-up window.
    pub cache: CacheConfig,

    /// REST retry budget.
    pub retries: RetryConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

impl BridgeConfig {
    /// Connection credentials in pool order: primary first, then alternatives.
    pub fn credentials(&self) -> Vec<Credentials> {
        self.primary_server
            .iter()
            .map(|server| server.credentials(true))
            .chain(self.alternative_servers.iter().map(|server| server.credentials(false)))
            .collect()
    }
}

/// One upstream matching server.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Base URL, e.g. "https://rtcv.example.com".
    pub server_location: String,

    pub api_key_id: String,

    pub api_key: String,
}

impl ServerConfig {
    pub fn credentials(&self, primary: bool) -> Credentials {
        Credentials {
            server_location: self.server_location.clone(),
            api_key_id: self.api_key_id.clone(),
            api_key: self.api_key.clone(),
            primary,
        }
    }
}

/// A site login handed to the collector.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct LoginUser {
    pub username: String,

    /// Plain password, used when `encrypted_password` is absent.
    pub password: String,

    /// Base64 sealed box holding 32 bytes of padding followed by the password.
    #[serde(alias = "encryptedPassword")]
    pub encrypted_password: Option<String>,
}

/// Listener configuration for the local control surface.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind host, loopback unless the collector runs elsewhere.
    pub host: String,

    /// First port tried.
    pub port_range_start: u16,

    /// Last port tried (inclusive).
    pub port_range_end: u16,

    /// Maximum accepted request body in bytes.
    pub max_body_size: usize,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port_range_start: 4001,
            port_range_end: 6000,
            max_body_size: 2 * 1024 * 1024,
        }
    }
}

/// Health check configuration.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct HealthCheckConfig {
    /// Port for `GET /` on 0.0.0.0. Disabled when unset.
    pub port: Option<u16>,
}

/// Command relay timing.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RelayConfig {
    /// Pickup deadline while the collector has not picked anything up yet.
    pub short_pickup_ms: u64,

    /// Pickup deadline once the collector is known to be polling.
    pub long_pickup_ms: u64,

    /// How long a /server_request call waits for a command.
    pub poll_timeout_secs: u64,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            short_pickup_ms: 1_000,
            long_pickup_ms: 30_000,
            poll_timeout_secs: 60,
        }
    }
}

impl RelayConfig {
    pub fn short_pickup(&self) -> Duration {
        Duration::from_millis(self.short_pickup_ms)
    }

    pub fn long_pickup(&self) -> Duration {
        Duration::from_millis(self.long_pickup_ms)
    }

    pub fn poll_timeout(&self) -> Duration {
        Duration::from_secs(self.poll_timeout_secs)
    }
}

/// Reference cache configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CacheConfig {
    /// TTL after a confirmed match, warm-up, or /set_cached_reference.
    pub long_ttl_hours: u64,

    /// TTL for /set_short_cached_reference.
    pub short_ttl_hours: u64,

    /// Days of scanned references fetched from the primary at startup.
    pub warm_days: u32,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            long_ttl_hours: 72,
            short_ttl_hours: 12,
            warm_days: 30,
        }
    }
}

impl CacheConfig {
    pub fn long_ttl(&self) -> Duration {
        Duration::from_secs(self.long_ttl_hours.saturating_mul(3600))
    }

    pub fn short_ttl(&self) -> Duration {
        Duration::from_secs(self.short_ttl_hours.saturating_mul(3600))
    }
}

/// Retry configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Extra attempts after a transport failure.
    pub max_retries: u32,

    /// Linear backoff step in seconds.
    pub step_secs: u64,

    /// Upper bound for one request attempt, response body included.
    pub request_timeout_secs: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            step_secs: 2,
            request_timeout_secs: 30,
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Emit JSON lines instead of the pretty formatter.
    pub json_logs: bool,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            json_logs: false,
            metrics_enabled: false,
            metrics_address: "127.0.0.1:9090".to_string(),
        }
    }
}

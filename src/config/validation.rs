//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Require credentials for every configured server unless in mock mode
//! - Require a complete key pair when any login password is encrypted
//! - Validate value ranges (port range ordered, timeouts > 0)
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: BridgeConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use thiserror::Error;

use crate::config::schema::{BridgeConfig, ServerConfig};

/// A single semantic problem in the configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("{0} is required")]
    Missing(String),

    #[error("{field}: {reason}")]
    Invalid { field: String, reason: String },
}

fn invalid(field: &str, reason: impl Into<String>) -> ValidationError {
    ValidationError::Invalid {
        field: field.to_string(),
        reason: reason.into(),
    }
}

/// Validate a deserialized configuration.
pub fn validate_config(config: &BridgeConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if !config.mock_mode {
        match &config.primary_server {
            Some(server) => validate_server("primary_server", server, &mut errors),
            None => errors.push(ValidationError::Missing("primary_server".into())),
        }
        for (i, server) in config.alternative_servers.iter().enumerate() {
            validate_server(&format!("alternative_servers[{i}]"), server, &mut errors);
        }
    }

    match (&config.public_key, &config.private_key) {
        (Some(_), None) => errors.push(ValidationError::Missing("private_key".into())),
        (None, Some(_)) => errors.push(ValidationError::Missing("public_key".into())),
        _ => {}
    }

    let has_keys = config.public_key.is_some() && config.private_key.is_some();
    for (i, user) in config.login_users.iter().enumerate() {
        if user.username.is_empty() {
            errors.push(ValidationError::Missing(format!("login_users[{i}].username")));
        }
        if user.encrypted_password.is_some() && !has_keys {
            errors.push(invalid(
                &format!("login_users[{i}].encrypted_password"),
                "public_key and private_key are required to decrypt it",
            ));
        }
    }

    let listener = &config.listener;
    if listener.port_range_start == 0 {
        errors.push(invalid("listener.port_range_start", "must be greater than 0"));
    }
    if listener.port_range_start > listener.port_range_end {
        errors.push(invalid(
            "listener.port_range_end",
            "must not be lower than listener.port_range_start",
        ));
    }
    if listener.max_body_size == 0 {
        errors.push(invalid("listener.max_body_size", "must be greater than 0"));
    }

    let bridge = &config.bridge;
    if bridge.short_pickup_ms == 0 {
        errors.push(invalid("bridge.short_pickup_ms", "must be greater than 0"));
    }
    if bridge.long_pickup_ms < bridge.short_pickup_ms {
        errors.push(invalid(
            "bridge.long_pickup_ms",
            "must not be lower than bridge.short_pickup_ms",
        ));
    }
    if bridge.poll_timeout_secs == 0 {
        errors.push(invalid("bridge.poll_timeout_secs", "must be greater than 0"));
    }

    if config.retries.request_timeout_secs == 0 {
        errors.push(invalid("retries.request_timeout_secs", "must be greater than 0"));
    }

    if config.cache.long_ttl_hours == 0 {
        errors.push(invalid("cache.long_ttl_hours", "must be greater than 0"));
    }
    if config.cache.short_ttl_hours == 0 {
        errors.push(invalid("cache.short_ttl_hours", "must be greater than 0"));
    }

    if config.observability.metrics_enabled
        && config
            .observability
            .metrics_address
            .parse::<std::net::SocketAddr>()
            .is_err()
    {
        errors.push(invalid(
            "observability.metrics_address",
            "must be a socket address like 127.0.0.1:9090",
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn validate_server(prefix: &str, server: &ServerConfig, errors: &mut Vec<ValidationError>) {
    if server.server_location.is_empty() {
        errors.push(ValidationError::Missing(format!("{prefix}.server_location")));
    }
    if server.api_key_id.is_empty() {
        errors.push(ValidationError::Missing(format!("{prefix}.api_key_id")));
    }
    if server.api_key.is_empty() {
        errors.push(ValidationError::Missing(format!("{prefix}.api_key")));
    }
}

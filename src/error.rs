//! Error taxonomy shared by every subsystem.
//!
//! # Propagation
//! ```text
//! Transport  → retried inside upstream/ (resilience::retries), surfaced after the budget
//! Upstream   → surfaced once to the immediate caller
//! Protocol   → logged by the bridge, message dropped, connection stays alive
//! Superseded → designed outcome for a displaced fetch
//! Everything → converted to {"error": ..} + status at the control surface (http::response)
//! ```

use std::time::Duration;
use thiserror::Error;

/// Errors produced by the bridge.
#[derive(Debug, Error)]
pub enum BridgeError {
    /// Bad credentials, missing primary designation, unusable key pair.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Connection refused, DNS failure, timeout. Never an HTTP status.
    #[error("{message}, retried {retries} times")]
    Transport { message: String, retries: u32 },

    /// Upstream answered with a status in [400, 600).
    #[error("{message}")]
    Upstream { status: u16, message: String },

    /// Malformed frame, malformed correlation id, out-of-range connection index.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// A newer fetch displaced this one.
    #[error("request superseded by a newer server_request call")]
    Superseded,

    /// No command became available while the fetch was waiting.
    #[error("no command available within {0:?}")]
    FetchTimeout(Duration),

    /// A local request body could not be used.
    #[error("{0}")]
    InvalidInput(String),
}

/// Result type for bridge operations.
pub type BridgeResult<T> = Result<T, BridgeError>;

impl BridgeError {
    /// Build the upstream failure for a non-success response body.
    ///
    /// Uses the body's `error` field when it parses, otherwise keeps the raw body.
    pub fn from_upstream_body(status: u16, body: &[u8]) -> Self {
        #[derive(serde::Deserialize)]
        struct ErrorResponse {
            error: String,
        }

        match serde_json::from_slice::<ErrorResponse>(body) {
            Ok(parsed) => BridgeError::Upstream {
                status,
                message: parsed.error,
            },
            Err(_) => BridgeError::Upstream {
                status,
                message: format!(
                    "server returned {} code, with body {}",
                    status,
                    String::from_utf8_lossy(body)
                ),
            },
        }
    }
}

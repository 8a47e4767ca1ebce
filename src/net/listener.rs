//! TCP listener binding over a port range.

use std::io;
use tokio::net::TcpListener;

use crate::config::ListenerConfig;

/// Error type for listener operations.
#[derive(Debug)]
pub enum ListenerError {
    /// Failed to bind for a reason other than the port being taken.
    Bind { port: u16, source: io::Error },
    /// Every port in the range is taken.
    Exhausted { start: u16, end: u16 },
}

impl std::fmt::Display for ListenerError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ListenerError::Bind { port, source } => write!(f, "Failed to bind port {}: {}", port, source),
            ListenerError::Exhausted { start, end } => {
                write!(f, "No free port between {} and {}", start, end)
            }
        }
    }
}

impl std::error::Error for ListenerError {}

/// Bind the first free port of `config`'s range on its host.
pub async fn bind_first_free(config: &ListenerConfig) -> Result<TcpListener, ListenerError> {
    for port in config.port_range_start..=config.port_range_end {
        match TcpListener::bind((config.host.as_str(), port)).await {
            Ok(listener) => {
                tracing::info!(host = %config.host, port, "Listener bound");
                return Ok(listener);
            }
            Err(e) if e.kind() == io::ErrorKind::AddrInUse => {
                tracing::debug!(port, "Port in use, trying next");
            }
            Err(source) => return Err(ListenerError::Bind { port, source }),
        }
    }

    Err(ListenerError::Exhausted {
        start: config.port_range_start,
        end: config.port_range_end,
    })
}

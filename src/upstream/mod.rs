//! Upstream matching servers.
//!
//! # Data Flow
//! ```text
//! Credentials (from config)
//!     → pool.rs configure (validate, derive auth header, pick primary)
//!     → connection.rs ServerConnection per server
//!
//! REST:   get / post ──▶ resilience::RetryPolicy ──▶ reqwest
//! Socket: open_socket ──▶ tokio-tungstenite, reconnect schedule until connected
//! Fan-out: pool.fanout_post ──▶ every connection concurrently, primary authoritative
//! ```
//!
//! # Design Decisions
//! - The Authorization header is derived once, never per request
//! - One shared reqwest::Client keeps connection pooling across servers
//! - Any fan-out failure fails the whole call

pub mod connection;
pub mod pool;
pub mod types;

pub use connection::{Credentials, ServerConnection, SocketStream};
pub use pool::{ConnectionPool, FanoutResults};
pub use types::{ApiKeyInfo, ApiRole, ScanCvResponse};

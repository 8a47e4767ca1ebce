//! Network layer subsystem.
//!
//! # Data Flow
//! ```text
//! ListenerConfig (host, port range)
//!     → listener.rs (try each port in order, first free one wins)
//!     → TcpListener handed to http::HttpServer
//!     → bound address becomes SCRAPER_ADDRESS for the collector
//! ```
//!
//! # Design Decisions
//! - Ports already in use are skipped, any other bind error is fatal
//! - Loopback by default; the collector is a child process on the same host

pub mod listener;

pub use listener::{bind_first_free, ListenerError};

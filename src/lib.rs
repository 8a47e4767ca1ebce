//! Collector Bridge Library
//!
//! Sits between a scraper process and one or more matching servers: relays
//! socket commands to the scraper, routes its answers back, and forwards
//! scraped records while remembering which references were already sent.

pub mod bridge;
pub mod cache;
pub mod config;
pub mod crypto;
pub mod error;
pub mod health;
pub mod http;
pub mod lifecycle;
pub mod net;
pub mod observability;
pub mod records;
pub mod resilience;
pub mod upstream;

pub use config::schema::BridgeConfig;
pub use error::BridgeError;
pub use http::HttpServer;
pub use lifecycle::{Bridge, Shutdown};

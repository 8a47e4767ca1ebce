//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! All subsystems produce:
//!     → logging.rs (structured log events, fields like connection = idx)
//!     → metrics.rs (counters and gauges)
//!
//! Consumers:
//!     → stdout (pretty or JSON lines)
//!     → Prometheus scrape endpoint (optional)
//! ```
//!
//! # Design Decisions
//! - Request IDs on the control surface come from tower-http (see http::request)
//! - Metric updates are no-ops until a recorder is installed, so tests never need one

pub mod logging;
pub mod metrics;

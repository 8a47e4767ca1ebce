//! Liveness endpoint for process supervisors.
//!
//! # Data Flow
//! ```text
//! supervisor ──GET /──▶ 0.0.0.0:<health_check.port> ──▶ true
//! ```
//!
//! # Design Decisions
//! - Separate from the control surface so it can listen on all interfaces
//! - Reports process liveness only, upstream sessions are visible via /status

pub mod server;

pub use server::{health_router, serve_health};

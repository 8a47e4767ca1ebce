//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! REST call to an upstream:
//!     → retries.rs (transport failure? sleep attempt * step, try again)
//!     → after the budget: Transport error "... retried N times"
//!
//! Persistent socket dial:
//!     → backoff.rs reconnect schedule (1s, 2s, 4s, 10s, then 15s forever)
//! ```
//!
//! # Design Decisions
//! - HTTP status errors are never retried, only failures to get a response
//! - Socket reconnects never give up; only shutdown stops them
//! - Backoff sleeps run on the caller's task

pub mod backoff;
pub mod retries;

pub use backoff::{linear_backoff, reconnect_backoff};
pub use retries::{RetryError, RetryPolicy};

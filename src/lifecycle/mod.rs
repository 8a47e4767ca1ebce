//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (startup.rs):
//!     Keys → login users → pool configure → role check → cache warm-up
//!     → bind control surface → upstream sessions → health server
//!
//! Collector (collector.rs):
//!     spawn with SCRAPER_ADDRESS → wait → its exit code is ours
//!
//! Shutdown (shutdown.rs, signals.rs):
//!     Ctrl-C / SIGTERM or collector exit → broadcast → sessions drain, servers stop
//! ```
//!
//! # Design Decisions
//! - Fail fast: any startup error is fatal
//! - Subsystems initialize in order, not concurrently
//! - Listeners start last (traffic only when ready)
//! - Shutdown has a grace period, then remaining tasks are aborted

pub mod collector;
pub mod shutdown;
pub mod signals;
pub mod startup;

pub use collector::Collector;
pub use shutdown::Shutdown;
pub use startup::{Bridge, RunningBridge};

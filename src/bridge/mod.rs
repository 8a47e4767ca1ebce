//! Command relay between upstream sockets and the collector.
//!
//! # Data Flow
//! ```text
//! upstream socket i ──frame──▶ session.rs read loop (Listening)
//!     → correlation.rs: id "7" becomes "i-7"
//!     → per-connection delivery queue (read order)
//!     → handoff.rs offer, pickup deadline short/long (AwaitingPickup)
//!     → GET /server_request claims it (endpoint.rs fetch_next_command)
//!
//! POST /server_response ──▶ router.rs route_answer
//!     → parse "i-7", check i < connection count, restore id "7"
//!     → outbound queue i ──▶ session.rs writer task ──▶ upstream socket i
//! ```
//!
//! # Design Decisions
//! - One live fetch at a time; a newer fetch supersedes the waiting one
//! - Outbound queues are created once, one per connection, and never locked
//! - Undelivered commands are logged and dropped, the upstream is not told

pub mod correlation;
pub mod endpoint;
pub mod handoff;
pub mod router;
pub mod session;

pub use correlation::{CorrelatedMessage, CorrelationId, Envelope};
pub use endpoint::BridgeEndpoint;
pub use handoff::{CommandHandoff, PickupPolicy};
pub use router::CorrelationRouter;
pub use session::{SessionState, SessionStateCell, UpstreamSession};

//! Reference number cache.
//!
//! # Responsibilities
//! - Remember which record references were already submitted
//! - Expire entries after a per-entry TTL
//!
//! # Data Flow
//! ```text
//! /send_cv ──▶ exists(ref)? ──yes──▶ alreadySent
//!                 │ no
//!                 ▼
//!          pool fan-out ──match on primary──▶ put(ref, long TTL)
//!
//! startup warm-up ─────────────────────────▶ put(ref, long TTL)
//! /set_*_cached_reference ─────────────────▶ put(ref, long|short TTL)
//! ```
//!
//! # Design Decisions
//! - Expired entries are removed lazily on lookup, there is no sweeper task
//! - The TTL class is chosen by the caller, the cache only stores deadlines

pub mod reference;

pub use reference::ReferenceCache;

//! Record (CV) submission.
//!
//! # Data Flow
//! ```text
//! POST /send_cv body
//!     → Record::parse (object with a non-empty string referenceNumber)
//!     → cache hit? → {"alreadySent": true}
//!     → pool.fanout_post(scanCV) → primary hasMatches → cache put (long TTL)
//!     → {"alreadySent": false, "hasMatches": ..}
//! ```
//!
//! In mock mode there is no pool: every record counts as a match.

pub mod submit;

pub use submit::{Record, RecordSubmitter, SubmitOutcome};

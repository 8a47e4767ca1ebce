//! TTL map of record references.

use dashmap::DashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

use crate::observability::metrics;

/// Fallback horizon for TTLs too large to add to the current instant.
const FAR_FUTURE: Duration = Duration::from_secs(100 * 365 * 24 * 60 * 60);

/// A thread-safe reference cache.
///
/// Cloning is cheap and every clone sees the same entries.
#[derive(Clone, Default)]
pub struct ReferenceCache {
    /// Reference number -> instant after which the entry is gone.
    inner: Arc<DashMap<String, Instant>>,
}

impl std::fmt::Debug for ReferenceCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReferenceCache").field("len", &self.len()).finish()
    }
}

impl ReferenceCache {
    /// Create a new empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `reference` until `now + ttl`, replacing any previous deadline.
    pub fn put(&self, reference: impl Into<String>, ttl: Duration) {
        let now = Instant::now();
        let expiry = now
            .checked_add(ttl)
            .or_else(|| now.checked_add(FAR_FUTURE))
            .unwrap_or(now);
        self.inner.insert(reference.into(), expiry);
    }

    /// Whether `reference` is cached and not yet expired.
    ///
    /// An expired entry is removed as a side effect.
    pub fn exists(&self, reference: &str) -> bool {
        let now = Instant::now();
        let expired = self
            .inner
            .remove_if(reference, |_, expiry| now > *expiry)
            .is_some();
        let hit = !expired && self.inner.contains_key(reference);

        metrics::record_cache_lookup(hit);
        hit
    }

    /// Time left before `reference` expires, if it is cached.
    pub fn remaining(&self, reference: &str) -> Option<Duration> {
        let now = Instant::now();
        self.inner
            .get(reference)
            .and_then(|expiry| expiry.checked_duration_since(now))
    }

    /// Number of stored entries, expired ones included until looked up.
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}

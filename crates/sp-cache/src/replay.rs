//! Assertion replay cache.
//!
//! Remembers the ID of every accepted assertion until it expires so the same
//! assertion can never establish a second session.

use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

use crate::error::{CacheError, CacheResult};

/// Replay cache provider.
///
/// `insert_if_absent` is the only admission check: it must be a single atomic
/// operation so that two concurrent validations of the same assertion cannot
/// both observe "absent".
#[async_trait]
pub trait ReplayCache: Send + Sync {
    /// Records `id` until `expires_at`.
    ///
    /// Returns `true` if the ID was not present, or only present with an
    /// expiry at or before now, and is now recorded. Returns `false` if it is
    /// still live.
    async fn insert_if_absent(&self, id: &str, expires_at: DateTime<Utc>) -> CacheResult<bool>;

    /// Removes entries whose expiry is at or before `now`.
    ///
    /// Returns the number of entries removed.
    async fn purge_expired(&self, now: DateTime<Utc>) -> CacheResult<usize>;

    /// Returns the number of live entries.
    async fn len(&self) -> CacheResult<usize>;
}

/// Number of inserts between opportunistic purges.
const PURGE_INTERVAL: u64 = 1024;

/// In-process replay cache backed by a sharded concurrent map.
#[derive(Debug)]
pub struct InMemoryReplayCache {
    entries: DashMap<String, DateTime<Utc>>,
    max_entries: usize,
    inserts: AtomicU64,
}

impl InMemoryReplayCache {
    /// Default maximum number of remembered assertion IDs.
    pub const DEFAULT_MAX_ENTRIES: usize = 1_000_000;

    /// Creates an empty cache with the default capacity.
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(Self::DEFAULT_MAX_ENTRIES)
    }

    /// Creates an empty cache holding at most `max_entries` IDs.
    #[must_use]
    pub fn with_capacity(max_entries: usize) -> Self {
        Self {
            entries: DashMap::new(),
            max_entries,
            inserts: AtomicU64::new(0),
        }
    }

    fn purge_before(&self, now: DateTime<Utc>) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, expires_at| *expires_at > now);
        before.saturating_sub(self.entries.len())
    }
}

impl Default for InMemoryReplayCache {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ReplayCache for InMemoryReplayCache {
    async fn insert_if_absent(&self, id: &str, expires_at: DateTime<Utc>) -> CacheResult<bool> {
        let now = Utc::now();
        let count = self.inserts.fetch_add(1, Ordering::Relaxed) + 1;
        if count % PURGE_INTERVAL == 0 || self.entries.len() >= self.max_entries {
            let removed = self.purge_before(now);
            if removed > 0 {
                tracing::debug!(removed, "purged expired replay cache entries");
            }
        }

        // len() locks every shard, so it must not run while an entry guard is held
        let full = self.entries.len() >= self.max_entries;

        match self.entries.entry(id.to_string()) {
            Entry::Occupied(mut expired) if *expired.get() <= now => {
                expired.insert(expires_at);
                Ok(true)
            }
            Entry::Occupied(_) => Ok(false),
            Entry::Vacant(_) if full => Err(CacheError::CapacityExceeded(self.max_entries)),
            Entry::Vacant(vacant) => {
                vacant.insert(expires_at);
                Ok(true)
            }
        }
    }

    async fn purge_expired(&self, now: DateTime<Utc>) -> CacheResult<usize> {
        Ok(self.purge_before(now))
    }

    async fn len(&self) -> CacheResult<usize> {
        Ok(self.entries.len())
    }
}

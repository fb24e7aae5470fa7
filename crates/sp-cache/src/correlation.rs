//! Pending request correlation.
//!
//! Every outbound AuthnRequest or LogoutRequest leaves a correlation record
//! behind. The matching response consumes it exactly once.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use dashmap::DashMap;

use crate::error::CacheResult;

/// Store of outstanding request IDs.
#[async_trait]
pub trait CorrelationStore: Send + Sync {
    /// Records `id` as outstanding for `ttl`.
    async fn put(&self, id: &str, ttl: Duration) -> CacheResult<()>;

    /// Atomically removes `id`.
    ///
    /// Returns `true` only if the record was present and had not expired.
    async fn take_if_present(&self, id: &str) -> CacheResult<bool>;

    /// Removes expired records, returning how many were removed.
    async fn purge_expired(&self) -> CacheResult<usize>;
}

/// In-process correlation store.
#[derive(Debug, Default)]
pub struct InMemoryCorrelationStore {
    pending: DashMap<String, Instant>,
}

impl InMemoryCorrelationStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CorrelationStore for InMemoryCorrelationStore {
    async fn put(&self, id: &str, ttl: Duration) -> CacheResult<()> {
        self.pending.insert(id.to_string(), Instant::now() + ttl);
        Ok(())
    }

    async fn take_if_present(&self, id: &str) -> CacheResult<bool> {
        Ok(self
            .pending
            .remove(id)
            .is_some_and(|(_, deadline)| Instant::now() < deadline))
    }

    async fn purge_expired(&self) -> CacheResult<usize> {
        let now = Instant::now();
        let before = self.pending.len();
        self.pending.retain(|_, deadline| *deadline > now);
        Ok(before.saturating_sub(self.pending.len()))
    }
}

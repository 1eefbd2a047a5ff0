// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! TTL-bounded cache around a fallible fetch.
//!
//! Each cached artifact (key set, token config, revocation list) gets its own
//! [`CachedFetcher`] with its own TTL. The lock is only held to read or swap
//! the snapshot, never across the fetch itself, so concurrent misses may fetch
//! redundantly and the last writer wins.
//!
//! Fan-out is bounded by the callers that miss while a fetch is in flight:
//! each of them fetches at most once, and the first stored value ends the
//! window. A cold validator hit by N callers at once can therefore send up
//! to N requests per artifact. Waiting on a shared in-flight fetch would
//! instead queue every caller behind one slow or failing issuer request.

use std::future::Future;
use std::sync::{PoisonError, RwLock};
use std::time::{Duration, Instant};

/// A fetched value and when it was fetched.
#[derive(Debug, Clone)]
pub struct CachedArtifact<T> {
    pub value: T,
    pub fetched_at: Instant,
}

impl<T> CachedArtifact<T> {
    pub fn new(value: T) -> Self {
        Self {
            value,
            fetched_at: Instant::now(),
        }
    }

    pub fn is_fresh(&self, ttl: Duration) -> bool {
        self.fetched_at.elapsed() < ttl
    }
}

/// Single-slot cache for one artifact kind.
#[derive(Debug)]
pub struct CachedFetcher<T> {
    name: &'static str,
    ttl: Duration,
    slot: RwLock<Option<CachedArtifact<T>>>,
}

impl<T: Clone> CachedFetcher<T> {
    /// Create an empty cache. `name` only appears in logs.
    pub fn new(name: &'static str, ttl: Duration) -> Self {
        Self {
            name,
            ttl,
            slot: RwLock::new(None),
        }
    }

    /// Return the cached value if it is still fresh.
    pub fn fresh(&self) -> Option<T> {
        let slot = self.slot.read().unwrap_or_else(PoisonError::into_inner);
        slot.as_ref()
            .filter(|entry| entry.is_fresh(self.ttl))
            .map(|entry| entry.value.clone())
    }

    /// Return the cached value, or run `fetch` and cache its result.
    ///
    /// Fetch failures are returned as-is and leave the slot untouched.
    pub async fn get_or_fetch<F, Fut, E>(&self, fetch: F) -> Result<T, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        if let Some(value) = self.fresh() {
            tracing::debug!(cache = self.name, "cache hit");
            return Ok(value);
        }

        tracing::debug!(cache = self.name, "cache miss, fetching");
        let value = fetch().await?;
        self.store(value.clone());
        Ok(value)
    }

    /// Replace the cached value, stamping it with the current time.
    pub fn store(&self, value: T) {
        let mut slot = self.slot.write().unwrap_or_else(PoisonError::into_inner);
        *slot = Some(CachedArtifact::new(value));
    }

    /// Drop the cached value without fetching.
    pub fn invalidate(&self) {
        let mut slot = self.slot.write().unwrap_or_else(PoisonError::into_inner);
        *slot = None;
    }
}

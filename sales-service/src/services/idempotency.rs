//! Response cache for `Idempotency-Key` replays.

use axum::body::Bytes;
use axum::http::StatusCode;
use dashmap::DashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// A response captured for replay.
#[derive(Debug, Clone)]
pub struct CachedResponse {
    pub status: StatusCode,
    pub content_type: Option<String>,
    pub body: Bytes,
    expires_at: Instant,
}

impl CachedResponse {
    fn is_expired(&self, now: Instant) -> bool {
        now >= self.expires_at
    }
}

/// Process-local TTL cache keyed by the client's idempotency key.
#[derive(Clone)]
pub struct IdempotencyCache {
    entries: Arc<DashMap<String, CachedResponse>>,
    ttl: Duration,
}

impl IdempotencyCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: Arc::new(DashMap::new()),
            ttl,
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Live entry for `key`. Expired entries are removed and reported as absent.
    pub fn get(&self, key: &str) -> Option<CachedResponse> {
        let now = Instant::now();
        let entry = self.entries.get(key).map(|entry| entry.value().clone())?;

        if entry.is_expired(now) {
            self.entries.remove_if(key, |_, cached| cached.is_expired(now));
            return None;
        }
        Some(entry)
    }

    pub fn insert(
        &self,
        key: impl Into<String>,
        status: StatusCode,
        content_type: Option<String>,
        body: Bytes,
    ) {
        self.entries.insert(
            key.into(),
            CachedResponse {
                status,
                content_type,
                body,
                expires_at: Instant::now() + self.ttl,
            },
        );
    }

    /// Drop expired entries; returns how many were removed.
    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let before = self.entries.len();
        self.entries.retain(|_, cached| !cached.is_expired(now));
        before.saturating_sub(self.entries.len())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Periodically purge expired entries. Runs until the task is aborted.
pub async fn run_sweeper(cache: IdempotencyCache, every: Duration) {
    let mut ticker = tokio::time::interval(every);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    loop {
        ticker.tick().await;
        let removed = cache.purge_expired();
        if removed > 0 {
            tracing::debug!(removed = removed, remaining = cache.len(), "Purged idempotency entries");
        }
    }
}

//! Concurrent TTL cache, backed by `dashmap`.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use dashmap::DashMap;

use crate::error::Result;

use super::{Cache, CacheStats};

struct Entry {
    value: Vec<u8>,
    expires_at: Instant,
}

/// In-process cache used for relevance-score and query-result caching.
///
/// Expiry is checked lazily on read; there is no background sweeper, which
/// matches the spec's "best-effort" cache invalidation requirement.
pub struct DashMapCache {
    entries: DashMap<String, Entry>,
    hits: AtomicU64,
    misses: AtomicU64,
    invalidations: AtomicU64,
}

impl DashMapCache {
    pub fn new() -> Self {
        Self {
            entries: DashMap::new(),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            invalidations: AtomicU64::new(0),
        }
    }
}

impl Default for DashMapCache {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Cache for DashMapCache {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let Some(entry) = self.entries.get(key) else {
            self.misses.fetch_add(1, Ordering::Relaxed);
            return Ok(None);
        };
        if Instant::now() >= entry.expires_at {
            drop(entry);
            self.entries.remove(key);
            self.misses.fetch_add(1, Ordering::Relaxed);
            return Ok(None);
        }
        self.hits.fetch_add(1, Ordering::Relaxed);
        Ok(Some(entry.value.clone()))
    }

    async fn setex(&self, key: &str, value: Vec<u8>, ttl_secs: u64) -> Result<()> {
        self.entries.insert(
            key.to_string(),
            Entry { value, expires_at: Instant::now() + Duration::from_secs(ttl_secs) },
        );
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        if self.entries.remove(key).is_some() {
            self.invalidations.fetch_add(1, Ordering::Relaxed);
        }
        Ok(())
    }

    async fn delete_prefix(&self, prefix: &str) -> Result<u64> {
        let keys: Vec<String> = self
            .entries
            .iter()
            .filter(|e| e.key().starts_with(prefix))
            .map(|e| e.key().clone())
            .collect();
        let count = keys.len() as u64;
        for key in keys {
            self.entries.remove(&key);
        }
        self.invalidations.fetch_add(count, Ordering::Relaxed);
        Ok(count)
    }

    fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            invalidations: self.invalidations.load(Ordering::Relaxed),
        }
    }
}

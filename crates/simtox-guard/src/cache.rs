//! TTL + LRU response cache.
//!
//! Entries are immutable once inserted and handed out as `Arc`s, so a reader
//! only holds the read lock long enough to clone the pointer. Recency is
//! tracked with an atomic stamp on each entry so lookups never need the write
//! lock. Expired entries are dropped lazily on the next insert.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

use serde_json::Value;
use tokio::time::Instant;

/// A cached provider response.
#[derive(Debug)]
pub struct CacheEntry {
    pub key: String,
    pub value: Arc<Value>,
    pub fetched_at: Instant,
    pub ttl: Duration,
    last_used: AtomicU64,
}

impl CacheEntry {
    /// Whether the entry has outlived its TTL at `now`.
    #[must_use]
    pub fn is_expired(&self, now: Instant) -> bool {
        now.duration_since(self.fetched_at) >= self.ttl
    }
}

#[derive(Debug)]
pub struct ResponseCache {
    entries: RwLock<HashMap<String, Arc<CacheEntry>>>,
    ttl: Duration,
    capacity: usize,
    clock: AtomicU64,
}

impl ResponseCache {
    #[must_use]
    pub fn new(ttl: Duration, capacity: usize) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            ttl,
            capacity: capacity.max(1),
            clock: AtomicU64::new(0),
        }
    }

    /// Look up an unexpired entry.
    pub fn get(&self, key: &str) -> Option<Arc<CacheEntry>> {
        let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        let entry = entries.get(key)?;
        if entry.is_expired(Instant::now()) {
            return None;
        }
        entry.last_used.store(self.tick(), Ordering::Relaxed);
        Some(Arc::clone(entry))
    }

    /// Store a value, evicting expired entries and then the least recently
    /// used one if the cache is full.
    pub fn insert(&self, key: &str, value: Arc<Value>) {
        let now = Instant::now();
        let entry = Arc::new(CacheEntry {
            key: key.to_string(),
            value,
            fetched_at: now,
            ttl: self.ttl,
            last_used: AtomicU64::new(self.tick()),
        });

        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        entries.retain(|_, e| !e.is_expired(now));

        if entries.len() >= self.capacity && !entries.contains_key(key) {
            let oldest = entries
                .iter()
                .min_by_key(|(_, e)| e.last_used.load(Ordering::Relaxed))
                .map(|(k, _)| k.clone());
            if let Some(oldest) = oldest {
                tracing::debug!(key = %oldest, "cache: evicting least recently used entry");
                entries.remove(&oldest);
            }
        }
        entries.insert(key.to_string(), entry);
    }

    /// Number of stored entries, expired ones included until the next insert.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn tick(&self) -> u64 {
        self.clock.fetch_add(1, Ordering::Relaxed)
    }
}

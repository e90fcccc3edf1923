//! ETag-aware response cache port.

use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use bytes::Bytes;
use dashmap::DashMap;
use tracing::debug;

/// A cached payload and the validator it was served with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheEntry {
    /// Response body.
    pub data: Bytes,
    /// ETag of the response, empty when the server sent none.
    pub etag: String,
}

/// Cache consulted before and updated after each fetch attempt.
///
/// Keys are fully-resolved request URLs. Implementations must be safe for
/// concurrent use when a client is shared.
#[async_trait]
pub trait Cache: Send + Sync {
    /// Look up a cached entry.
    async fn get(&self, key: &str) -> Option<CacheEntry>;

    /// Store an entry, replacing any previous one.
    async fn put(&self, key: &str, entry: CacheEntry);
}

/// Cache statistics.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub size: u64,
    pub evictions: u64,
}

impl CacheStats {
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

/// In-process [`Cache`]. Nothing is persisted.
pub struct MemoryCache {
    entries: DashMap<String, CacheEntry>,
    max_entries: Option<usize>,
    hits: AtomicU64,
    misses: AtomicU64,
    evictions: AtomicU64,
}

impl MemoryCache {
    /// Create an unbounded cache.
    pub fn new() -> Self {
        Self {
            entries: DashMap::new(),
            max_entries: None,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            evictions: AtomicU64::new(0),
        }
    }

    /// Create a cache holding at most `max_entries` entries.
    pub fn with_capacity(max_entries: usize) -> Self {
        Self {
            max_entries: Some(max_entries.max(1)),
            ..Self::new()
        }
    }

    /// Number of cached entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drop every entry.
    pub fn clear(&self) {
        self.entries.clear();
        debug!("cache cleared");
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            size: self.entries.len() as u64,
            evictions: self.evictions.load(Ordering::Relaxed),
        }
    }

    /// Evict an arbitrary entry if inserting `key` would exceed capacity.
    fn evict_if_needed(&self, key: &str) {
        let Some(max) = self.max_entries else {
            return;
        };
        if self.entries.len() < max || self.entries.contains_key(key) {
            return;
        }
        let victim = self.entries.iter().next().map(|entry| entry.key().clone());
        if let Some(victim) = victim {
            self.entries.remove(&victim);
            self.evictions.fetch_add(1, Ordering::Relaxed);
            debug!(key = %victim, "cache evict");
        }
    }
}

impl Default for MemoryCache {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Cache for MemoryCache {
    async fn get(&self, key: &str) -> Option<CacheEntry> {
        match self.entries.get(key) {
            Some(entry) => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                debug!(key = key, "cache hit");
                Some(entry.value().clone())
            }
            None => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                debug!(key = key, "cache miss");
                None
            }
        }
    }

    async fn put(&self, key: &str, entry: CacheEntry) {
        self.evict_if_needed(key);
        debug!(key = key, bytes = entry.data.len(), etag = %entry.etag, "cache put");
        self.entries.insert(key.to_string(), entry);
    }
}

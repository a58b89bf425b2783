//! Backing cache store contract and the bundled in-memory implementation.

use std::sync::RwLock;
use std::time::{Duration, Instant};

use lru::LruCache;
use metrics::counter;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::trace;

use crate::domain::Attributes;

use super::config::StoreConfig;
use super::lock::{rw_read, rw_write};

const SOURCE: &str = "cache::store";

pub(crate) const METRIC_STORE_EVICT_TOTAL: &str = "rowcache_store_evict_total";

/// Value held under one cache key.
///
/// Snapshots serialize as `{"attributes": {...}}`; counters serialize as a
/// bare integer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CacheEntry {
    Counter(i64),
    Snapshot { attributes: Attributes },
}

impl CacheEntry {
    pub fn snapshot(attributes: Attributes) -> Self {
        CacheEntry::Snapshot { attributes }
    }

    pub fn as_counter(&self) -> Option<i64> {
        match self {
            CacheEntry::Counter(value) => Some(*value),
            CacheEntry::Snapshot { .. } => None,
        }
    }

    pub fn into_attributes(self) -> Option<Attributes> {
        match self {
            CacheEntry::Snapshot { attributes } => Some(attributes),
            CacheEntry::Counter(_) => None,
        }
    }
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("cache entry `{key}` does not hold a numeric value")]
    NotNumeric { key: String },
    #[error("counter `{key}` overflowed")]
    Overflow { key: String },
    #[error("cache store unavailable: {0}")]
    Unavailable(String),
}

impl StoreError {
    pub fn unavailable(err: impl std::fmt::Display) -> Self {
        Self::Unavailable(err.to_string())
    }
}

/// Capability contract of a backing cache store.
///
/// Implementations must make `increment` and `fetch` atomic per key; the
/// engine adds no locking of its own.
pub trait CacheStore: Send + Sync {
    /// Upsert `entry` under `key`, expiring after `ttl` when given.
    fn write(&self, key: &str, entry: CacheEntry, ttl: Option<Duration>) -> Result<(), StoreError>;

    /// Read `key`; absent and expired keys are both `None`.
    fn read(&self, key: &str) -> Result<Option<CacheEntry>, StoreError>;

    /// Remove `key`; missing keys are not an error.
    fn delete(&self, key: &str) -> Result<(), StoreError>;

    /// Atomically add `amount` to the counter under `key` and return the total.
    fn increment(&self, key: &str, amount: i64) -> Result<i64, StoreError>;

    /// Return the entry under `key`, storing `default()` first when absent.
    fn fetch<F>(&self, key: &str, ttl: Option<Duration>, default: F) -> Result<CacheEntry, StoreError>
    where
        F: FnOnce() -> CacheEntry;
}

#[derive(Debug, Clone)]
struct StoredEntry {
    entry: CacheEntry,
    expires_at: Option<Instant>,
}

impl StoredEntry {
    fn new(entry: CacheEntry, ttl: Option<Duration>) -> Self {
        Self {
            entry,
            expires_at: ttl.map(|ttl| Instant::now() + ttl),
        }
    }

    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.is_some_and(|expires_at| now >= expires_at)
    }
}

/// In-process [`CacheStore`] with LRU eviction and per-entry expiry.
pub struct MemoryStore {
    entries: RwLock<LruCache<String, StoredEntry>>,
}

impl MemoryStore {
    /// Create a new memory store with the given configuration.
    pub fn new(config: &StoreConfig) -> Self {
        Self {
            entries: RwLock::new(LruCache::new(config.capacity_non_zero())),
        }
    }

    /// Get the number of stored entries, expired ones included.
    pub fn len(&self) -> usize {
        rw_read(&self.entries, SOURCE, "len").len()
    }

    /// Check if the store is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop every entry.
    pub fn clear(&self) {
        rw_write(&self.entries, SOURCE, "clear").clear();
    }

    fn insert(entries: &mut LruCache<String, StoredEntry>, key: &str, stored: StoredEntry) {
        if let Some((evicted, _)) = entries.push(key.to_string(), stored) {
            // push hands back the replaced pair when the key was already present
            if evicted != key {
                trace!(key = evicted.as_str(), "Evicted cache entry");
                counter!(METRIC_STORE_EVICT_TOTAL).increment(1);
            }
        }
    }

    fn live<'a>(
        entries: &'a mut LruCache<String, StoredEntry>,
        key: &str,
    ) -> Option<&'a mut StoredEntry> {
        let now = Instant::now();
        if entries.peek(key).is_some_and(|stored| stored.is_expired(now)) {
            entries.pop(key);
            return None;
        }
        entries.get_mut(key)
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new(&StoreConfig::default())
    }
}

impl CacheStore for MemoryStore {
    fn write(&self, key: &str, entry: CacheEntry, ttl: Option<Duration>) -> Result<(), StoreError> {
        let mut entries = rw_write(&self.entries, SOURCE, "write");
        Self::insert(&mut entries, key, StoredEntry::new(entry, ttl));
        Ok(())
    }

    fn read(&self, key: &str) -> Result<Option<CacheEntry>, StoreError> {
        let mut entries = rw_write(&self.entries, SOURCE, "read");
        Ok(Self::live(&mut entries, key).map(|stored| stored.entry.clone()))
    }

    fn delete(&self, key: &str) -> Result<(), StoreError> {
        rw_write(&self.entries, SOURCE, "delete").pop(key);
        Ok(())
    }

    fn increment(&self, key: &str, amount: i64) -> Result<i64, StoreError> {
        let mut entries = rw_write(&self.entries, SOURCE, "increment");
        match Self::live(&mut entries, key) {
            Some(stored) => {
                let current = stored.entry.as_counter().ok_or_else(|| StoreError::NotNumeric {
                    key: key.to_string(),
                })?;
                let total = current
                    .checked_add(amount)
                    .ok_or_else(|| StoreError::Overflow {
                        key: key.to_string(),
                    })?;
                stored.entry = CacheEntry::Counter(total);
                Ok(total)
            }
            None => {
                Self::insert(
                    &mut entries,
                    key,
                    StoredEntry::new(CacheEntry::Counter(amount), None),
                );
                Ok(amount)
            }
        }
    }

    fn fetch<F>(&self, key: &str, ttl: Option<Duration>, default: F) -> Result<CacheEntry, StoreError>
    where
        F: FnOnce() -> CacheEntry,
    {
        let mut entries = rw_write(&self.entries, SOURCE, "fetch");
        if let Some(stored) = Self::live(&mut entries, key) {
            return Ok(stored.entry.clone());
        }
        let entry = default();
        Self::insert(&mut entries, key, StoredEntry::new(entry.clone(), ttl));
        Ok(entry)
    }
}

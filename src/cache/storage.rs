//! Storage Contract Module
//!
//! The five-operation interface the server front end talks to, and a
//! mutex-guarded single shard implementing it.

use parking_lot::Mutex;

use crate::cache::{CacheStats, SimpleLru};
use crate::error::StoreError;

// == Storage Trait ==
/// Thread-safe key-value storage.
///
/// Capacity is charged as `key.len() + value.len()` bytes. Misses and
/// rejections are ordinary `Err` values, never panics.
pub trait Storage: Send + Sync {
    /// Unconditional upsert.
    fn put(&self, key: &str, value: &str) -> Result<(), StoreError>;

    /// Insert only if `key` is absent.
    fn put_if_absent(&self, key: &str, value: &str) -> Result<(), StoreError>;

    /// Replace only if `key` is present.
    fn set(&self, key: &str, value: &str) -> Result<(), StoreError>;

    /// Remove `key`.
    fn delete(&self, key: &str) -> Result<(), StoreError>;

    /// Read `key`, counting the read as a use.
    fn get(&self, key: &str) -> Result<String, StoreError>;

    /// Snapshot of hit/miss/eviction counters and occupancy.
    fn stats(&self) -> CacheStats;
}

// == Locked LRU ==
/// A [`SimpleLru`] behind its own mutex.
///
/// Used on its own as an unsharded store, and as one shard of
/// [`ShardedLru`](crate::cache::ShardedLru). The lock is held for exactly
/// one operation, so the size counter and the list never disagree for an
/// observer.
#[derive(Debug)]
pub struct LockedLru {
    inner: Mutex<SimpleLru>,
}

impl LockedLru {
    pub fn new(max_size: usize) -> Self {
        Self {
            inner: Mutex::new(SimpleLru::new(max_size)),
        }
    }

    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().is_empty()
    }

    pub fn max_size(&self) -> usize {
        self.inner.lock().max_size()
    }

    pub fn clear(&self) {
        self.inner.lock().clear();
    }

    /// Runs `f` with exclusive access to the underlying cache.
    #[cfg(test)]
    pub(crate) fn with<R>(&self, f: impl FnOnce(&mut SimpleLru) -> R) -> R {
        let mut guard = self.inner.lock();
        f(&mut *guard)
    }
}

impl Storage for LockedLru {
    fn put(&self, key: &str, value: &str) -> Result<(), StoreError> {
        self.inner.lock().put(key, value)
    }

    fn put_if_absent(&self, key: &str, value: &str) -> Result<(), StoreError> {
        self.inner.lock().put_if_absent(key, value)
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        self.inner.lock().set(key, value)
    }

    fn delete(&self, key: &str) -> Result<(), StoreError> {
        self.inner.lock().delete(key)
    }

    fn get(&self, key: &str) -> Result<String, StoreError> {
        self.inner.lock().get(key)
    }

    fn stats(&self) -> CacheStats {
        self.inner.lock().stats()
    }
}

//! Sharded Cache Module
//!
//! Splits the keyspace over independently locked LRU shards.
//!
//! A key always lands on the same shard: the index is a fixed-seed hash of
//! the key modulo the shard count. Recency is tracked per shard only, so the
//! entry evicted is the least recently used *within its shard*.

use std::hash::Hasher;

use rustc_hash::FxHasher;
use tracing::info;

use crate::cache::{CacheStats, LockedLru, Storage};
use crate::error::{ConfigError, StoreError};

// == Public Constants ==
/// Smallest capacity a single shard may be built with (16 MiB).
pub const MIN_SHARD_SIZE: usize = 16 * 1024 * 1024;

// == Sharded LRU ==
/// Fixed table of [`LockedLru`] shards addressed by key hash.
#[derive(Debug)]
pub struct ShardedLru {
    shards: Vec<LockedLru>,
}

impl ShardedLru {
    // == Build ==
    /// Builds `stripe_count` shards sharing `max_size` bytes between them.
    ///
    /// Each shard gets `max_size / stripe_count` bytes (rounded down).
    ///
    /// # Errors
    /// - `ConfigError::NoStripes` if `stripe_count` is zero
    /// - `ConfigError::TooManyStripes` if a shard would get less than
    ///   [`MIN_SHARD_SIZE`]
    pub fn build(stripe_count: usize, max_size: usize) -> Result<Self, ConfigError> {
        if stripe_count == 0 {
            return Err(ConfigError::NoStripes);
        }

        let shard_size = max_size / stripe_count;
        if shard_size < MIN_SHARD_SIZE {
            return Err(ConfigError::TooManyStripes {
                shard_size,
                min_shard_size: MIN_SHARD_SIZE,
            });
        }

        let shards = (0..stripe_count)
            .map(|_| LockedLru::new(shard_size))
            .collect();

        info!(stripe_count, shard_size, "sharded cache built");
        Ok(Self { shards })
    }

    // == Shard Routing ==
    /// Index of the shard owning `key`.
    pub fn shard_for(&self, key: &str) -> usize {
        shard_index(key, self.shards.len())
    }

    fn shard(&self, key: &str) -> &LockedLru {
        &self.shards[self.shard_for(key)]
    }

    pub fn shard_count(&self) -> usize {
        self.shards.len()
    }

    /// Capacity of each shard in bytes.
    pub fn shard_size(&self) -> usize {
        self.shards.first().map_or(0, LockedLru::max_size)
    }

    /// Per-shard statistics, in shard order.
    pub fn shard_stats(&self) -> Vec<CacheStats> {
        self.shards.iter().map(Storage::stats).collect()
    }

    /// Total entries across shards. Shards are locked one at a time, so
    /// the figure is approximate under concurrent writes.
    pub fn len(&self) -> usize {
        self.shards.iter().map(LockedLru::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.shards.iter().all(LockedLru::is_empty)
    }

    pub fn clear(&self) {
        for shard in &self.shards {
            shard.clear();
        }
    }
}

impl Storage for ShardedLru {
    fn put(&self, key: &str, value: &str) -> Result<(), StoreError> {
        self.shard(key).put(key, value)
    }

    fn put_if_absent(&self, key: &str, value: &str) -> Result<(), StoreError> {
        self.shard(key).put_if_absent(key, value)
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        self.shard(key).set(key, value)
    }

    fn delete(&self, key: &str) -> Result<(), StoreError> {
        self.shard(key).delete(key)
    }

    fn get(&self, key: &str) -> Result<String, StoreError> {
        self.shard(key).get(key)
    }

    fn stats(&self) -> CacheStats {
        let mut total = CacheStats::new();
        for shard in &self.shards {
            total.merge(&shard.stats());
        }
        total
    }
}

/// Pure key-to-shard mapping, stable across calls and processes.
pub fn shard_index(key: &str, stripe_count: usize) -> usize {
    let mut hasher = FxHasher::default();
    hasher.write(key.as_bytes());
    (hasher.finish() % stripe_count as u64) as usize
}

//! Cache Module
//!
//! Provides a byte-bounded LRU cache and a sharded wrapper for concurrent access.

mod entry;
mod lru;
mod sharded;
mod stats;
mod storage;

#[cfg(test)]
mod property_tests;

// Re-export public types
pub(crate) use entry::LruNode;
pub use lru::{Iter, SimpleLru};
pub use sharded::{shard_index, ShardedLru, MIN_SHARD_SIZE};
pub use stats::CacheStats;
pub use storage::{LockedLru, Storage};

// == Public Constants ==
/// Maximum allowed key length in bytes (the memcached limit)
pub const MAX_KEY_LENGTH: usize = 250;

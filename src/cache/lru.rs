//! Bounded LRU Module
//!
//! Implements a byte-bounded Least Recently Used cache for one shard.
//!
//! Entries live in an arena (`Vec<LruNode>`) and are linked into a recency
//! list by slot index:
//! - Head = Most recently used
//! - Tail = Least recently used
//!
//! Vacated slots are kept on a free list and reused by later inserts.

use std::collections::HashMap;

use tracing::debug;

use crate::cache::{CacheStats, LruNode};
use crate::error::StoreError;

// == Simple LRU ==
/// Single-shard LRU cache bounded by `Σ(len(key) + len(value))`.
///
/// Not synchronized; wrap it in a lock (see [`LockedLru`](crate::cache::LockedLru))
/// to share it between threads.
#[derive(Debug)]
pub struct SimpleLru {
    /// Maximum bytes of keys plus values
    max_size: usize,
    /// Bytes currently charged
    filled_size: usize,
    /// Node arena; vacant slots are listed in `free`
    nodes: Vec<LruNode>,
    /// Reusable slots
    free: Vec<usize>,
    /// Key to slot lookup
    index: HashMap<String, usize>,
    /// Most recently used slot
    head: Option<usize>,
    /// Least recently used slot
    tail: Option<usize>,
    /// Performance statistics
    stats: CacheStats,
}

impl SimpleLru {
    // == Constructor ==
    /// Creates an empty cache holding at most `max_size` bytes.
    pub fn new(max_size: usize) -> Self {
        Self {
            max_size,
            filled_size: 0,
            nodes: Vec::new(),
            free: Vec::new(),
            index: HashMap::new(),
            head: None,
            tail: None,
            stats: CacheStats::new(),
        }
    }

    // == Put ==
    /// Inserts or replaces the value for `key`, promoting it to most recent.
    ///
    /// Other entries are evicted from the tail until the new size fits.
    /// An entry larger than the whole cache is rejected without mutation.
    pub fn put(&mut self, key: &str, value: &str) -> Result<(), StoreError> {
        self.check_size(key, value)?;
        match self.index.get(key).copied() {
            Some(slot) => self.update(slot, value),
            None => self.insert(key, value),
        }
        Ok(())
    }

    // == Put If Absent ==
    /// Inserts only when `key` is not resident. Never touches an existing entry.
    pub fn put_if_absent(&mut self, key: &str, value: &str) -> Result<(), StoreError> {
        if self.index.contains_key(key) {
            return Err(StoreError::AlreadyExists);
        }
        self.check_size(key, value)?;
        self.insert(key, value);
        Ok(())
    }

    // == Set ==
    /// Replaces the value of a resident key, promoting it to most recent.
    pub fn set(&mut self, key: &str, value: &str) -> Result<(), StoreError> {
        let slot = *self.index.get(key).ok_or(StoreError::NotFound)?;
        self.check_size(key, value)?;
        self.update(slot, value);
        Ok(())
    }

    // == Delete ==
    /// Removes `key` and releases the bytes it was charged.
    pub fn delete(&mut self, key: &str) -> Result<(), StoreError> {
        let slot = self.index.remove(key).ok_or(StoreError::NotFound)?;
        self.release(slot);
        Ok(())
    }

    // == Get ==
    /// Returns a copy of the value and promotes the entry to most recent.
    ///
    /// Every read counts as a use: a hot key read often enough is never the
    /// eviction candidate.
    pub fn get(&mut self, key: &str) -> Result<String, StoreError> {
        match self.index.get(key).copied() {
            Some(slot) => {
                self.move_to_head(slot);
                self.stats.record_hit();
                Ok(self.nodes[slot].value.clone())
            }
            None => {
                self.stats.record_miss();
                Err(StoreError::NotFound)
            }
        }
    }

    // == Contains ==
    /// Checks residency without counting as a use.
    pub fn contains(&self, key: &str) -> bool {
        self.index.contains_key(key)
    }

    // == Iter ==
    /// Iterates entries from most to least recently used.
    pub fn iter(&self) -> Iter<'_> {
        Iter {
            nodes: &self.nodes,
            cursor: self.head,
        }
    }

    // == Length ==
    /// Returns the number of resident entries.
    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    /// Bytes currently charged against capacity.
    pub fn filled_size(&self) -> usize {
        self.filled_size
    }

    pub fn max_size(&self) -> usize {
        self.max_size
    }

    // == Stats ==
    /// Returns current cache statistics.
    pub fn stats(&self) -> CacheStats {
        let mut stats = self.stats.clone();
        stats.total_entries = self.index.len();
        stats.bytes_used = self.filled_size;
        stats.capacity = self.max_size;
        stats
    }

    // == Clear ==
    /// Drops every entry. Counters are kept.
    pub fn clear(&mut self) {
        self.nodes.clear();
        self.free.clear();
        self.index.clear();
        self.head = None;
        self.tail = None;
        self.filled_size = 0;
    }

    fn check_size(&self, key: &str, value: &str) -> Result<(), StoreError> {
        let size = key.len() + value.len();
        if size > self.max_size {
            return Err(StoreError::EntryTooLarge {
                size,
                capacity: self.max_size,
            });
        }
        Ok(())
    }

    fn insert(&mut self, key: &str, value: &str) {
        let size = key.len() + value.len();
        self.free_space(size, None);

        let node = LruNode::new(key.to_string(), value.to_string());
        let slot = match self.free.pop() {
            Some(slot) => {
                self.nodes[slot] = node;
                slot
            }
            None => {
                self.nodes.push(node);
                self.nodes.len() - 1
            }
        };

        self.push_front(slot);
        self.index.insert(key.to_string(), slot);
        self.filled_size += size;
    }

    fn update(&mut self, slot: usize, value: &str) {
        self.move_to_head(slot);

        let old_len = self.nodes[slot].value.len();
        if value.len() > old_len {
            self.free_space(value.len() - old_len, Some(slot));
        }

        self.filled_size = self.filled_size - old_len + value.len();
        let stored = &mut self.nodes[slot].value;
        stored.clear();
        stored.push_str(value);
    }

    /// Evicts from the tail until `needed` more bytes fit. `keep` is never evicted.
    fn free_space(&mut self, needed: usize, keep: Option<usize>) {
        while self.filled_size + needed > self.max_size {
            match self.tail {
                Some(tail) if Some(tail) != keep => self.evict(tail),
                _ => break,
            }
        }
    }

    fn evict(&mut self, slot: usize) {
        let key = self.release(slot);
        self.index.remove(&key);
        self.stats.record_eviction();
        debug!(key = %key, filled = self.filled_size, "evicted least recently used entry");
    }

    /// Unlinks and vacates `slot`, returning its key. The index is left to the caller.
    fn release(&mut self, slot: usize) -> String {
        self.unlink(slot);
        self.filled_size -= self.nodes[slot].charged_size();
        self.free.push(slot);
        self.nodes[slot].vacate()
    }

    fn move_to_head(&mut self, slot: usize) {
        if self.head == Some(slot) {
            return;
        }
        self.unlink(slot);
        self.push_front(slot);
    }

    fn push_front(&mut self, slot: usize) {
        self.nodes[slot].prev = None;
        self.nodes[slot].next = self.head;
        match self.head {
            Some(head) => self.nodes[head].prev = Some(slot),
            None => self.tail = Some(slot),
        }
        self.head = Some(slot);
    }

    fn unlink(&mut self, slot: usize) {
        let prev = self.nodes[slot].prev.take();
        let next = self.nodes[slot].next.take();
        match prev {
            Some(prev) => self.nodes[prev].next = next,
            None => self.head = next,
        }
        match next {
            Some(next) => self.nodes[next].prev = prev,
            None => self.tail = prev,
        }
    }

    /// Walks the list and panics if the list, index or size counter disagree.
    #[cfg(test)]
    pub(crate) fn assert_invariants(&self) {
        let mut seen = 0;
        let mut bytes = 0;
        let mut prev = None;
        let mut cursor = self.head;

        while let Some(slot) = cursor {
            let node = &self.nodes[slot];
            assert_eq!(node.prev, prev, "prev link of slot {} is stale", slot);
            assert_eq!(
                self.index.get(&node.key),
                Some(&slot),
                "index does not point at slot {}",
                slot
            );
            seen += 1;
            bytes += node.charged_size();
            assert!(seen <= self.index.len(), "recency list has a cycle");
            prev = cursor;
            cursor = node.next;
        }

        assert_eq!(self.tail, prev, "tail is not the last node");
        assert_eq!(seen, self.index.len(), "list and index sizes differ");
        assert_eq!(bytes, self.filled_size, "filled size drifted");
        assert!(self.filled_size <= self.max_size, "capacity exceeded");
        assert_eq!(
            self.nodes.len(),
            self.index.len() + self.free.len(),
            "arena slots leaked"
        );
    }
}

// == Iter ==
/// Iterator over `(key, value)` pairs from most to least recently used.
pub struct Iter<'a> {
    nodes: &'a [LruNode],
    cursor: Option<usize>,
}

impl<'a> Iterator for Iter<'a> {
    type Item = (&'a str, &'a str);

    fn next(&mut self) -> Option<Self::Item> {
        let nodes = self.nodes;
        let node = &nodes[self.cursor?];
        self.cursor = node.next;
        Some((node.key.as_str(), node.value.as_str()))
    }
}

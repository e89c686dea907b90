//! Cache Entry Module
//!
//! Defines the arena node that holds one resident key-value pair.

// == LRU Node ==
/// A single cache entry and its position in the recency list.
///
/// Links are slot indices into the owning arena; `None` marks the list
/// boundary. A vacant slot keeps empty strings and no links.
#[derive(Debug, Clone, Default)]
pub(crate) struct LruNode {
    /// The key, fixed for the lifetime of the entry
    pub(crate) key: String,
    /// The stored value
    pub(crate) value: String,
    /// Slot of the next more recently used entry
    pub(crate) prev: Option<usize>,
    /// Slot of the next less recently used entry
    pub(crate) next: Option<usize>,
}

impl LruNode {
    // == Constructor ==
    /// Creates a detached node.
    pub(crate) fn new(key: String, value: String) -> Self {
        Self {
            key,
            value,
            prev: None,
            next: None,
        }
    }

    // == Charged Size ==
    /// Bytes this entry counts against capacity.
    pub(crate) fn charged_size(&self) -> usize {
        self.key.len() + self.value.len()
    }

    // == Vacate ==
    /// Empties the slot, handing back the key so the index can be updated.
    pub(crate) fn vacate(&mut self) -> String {
        self.value = String::new();
        self.prev = None;
        self.next = None;
        std::mem::take(&mut self.key)
    }
}

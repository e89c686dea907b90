//! Property-Based Tests for Cache Module
//!
//! Uses proptest to check the LRU against a straightforward reference model
//! and to verify the capacity, ordering and routing properties.

use proptest::prelude::*;
use std::collections::HashSet;

use crate::cache::{shard_index, SimpleLru, Storage, ShardedLru, MIN_SHARD_SIZE};
use crate::error::StoreError;

// == Test Configuration ==
const TEST_MAX_SIZE: usize = 32;

// == Strategies ==
/// Short keys so that sequences revisit the same keys often
fn key_strategy() -> impl Strategy<Value = String> {
    "[a-e]{1,3}".prop_map(|s| s)
}

/// Values of varied size, occasionally larger than the whole cache
fn value_strategy() -> impl Strategy<Value = String> {
    prop_oneof![
        9 => "[a-z0-9]{0,12}".prop_map(|s| s),
        1 => "[x]{30,40}".prop_map(|s| s),
    ]
}

/// Generates a sequence of cache operations for testing
#[derive(Debug, Clone)]
enum CacheOp {
    Put { key: String, value: String },
    PutIfAbsent { key: String, value: String },
    Set { key: String, value: String },
    Get { key: String },
    Delete { key: String },
}

fn cache_op_strategy() -> impl Strategy<Value = CacheOp> {
    prop_oneof![
        3 => (key_strategy(), value_strategy())
            .prop_map(|(key, value)| CacheOp::Put { key, value }),
        1 => (key_strategy(), value_strategy())
            .prop_map(|(key, value)| CacheOp::PutIfAbsent { key, value }),
        1 => (key_strategy(), value_strategy())
            .prop_map(|(key, value)| CacheOp::Set { key, value }),
        2 => key_strategy().prop_map(|key| CacheOp::Get { key }),
        1 => key_strategy().prop_map(|key| CacheOp::Delete { key }),
    ]
}

// == Reference Model ==
/// Vector-backed LRU: index 0 is most recently used.
struct ModelLru {
    max_size: usize,
    entries: Vec<(String, String)>,
}

impl ModelLru {
    fn new(max_size: usize) -> Self {
        Self {
            max_size,
            entries: Vec::new(),
        }
    }

    fn filled(&self) -> usize {
        self.entries.iter().map(|(k, v)| k.len() + v.len()).sum()
    }

    fn position(&self, key: &str) -> Option<usize> {
        self.entries.iter().position(|(k, _)| k == key)
    }

    fn too_large(&self, key: &str, value: &str) -> Option<StoreError> {
        let size = key.len() + value.len();
        (size > self.max_size).then_some(StoreError::EntryTooLarge {
            size,
            capacity: self.max_size,
        })
    }

    /// Puts `(key, value)` at the front and drops entries from the back
    /// until the total fits. The front entry always survives.
    fn upsert_front(&mut self, key: &str, value: &str) {
        if let Some(pos) = self.position(key) {
            self.entries.remove(pos);
        }
        self.entries.insert(0, (key.to_string(), value.to_string()));
        while self.filled() > self.max_size && self.entries.len() > 1 {
            self.entries.pop();
        }
    }

    fn apply(&mut self, op: &CacheOp) -> Result<Option<String>, StoreError> {
        match op {
            CacheOp::Put { key, value } => {
                if let Some(err) = self.too_large(key, value) {
                    return Err(err);
                }
                self.upsert_front(key, value);
                Ok(None)
            }
            CacheOp::PutIfAbsent { key, value } => {
                if self.position(key).is_some() {
                    return Err(StoreError::AlreadyExists);
                }
                if let Some(err) = self.too_large(key, value) {
                    return Err(err);
                }
                self.upsert_front(key, value);
                Ok(None)
            }
            CacheOp::Set { key, value } => {
                if self.position(key).is_none() {
                    return Err(StoreError::NotFound);
                }
                if let Some(err) = self.too_large(key, value) {
                    return Err(err);
                }
                self.upsert_front(key, value);
                Ok(None)
            }
            CacheOp::Get { key } => {
                let pos = self.position(key).ok_or(StoreError::NotFound)?;
                let entry = self.entries.remove(pos);
                let value = entry.1.clone();
                self.entries.insert(0, entry);
                Ok(Some(value))
            }
            CacheOp::Delete { key } => {
                let pos = self.position(key).ok_or(StoreError::NotFound)?;
                self.entries.remove(pos);
                Ok(None)
            }
        }
    }
}

fn apply(lru: &mut SimpleLru, op: &CacheOp) -> Result<Option<String>, StoreError> {
    match op {
        CacheOp::Put { key, value } => lru.put(key, value).map(|_| None),
        CacheOp::PutIfAbsent { key, value } => lru.put_if_absent(key, value).map(|_| None),
        CacheOp::Set { key, value } => lru.set(key, value).map(|_| None),
        CacheOp::Get { key } => lru.get(key).map(Some),
        CacheOp::Delete { key } => lru.delete(key).map(|_| None),
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    // Capacity invariant: Σ(len(key)+len(value)) never exceeds max_size, and
    // list, index and size counter stay consistent after every operation.
    #[test]
    fn prop_capacity_invariant(ops in prop::collection::vec(cache_op_strategy(), 1..120)) {
        let mut lru = SimpleLru::new(TEST_MAX_SIZE);

        for op in &ops {
            let _ = apply(&mut lru, op);
            prop_assert!(
                lru.filled_size() <= TEST_MAX_SIZE,
                "filled {} exceeds max {} after {:?}",
                lru.filled_size(),
                TEST_MAX_SIZE,
                op
            );
            lru.assert_invariants();
        }
    }

    // Every result and the final recency order match the reference model.
    #[test]
    fn prop_matches_reference_model(ops in prop::collection::vec(cache_op_strategy(), 1..120)) {
        let mut lru = SimpleLru::new(TEST_MAX_SIZE);
        let mut model = ModelLru::new(TEST_MAX_SIZE);

        for op in &ops {
            let expected = model.apply(op);
            let actual = apply(&mut lru, op);
            prop_assert_eq!(actual, expected, "diverged on {:?}", op);
        }

        let order: Vec<(String, String)> = lru
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        prop_assert_eq!(order, model.entries);
    }

    // Storing then reading returns the exact value stored.
    #[test]
    fn prop_roundtrip_storage(key in key_strategy(), value in "[a-z0-9]{0,12}") {
        let mut lru = SimpleLru::new(TEST_MAX_SIZE);

        lru.put(&key, &value).unwrap();

        prop_assert_eq!(lru.get(&key).unwrap(), value);
    }

    // After delete, get misses and the bytes are released.
    #[test]
    fn prop_delete_removes_entry(key in key_strategy(), value in "[a-z0-9]{0,12}") {
        let mut lru = SimpleLru::new(TEST_MAX_SIZE);

        lru.put(&key, &value).unwrap();
        lru.delete(&key).unwrap();

        prop_assert_eq!(lru.get(&key), Err(StoreError::NotFound));
        prop_assert_eq!(lru.filled_size(), 0);
    }

    // put_if_absent never changes a resident entry.
    #[test]
    fn prop_put_if_absent_no_clobber(
        key in key_strategy(),
        first in "[a-z0-9]{0,12}",
        second in "[a-z0-9]{0,12}"
    ) {
        let mut lru = SimpleLru::new(TEST_MAX_SIZE);

        lru.put(&key, &first).unwrap();

        prop_assert_eq!(lru.put_if_absent(&key, &second), Err(StoreError::AlreadyExists));
        prop_assert_eq!(lru.get(&key).unwrap(), first);
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    // With equal-sized entries filling the cache, inserting one more evicts
    // the first key inserted, unless it was read in between.
    #[test]
    fn prop_lru_eviction_order(
        initial_keys in prop::collection::hash_set("[a-z]{4}", 3..10),
        touch_first in any::<bool>()
    ) {
        let keys: Vec<String> = initial_keys.into_iter().collect();
        // Each entry is 4 + 4 bytes
        let mut lru = SimpleLru::new(keys.len() * 8);

        for key in &keys {
            lru.put(key, "vvvv").unwrap();
        }
        if touch_first {
            lru.get(&keys[0]).unwrap();
        }

        lru.put("NEW!", "vvvv").unwrap();

        let expected_evicted = if touch_first { &keys[1] } else { &keys[0] };
        prop_assert!(!lru.contains(expected_evicted));
        prop_assert_eq!(lru.len(), keys.len());

        let survivors: HashSet<&str> = lru.iter().map(|(k, _)| k).collect();
        for key in keys.iter().filter(|k| *k != expected_evicted) {
            prop_assert!(survivors.contains(key.as_str()), "{} should survive", key);
        }
    }

    // A key always maps to the same shard, and the shard is in range.
    #[test]
    fn prop_shard_determinism(key in ".{0,64}", stripes in 1usize..64) {
        let first = shard_index(&key, stripes);

        prop_assert!(first < stripes);
        for _ in 0..5 {
            prop_assert_eq!(shard_index(&key, stripes), first);
        }
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(20))]

    // The sharded cache agrees with a lone shard on which keys are present,
    // since no shard ever comes near its capacity here.
    #[test]
    fn prop_sharded_matches_unsharded(ops in prop::collection::vec(cache_op_strategy(), 1..80)) {
        let sharded = ShardedLru::build(4, 4 * MIN_SHARD_SIZE).unwrap();
        let mut single = SimpleLru::new(MIN_SHARD_SIZE);

        for op in &ops {
            let expected = apply(&mut single, op);
            let actual = match op {
                CacheOp::Put { key, value } => sharded.put(key, value).map(|_| None),
                CacheOp::PutIfAbsent { key, value } => sharded.put_if_absent(key, value).map(|_| None),
                CacheOp::Set { key, value } => sharded.set(key, value).map(|_| None),
                CacheOp::Get { key } => sharded.get(key).map(Some),
                CacheOp::Delete { key } => sharded.delete(key).map(|_| None),
            };
            prop_assert_eq!(actual, expected, "diverged on {:?}", op);
        }

        prop_assert_eq!(sharded.len(), single.len());
        prop_assert_eq!(sharded.stats().bytes_used, single.filled_size());
    }
}

// == Property Test for Error Response Format ==
// This tests the CacheError -> HTTP response conversion

proptest! {
    #![proptest_config(ProptestConfig::with_cases(50))]

    // For any error condition, the HTTP response includes a JSON body with
    // an "error" field carrying the error's message.
    #[test]
    fn prop_error_response_format(key in "[a-zA-Z0-9 _-]{1,100}") {
        use crate::error::{CacheError, ExecutorError};
        use axum::body::to_bytes;
        use axum::response::IntoResponse;

        let error_variants = vec![
            CacheError::store(key.clone(), StoreError::NotFound),
            CacheError::store(key.clone(), StoreError::AlreadyExists),
            CacheError::store(key.clone(), StoreError::EntryTooLarge { size: 2, capacity: 1 }),
            CacheError::InvalidRequest(key.clone()),
            CacheError::Rejected(ExecutorError::QueueOverflow { max_queue_size: 4 }),
            CacheError::Internal(key.clone()),
        ];

        for error in error_variants {
            let expected_msg = error.to_string();
            let response = error.into_response();

            let content_type = response
                .headers()
                .get("content-type")
                .and_then(|v| v.to_str().ok());
            prop_assert!(
                content_type.map(|ct| ct.contains("application/json")).unwrap_or(false),
                "Response should have JSON content-type"
            );

            let bytes = tokio_test::block_on(to_bytes(response.into_body(), usize::MAX)).unwrap();
            let json: serde_json::Value = serde_json::from_slice(&bytes)
                .expect("Response body should be valid JSON");

            prop_assert_eq!(json["error"].as_str(), Some(expected_msg.as_str()));
        }
    }
}

// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Recording store for testing.
//!
//! This module provides [`RecordingStore`], an LRU store that records every operation
//! performed on it, so tests can verify how a cache talks to its storage.

use std::{fmt, hash::Hash, num::NonZeroUsize};

use parking_lot::Mutex;

use crate::{BoundedStore, LruStore};

/// Recorded store operation with full context.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreOp<K, V> {
    /// A recency-updating lookup of the given key.
    Get(K),
    /// A lookup of the given key that left the recency order untouched.
    Peek(K),
    /// An entry was added or replaced.
    Add {
        /// The key that was written.
        key: K,
        /// The value that was written.
        value: V,
    },
    /// The entry for the given key was removed.
    Remove(K),
    /// Every entry was removed.
    Clear,
}

/// A [`BoundedStore`] that behaves like [`LruStore`] and records every operation.
///
/// [`len`](BoundedStore::len) and [`capacity`](BoundedStore::capacity) are not recorded.
///
/// # Examples
///
/// ```
/// use std::num::NonZeroUsize;
///
/// use sfcache_store::{BoundedStore, testing::{RecordingStore, StoreOp}};
///
/// let store = RecordingStore::with_capacity(NonZeroUsize::new(10).expect("non-zero"));
/// store.add("key", 42);
/// assert_eq!(store.peek(&"key"), Some(42));
///
/// assert_eq!(store.operations(), vec![
///     StoreOp::Add { key: "key", value: 42 },
///     StoreOp::Peek("key"),
/// ]);
/// ```
pub struct RecordingStore<K, V> {
    inner: LruStore<K, V>,
    operations: Mutex<Vec<StoreOp<K, V>>>,
}

impl<K, V> fmt::Debug for RecordingStore<K, V>
where
    K: Hash + Eq + fmt::Debug,
    V: fmt::Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RecordingStore")
            .field("inner", &self.inner)
            .field("operations", &self.operations)
            .finish()
    }
}

impl<K, V> RecordingStore<K, V>
where
    K: Clone,
    V: Clone,
{
    /// Returns a clone of all recorded operations.
    #[must_use]
    pub fn operations(&self) -> Vec<StoreOp<K, V>> {
        self.operations.lock().clone()
    }

    /// Clears all recorded operations.
    pub fn clear_operations(&self) {
        self.operations.lock().clear();
    }

    fn record(&self, op: StoreOp<K, V>) {
        self.operations.lock().push(op);
    }
}

impl<K, V> BoundedStore<K, V> for RecordingStore<K, V>
where
    K: Clone + Hash + Eq,
    V: Clone,
{
    fn with_capacity(capacity: NonZeroUsize) -> Self {
        Self {
            inner: LruStore::with_capacity(capacity),
            operations: Mutex::new(Vec::new()),
        }
    }

    fn get(&self, key: &K) -> Option<V> {
        self.record(StoreOp::Get(key.clone()));
        self.inner.get(key)
    }

    fn peek(&self, key: &K) -> Option<V> {
        self.record(StoreOp::Peek(key.clone()));
        self.inner.peek(key)
    }

    fn add(&self, key: K, value: V) -> bool {
        self.record(StoreOp::Add {
            key: key.clone(),
            value: value.clone(),
        });
        self.inner.add(key, value)
    }

    fn remove(&self, key: &K) -> bool {
        self.record(StoreOp::Remove(key.clone()));
        self.inner.remove(key)
    }

    fn len(&self) -> usize {
        self.inner.len()
    }

    fn capacity(&self) -> NonZeroUsize {
        self.inner.capacity()
    }

    fn clear(&self) {
        self.record(StoreOp::Clear);
        self.inner.clear();
    }
}

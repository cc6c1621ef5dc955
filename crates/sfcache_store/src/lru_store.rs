// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Least-recently-used store backed by the `lru` crate.

use std::{fmt, hash::Hash, num::NonZeroUsize};

use lru::LruCache;
use parking_lot::Mutex;

use crate::BoundedStore;

/// A [`BoundedStore`] that evicts the least recently used entry.
///
/// The underlying [`LruCache`] is guarded by a single mutex. Every operation, including
/// [`get`](BoundedStore::get), mutates the recency list, so a read-write lock would not help.
///
/// # Examples
///
/// ```
/// use std::num::NonZeroUsize;
///
/// use sfcache_store::{BoundedStore, LruStore};
///
/// let store = LruStore::with_capacity(NonZeroUsize::new(100).expect("non-zero"));
/// assert!(!store.add("key".to_string(), 42));
/// assert_eq!(store.peek(&"key".to_string()), Some(42));
/// assert!(store.remove(&"key".to_string()));
/// assert!(store.is_empty());
/// ```
pub struct LruStore<K, V> {
    inner: Mutex<LruCache<K, V>>,
}

impl<K: Hash + Eq, V> fmt::Debug for LruStore<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.inner.lock();
        f.debug_struct("LruStore")
            .field("len", &inner.len())
            .field("capacity", &inner.cap())
            .finish()
    }
}

impl<K, V> BoundedStore<K, V> for LruStore<K, V>
where
    K: Hash + Eq,
    V: Clone,
{
    fn with_capacity(capacity: NonZeroUsize) -> Self {
        Self {
            inner: Mutex::new(LruCache::new(capacity)),
        }
    }

    fn get(&self, key: &K) -> Option<V> {
        self.inner.lock().get(key).cloned()
    }

    fn peek(&self, key: &K) -> Option<V> {
        self.inner.lock().peek(key).cloned()
    }

    fn add(&self, key: K, value: V) -> bool {
        let mut inner = self.inner.lock();
        // `push` hands back the old pair when the key was already present; that is a
        // replacement, not an eviction.
        let replaces = inner.contains(&key);
        inner.push(key, value).is_some() && !replaces
    }

    fn remove(&self, key: &K) -> bool {
        self.inner.lock().pop(key).is_some()
    }

    fn len(&self) -> usize {
        self.inner.lock().len()
    }

    fn capacity(&self) -> NonZeroUsize {
        self.inner.lock().cap()
    }

    fn clear(&self) {
        self.inner.lock().clear();
    }
}

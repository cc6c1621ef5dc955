// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::num::NonZeroUsize;

/// A bounded, recency-ordered key-value container.
///
/// Implementations must be internally synchronized and must never hold more than
/// [`capacity`](Self::capacity) entries. When an entry is added to a full store, the least
/// recently used entry is evicted.
///
/// Values are returned by clone, so `V` is typically cheap to clone (small values, or values
/// behind an `Arc`).
pub trait BoundedStore<K, V> {
    /// Creates an empty store that holds at most `capacity` entries.
    fn with_capacity(capacity: NonZeroUsize) -> Self
    where
        Self: Sized;

    /// Returns the value for `key` and marks it as the most recently used entry.
    fn get(&self, key: &K) -> Option<V>;

    /// Returns the value for `key` without changing the recency order.
    fn peek(&self, key: &K) -> Option<V>;

    /// Inserts or replaces the value for `key` and marks it as the most recently used entry.
    ///
    /// Returns `true` if another entry had to be evicted to make room.
    fn add(&self, key: K, value: V) -> bool;

    /// Removes the entry for `key`, returning `true` if it was present.
    fn remove(&self, key: &K) -> bool;

    /// Returns the number of entries currently held.
    fn len(&self) -> usize;

    /// Returns `true` if the store holds no entries.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns the maximum number of entries the store can hold.
    fn capacity(&self) -> NonZeroUsize;

    /// Removes every entry.
    fn clear(&self);
}

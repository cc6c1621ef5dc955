// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Integration tests for `LruStore`.

use std::num::NonZeroUsize;

use sfcache_store::{BoundedStore, LruStore};

fn store(capacity: usize) -> LruStore<String, i32> {
    LruStore::with_capacity(NonZeroUsize::new(capacity).expect("capacity must be non-zero"))
}

#[test]
fn new_store_is_empty() {
    let store = store(10);
    assert!(store.is_empty());
    assert_eq!(store.len(), 0);
    assert_eq!(store.capacity().get(), 10);
}

#[test]
fn get_returns_none_for_missing_key() {
    let store = store(10);
    assert_eq!(store.get(&"missing".to_string()), None);
    assert_eq!(store.peek(&"missing".to_string()), None);
}

#[test]
fn add_and_get_returns_value() {
    let store = store(10);
    assert!(!store.add("key".to_string(), 42));
    assert_eq!(store.get(&"key".to_string()), Some(42));
    assert_eq!(store.len(), 1);
}

#[test]
fn add_overwrites_existing_value() {
    let store = store(10);
    store.add("key".to_string(), 42);
    store.add("key".to_string(), 100);
    assert_eq!(store.get(&"key".to_string()), Some(100));
    assert_eq!(store.len(), 1);
}

#[test]
fn full_store_evicts_least_recently_used() {
    let store = store(2);
    assert!(!store.add("a".to_string(), 1));
    assert!(!store.add("b".to_string(), 2));
    assert!(store.add("c".to_string(), 3));

    assert_eq!(store.peek(&"a".to_string()), None);
    assert_eq!(store.peek(&"b".to_string()), Some(2));
    assert_eq!(store.peek(&"c".to_string()), Some(3));
    assert_eq!(store.len(), 2);
}

#[test]
fn get_protects_an_entry_from_eviction() {
    let store = store(2);
    store.add("a".to_string(), 1);
    store.add("b".to_string(), 2);

    assert_eq!(store.get(&"a".to_string()), Some(1));
    assert!(store.add("c".to_string(), 3));

    assert_eq!(store.peek(&"a".to_string()), Some(1));
    assert_eq!(store.peek(&"b".to_string()), None);
}

#[test]
fn peek_does_not_protect_an_entry_from_eviction() {
    let store = store(2);
    store.add("a".to_string(), 1);
    store.add("b".to_string(), 2);

    assert_eq!(store.peek(&"a".to_string()), Some(1));
    assert!(store.add("c".to_string(), 3));

    assert_eq!(store.peek(&"a".to_string()), None);
    assert_eq!(store.peek(&"b".to_string()), Some(2));
}

#[test]
fn remove_reports_presence() {
    let store = store(10);
    store.add("key".to_string(), 42);
    assert!(store.remove(&"key".to_string()));
    assert!(!store.remove(&"key".to_string()));
    assert_eq!(store.get(&"key".to_string()), None);
}

#[test]
fn clear_removes_all_entries() {
    let store = store(10);
    store.add("a".to_string(), 1);
    store.add("b".to_string(), 2);
    store.clear();
    assert!(store.is_empty());
    assert_eq!(store.capacity().get(), 10);
}

#[test]
fn store_is_shareable_across_threads() {
    let store = store(1000);

    std::thread::scope(|scope| {
        for thread in 0..4 {
            let store = &store;
            scope.spawn(move || {
                for i in 0..100 {
                    store.add(format!("{thread}-{i}"), i);
                }
            });
        }
    });

    assert_eq!(store.len(), 400);
}

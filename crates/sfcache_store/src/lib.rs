// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

#![cfg_attr(docsrs, feature(doc_cfg))]

//! Bounded, recency-ordered storage used by the `sfcache` read-through cache.
//!
//! This crate defines the [`BoundedStore`] trait that a storage backend must satisfy and ships
//! [`LruStore`], a least-recently-used implementation backed by the [`lru`] crate.
//!
//! A store has a fixed capacity chosen at construction. Adding an entry to a full store evicts
//! the least recently used one. Reads come in two flavors: [`BoundedStore::get`] marks the entry
//! as most recently used, while [`BoundedStore::peek`] leaves the recency order untouched.
//!
//! Stores are internally synchronized: every method takes `&self`, so a store can be shared
//! between tasks without an extra lock around it.
//!
//! # Example
//!
//! ```
//! use std::num::NonZeroUsize;
//!
//! use sfcache_store::{BoundedStore, LruStore};
//!
//! let store = LruStore::with_capacity(NonZeroUsize::new(2).expect("non-zero"));
//! store.add("a", 1);
//! store.add("b", 2);
//!
//! // Touch "a" so that "b" becomes the least recently used entry.
//! assert_eq!(store.get(&"a"), Some(1));
//!
//! let evicted = store.add("c", 3);
//! assert!(evicted);
//! assert_eq!(store.peek(&"b"), None);
//! ```
//!
//! # Testing
//!
//! Enable the `test-util` feature for [`testing::RecordingStore`], a store that records every
//! operation performed on it.

mod lru_store;
mod store;
#[cfg(any(feature = "test-util", test))]
#[cfg_attr(docsrs, doc(cfg(feature = "test-util")))]
pub mod testing;

#[doc(inline)]
pub use lru_store::LruStore;
#[doc(inline)]
pub use store::BoundedStore;

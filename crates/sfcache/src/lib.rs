// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

#![cfg_attr(docsrs, feature(doc_cfg))]

//! A bounded, in-memory read-through cache with per-key load deduplication.
//!
//! [`Cache`] sits in front of a slow or expensive source. On a miss it calls a user-supplied
//! loader and stores what the loader returns. Concurrent misses for the same key are joined:
//! the loader runs once and every waiting caller receives the same value or error.
//!
//! # Entries
//!
//! The loader returns a [`CacheEntry`], made of a [`Value`] and an [`Expiry`]:
//!
//! - [`Value::Present`] holds a value. [`Value::Absent`] records that the key has no value, so
//!   that repeated lookups of a missing key are answered from the cache with
//!   [`Error::NotFound`] instead of reaching the source again.
//! - [`Expiry::At`] sets when the entry stops being served. [`Expiry::Never`] keeps the entry
//!   until it is deleted, replaced or evicted.
//!
//! Expiration is checked when an entry is read; there is no background sweeper. The number of
//! entries is bounded, and the least recently used entry is evicted when the cache is full.
//!
//! # Example
//!
//! ```
//! use std::{io, time::Duration};
//!
//! use sfcache::{Cache, CacheEntry, Error, Expiry, LoadContext, Value};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let cache = Cache::new(1000, |_ctx: LoadContext, user: String| async move {
//!     let value = if user == "ghost" { Value::Absent } else { Value::Present(format!("profile of {user}")) };
//!     Ok::<_, io::Error>(CacheEntry::new(value, Expiry::after(Duration::from_secs(30))))
//! })?;
//!
//! let ctx = LoadContext::new();
//! assert_eq!(cache.load(&ctx, &"alice".to_string()).await?, "profile of alice");
//! assert!(matches!(cache.load(&ctx, &"ghost".to_string()).await, Err(Error::NotFound)));
//!
//! // The negative answer is cached as well.
//! assert_eq!(cache.get(&"ghost".to_string()), Some(Value::Absent));
//! # Ok(())
//! # }
//! ```
//!
//! # Logging and metrics
//!
//! Every operation emits `cache.event` records through [`tracing`] with the fields
//! `cache.name`, `cache.operation` and `cache.activity`. Hits, misses and joined loads are
//! logged at `DEBUG`, writes and removals at `INFO`, and loader failures at `ERROR`.
//!
//! Passing a meter provider to [`CacheBuilder::metrics`] also records the same events, loader
//! durations and the cache size as OpenTelemetry metrics.

mod builder;
mod cache;
mod context;
mod entry;
mod error;
mod telemetry;

#[doc(inline)]
pub use builder::CacheBuilder;
#[doc(inline)]
pub use cache::Cache;
#[doc(inline)]
pub use context::LoadContext;
#[doc(inline)]
pub use entry::{CacheEntry, Expiry, Value};
#[doc(inline)]
pub use error::{ConfigError, Error, Result};
#[doc(inline)]
pub use sfcache_store::{BoundedStore, LruStore};
#[doc(inline)]
pub use telemetry::CacheName;

/// Test utilities for inspecting what the cache does with its store.
#[cfg(feature = "test-util")]
#[cfg_attr(docsrs, doc(cfg(feature = "test-util")))]
pub mod testing {
    #[doc(inline)]
    pub use sfcache_store::testing::{RecordingStore, StoreOp};
}

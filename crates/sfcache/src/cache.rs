// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! The read-through cache.

use std::{fmt, hash::Hash, sync::Arc};

use joinflight::{Abandoned, JoinGroup};
use sfcache_store::{BoundedStore, LruStore};
use tokio::time::Instant;

use crate::{
    CacheEntry, ConfigError, Error, LoadContext, Result, Value,
    builder::{CacheBuilder, Loader},
    telemetry::{CacheActivity, CacheName, CacheOperation, CacheTelemetry},
};

/// A bounded read-through cache that runs at most one load per key at a time.
///
/// On a miss, [`load`](Self::load) calls the configured loader and stores what it returns.
/// Concurrent loads of the same key share a single loader invocation: the first caller runs
/// it, every other caller waits and receives the same value or error.
///
/// Entries carry their own [`Expiry`](crate::Expiry). Expiration is lazy: an expired entry is
/// never served, but it keeps its slot in the store until it is replaced, evicted or deleted.
/// A loader can return [`Value::Absent`] to cache the fact that a key has no value.
///
/// Cloning a `Cache` is cheap; clones share the same entries and in-flight loads.
///
/// # Examples
///
/// ```
/// use std::{convert::Infallible, time::Duration};
///
/// use sfcache::{Cache, CacheEntry, Expiry, LoadContext};
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let cache = Cache::new(1000, |_ctx, key: String| async move {
///     Ok::<_, Infallible>(CacheEntry::present(key.to_uppercase(), Expiry::after(Duration::from_secs(60))))
/// })?;
///
/// let ctx = LoadContext::new();
/// assert_eq!(cache.load(&ctx, &"hello".to_string()).await?, "HELLO");
/// # Ok(())
/// # }
/// ```
pub struct Cache<K, V, S = LruStore<K, CacheEntry<V>>> {
    inner: Arc<CacheInner<K, V, S>>,
}

struct CacheInner<K, V, S> {
    name: CacheName,
    store: S,
    loader: Loader<K, V>,
    group: JoinGroup<K, Result<V>>,
    telemetry: CacheTelemetry,
}

impl<K, V, S> Clone for Cache<K, V, S> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<K, V, S: fmt::Debug> fmt::Debug for Cache<K, V, S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Cache")
            .field("name", &self.inner.name)
            .field("store", &self.inner.store)
            .field("group", &self.inner.group)
            .finish_non_exhaustive()
    }
}

impl Cache<(), (), ()> {
    /// Creates a new cache builder.
    ///
    /// # Examples
    ///
    /// ```
    /// use std::convert::Infallible;
    ///
    /// use sfcache::{Cache, CacheEntry, Expiry};
    ///
    /// let cache = Cache::builder::<String, u32>()
    ///     .capacity(100)
    ///     .loader(|_ctx, key: String| async move {
    ///         Ok::<_, Infallible>(CacheEntry::present(key.len() as u32, Expiry::Never))
    ///     })
    ///     .build()
    ///     .expect("valid configuration");
    /// ```
    #[must_use]
    pub fn builder<K, V>() -> CacheBuilder<K, V> {
        CacheBuilder::new()
    }
}

impl<K, V> Cache<K, V>
where
    K: Hash + Eq + Clone,
    V: Clone,
{
    /// Creates a cache holding at most `capacity` entries in an [`LruStore`].
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidCapacity`] if `capacity` is zero.
    pub fn new<F, Fut, E>(capacity: usize, loader: F) -> std::result::Result<Self, ConfigError>
    where
        F: Fn(LoadContext, K) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = std::result::Result<CacheEntry<V>, E>> + Send + 'static,
        E: Into<Box<dyn std::error::Error + Send + Sync>>,
    {
        Cache::builder().capacity(capacity).loader(loader).build()
    }
}

impl<K, V, S> Cache<K, V, S>
where
    K: Hash + Eq + Clone,
{
    pub(crate) fn from_parts(name: CacheName, store: S, loader: Loader<K, V>, telemetry: CacheTelemetry) -> Self {
        Self {
            inner: Arc::new(CacheInner {
                name,
                store,
                loader,
                group: JoinGroup::new(),
                telemetry,
            }),
        }
    }
}

impl<K, V, S> Cache<K, V, S> {
    /// Returns the name of this cache for telemetry identification.
    #[must_use]
    pub fn name(&self) -> CacheName {
        self.inner.name
    }

    /// Returns a reference to the underlying store.
    ///
    /// Reads through the store bypass expiration and telemetry.
    #[must_use]
    pub fn inner(&self) -> &S {
        &self.inner.store
    }

    fn record(&self, operation: CacheOperation, activity: CacheActivity) {
        self.inner.telemetry.record(self.inner.name, operation, activity, None);
    }
}

impl<K, V, S> Cache<K, V, S>
where
    K: Hash + Eq + Clone,
    V: Clone,
    S: BoundedStore<K, CacheEntry<V>>,
{
    /// Returns the value for `key`, loading it on a miss.
    ///
    /// A live cached entry is returned directly and marked as recently used. Otherwise the
    /// loader runs, unless a load of `key` is already in flight, in which case this call waits
    /// for it. The loaded entry is stored and its value returned.
    ///
    /// The call waits for the shared load regardless of `ctx`; the context is only handed to the
    /// loader. Use [`load_cancellable`](Self::load_cancellable) to stop waiting on cancellation.
    ///
    /// # Errors
    ///
    /// * [`Error::NotFound`] if the cached or loaded value is [`Value::Absent`], or if the loader
    ///   returned an entry that was already expired.
    /// * [`Error::Load`] if the loader failed. Nothing is cached in that case.
    pub async fn load(&self, ctx: &LoadContext, key: &K) -> Result<V> {
        if let Some(value) = self.lookup(CacheOperation::Load, key, true) {
            return found(value);
        }

        let mut led = false;
        let outcome = self
            .inner
            .group
            .work(key.clone(), || {
                led = true;
                self.load_and_store(ctx.clone(), key.clone())
            })
            .await;
        if !led {
            self.record(CacheOperation::Load, CacheActivity::Joined);
        }
        outcome.value
    }

    /// Runs the loader and stores its entry.
    async fn load_and_store(&self, ctx: LoadContext, key: K) -> Result<V> {
        let started = Instant::now();
        let loaded = (self.inner.loader)(ctx, key.clone()).await;
        let duration = Some(started.elapsed());

        let entry = match loaded {
            Ok(entry) => entry,
            Err(error) => {
                self.inner
                    .telemetry
                    .record(self.inner.name, CacheOperation::Load, CacheActivity::LoadFailed, duration);
                return Err(Error::load(error));
            }
        };
        self.inner
            .telemetry
            .record(self.inner.name, CacheOperation::Load, CacheActivity::Loaded, duration);

        let value = entry.value().clone();
        if self.set(key, entry) { found(value) } else { Err(Error::NotFound) }
    }

    /// Returns the live entry's value for `key` without loading, marking it as recently used.
    ///
    /// Returns `Some(Value::Absent)` for a cached "no value" answer, and `None` if the key is not
    /// cached or its entry has expired.
    #[must_use]
    pub fn get(&self, key: &K) -> Option<Value<V>> {
        self.lookup(CacheOperation::Get, key, true)
    }

    /// Like [`get`](Self::get), but leaves the recency order untouched.
    ///
    /// A peeked entry is as likely to be evicted as if it had not been read.
    #[must_use]
    pub fn peek(&self, key: &K) -> Option<Value<V>> {
        self.lookup(CacheOperation::Peek, key, false)
    }

    fn lookup(&self, operation: CacheOperation, key: &K, touch: bool) -> Option<Value<V>> {
        let entry = if touch {
            self.inner.store.get(key)
        } else {
            self.inner.store.peek(key)
        };

        match entry {
            None => {
                self.record(operation, CacheActivity::Miss);
                None
            }
            Some(entry) if !entry.is_live() => {
                self.record(operation, CacheActivity::Expired);
                None
            }
            Some(entry) => {
                let value = entry.into_value();
                let activity = if value.is_present() {
                    CacheActivity::Hit
                } else {
                    CacheActivity::HitAbsent
                };
                self.record(operation, activity);
                Some(value)
            }
        }
    }

    /// Stores `entry` under `key`, bypassing the loader.
    ///
    /// Returns `false` and stores nothing if the entry has already expired. Otherwise the entry
    /// replaces any previous one for `key`, possibly evicting the least recently used entry.
    pub fn set(&self, key: K, entry: CacheEntry<V>) -> bool {
        if !entry.is_live() {
            self.record(CacheOperation::Set, CacheActivity::Rejected);
            return false;
        }

        let evicted = self.inner.store.add(key, entry);
        self.record(CacheOperation::Set, CacheActivity::Inserted);
        if evicted {
            self.record(CacheOperation::Set, CacheActivity::Evicted);
        }
        self.record_size();
        true
    }

    /// Removes the entry for `key`, expired or not. Returns `true` if there was one.
    pub fn delete(&self, key: &K) -> bool {
        let removed = self.inner.store.remove(key);
        let activity = if removed {
            CacheActivity::Deleted
        } else {
            CacheActivity::Miss
        };
        self.record(CacheOperation::Delete, activity);
        if removed {
            self.record_size();
        }
        removed
    }

    /// Removes every entry.
    ///
    /// Loads already in flight still store their result when they finish.
    pub fn clear(&self) {
        self.inner.store.clear();
        self.record(CacheOperation::Clear, CacheActivity::Cleared);
        self.record_size();
    }

    fn record_size(&self) {
        self.inner.telemetry.record_size(self.inner.name, self.inner.store.len());
    }

    /// Returns `true` if `key` has a live entry. Does not affect the recency order.
    #[must_use]
    pub fn contains(&self, key: &K) -> bool {
        self.inner.store.peek(key).is_some_and(|entry| entry.is_live())
    }

    /// Returns the number of stored entries, including expired ones that still hold a slot.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.store.len()
    }

    /// Returns `true` if no entries are stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.store.is_empty()
    }

    /// Returns the maximum number of entries.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.inner.store.capacity().get()
    }
}

impl<K, V, S> Cache<K, V, S>
where
    K: Hash + Eq + Clone + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
    S: BoundedStore<K, CacheEntry<V>> + Send + Sync + 'static,
{
    /// Like [`load`](Self::load), but stops waiting when `ctx` is cancelled.
    ///
    /// The loader runs on the Tokio runtime. When `ctx` is cancelled or its deadline passes
    /// first, this call returns [`Error::Cancelled`] and, if nobody else is waiting for the same
    /// load, forgets it so that the next call for `key` starts a fresh load. The abandoned load
    /// keeps running and still stores its result.
    ///
    /// If this call joined a load whose [`load`](Self::load) caller went away before it
    /// finished, it starts a load of its own.
    ///
    /// # Errors
    ///
    /// Same as [`load`](Self::load), plus:
    ///
    /// * [`Error::Cancelled`] if `ctx` was cancelled first.
    /// * [`Error::Abandoned`] if the loader started by this call panicked.
    ///
    /// # Panics
    ///
    /// Panics if called outside of a Tokio runtime when a new load has to be started.
    pub async fn load_cancellable(&self, ctx: &LoadContext, key: &K) -> Result<V> {
        if let Some(value) = self.lookup(CacheOperation::Load, key, true) {
            return found(value);
        }
        if ctx.is_cancelled() {
            self.record(CacheOperation::Load, CacheActivity::Cancelled);
            return Err(Error::Cancelled);
        }

        loop {
            let cache = self.clone();
            let load_ctx = ctx.clone();
            let load_key = key.clone();
            let (waiter, started) = self
                .inner
                .group
                .work_detached(key.clone(), move || async move { cache.load_and_store(load_ctx, load_key).await });

            // A finished load wins over a cancellation that arrives at the same time.
            tokio::select! {
                biased;
                result = waiter.wait() => match result {
                    Ok(outcome) => {
                        if !started {
                            self.record(CacheOperation::Load, CacheActivity::Joined);
                        }
                        return outcome.value;
                    }
                    Err(Abandoned) if started => return Err(Error::Abandoned),
                    // The caller that led the joined load went away; start over.
                    Err(Abandoned) => {}
                },
                () = ctx.cancelled() => {
                    waiter.forget_unshared();
                    self.record(CacheOperation::Load, CacheActivity::Cancelled);
                    return Err(Error::Cancelled);
                }
            }
        }
    }
}

fn found<V>(value: Value<V>) -> Result<V> {
    match value {
        Value::Present(value) => Ok(value),
        Value::Absent => Err(Error::NotFound),
    }
}

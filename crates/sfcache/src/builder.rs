// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Builder for [`Cache`].

use std::{fmt, hash::Hash, marker::PhantomData, num::NonZeroUsize, sync::Arc};

use futures_util::future::{BoxFuture, FutureExt};
use opentelemetry::metrics::{Meter, MeterProvider};
use sfcache_store::{BoundedStore, LruStore};

use crate::{
    Cache, CacheEntry, ConfigError, LoadContext,
    error::BoxError,
    telemetry::{CacheName, CacheTelemetry, metrics},
};

const DEFAULT_NAME: CacheName = "sfcache";

pub(crate) type Loader<K, V> = Arc<dyn Fn(LoadContext, K) -> BoxFuture<'static, Result<CacheEntry<V>, BoxError>> + Send + Sync>;

/// Builder for a [`Cache`].
///
/// Created by [`Cache::builder`]. A capacity and a loader are required; everything else has a
/// default. Configuration errors are reported by [`build`](Self::build).
///
/// # Examples
///
/// ```
/// use std::{convert::Infallible, time::Duration};
///
/// use sfcache::{Cache, CacheEntry, Expiry};
///
/// let cache = Cache::builder::<u64, String>()
///     .name("users")
///     .capacity(10_000)
///     .loader(|_ctx, id: u64| async move {
///         Ok::<_, Infallible>(CacheEntry::present(format!("user-{id}"), Expiry::after(Duration::from_secs(60))))
///     })
///     .build()
///     .expect("valid configuration");
///
/// assert_eq!(cache.name(), "users");
/// assert_eq!(cache.capacity(), 10_000);
/// ```
pub struct CacheBuilder<K, V, S = LruStore<K, CacheEntry<V>>> {
    name: CacheName,
    capacity: usize,
    loader: Option<Loader<K, V>>,
    meter: Option<Meter>,
    _store: PhantomData<fn() -> S>,
}

impl<K, V, S> fmt::Debug for CacheBuilder<K, V, S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CacheBuilder")
            .field("name", &self.name)
            .field("capacity", &self.capacity)
            .field("loader", &self.loader.is_some())
            .field("meter", &self.meter)
            .finish()
    }
}

impl<K, V> CacheBuilder<K, V> {
    pub(crate) fn new() -> Self {
        Self {
            name: DEFAULT_NAME,
            capacity: 0,
            loader: None,
            meter: None,
            _store: PhantomData,
        }
    }
}

impl<K, V, S> CacheBuilder<K, V, S> {
    /// Sets the maximum number of entries. Must be at least 1.
    #[must_use]
    pub fn capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity;
        self
    }

    /// Sets the name reported in log events. Defaults to `"sfcache"`.
    #[must_use]
    pub fn name(mut self, name: CacheName) -> Self {
        self.name = name;
        self
    }

    /// Records cache events, loader durations and the number of stored entries as
    /// OpenTelemetry metrics created from `provider`.
    ///
    /// Without a meter provider the cache only emits log events.
    #[must_use]
    pub fn metrics(mut self, provider: &dyn MeterProvider) -> Self {
        self.meter = Some(metrics::create_meter(provider));
        self
    }

    /// Sets the function that produces an entry for a key that is not cached.
    ///
    /// The loader returns both the value, or [`Value::Absent`](crate::Value::Absent) when the
    /// key has no value, and the entry's [`Expiry`](crate::Expiry). It receives the
    /// [`LoadContext`] of the caller that triggered the load.
    #[must_use]
    pub fn loader<F, Fut, E>(mut self, loader: F) -> Self
    where
        F: Fn(LoadContext, K) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<CacheEntry<V>, E>> + Send + 'static,
        E: Into<BoxError>,
    {
        let loader: Loader<K, V> = Arc::new(move |ctx: LoadContext, key: K| {
            loader(ctx, key).map(|result| result.map_err(Into::<BoxError>::into)).boxed()
        });
        self.loader = Some(loader);
        self
    }

    /// Uses `T` instead of [`LruStore`] to hold the entries.
    ///
    /// The store is created by [`build`](Self::build) with the configured capacity.
    #[must_use]
    pub fn store<T>(self) -> CacheBuilder<K, V, T>
    where
        T: BoundedStore<K, CacheEntry<V>>,
    {
        CacheBuilder {
            name: self.name,
            capacity: self.capacity,
            loader: self.loader,
            meter: self.meter,
            _store: PhantomData,
        }
    }

    /// Builds the cache.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidCapacity`] if the capacity is zero or was never set, and
    /// [`ConfigError::MissingLoader`] if no loader was set.
    pub fn build(self) -> Result<Cache<K, V, S>, ConfigError>
    where
        K: Hash + Eq + Clone,
        S: BoundedStore<K, CacheEntry<V>>,
    {
        let capacity = NonZeroUsize::new(self.capacity).ok_or(ConfigError::InvalidCapacity)?;
        let loader = self.loader.ok_or(ConfigError::MissingLoader)?;
        let telemetry = CacheTelemetry::new(self.meter.as_ref());
        Ok(Cache::from_parts(self.name, S::with_capacity(capacity), loader, telemetry))
    }
}

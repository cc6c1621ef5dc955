// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Error types for cache construction and lookups.

use std::sync::Arc;

/// Error type for loader failures, before they are shared with every waiting caller.
pub(crate) type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// An error from a cache lookup.
///
/// Errors are cheap to clone: when several callers wait for the same load, each of them
/// receives a clone of the same error.
#[derive(Clone, Debug, thiserror::Error)]
pub enum Error {
    /// The key has no value. Either the loader returned [`Value::Absent`](crate::Value::Absent)
    /// or the loaded entry was already expired.
    #[error("cache entry not found")]
    NotFound,

    /// The loader failed. Failures are not cached.
    #[error("loader failed: {0}")]
    Load(#[source] Arc<dyn std::error::Error + Send + Sync>),

    /// The caller's [`LoadContext`](crate::LoadContext) was cancelled or its deadline passed
    /// before the load finished.
    #[error("load cancelled")]
    Cancelled,

    /// The load task panicked before it produced a result.
    #[error("load abandoned before it produced a result")]
    Abandoned,
}

impl Error {
    pub(crate) fn load(error: BoxError) -> Self {
        Self::Load(Arc::from(error))
    }

    /// Returns `true` for [`Error::NotFound`].
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound)
    }

    /// Returns the loader's error as `E`, if this is a [`Error::Load`] caused by an `E`.
    ///
    /// # Examples
    ///
    /// ```
    /// use std::io;
    ///
    /// # async fn example(cache: sfcache::Cache<String, String>) {
    /// let ctx = sfcache::LoadContext::new();
    /// if let Err(error) = cache.load(&ctx, &"key".to_string()).await {
    ///     if let Some(io_error) = error.source_as::<io::Error>() {
    ///         println!("backend I/O failure: {io_error}");
    ///     }
    /// }
    /// # }
    /// ```
    #[must_use]
    pub fn source_as<E>(&self) -> Option<&E>
    where
        E: std::error::Error + 'static,
    {
        match self {
            Self::Load(source) => source.downcast_ref::<E>(),
            _ => None,
        }
    }
}

/// An invalid cache configuration, reported when the cache is built.
#[derive(Clone, Copy, Debug, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    /// The capacity was zero.
    #[error("size must be 1 or greater")]
    InvalidCapacity,

    /// No loader was configured.
    #[error("loader is required")]
    MissingLoader,
}

/// A specialized [`Result`] type for cache lookups.
pub type Result<T> = std::result::Result<T, Error>;

// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::time::Duration;

use tokio::time::Instant;

/// A cached value, or the cached fact that there is no value.
///
/// A loader returns [`Value::Absent`] when it has confirmed that a key has no result. The cache
/// stores that answer like any other entry, so repeated lookups of a missing key do not reach
/// the backing source until the entry expires or is deleted.
///
/// # Examples
///
/// ```
/// use sfcache::Value;
///
/// let found = Value::Present(42);
/// assert_eq!(found.present(), Some(42));
///
/// let missing: Value<i32> = Value::Absent;
/// assert!(missing.is_absent());
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Value<V> {
    /// The loader confirmed that there is no value for the key.
    Absent,
    /// A regular value.
    Present(V),
}

impl<V> Value<V> {
    /// Returns `true` if this is [`Value::Present`].
    #[must_use]
    pub fn is_present(&self) -> bool {
        matches!(self, Self::Present(_))
    }

    /// Returns `true` if this is [`Value::Absent`].
    #[must_use]
    pub fn is_absent(&self) -> bool {
        matches!(self, Self::Absent)
    }

    /// Converts into an [`Option`], mapping [`Value::Absent`] to `None`.
    #[must_use]
    pub fn present(self) -> Option<V> {
        match self {
            Self::Present(value) => Some(value),
            Self::Absent => None,
        }
    }

    /// Borrows the contained value.
    #[must_use]
    pub fn as_ref(&self) -> Value<&V> {
        match self {
            Self::Present(value) => Value::Present(value),
            Self::Absent => Value::Absent,
        }
    }
}

impl<V> From<Option<V>> for Value<V> {
    fn from(value: Option<V>) -> Self {
        value.map_or(Self::Absent, Self::Present)
    }
}

/// When a cache entry stops being served.
///
/// Instants come from [`tokio::time`], so a paused Tokio clock drives expiration in tests.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Expiry {
    /// The entry never expires. It stays until it is deleted, replaced or evicted.
    Never,
    /// The entry expires at the given instant.
    At(Instant),
}

impl Expiry {
    /// Expires `ttl` from now.
    ///
    /// A `ttl` too large to be represented as an instant never expires.
    #[must_use]
    pub fn after(ttl: Duration) -> Self {
        Instant::now().checked_add(ttl).map_or(Self::Never, Self::At)
    }

    /// Expires at `instant`.
    #[must_use]
    pub fn at(instant: Instant) -> Self {
        Self::At(instant)
    }

    /// Returns the expiration instant, or `None` for [`Expiry::Never`].
    #[must_use]
    pub fn instant(self) -> Option<Instant> {
        match self {
            Self::Never => None,
            Self::At(instant) => Some(instant),
        }
    }

    /// Returns `true` if the expiry has been reached at `now`.
    ///
    /// An entry expiring exactly at `now` is expired.
    #[must_use]
    pub fn has_passed(self, now: Instant) -> bool {
        match self {
            Self::Never => false,
            Self::At(instant) => instant <= now,
        }
    }
}

/// A value together with its expiry, as stored in the cache.
///
/// Entries are always replaced as a whole; there is no way to update the value or the expiry
/// of a stored entry in place.
///
/// # Examples
///
/// ```
/// use std::time::Duration;
///
/// use sfcache::{CacheEntry, Expiry, Value};
///
/// let entry = CacheEntry::present("data", Expiry::after(Duration::from_secs(60)));
/// assert_eq!(entry.value(), &Value::Present("data"));
///
/// let negative: CacheEntry<&str> = CacheEntry::absent(Expiry::Never);
/// assert!(negative.value().is_absent());
/// assert!(negative.is_live());
/// ```
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CacheEntry<V> {
    value: Value<V>,
    expiry: Expiry,
}

impl<V> CacheEntry<V> {
    /// Creates an entry from a value and an expiry.
    pub fn new(value: Value<V>, expiry: Expiry) -> Self {
        Self { value, expiry }
    }

    /// Creates an entry holding `value`.
    pub fn present(value: V, expiry: Expiry) -> Self {
        Self::new(Value::Present(value), expiry)
    }

    /// Creates an entry recording that there is no value.
    pub fn absent(expiry: Expiry) -> Self {
        Self::new(Value::Absent, expiry)
    }

    /// Returns the stored value.
    #[must_use]
    pub fn value(&self) -> &Value<V> {
        &self.value
    }

    /// Returns when the entry expires.
    #[must_use]
    pub fn expiry(&self) -> Expiry {
        self.expiry
    }

    /// Consumes the entry, returning its value.
    #[must_use]
    pub fn into_value(self) -> Value<V> {
        self.value
    }

    /// Returns `true` if the entry may be served at `now`.
    #[must_use]
    pub fn is_live_at(&self, now: Instant) -> bool {
        !self.expiry.has_passed(now)
    }

    /// Returns `true` if the entry may be served right now.
    #[must_use]
    pub fn is_live(&self) -> bool {
        self.is_live_at(Instant::now())
    }
}

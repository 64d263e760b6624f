//! Read results that say where the value came from.
//!
//! A cache hit is never re-validated against the primary store, so a value
//! read from the cache may be stale. `CacheRead` keeps that visible to the
//! caller instead of hiding it.

use chrono::{DateTime, Utc};

/// Where a read was served from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReadSource {
    /// Decoded from a cache entry.
    Cache,
    /// Fetched from the primary store.
    Primary,
}

/// Result of a cache-aside read.
#[derive(Debug, Clone, PartialEq)]
pub struct CacheRead<T> {
    value: T,
    source: ReadSource,
    read_at: DateTime<Utc>,
}

impl<T> CacheRead<T> {
    /// A value decoded from the cache.
    pub fn from_cache(value: T) -> Self {
        Self {
            value,
            source: ReadSource::Cache,
            read_at: Utc::now(),
        }
    }

    /// A value fetched from the primary store.
    pub fn from_primary(value: T) -> Self {
        Self {
            value,
            source: ReadSource::Primary,
            read_at: Utc::now(),
        }
    }

    /// Consume the wrapper and return the underlying value.
    pub fn into_value(self) -> T {
        self.value
    }

    pub fn value(&self) -> &T {
        &self.value
    }

    pub fn source(&self) -> ReadSource {
        self.source
    }

    /// When this read completed.
    pub fn read_at(&self) -> DateTime<Utc> {
        self.read_at
    }

    pub fn was_cache_hit(&self) -> bool {
        self.source == ReadSource::Cache
    }

    pub fn was_cache_miss(&self) -> bool {
        self.source == ReadSource::Primary
    }

    /// Map the inner value, keeping the source.
    pub fn map<U, F>(self, f: F) -> CacheRead<U>
    where
        F: FnOnce(T) -> U,
    {
        CacheRead {
            value: f(self.value),
            source: self.source,
            read_at: self.read_at,
        }
    }
}

impl<T> AsRef<T> for CacheRead<T> {
    fn as_ref(&self) -> &T {
        &self.value
    }
}

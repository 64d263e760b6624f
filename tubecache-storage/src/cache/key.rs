//! Cache keys and the key/TTL policy.
//!
//! `CacheKey` has no public constructor taking a raw string. Every key is
//! derived from a record kind plus either a record id or an owner id, so two
//! keys are equal exactly when they address the same cached value.
//!
//! | Value                 | Key shape            | TTL class           |
//! |-----------------------|----------------------|---------------------|
//! | single record         | `<kind>:<id>`        | `None`              |
//! | listing by owner      | `<kinds>:<ownerId>`  | `Bounded(60s)`      |

use std::fmt;
use std::time::Duration;

use tubecache_core::{EntityIdType, EntityKind, UserId};

/// Default lifetime of owner-scoped listings.
pub const DEFAULT_SCOPED_TTL: Duration = Duration::from_secs(60);

/// A key addressing one cached value.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CacheKey(String);

impl CacheKey {
    /// Key for a single record: `video:<id>`, `tweet:<id>`, `comment:<id>`.
    pub fn record<I: EntityIdType>(kind: EntityKind, id: I) -> Self {
        Self(format!("{}:{}", kind.as_str(), id))
    }

    /// Key for the full listing of an owner's records: `tweets:<ownerId>`.
    pub fn scoped(kind: EntityKind, owner: UserId) -> Self {
        Self(format!("{}:{}", kind.plural(), owner))
    }

    /// The key as stored in the cache.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The key as raw bytes, for byte-keyed stores.
    pub fn as_bytes(&self) -> &[u8] {
        self.0.as_bytes()
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for CacheKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// How long a cached value may live.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TtlClass {
    /// Cached until explicitly invalidated.
    None,
    /// Expires after the given duration.
    Bounded(Duration),
}

impl TtlClass {
    /// The expiry to hand to a cache store.
    pub fn as_duration(&self) -> Option<Duration> {
        match self {
            TtlClass::None => None,
            TtlClass::Bounded(ttl) => Some(*ttl),
        }
    }

    pub fn is_bounded(&self) -> bool {
        matches!(self, TtlClass::Bounded(_))
    }
}

/// Maps a record kind and id (or owner) to a key and TTL class.
///
/// Single records carry no TTL because every mutation knows their key and
/// deletes it. Listings are produced by a filter, so they expire instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyPolicy {
    scoped_ttl: Duration,
}

impl Default for KeyPolicy {
    fn default() -> Self {
        Self {
            scoped_ttl: DEFAULT_SCOPED_TTL,
        }
    }
}

impl KeyPolicy {
    /// Create a policy whose listings expire after `scoped_ttl`.
    pub fn new(scoped_ttl: Duration) -> Self {
        Self { scoped_ttl }
    }

    /// Key and TTL class for a single record.
    pub fn record<I: EntityIdType>(&self, kind: EntityKind, id: I) -> (CacheKey, TtlClass) {
        (CacheKey::record(kind, id), TtlClass::None)
    }

    /// Key and TTL class for an owner's listing.
    pub fn scoped(&self, kind: EntityKind, owner: UserId) -> (CacheKey, TtlClass) {
        (CacheKey::scoped(kind, owner), TtlClass::Bounded(self.scoped_ttl))
    }

    pub fn scoped_ttl(&self) -> Duration {
        self.scoped_ttl
    }
}


#[cfg(test)]
mod prop_tests {
    use super::*;
    use proptest::prelude::*;
    use tubecache_core::TweetId;
    use uuid::Uuid;

    fn uuid_strategy() -> impl Strategy<Value = Uuid> {
        any::<[u8; 16]>().prop_map(Uuid::from_bytes)
    }

    fn kind_strategy() -> impl Strategy<Value = EntityKind> {
        prop_oneof![
            Just(EntityKind::Video),
            Just(EntityKind::Tweet),
            Just(EntityKind::Comment),
        ]
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(500))]

        /// Property: key construction is deterministic.
        #[test]
        fn prop_key_is_deterministic(kind in kind_strategy(), id in uuid_strategy()) {
            prop_assert_eq!(
                CacheKey::record(kind, TweetId::new(id)),
                CacheKey::record(kind, TweetId::new(id))
            );
            prop_assert_eq!(
                CacheKey::scoped(kind, UserId::new(id)),
                CacheKey::scoped(kind, UserId::new(id))
            );
        }

        /// Property: different (kind, id) pairs never share a key.
        #[test]
        fn prop_record_keys_are_injective(
            kind1 in kind_strategy(),
            kind2 in kind_strategy(),
            id1 in uuid_strategy(),
            id2 in uuid_strategy(),
        ) {
            let key1 = CacheKey::record(kind1, TweetId::new(id1));
            let key2 = CacheKey::record(kind2, TweetId::new(id2));
            if kind1 != kind2 || id1 != id2 {
                prop_assert_ne!(key1, key2);
            }
        }

        /// Property: different (kind, owner) pairs never share a listing key.
        #[test]
        fn prop_scoped_keys_are_injective(
            kind1 in kind_strategy(),
            kind2 in kind_strategy(),
            owner1 in uuid_strategy(),
            owner2 in uuid_strategy(),
        ) {
            let key1 = CacheKey::scoped(kind1, UserId::new(owner1));
            let key2 = CacheKey::scoped(kind2, UserId::new(owner2));
            if kind1 != kind2 || owner1 != owner2 {
                prop_assert_ne!(key1, key2);
            }
        }
    }
}

//! Cache store trait, cacheable entity marker, and statistics.
//!
//! This module defines the traits that cache stores and cacheable records
//! must implement.

use std::fmt::Debug;
use std::time::Duration;

use async_trait::async_trait;
use serde::{de::DeserializeOwned, Serialize};
use tubecache_core::{
    CacheError, Comment, CommentId, EntityIdType, EntityKind, Tweet, TweetId, UserId, Video,
    VideoId,
};

use super::key::CacheKey;

/// Result type for cache store calls.
pub type CacheResult<T> = Result<T, CacheError>;

/// Marker trait for records that can be cached.
///
/// # Implementation Requirements
///
/// - `entity_kind()` must return the same value for all instances
/// - `entity_id()` must return the identifier the primary store uses
/// - `owner_id()` must return the user whose listing includes this record
pub trait CacheableEntity:
    Clone + PartialEq + Debug + Serialize + DeserializeOwned + Send + Sync + 'static
{
    /// Strongly-typed identifier of this record kind.
    type Id: EntityIdType;

    /// Get the kind of this record.
    fn entity_kind() -> EntityKind;

    /// Get the unique identifier for this record.
    fn entity_id(&self) -> Self::Id;

    /// Get the user that owns this record.
    fn owner_id(&self) -> UserId;
}

/// Key-value cache store.
///
/// Abstracts over concrete stores (in-memory, LMDB, or a networked server).
/// Each call is atomic for its single key; there is no cross-key or
/// cross-store transaction. Implementations must be safe to share between
/// concurrent tasks.
///
/// # Expiry
///
/// `ttl = None` keeps the entry until it is deleted. With `Some(ttl)` the
/// entry must read as a miss once `ttl` has elapsed.
#[async_trait]
pub trait CacheStore: Send + Sync {
    /// Get the bytes stored under `key`, or `None` on a miss.
    async fn get(&self, key: &CacheKey) -> CacheResult<Option<Vec<u8>>>;

    /// Store `value` under `key`, replacing any previous entry.
    async fn set(&self, key: &CacheKey, value: Vec<u8>, ttl: Option<Duration>) -> CacheResult<()>;

    /// Remove `key`. Removing an absent key succeeds.
    async fn delete(&self, key: &CacheKey) -> CacheResult<()>;
}

/// Statistics about cache-aside traffic.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Reads served from the cache.
    pub hits: u64,
    /// Reads that went to the primary store.
    pub misses: u64,
    /// Successful cache writes after a miss or write-through.
    pub populations: u64,
    /// Cache writes that failed or timed out.
    pub population_failures: u64,
    /// Cached bytes that did not decode and were treated as a miss.
    pub decode_failures: u64,
    /// Cache reads or deletes that failed or timed out.
    pub cache_faults: u64,
    /// Keys removed by invalidation.
    pub invalidations: u64,
}

impl CacheStats {
    /// Calculate the hit rate (0.0 to 1.0).
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

// ============================================================================
// IMPLEMENTATIONS FOR TUBECACHE RECORDS
// ============================================================================

impl CacheableEntity for Video {
    type Id = VideoId;

    fn entity_kind() -> EntityKind {
        EntityKind::Video
    }

    fn entity_id(&self) -> VideoId {
        self.video_id
    }

    fn owner_id(&self) -> UserId {
        self.owner
    }
}

impl CacheableEntity for Tweet {
    type Id = TweetId;

    fn entity_kind() -> EntityKind {
        EntityKind::Tweet
    }

    fn entity_id(&self) -> TweetId {
        self.tweet_id
    }

    fn owner_id(&self) -> UserId {
        self.owner
    }
}

impl CacheableEntity for Comment {
    type Id = CommentId;

    fn entity_kind() -> EntityKind {
        EntityKind::Comment
    }

    fn entity_id(&self) -> CommentId {
        self.comment_id
    }

    fn owner_id(&self) -> UserId {
        self.owner
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cache_stats_hit_rate() {
        let stats = CacheStats {
            hits: 80,
            misses: 20,
            ..Default::default()
        };
        assert!((stats.hit_rate() - 0.8).abs() < 0.001);

        let empty_stats = CacheStats::default();
        assert!((empty_stats.hit_rate() - 0.0).abs() < 0.001);
    }

    #[test]
    fn test_cacheable_entity_kinds() {
        assert_eq!(Video::entity_kind(), EntityKind::Video);
        assert_eq!(Tweet::entity_kind(), EntityKind::Tweet);
        assert_eq!(Comment::entity_kind(), EntityKind::Comment);
    }

    #[test]
    fn test_tweet_identity() {
        let now = chrono::Utc::now();
        let tweet = Tweet {
            tweet_id: TweetId::now_v7(),
            owner: UserId::now_v7(),
            content: "hi".to_string(),
            created_at: now,
            updated_at: now,
        };
        assert_eq!(tweet.entity_id(), tweet.tweet_id);
        assert_eq!(tweet.owner_id(), tweet.owner);
    }
}

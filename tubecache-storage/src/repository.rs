//! Cached repositories.
//!
//! `CachedRepository` pairs a [`CacheAside`] orchestrator with the write
//! paths for its record kind. Reads by id and by owner go through the cache;
//! writes go to the primary store and then invalidate (or write through) the
//! affected keys before returning.
//!
//! # Usage
//!
//! ```ignore
//! let tweets = CachedRepository::new(primary, cache, CacheConfig::from_env())?;
//!
//! let tweet = tweets.get(tweet_id).await?;
//! let page = tweets.list_by_owner(owner, PageParams::new(1, 10)).await?;
//!
//! // Commits, then drops `tweet:<id>` and `tweets:<owner>` from the cache.
//! let updated = tweets.update(tweet_id, &TweetPatch { content: Some(text) }).await?;
//! ```

use std::sync::Arc;

use tubecache_core::{
    CacheConfig, PageParams, RecordFilter, StoreError, TubeResult, UserId, Video, VideoId,
    VideoPatch,
};

use crate::cache::{CacheAside, CacheRead, CacheStats, CacheStore, EntityCodec, JsonCodec};
use crate::primary::{Document, PrimaryStore};

/// Read and write access to one record kind with cache-aside reads.
pub struct CachedRepository<T, P, C, K = JsonCodec<T>>
where
    T: Document,
    P: PrimaryStore<T>,
    C: CacheStore,
    K: EntityCodec<T>,
{
    primary: Arc<P>,
    cache: CacheAside<T, P, C, K>,
}

impl<T, P, C> CachedRepository<T, P, C, JsonCodec<T>>
where
    T: Document,
    P: PrimaryStore<T>,
    C: CacheStore,
{
    /// Create a repository using the JSON codec.
    pub fn new(primary: Arc<P>, cache: Arc<C>, config: CacheConfig) -> TubeResult<Self> {
        let orchestrator = CacheAside::new(Arc::clone(&primary), cache, config)?;
        Ok(Self {
            primary,
            cache: orchestrator,
        })
    }
}

impl<T, P, C, K> CachedRepository<T, P, C, K>
where
    T: Document,
    P: PrimaryStore<T>,
    C: CacheStore,
    K: EntityCodec<T>,
{
    /// Create a repository with an explicit codec.
    pub fn with_codec(primary: Arc<P>, cache: Arc<C>, codec: K, config: CacheConfig) -> TubeResult<Self> {
        let orchestrator = CacheAside::with_codec(Arc::clone(&primary), cache, codec, config)?;
        Ok(Self {
            primary,
            cache: orchestrator,
        })
    }

    /// The orchestrator behind this repository.
    pub fn cache(&self) -> &CacheAside<T, P, C, K> {
        &self.cache
    }

    pub fn stats(&self) -> CacheStats {
        self.cache.stats()
    }

    /// Get a record by id, cache first.
    ///
    /// # Errors
    ///
    /// `StoreError::NotFound` if the primary store has no such record.
    pub async fn get(&self, id: T::Id) -> TubeResult<T> {
        self.get_read(id).await.map(CacheRead::into_value)
    }

    /// Like [`get`](Self::get), but reports whether the cache served it.
    pub async fn get_read(&self, id: T::Id) -> TubeResult<CacheRead<T>> {
        self.cache
            .read_through(id)
            .await?
            .ok_or_else(|| not_found::<T>(id))
    }

    /// One page of an owner's records, cache first.
    pub async fn list_by_owner(&self, owner: UserId, page: PageParams) -> TubeResult<Vec<T>> {
        self.cache
            .read_through_scoped(owner, page)
            .await
            .map(CacheRead::into_value)
    }

    /// One page of records matching `filter`, read straight from the primary
    /// store.
    pub async fn list(&self, filter: &RecordFilter, page: PageParams) -> TubeResult<Vec<T>> {
        self.cache
            .primary_call("find", self.primary.find(filter, Some(page)))
            .await
    }

    /// Insert a record.
    pub async fn create(&self, record: T) -> TubeResult<T> {
        let created = self
            .cache
            .primary_call("create", self.primary.create(record))
            .await?;

        if self.cache.config().invalidate_scope_on_write {
            self.cache.invalidate_scoped(created.owner_id()).await;
        }

        tracing::debug!(kind = %T::entity_kind(), id = %created.entity_id(), "Record created");
        Ok(created)
    }

    /// Apply a patch and return the updated record.
    ///
    /// The cache is only touched once the primary store has confirmed the
    /// update. A missing record returns `NotFound` and leaves the cache alone.
    pub async fn update(&self, id: T::Id, patch: &T::Patch) -> TubeResult<T> {
        let updated = self
            .cache
            .primary_call("update", self.primary.update(id, patch))
            .await?
            .ok_or_else(|| not_found::<T>(id))?;

        if self.cache.config().write_through_on_update {
            self.cache.write_through_if_present(id, Some(&updated)).await;
        } else {
            self.cache.invalidate(id).await;
        }

        if self.cache.config().invalidate_scope_on_write {
            self.cache.invalidate_scoped(updated.owner_id()).await;
        }

        tracing::debug!(kind = %T::entity_kind(), id = %id, "Record updated");
        Ok(updated)
    }

    /// Delete a record and return it.
    pub async fn delete(&self, id: T::Id) -> TubeResult<T> {
        let deleted = self
            .cache
            .primary_call("delete", self.primary.delete(id))
            .await?
            .ok_or_else(|| not_found::<T>(id))?;

        self.cache.invalidate(id).await;
        if self.cache.config().invalidate_scope_on_write {
            self.cache.invalidate_scoped(deleted.owner_id()).await;
        }

        tracing::debug!(kind = %T::entity_kind(), id = %id, "Record deleted");
        Ok(deleted)
    }
}

impl<P, C, K> CachedRepository<Video, P, C, K>
where
    P: PrimaryStore<Video>,
    C: CacheStore,
    K: EntityCodec<Video>,
{
    /// Flip a video's publish flag.
    ///
    /// The current flag is read from the primary store, never from the cache,
    /// so a stale cached copy cannot flip it the wrong way.
    pub async fn toggle_publish(&self, id: VideoId) -> TubeResult<Video> {
        let current = self
            .cache
            .primary_call("get", self.primary.get(id))
            .await?
            .ok_or_else(|| not_found::<Video>(id))?;

        let patch = VideoPatch {
            is_published: Some(!current.is_published),
            ..VideoPatch::default()
        };
        self.update(id, &patch).await
    }
}

fn not_found<T: Document>(id: T::Id) -> tubecache_core::TubeError {
    StoreError::NotFound {
        kind: T::entity_kind(),
        id: id.to_string(),
    }
    .into()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{CacheKey, InMemoryCacheStore};
    use crate::primary::InMemoryPrimaryStore;
    use chrono::Utc;
    use tubecache_core::{EntityIdType, EntityKind, Tweet, TweetId, TweetPatch};

    type TweetRepo = CachedRepository<Tweet, InMemoryPrimaryStore<Tweet>, InMemoryCacheStore>;
    type VideoRepo = CachedRepository<Video, InMemoryPrimaryStore<Video>, InMemoryCacheStore>;

    fn tweet(owner: UserId, content: &str) -> Tweet {
        let now = Utc::now();
        Tweet {
            tweet_id: TweetId::now_v7(),
            owner,
            content: content.to_string(),
            created_at: now,
            updated_at: now,
        }
    }

    fn video(owner: UserId) -> Video {
        let now = Utc::now();
        Video {
            video_id: VideoId::now_v7(),
            owner,
            video_file: "https://media.example/v.mp4".to_string(),
            thumbnail: "https://media.example/v.jpg".to_string(),
            title: "title".to_string(),
            description: "description".to_string(),
            duration_ms: 61_000,
            views: 0,
            is_published: true,
            created_at: now,
            updated_at: now,
        }
    }

    fn tweet_repo(
        config: CacheConfig,
    ) -> (TweetRepo, Arc<InMemoryPrimaryStore<Tweet>>, Arc<InMemoryCacheStore>) {
        let primary = Arc::new(InMemoryPrimaryStore::new());
        let cache = Arc::new(InMemoryCacheStore::new());
        let repo = TweetRepo::new(primary.clone(), cache.clone(), config)
            .expect("config should validate");
        (repo, primary, cache)
    }

    #[tokio::test]
    async fn test_get_missing_is_not_found() {
        let (repo, _primary, cache) = tweet_repo(CacheConfig::default());
        let err = repo
            .get(TweetId::now_v7())
            .await
            .expect_err("missing record should fail");
        assert!(err.is_not_found());
        assert!(cache.is_empty().await);
    }

    #[tokio::test]
    async fn test_update_invalidates_record_and_scope() {
        let (repo, _primary, cache) = tweet_repo(CacheConfig::default());
        let owner = UserId::now_v7();
        let t = repo.create(tweet(owner, "hi")).await.expect("create should succeed");

        repo.get(t.tweet_id).await.expect("get should succeed");
        repo.list_by_owner(owner, PageParams::default())
            .await
            .expect("list should succeed");
        assert_eq!(cache.len().await, 2);

        let patch = TweetPatch {
            content: Some("bye".to_string()),
        };
        let updated = repo.update(t.tweet_id, &patch).await.expect("update should succeed");
        assert_eq!(updated.content, "bye");
        assert!(cache.is_empty().await);

        let read = repo.get_read(t.tweet_id).await.expect("get should succeed");
        assert!(read.was_cache_miss());
        assert_eq!(read.value().content, "bye");

        let listing = repo
            .list_by_owner(owner, PageParams::default())
            .await
            .expect("list should succeed");
        assert_eq!(listing, vec![updated]);
    }

    #[tokio::test]
    async fn test_update_with_write_through() {
        let (repo, _primary, cache) =
            tweet_repo(CacheConfig::default().with_write_through(true));
        let t = repo
            .create(tweet(UserId::now_v7(), "hi"))
            .await
            .expect("create should succeed");
        repo.get(t.tweet_id).await.expect("get should succeed");

        let patch = TweetPatch {
            content: Some("bye".to_string()),
        };
        repo.update(t.tweet_id, &patch).await.expect("update should succeed");
        assert!(cache.contains(&CacheKey::record(EntityKind::Tweet, t.tweet_id)).await);

        let read = repo.get_read(t.tweet_id).await.expect("get should succeed");
        assert!(read.was_cache_hit());
        assert_eq!(read.value().content, "bye");
    }

    #[tokio::test]
    async fn test_update_missing_leaves_cache_alone() {
        let (repo, primary, cache) = tweet_repo(CacheConfig::default());
        let t = tweet(UserId::now_v7(), "hi");
        primary.put_raw(t.clone()).await;
        repo.get(t.tweet_id).await.expect("get should succeed");

        let patch = TweetPatch {
            content: Some("bye".to_string()),
        };
        let err = repo
            .update(TweetId::now_v7(), &patch)
            .await
            .expect_err("missing record should fail");
        assert!(err.is_not_found());
        assert_eq!(cache.len().await, 1);
        assert_eq!(repo.stats().invalidations, 0);
    }

    #[tokio::test]
    async fn test_delete_invalidates() {
        let (repo, _primary, cache) = tweet_repo(CacheConfig::default());
        let t = repo
            .create(tweet(UserId::now_v7(), "hi"))
            .await
            .expect("create should succeed");
        repo.get(t.tweet_id).await.expect("get should succeed");

        let deleted = repo.delete(t.tweet_id).await.expect("delete should succeed");
        assert_eq!(deleted, t);
        assert!(cache.is_empty().await);
        assert!(repo
            .get(t.tweet_id)
            .await
            .expect_err("deleted record should be gone")
            .is_not_found());
        assert!(repo
            .delete(t.tweet_id)
            .await
            .expect_err("second delete should fail")
            .is_not_found());
    }

    #[tokio::test]
    async fn test_create_invalidates_owner_listing() {
        let (repo, _primary, _cache) = tweet_repo(CacheConfig::default());
        let owner = UserId::now_v7();
        assert!(repo
            .list_by_owner(owner, PageParams::default())
            .await
            .expect("list should succeed")
            .is_empty());

        let t = repo.create(tweet(owner, "hi")).await.expect("create should succeed");
        let listing = repo
            .list_by_owner(owner, PageParams::default())
            .await
            .expect("list should succeed");
        assert_eq!(listing, vec![t]);
    }

    #[tokio::test]
    async fn test_create_without_scope_invalidation_keeps_stale_listing() {
        let (repo, _primary, _cache) =
            tweet_repo(CacheConfig::default().with_scope_invalidation(false));
        let owner = UserId::now_v7();
        repo.list_by_owner(owner, PageParams::default())
            .await
            .expect("list should succeed");

        repo.create(tweet(owner, "hi")).await.expect("create should succeed");
        assert!(repo
            .list_by_owner(owner, PageParams::default())
            .await
            .expect("list should succeed")
            .is_empty());
    }

    #[tokio::test]
    async fn test_list_is_uncached() {
        let (repo, primary, cache) = tweet_repo(CacheConfig::default());
        let owner = UserId::now_v7();
        for i in 0..3 {
            primary.put_raw(tweet(owner, &format!("t{i}"))).await;
        }

        for _ in 0..2 {
            let page = repo
                .list(&RecordFilter::all(), PageParams::new(1, 2))
                .await
                .expect("list should succeed");
            assert_eq!(page.len(), 2);
        }
        assert_eq!(primary.calls().find, 2);
        assert!(cache.is_empty().await);
    }

    #[tokio::test]
    async fn test_toggle_publish_reads_primary() {
        let primary = Arc::new(InMemoryPrimaryStore::new());
        let cache = Arc::new(InMemoryCacheStore::new());
        let repo = VideoRepo::new(primary.clone(), cache.clone(), CacheConfig::default())
            .expect("config should validate");

        let v = video(UserId::now_v7());
        primary.put_raw(v.clone()).await;
        repo.get(v.video_id).await.expect("get should succeed");

        // Someone unpublished it behind the cache's back.
        primary
            .put_raw(Video {
                is_published: false,
                ..v.clone()
            })
            .await;

        let toggled = repo.toggle_publish(v.video_id).await.expect("toggle should succeed");
        assert!(toggled.is_published);
        assert!(repo.get(v.video_id).await.expect("get should succeed").is_published);

        let err = repo
            .toggle_publish(VideoId::now_v7())
            .await
            .expect_err("missing video should fail");
        assert!(err.is_not_found());
    }
}

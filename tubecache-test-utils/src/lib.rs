//! TUBECACHE Test Utilities
//!
//! Shared test infrastructure for the tubecache workspace:
//! - Proptest generators for ids and records
//! - Fixtures for common records and wired-up repositories
//! - Cache and primary store wrappers that inject faults, stalls and pauses
//! - Assertions for tubecache results

// Re-export the in-memory stores from their source crate
pub use tubecache_storage::{
    CacheAside, CacheKey, CacheRead, CacheStore, CachedRepository, InMemoryCacheStore,
    InMemoryPrimaryStore, LmdbCacheStore, PrimaryStore,
};

// Re-export core types for convenience
pub use tubecache_core::{
    CacheConfig, CacheError, Comment, CommentId, CommentPatch, EntityIdType, EntityKind,
    PageParams, RecordFilter, StoreError, Timestamp, TubeError, TubeResult, Tweet, TweetId,
    TweetPatch, UserId, Video, VideoId, VideoPatch,
};

use chrono::Utc;
use uuid::Uuid;

// ============================================================================
// PROPTEST GENERATORS
// ============================================================================

pub mod generators {
    //! Proptest strategies for generating tubecache records.

    use super::*;
    use proptest::prelude::*;

    // === Identity Type Generators ===

    /// Generate a random UUID (for generic ID generation).
    pub fn arb_uuid() -> impl Strategy<Value = Uuid> {
        any::<[u8; 16]>().prop_map(Uuid::from_bytes)
    }

    pub fn arb_user_id() -> impl Strategy<Value = UserId> {
        arb_uuid().prop_map(UserId::new)
    }

    pub fn arb_video_id() -> impl Strategy<Value = VideoId> {
        arb_uuid().prop_map(VideoId::new)
    }

    pub fn arb_tweet_id() -> impl Strategy<Value = TweetId> {
        arb_uuid().prop_map(TweetId::new)
    }

    pub fn arb_comment_id() -> impl Strategy<Value = CommentId> {
        arb_uuid().prop_map(CommentId::new)
    }

    /// Generate a Timestamp with sub-second precision.
    pub fn arb_timestamp() -> impl Strategy<Value = Timestamp> {
        // Between 2020 and 2030
        (1577836800i64..1893456000i64, 0u32..1_000_000_000).prop_map(|(secs, nanos)| {
            chrono::DateTime::from_timestamp(secs, nanos).unwrap_or_else(Utc::now)
        })
    }

    /// Free text including quotes, escapes, and non-ASCII.
    pub fn arb_text() -> impl Strategy<Value = String> {
        prop_oneof![
            "[a-zA-Z0-9 .,!?]{0,200}",
            "\\PC{0,80}",
            Just("\"quoted\" \\ back\\slash \n newline".to_string()),
            Just("héllo wörld \u{1F3AC}".to_string()),
        ]
    }

    pub fn arb_url() -> impl Strategy<Value = String> {
        "[a-z0-9]{1,20}".prop_map(|name| format!("https://media.example/{name}.bin"))
    }

    pub fn arb_entity_kind() -> impl Strategy<Value = EntityKind> {
        prop_oneof![
            Just(EntityKind::Video),
            Just(EntityKind::Tweet),
            Just(EntityKind::Comment),
        ]
    }

    pub fn arb_page_params() -> impl Strategy<Value = PageParams> {
        (0usize..6, 0usize..12).prop_map(|(page, limit)| PageParams::new(page, limit))
    }

    // === Record Generators ===

    /// Generate a Video.
    pub fn arb_video() -> impl Strategy<Value = Video> {
        (
            arb_video_id(),
            arb_user_id(),
            arb_url(),
            arb_url(),
            arb_text(),
            arb_text(),
            any::<u64>(),
            any::<u64>(),
            any::<bool>(),
            arb_timestamp(),
            arb_timestamp(),
        )
            .prop_map(
                |(
                    video_id,
                    owner,
                    video_file,
                    thumbnail,
                    title,
                    description,
                    duration_ms,
                    views,
                    is_published,
                    created_at,
                    updated_at,
                )| Video {
                    video_id,
                    owner,
                    video_file,
                    thumbnail,
                    title,
                    description,
                    duration_ms,
                    views,
                    is_published,
                    created_at,
                    updated_at,
                },
            )
    }

    /// Generate a Tweet.
    pub fn arb_tweet() -> impl Strategy<Value = Tweet> {
        arb_user_id().prop_flat_map(arb_tweet_for)
    }

    /// Generate a Tweet owned by `owner`.
    pub fn arb_tweet_for(owner: UserId) -> impl Strategy<Value = Tweet> {
        (arb_tweet_id(), arb_text(), arb_timestamp(), arb_timestamp()).prop_map(
            move |(tweet_id, content, created_at, updated_at)| Tweet {
                tweet_id,
                owner,
                content,
                created_at,
                updated_at,
            },
        )
    }

    /// Generate a Comment.
    pub fn arb_comment() -> impl Strategy<Value = Comment> {
        (
            arb_comment_id(),
            arb_video_id(),
            arb_user_id(),
            arb_text(),
            arb_timestamp(),
            arb_timestamp(),
        )
            .prop_map(
                |(comment_id, video, owner, content, created_at, updated_at)| Comment {
                    comment_id,
                    video,
                    owner,
                    content,
                    created_at,
                    updated_at,
                },
            )
    }
}

// ============================================================================
// TEST FIXTURES
// ============================================================================

pub mod fixtures {
    //! Pre-built records and wired-up stores.

    use super::*;
    use std::sync::Arc;

    /// Tweet repository over in-memory stores.
    pub type MemTweetRepo = CachedRepository<Tweet, InMemoryPrimaryStore<Tweet>, InMemoryCacheStore>;

    /// Video repository over in-memory stores.
    pub type MemVideoRepo = CachedRepository<Video, InMemoryPrimaryStore<Video>, InMemoryCacheStore>;

    /// Comment repository over in-memory stores.
    pub type MemCommentRepo =
        CachedRepository<Comment, InMemoryPrimaryStore<Comment>, InMemoryCacheStore>;

    /// A tweet created now.
    pub fn tweet(owner: UserId, content: &str) -> Tweet {
        let now = Utc::now();
        Tweet {
            tweet_id: TweetId::now_v7(),
            owner,
            content: content.to_string(),
            created_at: now,
            updated_at: now,
        }
    }

    /// A published video created now.
    pub fn video(owner: UserId, title: &str) -> Video {
        let now = Utc::now();
        Video {
            video_id: VideoId::now_v7(),
            owner,
            video_file: "https://media.example/video.mp4".to_string(),
            thumbnail: "https://media.example/thumb.jpg".to_string(),
            title: title.to_string(),
            description: format!("About {title}"),
            duration_ms: 90_000,
            views: 0,
            is_published: true,
            created_at: now,
            updated_at: now,
        }
    }

    /// A comment on `video` created now.
    pub fn comment(video: VideoId, owner: UserId, content: &str) -> Comment {
        let now = Utc::now();
        Comment {
            comment_id: CommentId::now_v7(),
            video,
            owner,
            content: content.to_string(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Fresh in-memory primary and cache stores.
    pub fn stores<T: tubecache_storage::Document>() -> (Arc<InMemoryPrimaryStore<T>>, Arc<InMemoryCacheStore>) {
        (
            Arc::new(InMemoryPrimaryStore::new()),
            Arc::new(InMemoryCacheStore::new()),
        )
    }

    /// A tweet repository with the given config, plus handles to both stores.
    pub fn tweet_repo(
        config: CacheConfig,
    ) -> (MemTweetRepo, Arc<InMemoryPrimaryStore<Tweet>>, Arc<InMemoryCacheStore>) {
        let (primary, cache) = stores::<Tweet>();
        let repo = MemTweetRepo::new(Arc::clone(&primary), Arc::clone(&cache), config)
            .unwrap_or_else(|e| panic!("fixture config must validate: {e}"));
        (repo, primary, cache)
    }

    /// A video repository with the given config, plus handles to both stores.
    pub fn video_repo(
        config: CacheConfig,
    ) -> (MemVideoRepo, Arc<InMemoryPrimaryStore<Video>>, Arc<InMemoryCacheStore>) {
        let (primary, cache) = stores::<Video>();
        let repo = MemVideoRepo::new(Arc::clone(&primary), Arc::clone(&cache), config)
            .unwrap_or_else(|e| panic!("fixture config must validate: {e}"));
        (repo, primary, cache)
    }

    /// A comment repository with the given config, plus handles to both stores.
    pub fn comment_repo(
        config: CacheConfig,
    ) -> (MemCommentRepo, Arc<InMemoryPrimaryStore<Comment>>, Arc<InMemoryCacheStore>) {
        let (primary, cache) = stores::<Comment>();
        let repo = MemCommentRepo::new(Arc::clone(&primary), Arc::clone(&cache), config)
            .unwrap_or_else(|e| panic!("fixture config must validate: {e}"));
        (repo, primary, cache)
    }
}

// ============================================================================
// FAULT INJECTION
// ============================================================================

pub mod faults {
    //! Store wrappers that fail, stall, or pause on demand.

    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
    use std::time::Duration;
    use tokio::sync::Notify;
    use tubecache_storage::{CacheResult, Document};

    /// Cache store operation, for targeting faults.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub enum CacheOp {
        Get,
        Set,
        Delete,
    }

    /// Cache store wrapper that can fail or stall each operation.
    ///
    /// With no faults armed it forwards every call to the inner store.
    #[derive(Debug, Default)]
    pub struct FaultyCacheStore<C> {
        inner: C,
        fail_get: AtomicBool,
        fail_set: AtomicBool,
        fail_delete: AtomicBool,
        stall_ms: AtomicU64,
        calls: AtomicU64,
    }

    impl<C: CacheStore> FaultyCacheStore<C> {
        pub fn new(inner: C) -> Self {
            Self {
                inner,
                fail_get: AtomicBool::new(false),
                fail_set: AtomicBool::new(false),
                fail_delete: AtomicBool::new(false),
                stall_ms: AtomicU64::new(0),
                calls: AtomicU64::new(0),
            }
        }

        /// The wrapped store.
        pub fn inner(&self) -> &C {
            &self.inner
        }

        /// Make one operation fail with `CacheError::Unavailable`.
        pub fn set_failing(&self, op: CacheOp, failing: bool) {
            let flag = match op {
                CacheOp::Get => &self.fail_get,
                CacheOp::Set => &self.fail_set,
                CacheOp::Delete => &self.fail_delete,
            };
            flag.store(failing, Ordering::SeqCst);
        }

        /// Make every operation fail.
        pub fn set_down(&self, down: bool) {
            for op in [CacheOp::Get, CacheOp::Set, CacheOp::Delete] {
                self.set_failing(op, down);
            }
        }

        /// Delay every operation by `stall` before it runs. Zero disables.
        pub fn set_stall(&self, stall: Duration) {
            let millis = u64::try_from(stall.as_millis()).unwrap_or(u64::MAX);
            self.stall_ms.store(millis, Ordering::SeqCst);
        }

        /// Total calls received, including failed ones.
        pub fn calls(&self) -> u64 {
            self.calls.load(Ordering::SeqCst)
        }

        async fn enter(&self, flag: &AtomicBool) -> CacheResult<()> {
            self.calls.fetch_add(1, Ordering::SeqCst);

            let stall = self.stall_ms.load(Ordering::SeqCst);
            if stall > 0 {
                tokio::time::sleep(Duration::from_millis(stall)).await;
            }

            if flag.load(Ordering::SeqCst) {
                return Err(CacheError::Unavailable {
                    reason: "injected fault".to_string(),
                });
            }
            Ok(())
        }
    }

    #[async_trait]
    impl<C: CacheStore> CacheStore for FaultyCacheStore<C> {
        async fn get(&self, key: &CacheKey) -> CacheResult<Option<Vec<u8>>> {
            self.enter(&self.fail_get).await?;
            self.inner.get(key).await
        }

        async fn set(&self, key: &CacheKey, value: Vec<u8>, ttl: Option<Duration>) -> CacheResult<()> {
            self.enter(&self.fail_set).await?;
            self.inner.set(key, value, ttl).await
        }

        async fn delete(&self, key: &CacheKey) -> CacheResult<()> {
            self.enter(&self.fail_delete).await?;
            self.inner.delete(key).await
        }
    }

    /// Primary store wrapper that can pause a `get` after it has read.
    ///
    /// Once armed, the next `get` reads from the inner store, signals
    /// [`wait_until_read`](Self::wait_until_read), and then waits for
    /// [`release`](Self::release) before returning. This lets a test slot a
    /// write between a reader's primary read and its cache population.
    #[derive(Debug)]
    pub struct PausingPrimaryStore<T: Document> {
        inner: InMemoryPrimaryStore<T>,
        armed: AtomicBool,
        reached: Notify,
        released: Notify,
    }

    impl<T: Document> PausingPrimaryStore<T> {
        pub fn new(inner: InMemoryPrimaryStore<T>) -> Self {
            Self {
                inner,
                armed: AtomicBool::new(false),
                reached: Notify::new(),
                released: Notify::new(),
            }
        }

        pub fn inner(&self) -> &InMemoryPrimaryStore<T> {
            &self.inner
        }

        /// Pause the next `get`.
        pub fn arm(&self) {
            self.armed.store(true, Ordering::SeqCst);
        }

        /// Wait until a paused `get` has read its value.
        pub async fn wait_until_read(&self) {
            self.reached.notified().await;
        }

        /// Let the paused `get` return.
        pub fn release(&self) {
            self.released.notify_one();
        }
    }

    #[async_trait]
    impl<T: Document> PrimaryStore<T> for PausingPrimaryStore<T> {
        async fn get(&self, id: T::Id) -> TubeResult<Option<T>> {
            let result = self.inner.get(id).await;
            if self.armed.swap(false, Ordering::SeqCst) {
                self.reached.notify_one();
                self.released.notified().await;
            }
            result
        }

        async fn find(&self, filter: &RecordFilter, page: Option<PageParams>) -> TubeResult<Vec<T>> {
            self.inner.find(filter, page).await
        }

        async fn create(&self, record: T) -> TubeResult<T> {
            self.inner.create(record).await
        }

        async fn update(&self, id: T::Id, patch: &T::Patch) -> TubeResult<Option<T>> {
            self.inner.update(id, patch).await
        }

        async fn delete(&self, id: T::Id) -> TubeResult<Option<T>> {
            self.inner.delete(id).await
        }
    }
}

// ============================================================================
// CUSTOM ASSERTIONS
// ============================================================================

pub mod assertions {
    //! Assertion functions for tubecache results.

    use super::*;

    /// Assert that a TubeResult is Ok.
    #[track_caller]
    pub fn assert_ok<T: std::fmt::Debug>(result: &TubeResult<T>) {
        assert!(result.is_ok(), "Expected Ok, got Err: {:?}", result);
    }

    /// Assert that a TubeResult is a NotFound store error for `kind`.
    #[track_caller]
    pub fn assert_not_found<T: std::fmt::Debug>(result: &TubeResult<T>, kind: EntityKind) {
        match result {
            Err(TubeError::Store(StoreError::NotFound { kind: k, .. })) => {
                assert_eq!(*k, kind, "Wrong kind in NotFound error");
            }
            other => panic!("Expected NotFound error for {}, got: {:?}", kind, other),
        }
    }

    /// Assert that a TubeResult is a store error other than NotFound.
    #[track_caller]
    pub fn assert_store_failure<T: std::fmt::Debug>(result: &TubeResult<T>) {
        match result {
            Err(TubeError::Store(StoreError::NotFound { .. })) => {
                panic!("Expected a store failure, got NotFound")
            }
            Err(TubeError::Store(_)) => {}
            other => panic!("Expected Store error, got: {:?}", other),
        }
    }

    /// Assert that a read was served from the cache.
    #[track_caller]
    pub fn assert_cache_hit<T: std::fmt::Debug>(read: &CacheRead<T>) {
        assert!(read.was_cache_hit(), "Expected cache hit, got: {:?}", read);
    }

    /// Assert that a read went to the primary store.
    #[track_caller]
    pub fn assert_cache_miss<T: std::fmt::Debug>(read: &CacheRead<T>) {
        assert!(read.was_cache_miss(), "Expected cache miss, got: {:?}", read);
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_tweet_fixture() {
        let owner = UserId::now_v7();
        let t = fixtures::tweet(owner, "hi");
        assert_eq!(t.owner, owner);
        assert_eq!(t.content, "hi");
        assert_eq!(t.created_at, t.updated_at);
    }

    #[test]
    fn test_video_fixture_is_published() {
        let v = fixtures::video(UserId::now_v7(), "launch");
        assert!(v.is_published);
        assert_eq!(v.description, "About launch");
    }

    #[test]
    fn test_comment_fixture_links_video() {
        let v = fixtures::video(UserId::now_v7(), "launch");
        let c = fixtures::comment(v.video_id, UserId::now_v7(), "nice");
        assert_eq!(c.video, v.video_id);
    }

    #[tokio::test]
    async fn test_faulty_cache_store_forwards_when_healthy() {
        let store = faults::FaultyCacheStore::new(InMemoryCacheStore::new());
        let key = CacheKey::record(EntityKind::Tweet, TweetId::now_v7());
        store.set(&key, b"x".to_vec(), None).await.expect("set should succeed");
        assert_eq!(
            store.get(&key).await.expect("get should succeed"),
            Some(b"x".to_vec())
        );
        assert_eq!(store.calls(), 2);
    }

    #[tokio::test]
    async fn test_faulty_cache_store_fails_targeted_op() {
        let store = faults::FaultyCacheStore::new(InMemoryCacheStore::new());
        let key = CacheKey::record(EntityKind::Tweet, TweetId::now_v7());
        store.set_failing(faults::CacheOp::Set, true);
        assert!(store.set(&key, b"x".to_vec(), None).await.is_err());
        assert!(store.get(&key).await.is_ok());
        assert!(store.inner().is_empty().await);
    }

    #[test]
    fn test_assert_not_found_accepts_matching_kind() {
        let result: TubeResult<()> = Err(StoreError::NotFound {
            kind: EntityKind::Video,
            id: "x".to_string(),
        }
        .into());
        assertions::assert_not_found(&result, EntityKind::Video);
    }

    proptest! {
        #[test]
        fn prop_generated_tweets_are_owned(
            (owner, tweet) in generators::arb_user_id()
                .prop_flat_map(|owner| (Just(owner), generators::arb_tweet_for(owner)))
        ) {
            prop_assert_eq!(tweet.owner, owner);
        }

        #[test]
        fn prop_page_params_are_clamped(page in generators::arb_page_params()) {
            prop_assert!(page.page() >= 1);
            prop_assert!(page.limit() >= 1);
        }
    }
}

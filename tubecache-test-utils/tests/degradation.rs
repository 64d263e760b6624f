//! Cache faults never surface; primary store faults always do.

use std::sync::Arc;
use std::time::Duration;

use tempfile::TempDir;
use tubecache_test_utils::assertions::{assert_cache_hit, assert_cache_miss, assert_store_failure};
use tubecache_test_utils::faults::{CacheOp, FaultyCacheStore};
use tubecache_test_utils::fixtures;
use tubecache_test_utils::*;

type FaultyTweetRepo =
    CachedRepository<Tweet, InMemoryPrimaryStore<Tweet>, FaultyCacheStore<InMemoryCacheStore>>;

fn faulty_repo(
    config: CacheConfig,
) -> (
    FaultyTweetRepo,
    Arc<InMemoryPrimaryStore<Tweet>>,
    Arc<FaultyCacheStore<InMemoryCacheStore>>,
) {
    let primary = Arc::new(InMemoryPrimaryStore::new());
    let cache = Arc::new(FaultyCacheStore::new(InMemoryCacheStore::new()));
    let repo = FaultyTweetRepo::new(Arc::clone(&primary), Arc::clone(&cache), config)
        .expect("config should validate");
    (repo, primary, cache)
}

#[tokio::test]
async fn every_operation_survives_a_dead_cache() {
    let (repo, primary, cache) = faulty_repo(CacheConfig::default());
    cache.set_down(true);
    let owner = UserId::now_v7();

    let t = repo
        .create(fixtures::tweet(owner, "hi"))
        .await
        .expect("create should succeed");
    assert_eq!(repo.get(t.tweet_id).await.expect("get should succeed"), t);
    assert_eq!(
        repo.list_by_owner(owner, PageParams::default())
            .await
            .expect("list should succeed"),
        vec![t.clone()]
    );

    let patch = TweetPatch {
        content: Some("bye".to_string()),
    };
    let updated = repo.update(t.tweet_id, &patch).await.expect("update should succeed");
    assert_eq!(updated.content, "bye");
    repo.delete(t.tweet_id).await.expect("delete should succeed");

    assert!(primary.is_empty().await);
    let stats = repo.stats();
    assert_eq!(stats.hits, 0);
    assert!(stats.cache_faults > 0);
}

#[tokio::test]
async fn cache_recovers_after_outage() {
    let (repo, primary, cache) = faulty_repo(CacheConfig::default());
    let t = fixtures::tweet(UserId::now_v7(), "hi");
    primary.put_raw(t.clone()).await;

    cache.set_down(true);
    assert_cache_miss(&repo.get_read(t.tweet_id).await.expect("get should succeed"));

    cache.set_down(false);
    assert_cache_miss(&repo.get_read(t.tweet_id).await.expect("get should succeed"));
    assert_cache_hit(&repo.get_read(t.tweet_id).await.expect("get should succeed"));
}

#[tokio::test]
async fn failed_population_is_swallowed() {
    let (repo, primary, cache) = faulty_repo(CacheConfig::default());
    cache.set_failing(CacheOp::Set, true);
    let t = fixtures::tweet(UserId::now_v7(), "hi");
    primary.put_raw(t.clone()).await;

    for _ in 0..2 {
        let read = repo.get_read(t.tweet_id).await.expect("get should succeed");
        assert_cache_miss(&read);
    }
    assert_eq!(repo.stats().population_failures, 2);
    assert!(cache.inner().is_empty().await);
}

#[tokio::test]
async fn failed_write_through_falls_back_to_delete() {
    let (repo, primary, cache) = faulty_repo(CacheConfig::default().with_write_through(true));
    let t = fixtures::tweet(UserId::now_v7(), "hi");
    primary.put_raw(t.clone()).await;
    repo.get(t.tweet_id).await.expect("get should succeed");

    cache.set_failing(CacheOp::Set, true);
    let patch = TweetPatch {
        content: Some("bye".to_string()),
    };
    repo.update(t.tweet_id, &patch).await.expect("update should succeed");
    cache.set_failing(CacheOp::Set, false);

    // The old value must not linger after a failed overwrite.
    let read = repo.get_read(t.tweet_id).await.expect("get should succeed");
    assert_cache_miss(&read);
    assert_eq!(read.value().content, "bye");
}

#[tokio::test]
async fn failed_invalidation_does_not_fail_the_write() {
    let (repo, primary, cache) = faulty_repo(CacheConfig::default());
    let t = fixtures::tweet(UserId::now_v7(), "hi");
    primary.put_raw(t.clone()).await;

    cache.set_failing(CacheOp::Delete, true);
    let patch = TweetPatch {
        content: Some("bye".to_string()),
    };
    let updated = repo.update(t.tweet_id, &patch).await.expect("update should succeed");
    assert_eq!(updated.content, "bye");
    assert_eq!(
        primary.get_raw(t.tweet_id).await.map(|t| t.content),
        Some("bye".to_string())
    );
}

#[tokio::test(start_paused = true)]
async fn stalled_cache_is_bounded_by_cache_timeout() {
    let config = CacheConfig::default().with_cache_timeout(Duration::from_millis(20));
    let (repo, primary, cache) = faulty_repo(config);
    cache.set_stall(Duration::from_secs(30));
    let t = fixtures::tweet(UserId::now_v7(), "hi");
    primary.put_raw(t.clone()).await;

    let started = tokio::time::Instant::now();
    let read = repo.get_read(t.tweet_id).await.expect("get should succeed");
    assert_cache_miss(&read);
    assert_eq!(read.into_value(), t);
    assert!(started.elapsed() < Duration::from_secs(1));

    let stats = repo.stats();
    assert_eq!(stats.cache_faults, 1);
    assert_eq!(stats.population_failures, 1);
}

#[tokio::test]
async fn primary_failure_propagates_even_with_warm_listing() {
    let (repo, primary, _cache) = fixtures::tweet_repo(CacheConfig::default());
    let owner = UserId::now_v7();
    primary.put_raw(fixtures::tweet(owner, "hi")).await;
    repo.list_by_owner(owner, PageParams::default())
        .await
        .expect("list should succeed");

    primary.set_unavailable(true);

    // Cached listing still serves.
    assert_eq!(
        repo.list_by_owner(owner, PageParams::default())
            .await
            .expect("cached listing should serve")
            .len(),
        1
    );
    // Anything that needs the primary store fails with its error.
    assert_store_failure(&repo.get(TweetId::now_v7()).await);
    assert_store_failure(&repo.create(fixtures::tweet(owner, "new")).await);
    assert_store_failure(&repo.list(&RecordFilter::all(), PageParams::default()).await);
}

#[tokio::test(start_paused = true)]
async fn slow_primary_times_out() {
    let (repo, primary, _cache) = fixtures::tweet_repo(CacheConfig::default());
    primary.set_latency(Duration::from_secs(60));

    let err = repo
        .update(TweetId::now_v7(), &TweetPatch::default())
        .await
        .expect_err("slow primary should time out");
    assert!(matches!(
        err,
        TubeError::Store(StoreError::Timeout { operation: "update", .. })
    ));
}

#[tokio::test]
async fn lmdb_store_backs_the_repository() {
    let dir = TempDir::new().expect("TempDir creation should succeed");
    let cache = Arc::new(LmdbCacheStore::new(dir.path(), 16).expect("store should open"));
    let primary = Arc::new(InMemoryPrimaryStore::<Video>::new());
    let repo = CachedRepository::<Video, InMemoryPrimaryStore<Video>, LmdbCacheStore>::new(
        Arc::clone(&primary),
        Arc::clone(&cache),
        CacheConfig::default(),
    )
    .expect("default config should validate");

    let owner = UserId::now_v7();
    let v = repo
        .create(fixtures::video(owner, "launch"))
        .await
        .expect("create should succeed");

    assert_cache_miss(&repo.get_read(v.video_id).await.expect("get should succeed"));
    assert_cache_hit(&repo.get_read(v.video_id).await.expect("get should succeed"));

    let listing = repo
        .list_by_owner(owner, PageParams::default())
        .await
        .expect("list should succeed");
    assert_eq!(listing, vec![v.clone()]);
    assert_eq!(cache.len().expect("len should succeed"), 2);

    let toggled = repo.toggle_publish(v.video_id).await.expect("toggle should succeed");
    assert!(!toggled.is_published);
    assert!(cache.is_empty().expect("len should succeed"));
    assert!(!repo.get(v.video_id).await.expect("get should succeed").is_published);
}

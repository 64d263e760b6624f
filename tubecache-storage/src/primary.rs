//! Primary store abstraction and an in-memory implementation.
//!
//! The primary store is the source of truth. It reports "not found" as
//! `Ok(None)` and reserves `Err` for real failures, which the cache-aside
//! layer propagates untouched.

use std::collections::HashMap;
use std::fmt::Debug;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tubecache_core::{
    Comment, CommentPatch, EntityIdType, PageParams, RecordFilter, StoreError, Timestamp,
    TubeResult, Tweet, TweetPatch, Video, VideoPatch,
};

use crate::cache::CacheableEntity;

/// A record the primary store can filter and patch.
pub trait Document: CacheableEntity {
    /// Partial update accepted by `PrimaryStore::update`.
    type Patch: Debug + Send + Sync;

    /// Apply `patch` in place.
    fn apply_patch(&mut self, patch: &Self::Patch);

    /// Whether this record satisfies every field set in `filter`.
    fn matches(&self, filter: &RecordFilter) -> bool;

    /// Creation time, used for newest-first ordering.
    fn created_at(&self) -> Timestamp;
}

impl Document for Video {
    type Patch = VideoPatch;

    fn apply_patch(&mut self, patch: &VideoPatch) {
        self.apply(patch);
    }

    fn matches(&self, filter: &RecordFilter) -> bool {
        // Videos carry no parent video, so a video filter matches nothing.
        filter.owner.map_or(true, |owner| owner == self.owner) && filter.video.is_none()
    }

    fn created_at(&self) -> Timestamp {
        self.created_at
    }
}

impl Document for Tweet {
    type Patch = TweetPatch;

    fn apply_patch(&mut self, patch: &TweetPatch) {
        self.apply(patch);
    }

    fn matches(&self, filter: &RecordFilter) -> bool {
        filter.owner.map_or(true, |owner| owner == self.owner) && filter.video.is_none()
    }

    fn created_at(&self) -> Timestamp {
        self.created_at
    }
}

impl Document for Comment {
    type Patch = CommentPatch;

    fn apply_patch(&mut self, patch: &CommentPatch) {
        self.apply(patch);
    }

    fn matches(&self, filter: &RecordFilter) -> bool {
        filter.owner.map_or(true, |owner| owner == self.owner)
            && filter.video.map_or(true, |video| video == self.video)
    }

    fn created_at(&self) -> Timestamp {
        self.created_at
    }
}

/// Source-of-truth store for one record kind.
///
/// None of these methods return an error for a missing record: `get`,
/// `update` and `delete` return `Ok(None)` instead.
#[async_trait]
pub trait PrimaryStore<T: Document>: Send + Sync {
    /// Get a record by id.
    async fn get(&self, id: T::Id) -> TubeResult<Option<T>>;

    /// List records matching `filter`, newest first, optionally paginated.
    async fn find(&self, filter: &RecordFilter, page: Option<PageParams>) -> TubeResult<Vec<T>>;

    /// Insert a new record.
    async fn create(&self, record: T) -> TubeResult<T>;

    /// Apply a patch and return the updated record.
    async fn update(&self, id: T::Id, patch: &T::Patch) -> TubeResult<Option<T>>;

    /// Delete a record and return what was removed.
    async fn delete(&self, id: T::Id) -> TubeResult<Option<T>>;
}

/// Snapshot of how often each primary store method was called.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PrimaryCallCounts {
    pub get: u64,
    pub find: u64,
    pub create: u64,
    pub update: u64,
    pub delete: u64,
}

impl PrimaryCallCounts {
    /// Total number of calls of any kind.
    pub fn total(&self) -> u64 {
        self.get + self.find + self.create + self.update + self.delete
    }
}

#[derive(Debug, Default)]
struct CallCounters {
    get: AtomicU64,
    find: AtomicU64,
    create: AtomicU64,
    update: AtomicU64,
    delete: AtomicU64,
}

/// In-memory primary store.
///
/// Counts calls per method so tests can tell a cache hit from a primary
/// read. Can be switched into an unavailable state or given artificial
/// latency to exercise error propagation and timeouts.
#[derive(Debug)]
pub struct InMemoryPrimaryStore<T: Document> {
    records: RwLock<HashMap<T::Id, T>>,
    calls: CallCounters,
    unavailable: AtomicBool,
    latency_ms: AtomicU64,
}

impl<T: Document> Default for InMemoryPrimaryStore<T> {
    fn default() -> Self {
        Self {
            records: RwLock::new(HashMap::new()),
            calls: CallCounters::default(),
            unavailable: AtomicBool::new(false),
            latency_ms: AtomicU64::new(0),
        }
    }
}

impl<T: Document> InMemoryPrimaryStore<T> {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store holding `records`.
    pub fn with_records(records: impl IntoIterator<Item = T>) -> Self {
        let map = records
            .into_iter()
            .map(|record| (record.entity_id(), record))
            .collect();
        Self {
            records: RwLock::new(map),
            ..Self::default()
        }
    }

    /// Insert or replace a record directly, bypassing counters and failure
    /// injection. Models a write the cache layer never saw.
    pub async fn put_raw(&self, record: T) {
        self.records
            .write()
            .await
            .insert(record.entity_id(), record);
    }

    /// Read a record directly, bypassing counters and failure injection.
    pub async fn get_raw(&self, id: T::Id) -> Option<T> {
        self.records.read().await.get(&id).cloned()
    }

    /// Number of stored records.
    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Make every subsequent call fail with `StoreError::Unavailable`.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Delay every subsequent call by `latency`.
    pub fn set_latency(&self, latency: Duration) {
        let millis = u64::try_from(latency.as_millis()).unwrap_or(u64::MAX);
        self.latency_ms.store(millis, Ordering::SeqCst);
    }

    /// Snapshot of the call counters.
    pub fn calls(&self) -> PrimaryCallCounts {
        PrimaryCallCounts {
            get: self.calls.get.load(Ordering::Relaxed),
            find: self.calls.find.load(Ordering::Relaxed),
            create: self.calls.create.load(Ordering::Relaxed),
            update: self.calls.update.load(Ordering::Relaxed),
            delete: self.calls.delete.load(Ordering::Relaxed),
        }
    }

    /// Reset the call counters to zero.
    pub fn reset_calls(&self) {
        for counter in [
            &self.calls.get,
            &self.calls.find,
            &self.calls.create,
            &self.calls.update,
            &self.calls.delete,
        ] {
            counter.store(0, Ordering::Relaxed);
        }
    }

    async fn enter(&self, counter: &AtomicU64) -> TubeResult<()> {
        counter.fetch_add(1, Ordering::Relaxed);

        let latency = self.latency_ms.load(Ordering::SeqCst);
        if latency > 0 {
            tokio::time::sleep(Duration::from_millis(latency)).await;
        }

        if self.unavailable.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable {
                reason: "primary store marked unavailable".to_string(),
            }
            .into());
        }
        Ok(())
    }
}

#[async_trait]
impl<T: Document> PrimaryStore<T> for InMemoryPrimaryStore<T> {
    async fn get(&self, id: T::Id) -> TubeResult<Option<T>> {
        self.enter(&self.calls.get).await?;
        Ok(self.records.read().await.get(&id).cloned())
    }

    async fn find(&self, filter: &RecordFilter, page: Option<PageParams>) -> TubeResult<Vec<T>> {
        self.enter(&self.calls.find).await?;

        let mut matching: Vec<T> = self
            .records
            .read()
            .await
            .values()
            .filter(|record| record.matches(filter))
            .cloned()
            .collect();

        matching.sort_by(|a, b| {
            b.created_at()
                .cmp(&a.created_at())
                .then_with(|| b.entity_id().as_uuid().cmp(&a.entity_id().as_uuid()))
        });

        Ok(match page {
            Some(page) => page.apply(matching),
            None => matching,
        })
    }

    async fn create(&self, record: T) -> TubeResult<T> {
        self.enter(&self.calls.create).await?;

        let mut records = self.records.write().await;
        let id = record.entity_id();
        if records.contains_key(&id) {
            return Err(StoreError::InsertFailed {
                kind: T::entity_kind(),
                reason: format!("{id} already exists"),
            }
            .into());
        }
        records.insert(id, record.clone());
        Ok(record)
    }

    async fn update(&self, id: T::Id, patch: &T::Patch) -> TubeResult<Option<T>> {
        self.enter(&self.calls.update).await?;

        let mut records = self.records.write().await;
        Ok(records.get_mut(&id).map(|record| {
            record.apply_patch(patch);
            record.clone()
        }))
    }

    async fn delete(&self, id: T::Id) -> TubeResult<Option<T>> {
        self.enter(&self.calls.delete).await?;
        Ok(self.records.write().await.remove(&id))
    }
}

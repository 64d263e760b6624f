//! Cache-aside orchestrator.
//!
//! Reads go to the cache first and fall back to the primary store on a miss,
//! populating the cache with what the primary store returned. Mutations are
//! never made here: callers commit to the primary store first and then call
//! [`CacheAside::invalidate`] or [`CacheAside::write_through_if_present`].
//!
//! # Failure contract
//!
//! Every cache call runs under `cache_timeout`. A failed or timed-out cache
//! call, and any cached bytes that fail to decode, are logged at `warn`,
//! counted, and treated as a miss or a skipped write. Primary store calls run
//! under `primary_timeout` and their errors are returned as-is.
//!
//! # Accepted race
//!
//! A reader that misses, reads the primary store, and is then overtaken by a
//! writer's commit and invalidation will still populate the cache with the
//! value it read. That stale entry lives until the next invalidation of the
//! same key (single records) or until its TTL ends (listings). There is no
//! locking to close this window.

use std::future::Future;
use std::marker::PhantomData;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tubecache_core::{
    CacheConfig, CacheError, PageParams, RecordFilter, StoreError, TubeResult, UserId,
};

use super::codec::{EntityCodec, JsonCodec};
use super::key::{CacheKey, KeyPolicy, TtlClass};
use super::read::CacheRead;
use super::traits::{CacheStats, CacheStore};
use crate::primary::{Document, PrimaryStore};

#[derive(Debug, Default)]
struct StatsCounters {
    hits: AtomicU64,
    misses: AtomicU64,
    populations: AtomicU64,
    population_failures: AtomicU64,
    decode_failures: AtomicU64,
    cache_faults: AtomicU64,
    invalidations: AtomicU64,
}

impl StatsCounters {
    fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    fn snapshot(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            populations: self.populations.load(Ordering::Relaxed),
            population_failures: self.population_failures.load(Ordering::Relaxed),
            decode_failures: self.decode_failures.load(Ordering::Relaxed),
            cache_faults: self.cache_faults.load(Ordering::Relaxed),
            invalidations: self.invalidations.load(Ordering::Relaxed),
        }
    }
}

/// Cache-aside access to one record kind.
///
/// # Type Parameters
///
/// - `T`: the record kind
/// - `P`: the primary store holding `T`
/// - `C`: the cache store
/// - `K`: the codec used for cached bytes
///
/// # Example
///
/// ```ignore
/// let tweets = CacheAside::new(primary, cache, CacheConfig::default())?;
///
/// let read = tweets.read_through(tweet_id).await?;
/// let page = tweets.read_through_scoped(owner, PageParams::new(1, 10)).await?;
///
/// // After committing an update to the primary store:
/// tweets.invalidate(tweet_id).await;
/// ```
pub struct CacheAside<T, P, C, K = JsonCodec<T>>
where
    T: Document,
    P: PrimaryStore<T>,
    C: CacheStore,
    K: EntityCodec<T>,
{
    primary: Arc<P>,
    cache: Arc<C>,
    codec: K,
    policy: KeyPolicy,
    config: CacheConfig,
    stats: StatsCounters,
    _marker: PhantomData<fn() -> T>,
}

impl<T, P, C> CacheAside<T, P, C, JsonCodec<T>>
where
    T: Document,
    P: PrimaryStore<T>,
    C: CacheStore,
{
    /// Create an orchestrator using the JSON codec.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if `config` does not validate.
    pub fn new(primary: Arc<P>, cache: Arc<C>, config: CacheConfig) -> TubeResult<Self> {
        Self::with_codec(primary, cache, JsonCodec::new(), config)
    }
}

impl<T, P, C, K> CacheAside<T, P, C, K>
where
    T: Document,
    P: PrimaryStore<T>,
    C: CacheStore,
    K: EntityCodec<T>,
{
    /// Create an orchestrator with an explicit codec.
    pub fn with_codec(primary: Arc<P>, cache: Arc<C>, codec: K, config: CacheConfig) -> TubeResult<Self> {
        config.validate()?;
        Ok(Self {
            primary,
            cache,
            codec,
            policy: KeyPolicy::new(config.scoped_ttl),
            config,
            stats: StatsCounters::default(),
            _marker: PhantomData,
        })
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    pub fn policy(&self) -> &KeyPolicy {
        &self.policy
    }

    /// The primary store this orchestrator reads from.
    pub fn primary(&self) -> &P {
        &self.primary
    }

    /// The cache store this orchestrator populates.
    pub fn cache(&self) -> &C {
        &self.cache
    }

    /// Snapshot of the traffic counters.
    pub fn stats(&self) -> CacheStats {
        self.stats.snapshot()
    }

    /// Read a single record, cache first.
    ///
    /// A cache hit is returned without consulting the primary store. On a
    /// miss the primary store is read; a found record is cached with no TTL,
    /// an absent one is not cached at all.
    ///
    /// # Errors
    ///
    /// Only primary store errors are returned.
    pub async fn read_through(&self, id: T::Id) -> TubeResult<Option<CacheRead<T>>> {
        let (key, ttl) = self.policy.record(T::entity_kind(), id);

        if let Some(bytes) = self.cache_get(&key).await {
            match self.codec.decode(&bytes) {
                Ok(record) => {
                    StatsCounters::bump(&self.stats.hits);
                    tracing::debug!(key = %key, "Cache hit");
                    return Ok(Some(CacheRead::from_cache(record)));
                }
                Err(e) => self.note_decode_failure(&key, &e.to_string()),
            }
        }

        StatsCounters::bump(&self.stats.misses);
        tracing::debug!(key = %key, "Cache miss");

        let Some(record) = self.primary_call("get", self.primary.get(id)).await? else {
            return Ok(None);
        };

        match self.codec.encode(&record) {
            Ok(bytes) => {
                self.cache_set(&key, bytes, ttl).await;
            }
            Err(e) => self.note_population_failure(&key, &e.to_string()),
        }

        Ok(Some(CacheRead::from_primary(record)))
    }

    /// Read one page of an owner's records, cache first.
    ///
    /// The cache holds the owner's full, unpaginated listing with a bounded
    /// TTL; `page` is applied after decoding. An empty listing is cached like
    /// any other.
    pub async fn read_through_scoped(
        &self,
        owner: UserId,
        page: PageParams,
    ) -> TubeResult<CacheRead<Vec<T>>> {
        let (key, ttl) = self.policy.scoped(T::entity_kind(), owner);

        if let Some(bytes) = self.cache_get(&key).await {
            match self.codec.decode_list(&bytes) {
                Ok(records) => {
                    StatsCounters::bump(&self.stats.hits);
                    tracing::debug!(key = %key, count = records.len(), "Cache hit");
                    return Ok(CacheRead::from_cache(page.apply(records)));
                }
                Err(e) => self.note_decode_failure(&key, &e.to_string()),
            }
        }

        StatsCounters::bump(&self.stats.misses);
        tracing::debug!(key = %key, "Cache miss");

        let filter = RecordFilter::by_owner(owner);
        let records = self
            .primary_call("find", self.primary.find(&filter, None))
            .await?;

        match self.codec.encode_list(&records) {
            Ok(bytes) => {
                self.cache_set(&key, bytes, ttl).await;
            }
            Err(e) => self.note_population_failure(&key, &e.to_string()),
        }

        Ok(CacheRead::from_primary(page.apply(records)))
    }

    /// Drop the cached copy of one record. Idempotent; never fails.
    ///
    /// Call only after the primary store has confirmed the write.
    pub async fn invalidate(&self, id: T::Id) {
        let (key, _) = self.policy.record(T::entity_kind(), id);
        self.cache_delete(&key).await;
    }

    /// Drop the cached listing of one owner. Idempotent; never fails.
    pub async fn invalidate_scoped(&self, owner: UserId) {
        let (key, _) = self.policy.scoped(T::entity_kind(), owner);
        self.cache_delete(&key).await;
    }

    /// Replace the cached copy of a record with a freshly committed value.
    ///
    /// With `None`, or if the record cannot be written, the key is deleted
    /// instead so the cache never keeps the pre-update value.
    pub async fn write_through_if_present(&self, id: T::Id, record: Option<&T>) {
        let (key, ttl) = self.policy.record(T::entity_kind(), id);

        let Some(record) = record else {
            self.cache_delete(&key).await;
            return;
        };

        let bytes = match self.codec.encode(record) {
            Ok(bytes) => bytes,
            Err(e) => {
                self.note_population_failure(&key, &e.to_string());
                self.cache_delete(&key).await;
                return;
            }
        };

        if !self.cache_set(&key, bytes, ttl).await {
            self.cache_delete(&key).await;
        }
    }

    /// Run a primary store call under `primary_timeout`.
    pub(crate) async fn primary_call<R, F>(&self, operation: &'static str, call: F) -> TubeResult<R>
    where
        F: Future<Output = TubeResult<R>>,
    {
        match tokio::time::timeout(self.config.primary_timeout, call).await {
            Ok(result) => result,
            Err(_) => Err(StoreError::Timeout {
                operation,
                elapsed: self.config.primary_timeout,
            }
            .into()),
        }
    }

    // ========================================================================
    // GUARDED CACHE CALLS
    // ========================================================================

    async fn guarded<R, F>(&self, operation: &'static str, call: F) -> Result<R, CacheError>
    where
        F: Future<Output = Result<R, CacheError>>,
    {
        match tokio::time::timeout(self.config.cache_timeout, call).await {
            Ok(result) => result,
            Err(_) => Err(CacheError::Timeout {
                operation,
                elapsed: self.config.cache_timeout,
            }),
        }
    }

    async fn cache_get(&self, key: &CacheKey) -> Option<Vec<u8>> {
        match self.guarded("get", self.cache.get(key)).await {
            Ok(found) => found,
            Err(e) => {
                StatsCounters::bump(&self.stats.cache_faults);
                tracing::warn!(
                    key = %key,
                    operation = "get",
                    error = %e,
                    "Cache read failed, falling back to primary store"
                );
                None
            }
        }
    }

    /// Returns whether the entry was written.
    async fn cache_set(&self, key: &CacheKey, bytes: Vec<u8>, ttl: TtlClass) -> bool {
        match self.guarded("set", self.cache.set(key, bytes, ttl.as_duration())).await {
            Ok(()) => {
                StatsCounters::bump(&self.stats.populations);
                tracing::debug!(key = %key, ttl = ?ttl.as_duration(), "Cache populated");
                true
            }
            Err(e) => {
                self.note_population_failure(key, &e.to_string());
                false
            }
        }
    }

    async fn cache_delete(&self, key: &CacheKey) {
        match self.guarded("delete", self.cache.delete(key)).await {
            Ok(()) => {
                StatsCounters::bump(&self.stats.invalidations);
                tracing::debug!(key = %key, "Cache entry invalidated");
            }
            Err(e) => {
                StatsCounters::bump(&self.stats.cache_faults);
                tracing::warn!(
                    key = %key,
                    operation = "delete",
                    error = %e,
                    "Cache invalidation failed"
                );
            }
        }
    }

    fn note_decode_failure(&self, key: &CacheKey, error: &str) {
        StatsCounters::bump(&self.stats.decode_failures);
        tracing::warn!(
            key = %key,
            operation = "decode",
            error,
            "Cached bytes did not decode, treating as miss"
        );
    }

    fn note_population_failure(&self, key: &CacheKey, error: &str) {
        StatsCounters::bump(&self.stats.population_failures);
        tracing::warn!(
            key = %key,
            operation = "set",
            error,
            "Cache population failed"
        );
    }
}

impl<T, P, C, K> std::fmt::Debug for CacheAside<T, P, C, K>
where
    T: Document,
    P: PrimaryStore<T>,
    C: CacheStore,
    K: EntityCodec<T>,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheAside")
            .field("kind", &T::entity_kind())
            .field("policy", &self.policy)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

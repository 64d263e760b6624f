//! TUBECACHE Storage - Primary Stores and the Cache-Aside Layer
//!
//! The primary store owns every record. The [`cache`] module sits in front
//! of it and may only ever make reads faster, never wrong in a way that
//! outlives an invalidation or a listing TTL.

pub mod cache;
pub mod primary;
pub mod repository;

pub use cache::{
    CacheAside, CacheKey, CacheRead, CacheResult, CacheStats, CacheStore, CacheableEntity,
    EntityCodec, InMemoryCacheStore, JsonCodec, KeyPolicy, LmdbCacheError, LmdbCacheStore,
    ReadSource, TtlClass, DEFAULT_SCOPED_TTL,
};
pub use primary::{Document, InMemoryPrimaryStore, PrimaryCallCounts, PrimaryStore};
pub use repository::CachedRepository;

//! Cache-aside layer.
//!
//! The cache is a disposable projection of the primary store. Nothing in
//! this module can make a read or write fail: cache faults, timeouts and
//! undecodable entries all degrade to the primary store.
//!
//! # Pieces
//!
//! - [`KeyPolicy`] maps a record kind and id (or owner) to a [`CacheKey`]
//!   and a [`TtlClass`]. Pure, no I/O.
//! - [`EntityCodec`] turns records into bytes and back ([`JsonCodec`]).
//! - [`CacheStore`] is the key-value store: [`InMemoryCacheStore`] or
//!   [`LmdbCacheStore`].
//! - [`CacheAside`] ties them to a primary store and exposes
//!   `read_through`, `read_through_scoped`, `invalidate` and
//!   `write_through_if_present`.
//!
//! # Example
//!
//! ```ignore
//! let read = orchestrator.read_through(video_id).await?;
//! if let Some(read) = read {
//!     tracing::debug!(cached = read.was_cache_hit(), "Loaded video");
//! }
//! ```

pub mod codec;
pub mod key;
pub mod lmdb_backend;
pub mod memory;
pub mod orchestrator;
pub mod read;
pub mod traits;

pub use codec::{EntityCodec, JsonCodec};
pub use key::{CacheKey, KeyPolicy, TtlClass, DEFAULT_SCOPED_TTL};
pub use lmdb_backend::{LmdbCacheError, LmdbCacheStore};
pub use memory::InMemoryCacheStore;
pub use orchestrator::CacheAside;
pub use read::{CacheRead, ReadSource};
pub use traits::{CacheResult, CacheStats, CacheStore, CacheableEntity};

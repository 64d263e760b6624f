//! TUBECACHE Core - Record Types
//!
//! Pure data structures shared by every other crate: identifiers, the three
//! cacheable record kinds, filters and pagination, the error taxonomy, and
//! configuration. No I/O lives here apart from tracing setup.

pub mod config;
pub mod entities;
pub mod enums;
pub mod error;
pub mod filter;
pub mod identity;
pub mod telemetry;

pub use config::{CacheConfig, LmdbCacheConfig};
pub use entities::{Comment, CommentPatch, Tweet, TweetPatch, Video, VideoPatch};
pub use enums::EntityKind;
pub use error::{CacheError, CodecError, ConfigError, StoreError, TubeError, TubeResult};
pub use filter::{PageParams, RecordFilter, DEFAULT_PAGE_LIMIT};
pub use identity::{CommentId, EntityIdType, Timestamp, TweetId, UserId, VideoId};
pub use telemetry::{init_tracing, TelemetryConfig};

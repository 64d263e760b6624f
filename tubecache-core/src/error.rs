//! Error types for tubecache operations

use crate::EntityKind;
use std::time::Duration;
use thiserror::Error;

/// Primary store errors. These are the only storage errors callers see.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("Record not found: {kind} with id {id}")]
    NotFound { kind: EntityKind, id: String },

    #[error("Insert failed for {kind}: {reason}")]
    InsertFailed { kind: EntityKind, reason: String },

    #[error("Update failed for {kind} with id {id}: {reason}")]
    UpdateFailed {
        kind: EntityKind,
        id: String,
        reason: String,
    },

    #[error("Primary store timed out during {operation} after {elapsed:?}")]
    Timeout {
        operation: &'static str,
        elapsed: Duration,
    },

    #[error("Primary store unavailable: {reason}")]
    Unavailable { reason: String },

    #[error("Storage lock poisoned")]
    LockPoisoned,
}

/// Cache store errors.
///
/// The cache-aside layer absorbs every one of these; they exist so that cache
/// store implementations can report what went wrong to the log.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CacheError {
    #[error("Cache unavailable: {reason}")]
    Unavailable { reason: String },

    #[error("Cache {operation} timed out after {elapsed:?}")]
    Timeout {
        operation: &'static str,
        elapsed: Duration,
    },

    #[error("Cache backend error: {reason}")]
    Backend { reason: String },
}

/// Record codec errors. Absorbed by the cache-aside layer as a miss.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CodecError {
    #[error("Failed to encode {kind}: {reason}")]
    Encode { kind: EntityKind, reason: String },

    #[error("Failed to decode {kind}: {reason}")]
    Decode { kind: EntityKind, reason: String },
}

/// Configuration errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Missing required configuration field: {field}")]
    MissingRequired { field: String },

    #[error("Invalid value for {field}: {value} - {reason}")]
    InvalidValue {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Incompatible options: {option_a} and {option_b}")]
    IncompatibleOptions { option_a: String, option_b: String },
}

/// Master error type for all tubecache errors.
#[derive(Debug, Clone, Error)]
pub enum TubeError {
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Cache error: {0}")]
    Cache(#[from] CacheError),

    #[error("Codec error: {0}")]
    Codec(#[from] CodecError),

    #[error("Config error: {0}")]
    Config(#[from] ConfigError),
}

impl TubeError {
    /// Returns true if this error means the requested record does not exist.
    pub fn is_not_found(&self) -> bool {
        matches!(self, TubeError::Store(StoreError::NotFound { .. }))
    }
}

/// Result type alias for tubecache operations.
pub type TubeResult<T> = Result<T, TubeError>;

// =============================================================================
// TESTS
// =============================================================================

//! Record codecs.
//!
//! A codec turns records (and owner listings of records) into the bytes a
//! cache store holds and back. Decoding must fail on anything that is not a
//! well-formed encoding of the expected shape; the cache-aside layer turns
//! that failure into a miss.

use std::marker::PhantomData;

use tubecache_core::CodecError;

use super::traits::CacheableEntity;

/// Lossless byte encoding for one record kind.
///
/// Implementations must satisfy `decode(encode(r)) == r` for every valid `r`,
/// and likewise for lists.
pub trait EntityCodec<T: CacheableEntity>: Send + Sync {
    /// Encode a single record.
    fn encode(&self, record: &T) -> Result<Vec<u8>, CodecError>;

    /// Decode a single record.
    fn decode(&self, bytes: &[u8]) -> Result<T, CodecError>;

    /// Encode a full listing.
    fn encode_list(&self, records: &[T]) -> Result<Vec<u8>, CodecError>;

    /// Decode a full listing.
    fn decode_list(&self, bytes: &[u8]) -> Result<Vec<T>, CodecError>;
}

/// JSON codec, byte-compatible with values written by other JSON clients of
/// the same cache.
pub struct JsonCodec<T> {
    _marker: PhantomData<fn() -> T>,
}

impl<T> JsonCodec<T> {
    pub fn new() -> Self {
        Self {
            _marker: PhantomData,
        }
    }
}

impl<T> Default for JsonCodec<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Clone for JsonCodec<T> {
    fn clone(&self) -> Self {
        Self::new()
    }
}

impl<T> std::fmt::Debug for JsonCodec<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JsonCodec").finish()
    }
}

impl<T: CacheableEntity> EntityCodec<T> for JsonCodec<T> {
    fn encode(&self, record: &T) -> Result<Vec<u8>, CodecError> {
        serde_json::to_vec(record).map_err(|e| CodecError::Encode {
            kind: T::entity_kind(),
            reason: e.to_string(),
        })
    }

    fn decode(&self, bytes: &[u8]) -> Result<T, CodecError> {
        serde_json::from_slice(bytes).map_err(|e| CodecError::Decode {
            kind: T::entity_kind(),
            reason: e.to_string(),
        })
    }

    fn encode_list(&self, records: &[T]) -> Result<Vec<u8>, CodecError> {
        serde_json::to_vec(records).map_err(|e| CodecError::Encode {
            kind: T::entity_kind(),
            reason: e.to_string(),
        })
    }

    fn decode_list(&self, bytes: &[u8]) -> Result<Vec<T>, CodecError> {
        serde_json::from_slice(bytes).map_err(|e| CodecError::Decode {
            kind: T::entity_kind(),
            reason: e.to_string(),
        })
    }
}

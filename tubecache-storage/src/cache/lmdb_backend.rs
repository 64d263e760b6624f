//! LMDB-backed cache store.
//!
//! Uses the heed crate (Rust bindings for LMDB) to provide a memory-mapped,
//! crash-safe key-value store that survives process restarts.
//!
//! # Value Format
//!
//! Each value is framed as:
//! - Bytes 0-7: expiry as Unix milliseconds, little-endian (`0` = never)
//! - Bytes 8..: payload as handed to `set`
//!
//! An expired entry reads as a miss and is removed on that read.
//!
//! # Thread Safety
//!
//! LMDB provides ACID transactions. The store uses read transactions for
//! `get` and write transactions for `set`, `delete` and purges. Cache calls
//! run on tokio's blocking pool, so a writer stuck behind the environment
//! lock does not stall the executor and the caller's timeout still fires.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use heed::types::Bytes;
use heed::{Database, Env, EnvOpenOptions};
use tubecache_core::{CacheError, LmdbCacheConfig};

use super::key::CacheKey;
use super::traits::{CacheResult, CacheStore};

/// Length of the expiry header in front of every value.
const HEADER_LEN: usize = 8;

/// Error type for LMDB cache operations.
#[derive(Debug, thiserror::Error)]
pub enum LmdbCacheError {
    /// Failed to open or create the LMDB environment.
    #[error("Failed to open LMDB environment: {0}")]
    EnvOpen(String),

    /// Failed to open the database within the environment.
    #[error("Failed to open database: {0}")]
    DbOpen(String),

    /// Transaction error.
    #[error("Transaction error: {0}")]
    Transaction(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<LmdbCacheError> for CacheError {
    fn from(e: LmdbCacheError) -> Self {
        CacheError::Backend {
            reason: e.to_string(),
        }
    }
}

/// LMDB-backed cache store.
///
/// # Example
///
/// ```ignore
/// let store = LmdbCacheStore::new("/var/cache/tubecache", 256)?;
/// let key = CacheKey::record(EntityKind::Video, video_id);
/// store.set(&key, bytes, None).await?;
/// let cached = store.get(&key).await?;
/// ```
pub struct LmdbCacheStore {
    /// The LMDB environment.
    env: Env,
    /// The main database (single unnamed database).
    db: Database<Bytes, Bytes>,
}

impl LmdbCacheStore {
    /// Create a new LMDB cache store.
    ///
    /// # Arguments
    ///
    /// * `path` - Directory where LMDB files will be stored
    /// * `max_size_mb` - Maximum size of the database in megabytes
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be created or the LMDB
    /// environment or database cannot be opened.
    pub fn new<P: AsRef<Path>>(path: P, max_size_mb: usize) -> Result<Self, LmdbCacheError> {
        std::fs::create_dir_all(&path)?;

        // SAFETY: the environment directory is owned by this store; no other
        // handle in this process opens it with different flags.
        let env = unsafe {
            EnvOpenOptions::new()
                .map_size(max_size_mb * 1024 * 1024)
                .max_dbs(1)
                .open(path.as_ref())
        }
        .map_err(|e| LmdbCacheError::EnvOpen(e.to_string()))?;

        let mut wtxn = env
            .write_txn()
            .map_err(|e| LmdbCacheError::Transaction(e.to_string()))?;

        let db: Database<Bytes, Bytes> = env
            .create_database(&mut wtxn, None)
            .map_err(|e| LmdbCacheError::DbOpen(e.to_string()))?;

        wtxn.commit()
            .map_err(|e| LmdbCacheError::Transaction(e.to_string()))?;

        Ok(Self { env, db })
    }

    /// Open a store from configuration.
    pub fn from_config(config: &LmdbCacheConfig) -> Result<Self, LmdbCacheError> {
        Self::new(&config.path, config.max_size_mb)
    }

    /// Number of entries, including expired ones not yet purged.
    pub fn len(&self) -> Result<u64, LmdbCacheError> {
        let rtxn = self
            .env
            .read_txn()
            .map_err(|e| LmdbCacheError::Transaction(e.to_string()))?;
        self.db
            .len(&rtxn)
            .map_err(|e| LmdbCacheError::Transaction(e.to_string()))
    }

    pub fn is_empty(&self) -> Result<bool, LmdbCacheError> {
        Ok(self.len()? == 0)
    }

    /// Remove every expired entry, returning how many were removed.
    pub fn purge_expired(&self) -> Result<u64, LmdbCacheError> {
        let now = now_millis();
        let expired_keys = {
            let rtxn = self
                .env
                .read_txn()
                .map_err(|e| LmdbCacheError::Transaction(e.to_string()))?;
            let iter = self
                .db
                .iter(&rtxn)
                .map_err(|e| LmdbCacheError::Transaction(e.to_string()))?;

            let mut keys = Vec::new();
            for (key, value) in iter.flatten() {
                if is_expired(value, now) {
                    keys.push(key.to_vec());
                }
            }
            keys
        };

        let mut wtxn = self
            .env
            .write_txn()
            .map_err(|e| LmdbCacheError::Transaction(e.to_string()))?;

        let mut deleted = 0u64;
        for key in &expired_keys {
            if self.db.delete(&mut wtxn, key).unwrap_or(false) {
                deleted += 1;
            }
        }

        wtxn.commit()
            .map_err(|e| LmdbCacheError::Transaction(e.to_string()))?;

        Ok(deleted)
    }

    fn handles(&self) -> Handles {
        Handles {
            env: self.env.clone(),
            db: self.db,
        }
    }
}

fn now_millis() -> u64 {
    u64::try_from(Utc::now().timestamp_millis()).unwrap_or(0)
}

/// Frame `payload` behind its expiry header.
fn frame(payload: &[u8], ttl: Option<Duration>) -> Vec<u8> {
    let expires_at = match ttl {
        Some(ttl) => now_millis()
            .saturating_add(u64::try_from(ttl.as_millis()).unwrap_or(u64::MAX))
            .max(1),
        None => 0,
    };

    let mut framed = Vec::with_capacity(HEADER_LEN + payload.len());
    framed.extend_from_slice(&expires_at.to_le_bytes());
    framed.extend_from_slice(payload);
    framed
}

/// Expiry stored in a framed value. `None` if the header is missing.
fn expiry_of(framed: &[u8]) -> Option<u64> {
    let header: [u8; HEADER_LEN] = framed.get(..HEADER_LEN)?.try_into().ok()?;
    Some(u64::from_le_bytes(header))
}

fn is_expired(framed: &[u8], now: u64) -> bool {
    match expiry_of(framed) {
        Some(0) => false,
        Some(expires_at) => now >= expires_at,
        // Unframed bytes are unusable; treat them as expired so they get purged.
        None => true,
    }
}

/// Handles moved onto the blocking pool for a single cache call.
#[derive(Clone)]
struct Handles {
    env: Env,
    db: Database<Bytes, Bytes>,
}

impl Handles {
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, LmdbCacheError> {
        let found = {
            let rtxn = self
                .env
                .read_txn()
                .map_err(|e| LmdbCacheError::Transaction(e.to_string()))?;

            self.db
                .get(&rtxn, key)
                .map_err(|e| LmdbCacheError::Transaction(e.to_string()))?
                .map(|bytes| bytes.to_vec())
        };

        match found {
            Some(framed) if !is_expired(&framed, now_millis()) => {
                Ok(Some(framed[HEADER_LEN..].to_vec()))
            }
            Some(_) => {
                self.remove_if_expired(key)?;
                Ok(None)
            }
            None => Ok(None),
        }
    }

    fn put(&self, key: &[u8], framed: &[u8]) -> Result<(), LmdbCacheError> {
        let mut wtxn = self
            .env
            .write_txn()
            .map_err(|e| LmdbCacheError::Transaction(e.to_string()))?;

        self.db
            .put(&mut wtxn, key, framed)
            .map_err(|e| LmdbCacheError::Transaction(e.to_string()))?;

        wtxn.commit()
            .map_err(|e| LmdbCacheError::Transaction(e.to_string()))
    }

    fn remove(&self, key: &[u8]) -> Result<bool, LmdbCacheError> {
        let mut wtxn = self
            .env
            .write_txn()
            .map_err(|e| LmdbCacheError::Transaction(e.to_string()))?;

        let deleted = self
            .db
            .delete(&mut wtxn, key)
            .map_err(|e| LmdbCacheError::Transaction(e.to_string()))?;

        wtxn.commit()
            .map_err(|e| LmdbCacheError::Transaction(e.to_string()))?;

        Ok(deleted)
    }

    /// Delete `key` only if the value under the write lock is still expired.
    /// A `set` that landed after the read keeps its fresh value.
    fn remove_if_expired(&self, key: &[u8]) -> Result<bool, LmdbCacheError> {
        let mut wtxn = self
            .env
            .write_txn()
            .map_err(|e| LmdbCacheError::Transaction(e.to_string()))?;

        let still_expired = self
            .db
            .get(&wtxn, key)
            .map_err(|e| LmdbCacheError::Transaction(e.to_string()))?
            .is_some_and(|framed| is_expired(framed, now_millis()));

        let deleted = if still_expired {
            self.db
                .delete(&mut wtxn, key)
                .map_err(|e| LmdbCacheError::Transaction(e.to_string()))?
        } else {
            false
        };

        wtxn.commit()
            .map_err(|e| LmdbCacheError::Transaction(e.to_string()))?;

        Ok(deleted)
    }
}

/// Run a blocking LMDB call off the async executor so the caller's timeout
/// can fire while a writer holds the environment lock.
async fn blocking<R, F>(handles: Handles, call: F) -> CacheResult<R>
where
    R: Send + 'static,
    F: FnOnce(&Handles) -> Result<R, LmdbCacheError> + Send + 'static,
{
    tokio::task::spawn_blocking(move || call(&handles))
        .await
        .map_err(|e| CacheError::Backend {
            reason: format!("LMDB task failed: {e}"),
        })?
        .map_err(CacheError::from)
}

#[async_trait]
impl CacheStore for LmdbCacheStore {
    async fn get(&self, key: &CacheKey) -> CacheResult<Option<Vec<u8>>> {
        let key = key.as_bytes().to_vec();
        blocking(self.handles(), move |h| h.get(&key)).await
    }

    async fn set(&self, key: &CacheKey, value: Vec<u8>, ttl: Option<Duration>) -> CacheResult<()> {
        let key = key.as_bytes().to_vec();
        let framed = frame(&value, ttl);
        blocking(self.handles(), move |h| h.put(&key, &framed)).await
    }

    async fn delete(&self, key: &CacheKey) -> CacheResult<()> {
        let key = key.as_bytes().to_vec();
        blocking(self.handles(), move |h| h.remove(&key).map(|_| ())).await
    }
}

use thiserror::Error;

use crate::cache::keys::CachedDataKey;

/// I/O or transaction failure. Never retried here; retry policy belongs to the caller.
#[derive(Debug, Error)]
pub enum StorageFault {
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("connection pool error: {0}")]
    Pool(#[from] r2d2::Error),
    #[error("filesystem error: {0}")]
    Io(#[from] std::io::Error),
    #[error("payload serialization error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("unknown cache key kind {0:?} in store")]
    UnknownKey(String),
}

pub type StorageResult<T> = std::result::Result<T, StorageFault>;

/// Outcome of a read that could not be served as fresh data.
#[derive(Debug, Error)]
pub enum CacheError<T> {
    /// No authorizing validity record, or the backing file is missing.
    /// `partial` is whatever the store could still find.
    #[error("cache miss")]
    Miss { partial: Option<T> },
    /// Only raised by pass-through (ground truth) stores.
    #[error("{key} with id={id} does not exist")]
    NotFound { key: CachedDataKey, id: String },
    #[error(transparent)]
    Storage(#[from] StorageFault),
}

impl<T> CacheError<T> {
    pub fn miss(partial: Option<T>) -> Self {
        CacheError::Miss { partial }
    }

    pub fn is_miss(&self) -> bool {
        matches!(self, CacheError::Miss { .. })
    }

    /// Partial data carried by a miss, if any.
    pub fn into_partial(self) -> Option<T> {
        match self {
            CacheError::Miss { partial } => partial,
            _ => None,
        }
    }
}

pub type CacheResult<T> = std::result::Result<T, CacheError<T>>;

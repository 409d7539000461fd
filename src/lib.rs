//! Offline store for a remote media library: normalized metadata in SQLite, downloaded
//! media under a content root, and a per-item validity ledger deciding what is fresh.

pub mod cache;
pub mod database;
pub mod error;
pub mod ingest;
pub mod media;
pub mod query;
pub mod store;
pub mod utils;

pub use cache::keys::CachedDataKey;
pub use error::{CacheError, CacheResult, StorageFault, StorageResult};
pub use ingest::payload::{IngestRequest, Payload};
pub use query::albums::{AlbumListType, AlbumSearchQuery, SortDirection};
pub use store::CacheStore;
pub use utils::config::{StoreConfig, StoreMode};

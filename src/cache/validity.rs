//! The validity ledger: one row per (kind, parameter) recording whether the local copy
//! reflects a successful fetch, plus file metadata for binary kinds.

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::Serialize;

use crate::cache::keys::CachedDataKey;
use crate::error::StorageResult;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CacheInfo {
    pub cache_key: CachedDataKey,
    /// `None` is the whole-collection scope of `cache_key`.
    pub parameter: Option<String>,
    pub valid: bool,
    pub last_ingestion_time: DateTime<Utc>,
    pub file_id: Option<String>,
    pub file_hash: Option<String>,
    pub path: Option<String>,
    pub size: Option<i64>,
    pub cache_permanently: bool,
}

/// File metadata merged into a ledger row. Absent fields keep what is stored.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FileMetadata {
    pub file_id: Option<String>,
    pub file_hash: Option<String>,
    pub path: Option<String>,
    pub size: Option<i64>,
    pub cache_permanently: Option<bool>,
}

impl CacheInfo {
    pub fn new(cache_key: CachedDataKey, parameter: Option<&str>) -> Self {
        CacheInfo {
            cache_key,
            parameter: parameter.map(str::to_string),
            valid: false,
            last_ingestion_time: Utc::now(),
            file_id: None,
            file_hash: None,
            path: None,
            size: None,
            cache_permanently: false,
        }
    }

    fn apply(mut self, extra: FileMetadata) -> Self {
        self.file_id = extra.file_id.or(self.file_id);
        self.file_hash = extra.file_hash.or(self.file_hash);
        self.path = extra.path.or(self.path);
        self.size = extra.size.or(self.size);
        self.cache_permanently = extra.cache_permanently.unwrap_or(self.cache_permanently);
        self
    }

    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        let parameter: String = row.get("parameter")?;
        Ok(CacheInfo {
            cache_key: row.get("cache_key")?,
            parameter: (!parameter.is_empty()).then_some(parameter),
            valid: row.get("valid")?,
            last_ingestion_time: row.get("last_ingestion_time")?,
            file_id: row.get("file_id")?,
            file_hash: row.get("file_hash")?,
            path: row.get("path")?,
            size: row.get("size")?,
            cache_permanently: row.get("cache_permanently")?,
        })
    }

    fn save(&self, conn: &Connection) -> StorageResult<()> {
        conn.execute(
            "INSERT INTO cache_info (cache_key, parameter, valid, last_ingestion_time,
                                     file_id, file_hash, path, size, cache_permanently)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
             ON CONFLICT(cache_key, parameter) DO UPDATE SET
                valid=excluded.valid, last_ingestion_time=excluded.last_ingestion_time,
                file_id=excluded.file_id, file_hash=excluded.file_hash,
                path=excluded.path, size=excluded.size,
                cache_permanently=excluded.cache_permanently",
            params![
                self.cache_key,
                param(self.parameter.as_deref()),
                self.valid,
                self.last_ingestion_time,
                self.file_id,
                self.file_hash,
                self.path,
                self.size,
                self.cache_permanently
            ],
        )?;
        Ok(())
    }
}

fn param(parameter: Option<&str>) -> &str {
    parameter.unwrap_or("")
}

pub fn get(
    conn: &Connection,
    key: CachedDataKey,
    parameter: Option<&str>,
) -> StorageResult<Option<CacheInfo>> {
    Ok(conn
        .query_row(
            "SELECT * FROM cache_info WHERE cache_key = ?1 AND parameter = ?2",
            params![key, param(parameter)],
            CacheInfo::from_row,
        )
        .optional()?)
}

pub fn is_valid(conn: &Connection, key: CachedDataKey, parameter: Option<&str>) -> StorageResult<bool> {
    Ok(get(conn, key, parameter)?.is_some_and(|info| info.valid))
}

/// Whether any row exists for `key`, valid or not.
pub fn has_any(conn: &Connection, key: CachedDataKey) -> StorageResult<bool> {
    Ok(conn
        .query_row(
            "SELECT 1 FROM cache_info WHERE cache_key = ?1 LIMIT 1",
            params![key],
            |_| Ok(()),
        )
        .optional()?
        .is_some())
}

/// Marks the row valid as of `now`, merging `extra` into any stored metadata.
pub fn mark_valid(
    conn: &Connection,
    key: CachedDataKey,
    parameter: Option<&str>,
    now: DateTime<Utc>,
    extra: FileMetadata,
) -> StorageResult<CacheInfo> {
    let mut info = get(conn, key, parameter)?
        .unwrap_or_else(|| CacheInfo::new(key, parameter))
        .apply(extra);
    info.valid = true;
    info.last_ingestion_time = now;
    info.save(conn)?;
    Ok(info)
}

/// Records metadata for something that was only referenced, not fetched.
/// Validity is left alone; a new row starts out invalid.
pub fn register(
    conn: &Connection,
    key: CachedDataKey,
    parameter: Option<&str>,
    now: DateTime<Utc>,
    extra: FileMetadata,
) -> StorageResult<CacheInfo> {
    let info = match get(conn, key, parameter)? {
        Some(existing) => existing.apply(extra),
        None => CacheInfo {
            last_ingestion_time: now,
            ..CacheInfo::new(key, parameter)
        }
        .apply(extra),
    };
    info.save(conn)?;
    Ok(info)
}

/// Returns whether a row existed to invalidate.
pub fn mark_invalid(conn: &Connection, key: CachedDataKey, parameter: Option<&str>) -> StorageResult<bool> {
    let updated = conn.execute(
        "UPDATE cache_info SET valid = 0 WHERE cache_key = ?1 AND parameter = ?2",
        params![key, param(parameter)],
    )?;
    Ok(updated > 0)
}

pub fn mark_all_invalid(conn: &Connection, key: CachedDataKey) -> StorageResult<usize> {
    Ok(conn.execute(
        "UPDATE cache_info SET valid = 0 WHERE cache_key = ?1",
        params![key],
    )?)
}

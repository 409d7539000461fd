//! Reads with the cache-miss protocol.
//!
//! Every function here returns `Ok(Err(CacheError::Miss { partial }))` rather than failing
//! when data exists but is not authorized as fresh; the outer `Result` carries storage faults.

use std::collections::{BTreeSet, HashMap};

use rusqlite::{params, Connection};
use serde::Serialize;

use crate::cache::keys::CachedDataKey;
use crate::cache::validity::{self, CacheInfo};
use crate::database::models::{
    load_ignored_articles, Album, Artist, Directory, Genre, OrderedRelation, Playlist, Song,
};
use crate::error::{CacheError, CacheResult, StorageResult};
use crate::media::paths::ContentRoots;
use crate::query::albums::AlbumSearchQuery;
use crate::utils::config::StoreMode;

pub type Lookup<T> = StorageResult<CacheResult<T>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SongCacheStatus {
    NotCached,
    Cached,
    PermanentlyCached,
    CachedStale,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SearchResult {
    pub artists: Vec<Artist>,
    pub albums: Vec<Album>,
    pub songs: Vec<Song>,
    pub playlists: Vec<Playlist>,
}

fn single<T>(
    conn: &Connection,
    mode: StoreMode,
    key: CachedDataKey,
    id: &str,
    row: Option<T>,
) -> Lookup<T> {
    match mode {
        StoreMode::GroundTruth => Ok(row.ok_or_else(|| CacheError::NotFound {
            key,
            id: id.to_string(),
        })),
        StoreMode::Cache => match row {
            Some(row) if validity::is_valid(conn, key, Some(id))? => Ok(Ok(row)),
            row => Ok(Err(CacheError::miss(row))),
        },
    }
}

fn collection<T>(conn: &Connection, mode: StoreMode, key: CachedDataKey, rows: T) -> Lookup<T> {
    if mode == StoreMode::GroundTruth || validity::is_valid(conn, key, None)? {
        Ok(Ok(rows))
    } else {
        Ok(Err(CacheError::miss(Some(rows))))
    }
}

pub fn song(conn: &Connection, mode: StoreMode, id: &str) -> Lookup<Song> {
    single(conn, mode, CachedDataKey::Song, id, Song::load(conn, id)?)
}

pub fn album(conn: &Connection, mode: StoreMode, id: &str) -> Lookup<Album> {
    single(conn, mode, CachedDataKey::Album, id, Album::load(conn, id)?)
}

pub fn artist(conn: &Connection, mode: StoreMode, id: &str) -> Lookup<Artist> {
    single(conn, mode, CachedDataKey::Artist, id, Artist::load(conn, id)?)
}

pub fn playlist(conn: &Connection, mode: StoreMode, id: &str) -> Lookup<Playlist> {
    single(conn, mode, CachedDataKey::Playlist, id, Playlist::load(conn, id)?)
}

pub fn directory(conn: &Connection, mode: StoreMode, id: &str) -> Lookup<Directory> {
    single(conn, mode, CachedDataKey::Directory, id, Directory::load(conn, id)?)
}

pub fn playlists(conn: &Connection, mode: StoreMode) -> Lookup<Vec<Playlist>> {
    collection(conn, mode, CachedDataKey::Playlists, Playlist::load_all(conn)?)
}

pub fn artists(conn: &Connection, mode: StoreMode) -> Lookup<Vec<Artist>> {
    collection(conn, mode, CachedDataKey::Artists, Artist::load_all(conn)?)
}

pub fn genres(conn: &Connection, mode: StoreMode) -> Lookup<Vec<Genre>> {
    collection(conn, mode, CachedDataKey::Genres, Genre::load_all(conn)?)
}

pub fn ignored_articles(conn: &Connection, mode: StoreMode) -> Lookup<BTreeSet<String>> {
    let articles = load_ignored_articles(conn)?.into_iter().collect();
    collection(conn, mode, CachedDataKey::IgnoredArticles, articles)
}

/// Album headers for the whole collection, by name. Track lists are left empty.
pub fn all_albums(conn: &Connection, mode: StoreMode) -> Lookup<Vec<Album>> {
    let mut stmt = conn.prepare(
        "SELECT * FROM albums WHERE id NOT LIKE 'invalid:%' ORDER BY LOWER(name)",
    )?;
    let albums = stmt
        .query_map([], Album::from_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    collection(conn, mode, CachedDataKey::Albums, albums)
}

/// A parametrized album listing.
///
/// A materialized result is served only while its ledger row is valid. Without any
/// materialization the listing is computed from local albums and returned as partial data.
pub fn albums(conn: &Connection, mode: StoreMode, query: &AlbumSearchQuery) -> Lookup<Vec<Album>> {
    if mode == StoreMode::GroundTruth {
        return Ok(Ok(query.run_locally(conn)?));
    }

    let hash = query.strhash();
    match validity::get(conn, CachedDataKey::AlbumQueryResult, Some(&hash))? {
        Some(info) => {
            let ids = OrderedRelation::AlbumQueryResults.load(conn, &hash)?;
            let albums = Album::load_many(conn, &ids)?;
            if info.valid {
                Ok(Ok(albums))
            } else {
                Ok(Err(CacheError::miss(Some(albums))))
            }
        }
        None => Ok(Err(CacheError::miss(Some(query.run_locally(conn)?)))),
    }
}

/// Case-insensitive substring match over names and titles.
pub fn search(conn: &Connection, mode: StoreMode, query: &str) -> Lookup<SearchResult> {
    let pattern = like_pattern(query);
    let ids = |sql: &str| -> StorageResult<Vec<String>> {
        let mut stmt = conn.prepare(sql)?;
        let ids = stmt.query_map(params![pattern], |row| row.get::<_, String>(0))?;
        Ok(ids.collect::<rusqlite::Result<Vec<_>>>()?)
    };

    let mut result = SearchResult::default();
    for id in ids("SELECT id FROM artists WHERE name LIKE ?1 ESCAPE '\\' AND id NOT LIKE 'invalid:%' ORDER BY LOWER(name)")? {
        result.artists.extend(Artist::load(conn, &id)?);
    }
    let album_ids =
        ids("SELECT id FROM albums WHERE name LIKE ?1 ESCAPE '\\' AND id NOT LIKE 'invalid:%' ORDER BY LOWER(name)")?;
    result.albums = Album::load_many(conn, &album_ids)?;
    for id in ids("SELECT id FROM songs WHERE title LIKE ?1 ESCAPE '\\' AND id NOT LIKE 'invalid:%' ORDER BY LOWER(title)")? {
        result.songs.extend(Song::load(conn, &id)?);
    }
    for id in ids("SELECT id FROM playlists WHERE name LIKE ?1 ESCAPE '\\' ORDER BY LOWER(name)")? {
        result.playlists.extend(Playlist::load(conn, &id)?);
    }

    if mode == StoreMode::GroundTruth
        || validity::is_valid(conn, CachedDataKey::SearchResults, Some(query))?
    {
        Ok(Ok(result))
    } else {
        Ok(Err(CacheError::miss(Some(result))))
    }
}

/// `query` as a substring pattern, with LIKE wildcards taken literally.
fn like_pattern(query: &str) -> String {
    let escaped = query
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    format!("%{escaped}%")
}

fn file_uri(path: &std::path::Path) -> String {
    format!("file://{}", path.display())
}

/// Serves a file only when its bytes are on disk. A valid row without bytes is a miss.
fn servable(info: &CacheInfo, filename: Option<std::path::PathBuf>) -> CacheResult<String> {
    match filename.filter(|f| f.is_file()) {
        Some(filename) if info.valid => Ok(file_uri(&filename)),
        Some(filename) => Err(CacheError::miss(Some(file_uri(&filename)))),
        None => Err(CacheError::miss(None)),
    }
}

pub fn song_uri(conn: &Connection, roots: &ContentRoots, mode: StoreMode, id: &str) -> Lookup<String> {
    if Song::load(conn, id)?.is_none() && mode == StoreMode::GroundTruth {
        return Ok(Err(CacheError::NotFound {
            key: CachedDataKey::SongFile,
            id: id.to_string(),
        }));
    }
    match validity::get(conn, CachedDataKey::SongFile, Some(id))? {
        Some(info) => Ok(servable(&info, roots.song_filename(&info))),
        None => Ok(Err(CacheError::miss(None))),
    }
}

pub fn cover_art_uri(conn: &Connection, roots: &ContentRoots, id: &str) -> Lookup<String> {
    match validity::get(conn, CachedDataKey::CoverArtFile, Some(id))? {
        Some(info) => {
            let filename = info.file_hash.as_deref().map(|h| roots.cover_art_filename(h));
            Ok(servable(&info, filename))
        }
        None => Ok(Err(CacheError::miss(None))),
    }
}

pub fn cached_statuses(
    conn: &Connection,
    roots: &ContentRoots,
    song_ids: &[String],
) -> StorageResult<HashMap<String, SongCacheStatus>> {
    let mut statuses = HashMap::with_capacity(song_ids.len());
    for id in song_ids {
        let info = validity::get(conn, CachedDataKey::SongFile, Some(id))?;
        let on_disk = info
            .as_ref()
            .and_then(|i| roots.song_filename(i))
            .is_some_and(|f| f.is_file());
        let status = match info {
            Some(info) if on_disk && info.valid && info.cache_permanently => {
                SongCacheStatus::PermanentlyCached
            }
            Some(info) if on_disk && info.valid => SongCacheStatus::Cached,
            Some(_) if on_disk => SongCacheStatus::CachedStale,
            _ => SongCacheStatus::NotCached,
        };
        statuses.insert(id.clone(), status);
    }
    Ok(statuses)
}

/// Whether anything of `key` has ever been stored, valid or not.
pub fn has_cached(conn: &Connection, mode: StoreMode, key: CachedDataKey) -> StorageResult<bool> {
    match mode {
        StoreMode::GroundTruth => Ok(true),
        StoreMode::Cache => validity::has_any(conn, key),
    }
}

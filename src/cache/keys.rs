use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::StorageFault;

/// Kinds of cached data tracked in the validity ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CachedDataKey {
    Song,
    /// Songs of one album or playlist, keyed by the parent id.
    Songs,
    SongFile,
    SongFilePermanent,
    Album,
    /// The whole album collection.
    Albums,
    /// A parametrized album listing, keyed by `AlbumSearchQuery::strhash`.
    AlbumQueryResult,
    Artist,
    Artists,
    Genres,
    IgnoredArticles,
    Playlist,
    Playlists,
    Directory,
    CoverArtFile,
    SearchResults,
    AllSongs,
    Everything,
}

impl CachedDataKey {
    pub const ALL: [CachedDataKey; 18] = [
        CachedDataKey::Song,
        CachedDataKey::Songs,
        CachedDataKey::SongFile,
        CachedDataKey::SongFilePermanent,
        CachedDataKey::Album,
        CachedDataKey::Albums,
        CachedDataKey::AlbumQueryResult,
        CachedDataKey::Artist,
        CachedDataKey::Artists,
        CachedDataKey::Genres,
        CachedDataKey::IgnoredArticles,
        CachedDataKey::Playlist,
        CachedDataKey::Playlists,
        CachedDataKey::Directory,
        CachedDataKey::CoverArtFile,
        CachedDataKey::SearchResults,
        CachedDataKey::AllSongs,
        CachedDataKey::Everything,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            CachedDataKey::Song => "song",
            CachedDataKey::Songs => "songs",
            CachedDataKey::SongFile => "song_file",
            CachedDataKey::SongFilePermanent => "song_file_permanent",
            CachedDataKey::Album => "album",
            CachedDataKey::Albums => "albums",
            CachedDataKey::AlbumQueryResult => "album_query_result",
            CachedDataKey::Artist => "artist",
            CachedDataKey::Artists => "artists",
            CachedDataKey::Genres => "genres",
            CachedDataKey::IgnoredArticles => "ignored_articles",
            CachedDataKey::Playlist => "playlist",
            CachedDataKey::Playlists => "playlists",
            CachedDataKey::Directory => "directory",
            CachedDataKey::CoverArtFile => "cover_art_file",
            CachedDataKey::SearchResults => "search_results",
            CachedDataKey::AllSongs => "all_songs",
            CachedDataKey::Everything => "everything",
        }
    }
}

impl fmt::Display for CachedDataKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CachedDataKey {
    type Err = StorageFault;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        CachedDataKey::ALL
            .into_iter()
            .find(|key| key.as_str() == s)
            .ok_or_else(|| StorageFault::UnknownKey(s.to_string()))
    }
}

impl rusqlite::ToSql for CachedDataKey {
    fn to_sql(&self) -> rusqlite::Result<rusqlite::types::ToSqlOutput<'_>> {
        Ok(self.as_str().into())
    }
}

impl rusqlite::types::FromSql for CachedDataKey {
    fn column_result(value: rusqlite::types::ValueRef<'_>) -> rusqlite::types::FromSqlResult<Self> {
        let s = value.as_str()?;
        s.parse()
            .map_err(|e: StorageFault| rusqlite::types::FromSqlError::Other(Box::new(e)))
    }
}

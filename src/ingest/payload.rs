//! Nested, denormalized objects as handed over by the network client.
//! Optional fields are absent rather than defaulted.

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::cache::keys::CachedDataKey;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiGenre {
    pub name: String,
    pub song_count: Option<i64>,
    pub album_count: Option<i64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiSong {
    pub id: Option<String>,
    pub title: Option<String>,
    pub duration: Option<i64>,
    pub track: Option<i64>,
    pub year: Option<i64>,
    pub path: Option<String>,
    pub size: Option<i64>,
    pub parent_id: Option<String>,
    pub album: Option<ApiAlbum>,
    pub artist: Option<ApiArtist>,
    pub genre: Option<ApiGenre>,
    pub cover_art: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiAlbum {
    pub id: Option<String>,
    pub name: Option<String>,
    pub artist: Option<ApiArtist>,
    pub genre: Option<ApiGenre>,
    pub cover_art: Option<String>,
    pub created: Option<DateTime<Utc>>,
    pub changed: Option<DateTime<Utc>>,
    pub duration: Option<i64>,
    pub play_count: Option<i64>,
    pub song_count: Option<i64>,
    pub starred: Option<bool>,
    pub year: Option<i64>,
    /// `None` when the listing did not include songs; `Some(vec![])` means no songs.
    pub songs: Option<Vec<ApiSong>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiArtist {
    pub id: Option<String>,
    pub name: Option<String>,
    pub album_count: Option<i64>,
    pub starred: Option<bool>,
    pub biography: Option<String>,
    pub music_brainz_id: Option<String>,
    pub last_fm_url: Option<String>,
    pub artist_image_url: Option<String>,
    pub similar_artists: Option<Vec<ApiArtist>>,
    pub albums: Option<Vec<ApiAlbum>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiPlaylist {
    pub id: String,
    pub name: Option<String>,
    pub comment: Option<String>,
    pub owner: Option<String>,
    pub song_count: Option<i64>,
    pub duration: Option<i64>,
    pub created: Option<DateTime<Utc>>,
    pub changed: Option<DateTime<Utc>>,
    pub public: Option<bool>,
    pub cover_art: Option<String>,
    pub songs: Vec<ApiSong>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ApiDirectoryChild {
    Directory(ApiDirectory),
    Song(ApiSong),
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiDirectory {
    pub id: String,
    pub name: Option<String>,
    pub parent_id: Option<String>,
    pub children: Vec<ApiDirectoryChild>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiSearchResult {
    pub artists: Vec<ApiArtist>,
    pub albums: Vec<ApiAlbum>,
    pub songs: Vec<ApiSong>,
    pub playlists: Vec<ApiPlaylist>,
}

/// A downloaded binary sitting in a caller-owned buffer file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiFile {
    /// Server-relative path, used to name the cached copy when safe.
    pub path: Option<String>,
    /// Buffer holding the downloaded bytes. `None` records metadata only.
    pub source: Option<PathBuf>,
    pub size: Option<i64>,
}

/// Everything the store knows how to ingest. The variant decides the cache key kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "data", rename_all = "snake_case")]
pub enum Payload {
    Song(ApiSong),
    /// Songs of the album or playlist named by the parameter, in order.
    Songs(Vec<ApiSong>),
    Album(ApiAlbum),
    Albums(Vec<ApiAlbum>),
    /// A parametrized album listing; the parameter is the query hash.
    AlbumQueryResult(Vec<ApiAlbum>),
    Artist(ApiArtist),
    Artists(Vec<ApiArtist>),
    Genres(Vec<ApiGenre>),
    IgnoredArticles(Vec<String>),
    Playlist(ApiPlaylist),
    Playlists(Vec<ApiPlaylist>),
    Directory(ApiDirectory),
    CoverArtFile(ApiFile),
    SongFile(ApiFile),
    SongFilePermanent(ApiFile),
    SearchResults(ApiSearchResult),
}

impl Payload {
    pub fn key(&self) -> CachedDataKey {
        match self {
            Payload::Song(_) => CachedDataKey::Song,
            Payload::Songs(_) => CachedDataKey::Songs,
            Payload::Album(_) => CachedDataKey::Album,
            Payload::Albums(_) => CachedDataKey::Albums,
            Payload::AlbumQueryResult(_) => CachedDataKey::AlbumQueryResult,
            Payload::Artist(_) => CachedDataKey::Artist,
            Payload::Artists(_) => CachedDataKey::Artists,
            Payload::Genres(_) => CachedDataKey::Genres,
            Payload::IgnoredArticles(_) => CachedDataKey::IgnoredArticles,
            Payload::Playlist(_) => CachedDataKey::Playlist,
            Payload::Playlists(_) => CachedDataKey::Playlists,
            Payload::Directory(_) => CachedDataKey::Directory,
            Payload::CoverArtFile(_) => CachedDataKey::CoverArtFile,
            Payload::SongFile(_) => CachedDataKey::SongFile,
            Payload::SongFilePermanent(_) => CachedDataKey::SongFilePermanent,
            Payload::SearchResults(_) => CachedDataKey::SearchResults,
        }
    }
}

/// A payload file as read by the CLI: the parameter travels next to the payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestRequest {
    #[serde(default)]
    pub parameter: Option<String>,
    pub payload: Payload,
}

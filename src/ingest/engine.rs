//! Turns nested payloads into entity rows.
//!
//! Referenced rows are written before the rows that point at them: genre, then artist,
//! then album, then cover art and file records, then the entity itself. Owners of an
//! ordered relation (an album's songs, an artist's albums) are written before their
//! members, and the relation itself last. Existing rows are merged sparsely.

use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::Path;

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use tracing::{debug, warn};

use crate::cache::keys::CachedDataKey;
use crate::cache::validity::{self, CacheInfo, FileMetadata};
use crate::database::models::{
    is_placeholder, placeholder_id, Album, Artist, Directory, DirectoryChild, Genre, OrderedRelation,
    Playlist, Song,
};
use crate::error::StorageResult;
use crate::ingest::hasher;
use crate::ingest::payload::{
    ApiAlbum, ApiArtist, ApiDirectory, ApiDirectoryChild, ApiFile, ApiGenre, ApiPlaylist, ApiSong,
    Payload,
};
use crate::media::paths::ContentRoots;

/// How much of a nested object to follow. Ordered shallowest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum Depth {
    /// The row only. Used for objects embedded in another object.
    Shallow,
    /// The row and everything it owns.
    Full,
}

/// One ingestion call. Lives inside a single write transaction.
pub struct Ingestor<'a> {
    conn: &'a Connection,
    roots: &'a ContentRoots,
    now: DateTime<Utc>,
    visited: HashMap<(CachedDataKey, String), Depth>,
}

impl<'a> Ingestor<'a> {
    pub fn new(conn: &'a Connection, roots: &'a ContentRoots) -> Self {
        Self {
            conn,
            roots,
            now: Utc::now(),
            visited: HashMap::new(),
        }
    }

    /// Ingests `payload` and marks `(payload kind, parameter)` valid.
    ///
    /// Entity payloads default the parameter to the entity id. Placeholder entities
    /// are stored but never marked valid.
    pub fn ingest(mut self, parameter: Option<&str>, payload: Payload) -> StorageResult<CacheInfo> {
        let key = payload.key();
        debug!(%key, parameter, "ingesting");

        let mut ledger_key = key;
        let mut entity_id = None;
        let mut extra = FileMetadata::default();

        match payload {
            Payload::Song(song) => entity_id = Some(self.song(&song, None)?),
            Payload::Songs(songs) => {
                if !self.songs_of(parameter, &songs)? {
                    return Ok(CacheInfo::new(ledger_key, parameter));
                }
            }
            Payload::Album(album) => entity_id = Some(self.album(&album, None, Depth::Full)?),
            Payload::Albums(albums) => {
                for album in &albums {
                    self.album(album, None, Depth::Full)?;
                }
            }
            Payload::AlbumQueryResult(albums) => {
                let mut ids = Vec::with_capacity(albums.len());
                for album in &albums {
                    ids.push(self.album(album, None, Depth::Full)?);
                }
                OrderedRelation::AlbumQueryResults.replace(self.conn, parameter.unwrap_or(""), &ids)?;
            }
            Payload::Artist(artist) => entity_id = Some(self.artist(&artist, Depth::Full)?),
            Payload::Artists(artists) => {
                let mut keep = HashSet::with_capacity(artists.len());
                for artist in &artists {
                    keep.insert(self.artist(artist, Depth::Full)?);
                }
                self.reconcile("artists", "id", &keep)?;
            }
            Payload::Genres(genres) => {
                let mut keep = HashSet::with_capacity(genres.len());
                for genre in &genres {
                    keep.insert(self.genre(genre)?);
                }
                self.reconcile("genres", "name", &keep)?;
            }
            Payload::IgnoredArticles(names) => {
                let mut stmt = self
                    .conn
                    .prepare("INSERT OR IGNORE INTO ignored_articles (name) VALUES (?1)")?;
                for name in &names {
                    stmt.execute(params![name])?;
                }
                let keep: HashSet<String> = names.into_iter().collect();
                self.reconcile("ignored_articles", "name", &keep)?;
            }
            Payload::Playlist(playlist) => {
                entity_id = Some(self.playlist(&playlist, Depth::Full)?)
            }
            Payload::Playlists(playlists) => {
                let mut keep = HashSet::with_capacity(playlists.len());
                for playlist in &playlists {
                    keep.insert(self.playlist(playlist, Depth::Shallow)?);
                }
                self.reconcile("playlists", "id", &keep)?;
            }
            Payload::Directory(directory) => {
                entity_id = Some(self.directory(&directory, Depth::Full)?)
            }
            Payload::CoverArtFile(file) => extra = self.cover_art_file(parameter, &file)?,
            Payload::SongFile(file) => extra = self.song_file(parameter, &file)?,
            Payload::SongFilePermanent(file) => {
                ledger_key = CachedDataKey::SongFile;
                extra = FileMetadata {
                    cache_permanently: Some(true),
                    ..self.song_file(parameter, &file)?
                };
            }
            Payload::SearchResults(results) => {
                for artist in &results.artists {
                    self.artist(artist, Depth::Full)?;
                }
                for album in &results.albums {
                    self.album(album, None, Depth::Full)?;
                }
                for song in &results.songs {
                    self.song(song, None)?;
                }
                for playlist in &results.playlists {
                    self.playlist(playlist, Depth::Shallow)?;
                }
            }
        }

        let parameter = parameter.map(str::to_string).or(entity_id);
        if let Some(id) = parameter.as_deref().filter(|id| is_placeholder(id)) {
            debug!(%key, id, "placeholder stored without validity");
            return Ok(CacheInfo::new(ledger_key, Some(id)));
        }
        validity::mark_valid(self.conn, ledger_key, parameter.as_deref(), self.now, extra)
    }

    /// True unless `(key, id)` was already handled at `depth` or deeper in this call.
    fn visit(&mut self, key: CachedDataKey, id: &str, depth: Depth) -> bool {
        match self.visited.get_mut(&(key, id.to_string())) {
            Some(reached) if *reached >= depth => false,
            Some(reached) => {
                *reached = depth;
                true
            }
            None => {
                self.visited.insert((key, id.to_string()), depth);
                true
            }
        }
    }

    fn genre(&mut self, api: &ApiGenre) -> StorageResult<String> {
        if !self.visit(CachedDataKey::Genres, &api.name, Depth::Full) {
            return Ok(api.name.clone());
        }
        let incoming = Genre {
            name: api.name.clone(),
            song_count: api.song_count,
            album_count: api.album_count,
        };
        let genre = match Genre::load(self.conn, &api.name)? {
            Some(stored) => stored.merge(incoming),
            None => incoming,
        };
        genre.save(self.conn)?;
        Ok(genre.name)
    }

    fn artist(&mut self, api: &ApiArtist, depth: Depth) -> StorageResult<String> {
        let id = api
            .id
            .clone()
            .unwrap_or_else(|| placeholder_id(api.name.as_deref().unwrap_or_default()));
        if !self.visit(CachedDataKey::Artist, &id, depth) {
            return Ok(id);
        }

        if let Some(image) = &api.artist_image_url {
            self.cover_art_reference(image)?;
        }

        let stored = Artist::load(self.conn, &id)?;
        let incoming = Artist {
            id: id.clone(),
            name: known(api.name.as_deref(), stored.as_ref().map(|a| a.name.as_str())),
            album_count: api.album_count,
            starred: api.starred,
            biography: api.biography.clone(),
            music_brainz_id: api.music_brainz_id.clone(),
            last_fm_url: api.last_fm_url.clone(),
            artist_image_url: api.artist_image_url.clone(),
            ..Default::default()
        };
        match stored {
            Some(stored) => stored.merge(incoming),
            None => incoming,
        }
        .save(self.conn)?;

        if depth == Depth::Shallow {
            return Ok(id);
        }

        if let Some(similar) = &api.similar_artists {
            let mut ranked = Vec::with_capacity(similar.len());
            for other in similar {
                let other_id = self.artist(other, Depth::Shallow)?;
                if other_id != id {
                    ranked.push(other_id);
                }
            }
            OrderedRelation::SimilarArtists.replace(self.conn, &id, &dedup(ranked))?;
        }

        if let Some(albums) = &api.albums {
            let mut album_ids = Vec::with_capacity(albums.len());
            for album in albums {
                album_ids.push(self.album(album, Some(&id), Depth::Full)?);
            }
            OrderedRelation::ArtistAlbums.replace(self.conn, &id, &dedup(album_ids))?;
        }

        Ok(id)
    }

    /// `owner` is the artist whose listing contains this album, if any.
    fn album(&mut self, api: &ApiAlbum, owner: Option<&str>, depth: Depth) -> StorageResult<String> {
        let id = api
            .id
            .clone()
            .unwrap_or_else(|| placeholder_id(api.name.as_deref().unwrap_or_default()));
        if !self.visit(CachedDataKey::Album, &id, depth) {
            return Ok(id);
        }

        let genre = api.genre.as_ref().map(|g| self.genre(g)).transpose()?;
        let artist_id = match owner {
            Some(owner) => Some(owner.to_string()),
            None => api
                .artist
                .as_ref()
                .map(|a| self.artist(a, Depth::Shallow))
                .transpose()?,
        };
        if let Some(cover_art) = &api.cover_art {
            self.cover_art_reference(cover_art)?;
        }

        let stored = Album::load(self.conn, &id)?;
        let incoming = Album {
            id: id.clone(),
            name: known(api.name.as_deref(), stored.as_ref().map(|a| a.name.as_str())),
            artist_id,
            genre,
            cover_art: api.cover_art.clone(),
            created: api.created,
            changed: api.changed,
            duration: api.duration,
            play_count: api.play_count,
            song_count: api.song_count,
            starred: api.starred,
            year: api.year,
            song_ids: Vec::new(),
        };
        match stored {
            Some(stored) => stored.merge(incoming),
            None => incoming,
        }
        .save(self.conn)?;

        if depth == Depth::Full {
            if let Some(songs) = &api.songs {
                let mut song_ids = Vec::with_capacity(songs.len());
                for song in songs {
                    song_ids.push(self.song(song, Some(&id))?);
                }
                OrderedRelation::AlbumSongs.replace(self.conn, &id, &song_ids)?;
            }
        }

        Ok(id)
    }

    /// `album` is the album whose track list contains this song, if any.
    fn song(&mut self, api: &ApiSong, album: Option<&str>) -> StorageResult<String> {
        let id = api
            .id
            .clone()
            .unwrap_or_else(|| placeholder_id(api.title.as_deref().unwrap_or_default()));
        if !self.visit(CachedDataKey::Song, &id, Depth::Full) {
            return Ok(id);
        }
        let authoritative = !is_placeholder(&id);

        let genre = api.genre.as_ref().map(|g| self.genre(g)).transpose()?;
        let artist_id = api
            .artist
            .as_ref()
            .map(|a| self.artist(a, Depth::Shallow))
            .transpose()?;
        let album_id = match album {
            Some(album) => Some(album.to_string()),
            None => api
                .album
                .as_ref()
                .map(|a| self.album(a, None, Depth::Shallow))
                .transpose()?,
        };
        if let Some(cover_art) = &api.cover_art {
            self.cover_art_reference(cover_art)?;
        }
        if authoritative && (api.path.is_some() || api.size.is_some()) {
            validity::register(
                self.conn,
                CachedDataKey::SongFile,
                Some(&id),
                self.now,
                FileMetadata {
                    file_id: Some(id.clone()),
                    path: api.path.clone(),
                    size: api.size,
                    ..Default::default()
                },
            )?;
        }

        let stored = Song::load(self.conn, &id)?;
        let incoming = Song {
            id: id.clone(),
            title: known(api.title.as_deref(), stored.as_ref().map(|s| s.title.as_str())),
            duration: api.duration,
            track: api.track,
            year: api.year,
            path: api.path.clone(),
            size: api.size,
            parent_id: api.parent_id.clone(),
            album_id,
            artist_id,
            genre,
            cover_art: api.cover_art.clone(),
        };
        match stored {
            Some(stored) => stored.merge(incoming),
            None => incoming,
        }
        .save(self.conn)?;

        if authoritative {
            validity::mark_valid(
                self.conn,
                CachedDataKey::Song,
                Some(&id),
                self.now,
                FileMetadata::default(),
            )?;
        }
        Ok(id)
    }

    /// Songs of the album or playlist named by `parent`, replacing its track order.
    /// Returns false when `parent` names neither; the songs are stored but the list is not.
    fn songs_of(&mut self, parent: Option<&str>, songs: &[ApiSong]) -> StorageResult<bool> {
        let relation = match parent {
            Some(id) if row_exists(self.conn, "playlists", id)? => {
                Some((OrderedRelation::PlaylistSongs, None))
            }
            Some(id) if row_exists(self.conn, "albums", id)? => {
                Some((OrderedRelation::AlbumSongs, Some(id)))
            }
            _ => None,
        };

        let album = relation.and_then(|(_, album)| album);
        let mut ids = Vec::with_capacity(songs.len());
        for song in songs {
            ids.push(self.song(song, album)?);
        }

        match (parent, relation) {
            (Some(parent), Some((relation, _))) => {
                relation.replace(self.conn, parent, &ids)?;
                Ok(true)
            }
            _ => {
                warn!(parent, "song list for an unknown album or playlist, order not recorded");
                Ok(false)
            }
        }
    }

    fn playlist(&mut self, api: &ApiPlaylist, depth: Depth) -> StorageResult<String> {
        if !self.visit(CachedDataKey::Playlist, &api.id, depth) {
            return Ok(api.id.clone());
        }
        if let Some(cover_art) = &api.cover_art {
            self.cover_art_reference(cover_art)?;
        }

        let stored = Playlist::load(self.conn, &api.id)?;
        let incoming = Playlist {
            id: api.id.clone(),
            name: known(api.name.as_deref(), stored.as_ref().map(|p| p.name.as_str())),
            comment: api.comment.clone(),
            owner: api.owner.clone(),
            song_count: api.song_count,
            duration: api.duration,
            created: api.created,
            changed: api.changed,
            public: api.public,
            cover_art: api.cover_art.clone(),
            song_ids: Vec::new(),
        };
        match stored {
            Some(stored) => stored.merge(incoming),
            None => incoming,
        }
        .save(self.conn)?;

        // Listings carry headers only; leave the stored songs alone.
        if depth == Depth::Full {
            let mut ids = Vec::with_capacity(api.songs.len());
            for song in &api.songs {
                ids.push(self.song(song, None)?);
            }
            OrderedRelation::PlaylistSongs.replace(self.conn, &api.id, &ids)?;
        }
        Ok(api.id.clone())
    }

    fn directory(&mut self, api: &ApiDirectory, depth: Depth) -> StorageResult<String> {
        if !self.visit(CachedDataKey::Directory, &api.id, depth) {
            return Ok(api.id.clone());
        }

        let incoming = Directory {
            id: api.id.clone(),
            name: api.name.clone(),
            parent_id: api.parent_id.clone(),
            children: Vec::new(),
        };
        match Directory::load(self.conn, &api.id)? {
            Some(stored) => stored.merge(incoming),
            None => incoming,
        }
        .save(self.conn)?;

        if depth == Depth::Full {
            let mut children = Vec::with_capacity(api.children.len());
            for child in &api.children {
                children.push(match child {
                    ApiDirectoryChild::Directory(sub) => {
                        let id = self.directory(sub, Depth::Shallow)?;
                        validity::register(
                            self.conn,
                            CachedDataKey::Directory,
                            Some(&id),
                            self.now,
                            FileMetadata::default(),
                        )?;
                        DirectoryChild::Directory(id)
                    }
                    ApiDirectoryChild::Song(song) => DirectoryChild::Song(self.song(song, None)?),
                });
            }
            Directory::replace_children(self.conn, &api.id, &children)?;
        }
        Ok(api.id.clone())
    }

    /// A cover art id seen on an entity. Recorded, but not valid until its bytes arrive.
    fn cover_art_reference(&mut self, cover_art_id: &str) -> StorageResult<()> {
        if !self.visit(CachedDataKey::CoverArtFile, cover_art_id, Depth::Full) {
            return Ok(());
        }
        validity::register(
            self.conn,
            CachedDataKey::CoverArtFile,
            Some(cover_art_id),
            self.now,
            FileMetadata {
                file_id: Some(cover_art_id.to_string()),
                ..Default::default()
            },
        )?;
        Ok(())
    }

    fn cover_art_file(&self, cover_art_id: Option<&str>, file: &ApiFile) -> StorageResult<FileMetadata> {
        let mut extra = FileMetadata {
            file_id: cover_art_id.map(str::to_string),
            size: file.size,
            ..Default::default()
        };
        if let Some(source) = &file.source {
            let file_hash = hasher::hash_file(source)?;
            let target = self.roots.cover_art_filename(&file_hash);
            extra.size = Some(copy_into(source, &target)?);
            extra.file_hash = Some(file_hash);
        }
        Ok(extra)
    }

    fn song_file(&self, song_id: Option<&str>, file: &ApiFile) -> StorageResult<FileMetadata> {
        let mut extra = FileMetadata {
            file_id: song_id.map(str::to_string),
            path: file.path.clone(),
            size: file.size,
            ..Default::default()
        };
        if let Some(source) = &file.source {
            let file_hash = hasher::hash_file(source)?;
            let stored = validity::get(self.conn, CachedDataKey::SongFile, song_id)?
                .unwrap_or_else(|| CacheInfo::new(CachedDataKey::SongFile, song_id));
            let pending = CacheInfo {
                path: extra.path.clone().or(stored.path.clone()),
                file_hash: Some(file_hash.clone()),
                ..stored
            };
            if let Some(target) = self.roots.song_filename(&pending) {
                if let Some(parent) = target.parent() {
                    fs::create_dir_all(parent)?;
                }
                extra.size = Some(copy_into(source, &target)?);
            }
            extra.file_hash = Some(file_hash);
        }
        Ok(extra)
    }

    /// Deletes rows of `table` whose key is not in `keep`. Placeholders survive.
    fn reconcile(&self, table: &str, column: &str, keep: &HashSet<String>) -> StorageResult<usize> {
        let mut stmt = self.conn.prepare(&format!("SELECT {column} FROM {table}"))?;
        let stored = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        let mut delete = self
            .conn
            .prepare(&format!("DELETE FROM {table} WHERE {column} = ?1"))?;
        let mut removed = 0;
        for id in stored {
            if !keep.contains(&id) && !is_placeholder(&id) {
                removed += delete.execute(params![id])?;
            }
        }
        if removed > 0 {
            debug!(table, removed, "removed rows missing from authoritative collection");
        }
        Ok(removed)
    }
}

fn copy_into(source: &Path, target: &Path) -> StorageResult<i64> {
    if source == target {
        return Ok(fs::metadata(target)?.len() as i64);
    }
    Ok(fs::copy(source, target)? as i64)
}

fn row_exists(conn: &Connection, table: &str, id: &str) -> StorageResult<bool> {
    Ok(conn
        .query_row(
            &format!("SELECT 1 FROM {table} WHERE id = ?1"),
            params![id],
            |_| Ok(()),
        )
        .optional()?
        .is_some())
}

/// The incoming name or title when present, else the stored one.
fn known(incoming: Option<&str>, stored: Option<&str>) -> String {
    incoming.or(stored).unwrap_or_default().to_string()
}

fn dedup(ids: Vec<String>) -> Vec<String> {
    let mut seen = HashSet::with_capacity(ids.len());
    ids.into_iter().filter(|id| seen.insert(id.clone())).collect()
}

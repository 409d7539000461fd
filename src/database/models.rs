use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::{Deserialize, Serialize};

use crate::error::StorageResult;
use crate::ingest::hasher;

/// Prefix of ids the store made up for entities the server sent without one.
pub const PLACEHOLDER_PREFIX: &str = "invalid:";

/// Deterministic id for an entity that arrived without a remote id.
pub fn placeholder_id(name: &str) -> String {
    format!("{}{}", PLACEHOLDER_PREFIX, hasher::hash_str(name))
}

pub fn is_placeholder(id: &str) -> bool {
    id.starts_with(PLACEHOLDER_PREFIX)
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Song {
    pub id: String,
    pub title: String,
    pub duration: Option<i64>,
    pub track: Option<i64>,
    pub year: Option<i64>,
    pub path: Option<String>,
    pub size: Option<i64>,
    pub parent_id: Option<String>,
    pub album_id: Option<String>,
    pub artist_id: Option<String>,
    pub genre: Option<String>,
    pub cover_art: Option<String>,
}

impl Song {
    /// Fields present in `incoming` win, absent ones keep the stored value.
    pub fn merge(self, incoming: Song) -> Song {
        Song {
            id: incoming.id,
            title: incoming.title,
            duration: incoming.duration.or(self.duration),
            track: incoming.track.or(self.track),
            year: incoming.year.or(self.year),
            path: incoming.path.or(self.path),
            size: incoming.size.or(self.size),
            parent_id: incoming.parent_id.or(self.parent_id),
            album_id: incoming.album_id.or(self.album_id),
            artist_id: incoming.artist_id.or(self.artist_id),
            genre: incoming.genre.or(self.genre),
            cover_art: incoming.cover_art.or(self.cover_art),
        }
    }

    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(Song {
            id: row.get("id")?,
            title: row.get("title")?,
            duration: row.get("duration")?,
            track: row.get("track")?,
            year: row.get("year")?,
            path: row.get("path")?,
            size: row.get("size")?,
            parent_id: row.get("parent_id")?,
            album_id: row.get("album_id")?,
            artist_id: row.get("artist_id")?,
            genre: row.get("genre")?,
            cover_art: row.get("cover_art")?,
        })
    }

    pub fn load(conn: &Connection, id: &str) -> StorageResult<Option<Song>> {
        Ok(conn
            .query_row("SELECT * FROM songs WHERE id = ?1", params![id], Song::from_row)
            .optional()?)
    }

    pub fn save(&self, conn: &Connection) -> StorageResult<()> {
        conn.execute(
            "INSERT INTO songs (id, title, duration, track, year, path, size, parent_id,
                                album_id, artist_id, genre, cover_art)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)
             ON CONFLICT(id) DO UPDATE SET
                title=excluded.title, duration=excluded.duration, track=excluded.track,
                year=excluded.year, path=excluded.path, size=excluded.size,
                parent_id=excluded.parent_id, album_id=excluded.album_id,
                artist_id=excluded.artist_id, genre=excluded.genre,
                cover_art=excluded.cover_art",
            params![
                self.id,
                self.title,
                self.duration,
                self.track,
                self.year,
                self.path,
                self.size,
                self.parent_id,
                self.album_id,
                self.artist_id,
                self.genre,
                self.cover_art
            ],
        )?;
        Ok(())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Album {
    pub id: String,
    pub name: String,
    pub artist_id: Option<String>,
    pub genre: Option<String>,
    pub cover_art: Option<String>,
    pub created: Option<DateTime<Utc>>,
    pub changed: Option<DateTime<Utc>>,
    pub duration: Option<i64>,
    pub play_count: Option<i64>,
    pub song_count: Option<i64>,
    pub starred: Option<bool>,
    pub year: Option<i64>,
    /// Written separately through `album_songs`; `merge` never touches it.
    pub song_ids: Vec<String>,
}

impl Album {
    pub fn merge(self, incoming: Album) -> Album {
        Album {
            id: incoming.id,
            name: incoming.name,
            artist_id: incoming.artist_id.or(self.artist_id),
            genre: incoming.genre.or(self.genre),
            cover_art: incoming.cover_art.or(self.cover_art),
            created: incoming.created.or(self.created),
            changed: incoming.changed.or(self.changed),
            duration: incoming.duration.or(self.duration),
            play_count: incoming.play_count.or(self.play_count),
            song_count: incoming.song_count.or(self.song_count),
            starred: incoming.starred.or(self.starred),
            year: incoming.year.or(self.year),
            song_ids: self.song_ids,
        }
    }

    pub(crate) fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(Album {
            id: row.get("id")?,
            name: row.get("name")?,
            artist_id: row.get("artist_id")?,
            genre: row.get("genre")?,
            cover_art: row.get("cover_art")?,
            created: row.get("created")?,
            changed: row.get("changed")?,
            duration: row.get("duration")?,
            play_count: row.get("play_count")?,
            song_count: row.get("song_count")?,
            starred: row.get("starred")?,
            year: row.get("year")?,
            song_ids: Vec::new(),
        })
    }

    pub fn load(conn: &Connection, id: &str) -> StorageResult<Option<Album>> {
        let album = conn
            .query_row("SELECT * FROM albums WHERE id = ?1", params![id], Album::from_row)
            .optional()?;
        match album {
            Some(mut album) => {
                album.song_ids = load_ordered(
                    conn,
                    "SELECT song_id FROM album_songs WHERE album_id = ?1 ORDER BY position",
                    id,
                )?;
                Ok(Some(album))
            }
            None => Ok(None),
        }
    }

    /// Loads several albums keeping the order of `ids`; unknown ids are skipped.
    pub fn load_many(conn: &Connection, ids: &[String]) -> StorageResult<Vec<Album>> {
        let mut albums = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some(album) = Album::load(conn, id)? {
                albums.push(album);
            }
        }
        Ok(albums)
    }

    pub fn save(&self, conn: &Connection) -> StorageResult<()> {
        conn.execute(
            "INSERT INTO albums (id, name, artist_id, genre, cover_art, created, changed,
                                 duration, play_count, song_count, starred, year)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)
             ON CONFLICT(id) DO UPDATE SET
                name=excluded.name, artist_id=excluded.artist_id, genre=excluded.genre,
                cover_art=excluded.cover_art, created=excluded.created,
                changed=excluded.changed, duration=excluded.duration,
                play_count=excluded.play_count, song_count=excluded.song_count,
                starred=excluded.starred, year=excluded.year",
            params![
                self.id,
                self.name,
                self.artist_id,
                self.genre,
                self.cover_art,
                self.created,
                self.changed,
                self.duration,
                self.play_count,
                self.song_count,
                self.starred,
                self.year
            ],
        )?;
        Ok(())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Artist {
    pub id: String,
    pub name: String,
    pub album_count: Option<i64>,
    pub starred: Option<bool>,
    pub biography: Option<String>,
    pub music_brainz_id: Option<String>,
    pub last_fm_url: Option<String>,
    pub artist_image_url: Option<String>,
    pub similar_artist_ids: Vec<String>,
    pub album_ids: Vec<String>,
}

impl Artist {
    pub fn merge(self, incoming: Artist) -> Artist {
        Artist {
            id: incoming.id,
            name: incoming.name,
            album_count: incoming.album_count.or(self.album_count),
            starred: incoming.starred.or(self.starred),
            biography: incoming.biography.or(self.biography),
            music_brainz_id: incoming.music_brainz_id.or(self.music_brainz_id),
            last_fm_url: incoming.last_fm_url.or(self.last_fm_url),
            artist_image_url: incoming.artist_image_url.or(self.artist_image_url),
            similar_artist_ids: self.similar_artist_ids,
            album_ids: self.album_ids,
        }
    }

    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(Artist {
            id: row.get("id")?,
            name: row.get("name")?,
            album_count: row.get("album_count")?,
            starred: row.get("starred")?,
            biography: row.get("biography")?,
            music_brainz_id: row.get("music_brainz_id")?,
            last_fm_url: row.get("last_fm_url")?,
            artist_image_url: row.get("artist_image_url")?,
            similar_artist_ids: Vec::new(),
            album_ids: Vec::new(),
        })
    }

    pub fn load(conn: &Connection, id: &str) -> StorageResult<Option<Artist>> {
        let artist = conn
            .query_row("SELECT * FROM artists WHERE id = ?1", params![id], Artist::from_row)
            .optional()?;
        let Some(mut artist) = artist else {
            return Ok(None);
        };
        artist.similar_artist_ids = load_ordered(
            conn,
            "SELECT similar_artist_id FROM similar_artists WHERE artist_id = ?1 ORDER BY position",
            id,
        )?;
        artist.album_ids = load_ordered(
            conn,
            "SELECT album_id FROM artist_albums WHERE artist_id = ?1 ORDER BY position",
            id,
        )?;
        Ok(Some(artist))
    }

    /// Every artist with a remote id, by name.
    pub fn load_all(conn: &Connection) -> StorageResult<Vec<Artist>> {
        let mut stmt = conn.prepare(
            "SELECT * FROM artists WHERE id NOT LIKE 'invalid:%' ORDER BY LOWER(name)",
        )?;
        let artists = stmt.query_map([], Artist::from_row)?;
        Ok(artists.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    pub fn save(&self, conn: &Connection) -> StorageResult<()> {
        conn.execute(
            "INSERT INTO artists (id, name, album_count, starred, biography, music_brainz_id,
                                  last_fm_url, artist_image_url)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
             ON CONFLICT(id) DO UPDATE SET
                name=excluded.name, album_count=excluded.album_count,
                starred=excluded.starred, biography=excluded.biography,
                music_brainz_id=excluded.music_brainz_id,
                last_fm_url=excluded.last_fm_url,
                artist_image_url=excluded.artist_image_url",
            params![
                self.id,
                self.name,
                self.album_count,
                self.starred,
                self.biography,
                self.music_brainz_id,
                self.last_fm_url,
                self.artist_image_url
            ],
        )?;
        Ok(())
    }

    /// Ids of every album this artist owns, directly or through its album listing.
    pub fn owned_album_ids(conn: &Connection, id: &str) -> StorageResult<Vec<String>> {
        load_ordered(
            conn,
            "SELECT id FROM albums WHERE artist_id = ?1
             UNION SELECT album_id FROM artist_albums WHERE artist_id = ?1",
            id,
        )
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Genre {
    pub name: String,
    pub song_count: Option<i64>,
    pub album_count: Option<i64>,
}

impl Genre {
    pub fn merge(self, incoming: Genre) -> Genre {
        Genre {
            name: incoming.name,
            song_count: incoming.song_count.or(self.song_count),
            album_count: incoming.album_count.or(self.album_count),
        }
    }

    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(Genre {
            name: row.get("name")?,
            song_count: row.get("song_count")?,
            album_count: row.get("album_count")?,
        })
    }

    pub fn load(conn: &Connection, name: &str) -> StorageResult<Option<Genre>> {
        Ok(conn
            .query_row("SELECT * FROM genres WHERE name = ?1", params![name], Genre::from_row)
            .optional()?)
    }

    pub fn load_all(conn: &Connection) -> StorageResult<Vec<Genre>> {
        let mut stmt = conn.prepare("SELECT * FROM genres ORDER BY LOWER(name)")?;
        let genres = stmt.query_map([], Genre::from_row)?;
        Ok(genres.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    pub fn save(&self, conn: &Connection) -> StorageResult<()> {
        conn.execute(
            "INSERT INTO genres (name, song_count, album_count) VALUES (?1, ?2, ?3)
             ON CONFLICT(name) DO UPDATE SET
                song_count=excluded.song_count, album_count=excluded.album_count",
            params![self.name, self.song_count, self.album_count],
        )?;
        Ok(())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Playlist {
    pub id: String,
    pub name: String,
    pub comment: Option<String>,
    pub owner: Option<String>,
    pub song_count: Option<i64>,
    pub duration: Option<i64>,
    pub created: Option<DateTime<Utc>>,
    pub changed: Option<DateTime<Utc>>,
    pub public: Option<bool>,
    pub cover_art: Option<String>,
    /// Playback order; the same song may appear more than once.
    pub song_ids: Vec<String>,
}

impl Playlist {
    pub fn merge(self, incoming: Playlist) -> Playlist {
        Playlist {
            id: incoming.id,
            name: incoming.name,
            comment: incoming.comment.or(self.comment),
            owner: incoming.owner.or(self.owner),
            song_count: incoming.song_count.or(self.song_count),
            duration: incoming.duration.or(self.duration),
            created: incoming.created.or(self.created),
            changed: incoming.changed.or(self.changed),
            public: incoming.public.or(self.public),
            cover_art: incoming.cover_art.or(self.cover_art),
            song_ids: self.song_ids,
        }
    }

    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(Playlist {
            id: row.get("id")?,
            name: row.get("name")?,
            comment: row.get("comment")?,
            owner: row.get("owner")?,
            song_count: row.get("song_count")?,
            duration: row.get("duration")?,
            created: row.get("created")?,
            changed: row.get("changed")?,
            public: row.get("public")?,
            cover_art: row.get("cover_art")?,
            song_ids: Vec::new(),
        })
    }

    pub fn load(conn: &Connection, id: &str) -> StorageResult<Option<Playlist>> {
        let playlist = conn
            .query_row("SELECT * FROM playlists WHERE id = ?1", params![id], Playlist::from_row)
            .optional()?;
        let Some(mut playlist) = playlist else {
            return Ok(None);
        };
        playlist.song_ids = load_ordered(
            conn,
            "SELECT song_id FROM playlist_songs WHERE playlist_id = ?1 ORDER BY position",
            id,
        )?;
        Ok(Some(playlist))
    }

    /// Playlist headers ordered by name. Song lists are left empty.
    pub fn load_all(conn: &Connection) -> StorageResult<Vec<Playlist>> {
        let mut stmt = conn.prepare("SELECT * FROM playlists ORDER BY LOWER(name)")?;
        let playlists = stmt.query_map([], Playlist::from_row)?;
        Ok(playlists.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    pub fn save(&self, conn: &Connection) -> StorageResult<()> {
        conn.execute(
            "INSERT INTO playlists (id, name, comment, owner, song_count, duration, created,
                                    changed, public, cover_art)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
             ON CONFLICT(id) DO UPDATE SET
                name=excluded.name, comment=excluded.comment, owner=excluded.owner,
                song_count=excluded.song_count, duration=excluded.duration,
                created=excluded.created, changed=excluded.changed,
                public=excluded.public, cover_art=excluded.cover_art",
            params![
                self.id,
                self.name,
                self.comment,
                self.owner,
                self.song_count,
                self.duration,
                self.created,
                self.changed,
                self.public,
                self.cover_art
            ],
        )?;
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "id", rename_all = "snake_case")]
pub enum DirectoryChild {
    Directory(String),
    Song(String),
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Directory {
    pub id: String,
    pub name: Option<String>,
    pub parent_id: Option<String>,
    pub children: Vec<DirectoryChild>,
}

impl Directory {
    pub fn merge(self, incoming: Directory) -> Directory {
        Directory {
            id: incoming.id,
            name: incoming.name.or(self.name),
            parent_id: incoming.parent_id.or(self.parent_id),
            children: self.children,
        }
    }

    pub fn load(conn: &Connection, id: &str) -> StorageResult<Option<Directory>> {
        let directory = conn
            .query_row(
                "SELECT id, name, parent_id FROM directories WHERE id = ?1",
                params![id],
                |row| {
                    Ok(Directory {
                        id: row.get(0)?,
                        name: row.get(1)?,
                        parent_id: row.get(2)?,
                        children: Vec::new(),
                    })
                },
            )
            .optional()?;
        let Some(mut directory) = directory else {
            return Ok(None);
        };
        let mut stmt = conn.prepare(
            "SELECT child_id, is_directory FROM directory_children
             WHERE directory_id = ?1 ORDER BY position",
        )?;
        let children = stmt.query_map(params![id], |row| {
            let child_id: String = row.get(0)?;
            Ok(if row.get::<_, bool>(1)? {
                DirectoryChild::Directory(child_id)
            } else {
                DirectoryChild::Song(child_id)
            })
        })?;
        directory.children = children.collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(Some(directory))
    }

    pub fn save(&self, conn: &Connection) -> StorageResult<()> {
        conn.execute(
            "INSERT INTO directories (id, name, parent_id) VALUES (?1, ?2, ?3)
             ON CONFLICT(id) DO UPDATE SET name=excluded.name, parent_id=excluded.parent_id",
            params![self.id, self.name, self.parent_id],
        )?;
        Ok(())
    }

    pub fn replace_children(
        conn: &Connection,
        id: &str,
        children: &[DirectoryChild],
    ) -> StorageResult<()> {
        conn.execute(
            "DELETE FROM directory_children WHERE directory_id = ?1",
            params![id],
        )?;
        let mut stmt = conn.prepare(
            "INSERT INTO directory_children (directory_id, position, child_id, is_directory)
             VALUES (?1, ?2, ?3, ?4)",
        )?;
        for (position, child) in children.iter().enumerate() {
            let (child_id, is_directory) = match child {
                DirectoryChild::Directory(id) => (id, true),
                DirectoryChild::Song(id) => (id, false),
            };
            stmt.execute(params![id, position as i64, child_id, is_directory])?;
        }
        Ok(())
    }
}

/// Ordered many-to-many relations. Each is replaced wholesale, never merged.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderedRelation {
    AlbumSongs,
    ArtistAlbums,
    SimilarArtists,
    PlaylistSongs,
    AlbumQueryResults,
}

impl OrderedRelation {
    /// (table, owner column, member column)
    fn columns(self) -> (&'static str, &'static str, &'static str) {
        match self {
            OrderedRelation::AlbumSongs => ("album_songs", "album_id", "song_id"),
            OrderedRelation::ArtistAlbums => ("artist_albums", "artist_id", "album_id"),
            OrderedRelation::SimilarArtists => ("similar_artists", "artist_id", "similar_artist_id"),
            OrderedRelation::PlaylistSongs => ("playlist_songs", "playlist_id", "song_id"),
            OrderedRelation::AlbumQueryResults => ("album_query_results", "query_hash", "album_id"),
        }
    }

    pub fn load(self, conn: &Connection, owner: &str) -> StorageResult<Vec<String>> {
        let (table, owner_col, member_col) = self.columns();
        load_ordered(
            conn,
            &format!("SELECT {member_col} FROM {table} WHERE {owner_col} = ?1 ORDER BY position"),
            owner,
        )
    }

    pub fn replace(self, conn: &Connection, owner: &str, members: &[String]) -> StorageResult<()> {
        let (table, owner_col, member_col) = self.columns();
        conn.execute(&format!("DELETE FROM {table} WHERE {owner_col} = ?1"), params![owner])?;
        let mut stmt = conn.prepare(&format!(
            "INSERT INTO {table} ({owner_col}, {member_col}, position) VALUES (?1, ?2, ?3)"
        ))?;
        for (position, member) in members.iter().enumerate() {
            stmt.execute(params![owner, member, position as i64])?;
        }
        Ok(())
    }
}

fn load_ordered(conn: &Connection, sql: &str, id: &str) -> StorageResult<Vec<String>> {
    let mut stmt = conn.prepare(sql)?;
    let ids = stmt.query_map(params![id], |row| row.get::<_, String>(0))?;
    Ok(ids.collect::<rusqlite::Result<Vec<_>>>()?)
}

pub fn load_ignored_articles(conn: &Connection) -> StorageResult<Vec<String>> {
    let mut stmt = conn.prepare("SELECT name FROM ignored_articles ORDER BY name")?;
    let names = stmt.query_map([], |row| row.get::<_, String>(0))?;
    Ok(names.collect::<rusqlite::Result<Vec<_>>>()?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_song_merge_keeps_absent_fields() {
        let stored = Song {
            id: "1".into(),
            title: "Old".into(),
            track: Some(3),
            path: Some("a/b.flac".into()),
            ..Default::default()
        };
        let incoming = Song {
            id: "1".into(),
            title: "New".into(),
            year: Some(1999),
            track: Some(4),
            ..Default::default()
        };

        let merged = stored.merge(incoming);
        assert_eq!(merged.title, "New");
        assert_eq!(merged.track, Some(4));
        assert_eq!(merged.year, Some(1999));
        assert_eq!(merged.path.as_deref(), Some("a/b.flac"));
    }

    #[test]
    fn test_album_merge_never_touches_song_order() {
        let stored = Album {
            id: "7".into(),
            name: "A".into(),
            play_count: Some(10),
            song_ids: vec!["s1".into(), "s2".into()],
            ..Default::default()
        };
        let incoming = Album {
            id: "7".into(),
            name: "A (Remaster)".into(),
            ..Default::default()
        };

        let merged = stored.merge(incoming);
        assert_eq!(merged.name, "A (Remaster)");
        assert_eq!(merged.play_count, Some(10));
        assert_eq!(merged.song_ids, vec!["s1".to_string(), "s2".to_string()]);
    }

    #[test]
    fn test_placeholder_ids_are_deterministic() {
        let a = placeholder_id("Unknown Artist");
        assert!(is_placeholder(&a));
        assert_eq!(a, placeholder_id("Unknown Artist"));
        assert_ne!(a, placeholder_id("Other"));
    }
}

//! Invalidation and deletion, including the dependents each kind drags along.

use std::collections::HashSet;

use rusqlite::{params, Connection};
use tracing::{debug, info};

use crate::cache::keys::CachedDataKey;
use crate::cache::validity;
use crate::database::models::{Album, Artist, Playlist, Song};
use crate::database::repo::truncate_all;
use crate::error::StorageResult;
use crate::media::paths::{remove_if_exists, ContentRoots};

/// Permanent song files share the song file ledger row.
fn ledger_key(key: CachedDataKey) -> CachedDataKey {
    match key {
        CachedDataKey::SongFilePermanent => CachedDataKey::SongFile,
        other => other,
    }
}

/// Marks `(key, parameter)` invalid along with the cover art and albums hanging off it.
/// Rows are kept so stale data can still be served as a partial result.
pub fn invalidate(conn: &Connection, key: CachedDataKey, parameter: Option<&str>) -> StorageResult<()> {
    let mut seen = HashSet::new();
    invalidate_with(conn, ledger_key(key), parameter, &mut seen)
}

fn invalidate_with(
    conn: &Connection,
    key: CachedDataKey,
    parameter: Option<&str>,
    seen: &mut HashSet<(CachedDataKey, Option<String>)>,
) -> StorageResult<()> {
    if !seen.insert((key, parameter.map(str::to_string))) {
        return Ok(());
    }
    let existed = validity::mark_invalid(conn, key, parameter)?;
    debug!(%key, parameter, existed, "invalidated");

    let Some(id) = parameter else {
        return Ok(());
    };
    match key {
        CachedDataKey::Album => {
            if let Some(cover_art) = Album::load(conn, id)?.and_then(|a| a.cover_art) {
                invalidate_with(conn, CachedDataKey::CoverArtFile, Some(&cover_art), seen)?;
            }
        }
        CachedDataKey::Artist => {
            if let Some(image) = Artist::load(conn, id)?.and_then(|a| a.artist_image_url) {
                invalidate_with(conn, CachedDataKey::CoverArtFile, Some(&image), seen)?;
            }
            for album_id in Artist::owned_album_ids(conn, id)? {
                invalidate_with(conn, CachedDataKey::Album, Some(&album_id), seen)?;
            }
        }
        CachedDataKey::Playlist => {
            if let Some(cover_art) = Playlist::load(conn, id)?.and_then(|p| p.cover_art) {
                invalidate_with(conn, CachedDataKey::CoverArtFile, Some(&cover_art), seen)?;
            }
        }
        CachedDataKey::SongFile => {
            if let Some(cover_art) = Song::load(conn, id)?.and_then(|s| s.cover_art) {
                invalidate_with(conn, CachedDataKey::CoverArtFile, Some(&cover_art), seen)?;
            }
        }
        _ => {}
    }
    Ok(())
}

/// Removes the local copy of `(key, parameter)`: files on disk for binary kinds,
/// the row itself for entity kinds, everything for the sentinels.
///
/// Files that are already gone are not an error. File removal is not rolled back
/// if the surrounding transaction fails.
pub fn delete(
    conn: &Connection,
    roots: &ContentRoots,
    key: CachedDataKey,
    parameter: Option<&str>,
) -> StorageResult<()> {
    let key = ledger_key(key);
    let info = validity::get(conn, key, parameter)?;
    debug!(%key, parameter, known = info.is_some(), "deleting");

    match key {
        CachedDataKey::CoverArtFile => {
            if let Some(hash) = info.as_ref().and_then(|i| i.file_hash.as_deref()) {
                remove_if_exists(&roots.cover_art_filename(hash))?;
            }
        }
        CachedDataKey::SongFile => {
            if let Some(filename) = info.as_ref().and_then(|i| roots.song_filename(i)) {
                remove_if_exists(&filename)?;
            }
        }
        CachedDataKey::Playlist => {
            if let Some(id) = parameter {
                if let Some(cover_art) = Playlist::load(conn, id)?.and_then(|p| p.cover_art) {
                    delete(conn, roots, CachedDataKey::CoverArtFile, Some(&cover_art))?;
                }
                delete_row(conn, "playlists", "id", id)?;
            }
        }
        CachedDataKey::Song => delete_entity(conn, "songs", parameter)?,
        CachedDataKey::Album => delete_entity(conn, "albums", parameter)?,
        CachedDataKey::Artist => delete_entity(conn, "artists", parameter)?,
        CachedDataKey::Directory => delete_entity(conn, "directories", parameter)?,
        CachedDataKey::Genres => {
            if let Some(name) = parameter {
                delete_row(conn, "genres", "name", name)?;
            }
        }
        CachedDataKey::AllSongs => {
            info!("deleting all cached media");
            roots.wipe_media()?;
            validity::mark_all_invalid(conn, CachedDataKey::SongFile)?;
            validity::mark_all_invalid(conn, CachedDataKey::CoverArtFile)?;
        }
        CachedDataKey::Everything => {
            delete(conn, roots, CachedDataKey::AllSongs, None)?;
            info!("clearing the metadata store");
            return truncate_all(conn);
        }
        _ => {}
    }

    if info.is_some() {
        validity::mark_invalid(conn, key, parameter)?;
    }
    Ok(())
}

fn delete_entity(conn: &Connection, table: &str, id: Option<&str>) -> StorageResult<()> {
    match id {
        Some(id) => delete_row(conn, table, "id", id),
        None => Ok(()),
    }
}

fn delete_row(conn: &Connection, table: &str, column: &str, id: &str) -> StorageResult<()> {
    let removed = conn.execute(&format!("DELETE FROM {table} WHERE {column} = ?1"), params![id])?;
    debug!(table, id, removed, "deleted row");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::validity::FileMetadata;
    use crate::database::schema::SCHEMA;
    use chrono::Utc;

    fn conn() -> anyhow::Result<Connection> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(SCHEMA)?;
        Ok(conn)
    }

    fn valid(conn: &Connection, key: CachedDataKey, id: &str) -> anyhow::Result<()> {
        validity::mark_valid(conn, key, Some(id), Utc::now(), FileMetadata::default())?;
        Ok(())
    }

    #[test]
    fn test_artist_invalidation_reaches_albums_and_art() -> anyhow::Result<()> {
        let conn = conn()?;
        conn.execute_batch(
            "INSERT INTO artists (id, name, artist_image_url) VALUES ('ar', 'Artist', 'img');
             INSERT INTO albums (id, name, artist_id, cover_art) VALUES ('al1', 'One', 'ar', 'c1');
             INSERT INTO albums (id, name) VALUES ('al2', 'Two');
             INSERT INTO artist_albums (artist_id, album_id, position) VALUES ('ar', 'al2', 0);",
        )?;
        for (key, id) in [
            (CachedDataKey::Artist, "ar"),
            (CachedDataKey::Album, "al1"),
            (CachedDataKey::Album, "al2"),
            (CachedDataKey::CoverArtFile, "c1"),
            (CachedDataKey::CoverArtFile, "img"),
        ] {
            valid(&conn, key, id)?;
        }

        invalidate(&conn, CachedDataKey::Artist, Some("ar"))?;

        for (key, id) in [
            (CachedDataKey::Artist, "ar"),
            (CachedDataKey::Album, "al1"),
            (CachedDataKey::Album, "al2"),
            (CachedDataKey::CoverArtFile, "c1"),
            (CachedDataKey::CoverArtFile, "img"),
        ] {
            assert!(!validity::is_valid(&conn, key, Some(id))?, "{key} {id}");
        }
        // rows survive invalidation
        assert!(Album::load(&conn, "al1")?.is_some());
        Ok(())
    }

    #[test]
    fn test_playlist_invalidation_reaches_its_cover_art() -> anyhow::Result<()> {
        let conn = conn()?;
        conn.execute_batch("INSERT INTO playlists (id, name, cover_art) VALUES ('p', 'Mix', 'pc');")?;
        valid(&conn, CachedDataKey::Playlist, "p")?;
        valid(&conn, CachedDataKey::CoverArtFile, "pc")?;
        valid(&conn, CachedDataKey::CoverArtFile, "other")?;

        invalidate(&conn, CachedDataKey::Playlist, Some("p"))?;

        assert!(!validity::is_valid(&conn, CachedDataKey::Playlist, Some("p"))?);
        assert!(!validity::is_valid(&conn, CachedDataKey::CoverArtFile, Some("pc"))?);
        assert!(validity::is_valid(&conn, CachedDataKey::CoverArtFile, Some("other"))?);
        Ok(())
    }

    #[test]
    fn test_song_file_invalidation_reaches_the_song_cover_art() -> anyhow::Result<()> {
        let conn = conn()?;
        conn.execute_batch("INSERT INTO songs (id, title, cover_art) VALUES ('s', 'Song', 'sc');")?;
        valid(&conn, CachedDataKey::Song, "s")?;
        valid(&conn, CachedDataKey::SongFile, "s")?;
        valid(&conn, CachedDataKey::CoverArtFile, "sc")?;

        invalidate(&conn, CachedDataKey::SongFilePermanent, Some("s"))?;

        assert!(!validity::is_valid(&conn, CachedDataKey::SongFile, Some("s"))?);
        assert!(!validity::is_valid(&conn, CachedDataKey::CoverArtFile, Some("sc"))?);
        // the metadata row is a separate item
        assert!(validity::is_valid(&conn, CachedDataKey::Song, Some("s"))?);
        Ok(())
    }

    #[test]
    fn test_deleting_an_entity_removes_its_row() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let roots = ContentRoots::create(dir.path())?;
        let conn = conn()?;
        conn.execute_batch(
            "INSERT INTO songs (id, title) VALUES ('s', 'Song');
             INSERT INTO playlists (id, name, cover_art) VALUES ('p', 'List', 'pc');",
        )?;
        valid(&conn, CachedDataKey::Song, "s")?;
        valid(&conn, CachedDataKey::Playlist, "p")?;
        validity::mark_valid(
            &conn,
            CachedDataKey::CoverArtFile,
            Some("pc"),
            Utc::now(),
            FileMetadata {
                file_hash: Some("hash".into()),
                ..Default::default()
            },
        )?;
        std::fs::write(roots.cover_art_filename("hash"), b"art")?;

        delete(&conn, &roots, CachedDataKey::Song, Some("s"))?;
        delete(&conn, &roots, CachedDataKey::Playlist, Some("p"))?;

        assert!(Song::load(&conn, "s")?.is_none());
        assert!(!validity::is_valid(&conn, CachedDataKey::Song, Some("s"))?);
        assert!(Playlist::load(&conn, "p")?.is_none());
        assert!(!roots.cover_art_filename("hash").exists());
        assert!(!validity::is_valid(&conn, CachedDataKey::CoverArtFile, Some("pc"))?);
        Ok(())
    }

    #[test]
    fn test_deleting_a_missing_file_is_not_an_error() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let roots = ContentRoots::create(dir.path())?;
        let conn = conn()?;
        validity::mark_valid(
            &conn,
            CachedDataKey::SongFile,
            Some("s"),
            Utc::now(),
            FileMetadata {
                path: Some("gone.mp3".into()),
                ..Default::default()
            },
        )?;

        delete(&conn, &roots, CachedDataKey::SongFilePermanent, Some("s"))?;
        delete(&conn, &roots, CachedDataKey::SongFile, Some("never-seen"))?;
        assert!(!validity::is_valid(&conn, CachedDataKey::SongFile, Some("s"))?);
        Ok(())
    }
}

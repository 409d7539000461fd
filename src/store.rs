use std::collections::{BTreeSet, HashMap};
use std::path::Path;

use chrono::{DateTime, Utc};
use tracing::{debug, info};

use crate::cache::cascade;
use crate::cache::keys::CachedDataKey;
use crate::cache::validity::{self, CacheInfo, FileMetadata};
use crate::database::models::{Album, Artist, Directory, Genre, Playlist, Song};
use crate::database::repo::{self, Database};
use crate::error::{CacheResult, StorageResult};
use crate::ingest::engine::Ingestor;
use crate::ingest::payload::Payload;
use crate::media::paths::ContentRoots;
use crate::query::albums::AlbumSearchQuery;
use crate::query::retrieval::{self, SearchResult, SongCacheStatus};
use crate::utils::config::{StoreConfig, StoreMode};

/// The local library store: metadata database plus the media it references.
///
/// Safe to share between threads. Mutations serialize on one write lock; reads do not.
pub struct CacheStore {
    db: Database,
    roots: ContentRoots,
    mode: StoreMode,
}

impl CacheStore {
    pub fn open(data_directory: &Path, mode: StoreMode) -> StorageResult<Self> {
        let roots = ContentRoots::create(data_directory)?;
        let db = Database::open(&roots.database_path())?;
        info!(root = %data_directory.display(), %mode, "store ready");
        Ok(Self { db, roots, mode })
    }

    pub fn from_config(config: &StoreConfig) -> StorageResult<Self> {
        Self::open(&config.data_directory, config.mode)
    }

    pub fn mode(&self) -> StoreMode {
        self.mode
    }

    pub fn is_cache(&self) -> bool {
        self.mode == StoreMode::Cache
    }

    pub fn roots(&self) -> &ContentRoots {
        &self.roots
    }

    fn assert_cache(&self, operation: &str) {
        assert!(self.is_cache(), "{operation} called on a pass-through store");
    }

    pub fn ingest(&self, parameter: Option<&str>, payload: Payload) -> StorageResult<CacheInfo> {
        self.assert_cache("ingest");
        self.db
            .write(|tx| Ingestor::new(tx, &self.roots).ingest(parameter, payload))
    }

    pub fn invalidate(&self, key: CachedDataKey, parameter: Option<&str>) -> StorageResult<()> {
        self.assert_cache("invalidate");
        self.db.write(|tx| cascade::invalidate(tx, key, parameter))
    }

    pub fn delete(&self, key: CachedDataKey, parameter: Option<&str>) -> StorageResult<()> {
        self.assert_cache("delete");
        self.db.write(|tx| cascade::delete(tx, &self.roots, key, parameter))
    }

    pub fn is_valid(&self, key: CachedDataKey, parameter: Option<&str>) -> StorageResult<bool> {
        self.db.read(|conn| validity::is_valid(conn, key, parameter))
    }

    pub fn cache_info(&self, key: CachedDataKey, parameter: Option<&str>) -> StorageResult<Option<CacheInfo>> {
        self.db.read(|conn| validity::get(conn, key, parameter))
    }

    pub fn mark_valid(
        &self,
        key: CachedDataKey,
        parameter: Option<&str>,
        timestamp: DateTime<Utc>,
        extra: FileMetadata,
    ) -> StorageResult<CacheInfo> {
        self.assert_cache("mark_valid");
        self.db
            .write(|tx| validity::mark_valid(tx, key, parameter, timestamp, extra))
    }

    pub fn mark_invalid(&self, key: CachedDataKey, parameter: Option<&str>) -> StorageResult<bool> {
        self.assert_cache("mark_invalid");
        debug!(%key, parameter, "marking invalid");
        self.db.write(|tx| validity::mark_invalid(tx, key, parameter))
    }

    pub fn has_cached(&self, key: CachedDataKey) -> StorageResult<bool> {
        self.db.read(|conn| retrieval::has_cached(conn, self.mode, key))
    }

    pub fn get_song(&self, id: &str) -> CacheResult<Song> {
        self.db.read(|conn| retrieval::song(conn, self.mode, id))?
    }

    pub fn get_album(&self, id: &str) -> CacheResult<Album> {
        self.db.read(|conn| retrieval::album(conn, self.mode, id))?
    }

    pub fn get_artist(&self, id: &str) -> CacheResult<Artist> {
        self.db.read(|conn| retrieval::artist(conn, self.mode, id))?
    }

    pub fn get_playlist(&self, id: &str) -> CacheResult<Playlist> {
        self.db.read(|conn| retrieval::playlist(conn, self.mode, id))?
    }

    pub fn get_directory(&self, id: &str) -> CacheResult<Directory> {
        self.db.read(|conn| retrieval::directory(conn, self.mode, id))?
    }

    pub fn get_playlists(&self) -> CacheResult<Vec<Playlist>> {
        self.db.read(|conn| retrieval::playlists(conn, self.mode))?
    }

    pub fn get_artists(&self) -> CacheResult<Vec<Artist>> {
        self.db.read(|conn| retrieval::artists(conn, self.mode))?
    }

    pub fn get_genres(&self) -> CacheResult<Vec<Genre>> {
        self.db.read(|conn| retrieval::genres(conn, self.mode))?
    }

    pub fn get_ignored_articles(&self) -> CacheResult<BTreeSet<String>> {
        self.db.read(|conn| retrieval::ignored_articles(conn, self.mode))?
    }

    pub fn get_all_albums(&self) -> CacheResult<Vec<Album>> {
        self.db.read(|conn| retrieval::all_albums(conn, self.mode))?
    }

    pub fn get_albums(&self, query: &AlbumSearchQuery) -> CacheResult<Vec<Album>> {
        self.db.read(|conn| retrieval::albums(conn, self.mode, query))?
    }

    pub fn search(&self, query: &str) -> CacheResult<SearchResult> {
        self.db.read(|conn| retrieval::search(conn, self.mode, query))?
    }

    /// `file://` URI of the downloaded song bytes.
    pub fn get_song_uri(&self, song_id: &str) -> CacheResult<String> {
        self.db
            .read(|conn| retrieval::song_uri(conn, &self.roots, self.mode, song_id))?
    }

    pub fn get_cover_art_uri(&self, cover_art_id: &str) -> CacheResult<String> {
        self.db
            .read(|conn| retrieval::cover_art_uri(conn, &self.roots, cover_art_id))?
    }

    pub fn cached_statuses(&self, song_ids: &[String]) -> StorageResult<HashMap<String, SongCacheStatus>> {
        self.db
            .read(|conn| retrieval::cached_statuses(conn, &self.roots, song_ids))
    }

    pub fn table_counts(&self) -> StorageResult<Vec<(&'static str, i64)>> {
        self.db.read(|conn| repo::table_counts(conn))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CacheError;
    use crate::ingest::payload::{ApiAlbum, ApiArtist, ApiFile, ApiGenre, ApiPlaylist, ApiSong};
    use crate::query::albums::AlbumListType;
    use std::fs;
    use std::sync::Arc;
    use std::thread;
    use tempfile::TempDir;

    fn store() -> anyhow::Result<(TempDir, CacheStore)> {
        let dir = tempfile::tempdir()?;
        let store = CacheStore::open(dir.path(), StoreMode::Cache)?;
        Ok((dir, store))
    }

    fn song(id: &str, title: &str) -> ApiSong {
        ApiSong {
            id: Some(id.into()),
            title: Some(title.into()),
            ..Default::default()
        }
    }

    fn artist(id: &str, name: &str) -> ApiArtist {
        ApiArtist {
            id: Some(id.into()),
            name: Some(name.into()),
            ..Default::default()
        }
    }

    fn album(id: &str, name: &str) -> ApiAlbum {
        ApiAlbum {
            id: Some(id.into()),
            name: Some(name.into()),
            ..Default::default()
        }
    }

    fn buffer(dir: &TempDir, name: &str, bytes: &[u8]) -> anyhow::Result<ApiFile> {
        let source = dir.path().join(name);
        fs::write(&source, bytes)?;
        Ok(ApiFile {
            source: Some(source),
            ..Default::default()
        })
    }

    #[test]
    fn test_song_lifecycle() -> anyhow::Result<()> {
        let (_dir, store) = store()?;

        match store.get_song("42") {
            Err(CacheError::Miss { partial }) => assert_eq!(partial, None),
            other => panic!("expected an empty miss, got {other:?}"),
        }

        let payload = ApiSong {
            album: Some(album("7", "A")),
            ..song("42", "X")
        };
        store.ingest(None, Payload::Song(payload))?;

        let stored = store.get_song("42")?;
        assert_eq!(stored.title, "X");
        assert_eq!(stored.album_id.as_deref(), Some("7"));

        store.invalidate(CachedDataKey::Song, Some("42"))?;
        match store.get_song("42") {
            Err(CacheError::Miss { partial: Some(row) }) => assert_eq!(row, stored),
            other => panic!("expected a miss carrying the row, got {other:?}"),
        }
        Ok(())
    }

    #[test]
    fn test_merge_keeps_previously_known_fields() -> anyhow::Result<()> {
        let (_dir, store) = store()?;

        let full = ApiSong {
            track: Some(3),
            year: Some(1999),
            duration: Some(200),
            ..song("s", "Song")
        };
        store.ingest(None, Payload::Song(full))?;

        let sparse = ApiSong {
            duration: Some(201),
            ..song("s", "Song (Live)")
        };
        store.ingest(None, Payload::Song(sparse))?;

        let merged = store.get_song("s")?;
        assert_eq!(merged.title, "Song (Live)");
        assert_eq!(merged.duration, Some(201));
        assert_eq!(merged.track, Some(3));
        assert_eq!(merged.year, Some(1999));
        Ok(())
    }

    #[test]
    fn test_payload_without_names_keeps_stored_names() -> anyhow::Result<()> {
        let (_dir, store) = store()?;

        store.ingest(None, Payload::Album(album("7", "A")))?;
        let with_album = ApiSong {
            album: Some(ApiAlbum {
                id: Some("7".into()),
                ..Default::default()
            }),
            ..song("43", "Y")
        };
        store.ingest(None, Payload::Song(with_album))?;
        let untitled = ApiSong {
            id: Some("43".into()),
            duration: Some(5),
            ..Default::default()
        };
        store.ingest(None, Payload::Song(untitled))?;

        let stored = store.get_song("43")?;
        assert_eq!(stored.title, "Y");
        assert_eq!(stored.duration, Some(5));
        assert_eq!(stored.album_id.as_deref(), Some("7"));
        assert_eq!(store.get_album("7")?.name, "A");
        Ok(())
    }

    #[test]
    fn test_song_without_id_is_never_authoritative() -> anyhow::Result<()> {
        let (_dir, store) = store()?;

        let anonymous = ApiSong {
            title: Some("NoId".into()),
            ..Default::default()
        };
        let info = store.ingest(None, Payload::Song(anonymous))?;
        assert!(!info.valid);

        match store.get_song("") {
            Err(CacheError::Miss { partial }) => assert_eq!(partial, None),
            other => panic!("expected an empty miss, got {other:?}"),
        }
        let id = crate::database::models::placeholder_id("NoId");
        let partial = store.get_song(&id).err().and_then(CacheError::into_partial);
        assert_eq!(partial.map(|s| s.title).as_deref(), Some("NoId"));
        assert!(!store.is_valid(CachedDataKey::Song, Some(&id))?);
        Ok(())
    }

    #[test]
    fn test_artist_seen_first_as_similar_still_gets_relations() -> anyhow::Result<()> {
        let (_dir, store) = store()?;

        let a = ApiArtist {
            similar_artists: Some(vec![artist("b", "B")]),
            ..artist("a", "A")
        };
        let b = ApiArtist {
            similar_artists: Some(vec![artist("c", "C")]),
            albums: Some(vec![album("bal", "B's Album")]),
            ..artist("b", "B")
        };
        store.ingest(None, Payload::Artists(vec![a, b, artist("c", "C")]))?;

        let load = |id: &str| -> anyhow::Result<Artist> {
            match store.get_artist(id) {
                Ok(artist) => Ok(artist),
                Err(e) => e
                    .into_partial()
                    .ok_or_else(|| anyhow::anyhow!("artist {id} was not stored")),
            }
        };
        assert_eq!(load("a")?.similar_artist_ids, vec!["b"]);
        let b = load("b")?;
        assert_eq!(b.similar_artist_ids, vec!["c"]);
        assert_eq!(b.album_ids, vec!["bal"]);
        let owned = store.get_album("bal").err().and_then(CacheError::into_partial);
        assert_eq!(owned.and_then(|al| al.artist_id).as_deref(), Some("b"));
        Ok(())
    }

    #[test]
    fn test_song_list_for_unknown_parent_is_not_fresh() -> anyhow::Result<()> {
        let (_dir, store) = store()?;

        let info = store.ingest(Some("nowhere"), Payload::Songs(vec![song("s1", "A")]))?;
        assert!(!info.valid);
        assert!(!store.is_valid(CachedDataKey::Songs, Some("nowhere"))?);
        assert!(store.get_song("s1").is_ok());
        Ok(())
    }

    #[test]
    fn test_search_treats_wildcards_literally() -> anyhow::Result<()> {
        let (_dir, store) = store()?;
        store.ingest(None, Payload::Song(song("s1", "100% Pure")))?;
        store.ingest(None, Payload::Song(song("s2", "1000 Days")))?;
        store.ingest(None, Payload::Song(song("s3", "snake_case")))?;

        let titles = |query: &str| -> Vec<String> {
            let result = match store.search(query) {
                Ok(result) => Some(result),
                Err(e) => e.into_partial(),
            };
            result
                .map(|r| r.songs.into_iter().map(|s| s.title).collect())
                .unwrap_or_default()
        };
        assert_eq!(titles("100%"), vec!["100% Pure"]);
        assert_eq!(titles("e_c"), vec!["snake_case"]);
        assert_eq!(titles("0_D"), Vec::<String>::new());
        Ok(())
    }

    #[test]
    fn test_bulk_ingest_reconciles_membership() -> anyhow::Result<()> {
        let (_dir, store) = store()?;

        // a placeholder artist appears through an album without an artist id
        let orphan = ApiAlbum {
            artist: Some(ApiArtist {
                name: Some("Nobody".into()),
                ..Default::default()
            }),
            ..album("al", "Orphan")
        };
        store.ingest(None, Payload::Album(orphan))?;
        store.ingest(
            None,
            Payload::Artists(vec![artist("a", "A"), artist("b", "B"), artist("c", "C")]),
        )?;
        store.ingest(None, Payload::Artists(vec![artist("a", "A"), artist("c", "C")]))?;

        let names: Vec<_> = store.get_artists()?.into_iter().map(|a| a.id).collect();
        assert_eq!(names, vec!["a", "c"]);

        let placeholder = store.get_album("al")?.artist_id.unwrap_or_default();
        assert!(crate::database::models::is_placeholder(&placeholder));
        let partial = store.get_artist(&placeholder).err().and_then(CacheError::into_partial);
        assert_eq!(partial.map(|row| row.name).as_deref(), Some("Nobody"));

        store.ingest(
            None,
            Payload::Genres(vec![ApiGenre {
                name: "Rock".into(),
                ..Default::default()
            }]),
        )?;
        assert_eq!(store.get_genres()?.len(), 1);
        Ok(())
    }

    #[test]
    fn test_invalidating_an_artist_invalidates_its_albums() -> anyhow::Result<()> {
        let (_dir, store) = store()?;

        let with_albums = ApiArtist {
            albums: Some(vec![album("al1", "One"), album("al2", "Two")]),
            ..artist("ar", "Artist")
        };
        store.ingest(None, Payload::Artist(with_albums))?;
        store.ingest(None, Payload::Album(album("al1", "One")))?;
        store.ingest(None, Payload::Album(album("al2", "Two")))?;
        assert!(store.get_album("al1").is_ok());

        store.invalidate(CachedDataKey::Artist, Some("ar"))?;

        for id in ["al1", "al2"] {
            assert!(store.get_album(id).is_err_and(|e| e.is_miss()), "{id}");
        }
        assert!(store.get_artist("ar").is_err_and(|e| e.is_miss()));
        Ok(())
    }

    #[test]
    fn test_playlist_order_is_replaced() -> anyhow::Result<()> {
        let (_dir, store) = store()?;

        let playlist = |songs: Vec<ApiSong>| ApiPlaylist {
            id: "p".into(),
            name: Some("Mix".into()),
            songs,
            ..Default::default()
        };
        store.ingest(
            None,
            Payload::Playlist(playlist(vec![song("s3", "C"), song("s1", "A"), song("s2", "B")])),
        )?;
        assert_eq!(store.get_playlist("p")?.song_ids, vec!["s3", "s1", "s2"]);

        store.ingest(None, Payload::Playlist(playlist(vec![song("s2", "B"), song("s3", "C")])))?;
        assert_eq!(store.get_playlist("p")?.song_ids, vec!["s2", "s3"]);

        store.ingest(Some("p"), Payload::Songs(vec![song("s1", "A")]))?;
        assert_eq!(store.get_playlist("p")?.song_ids, vec!["s1"]);
        Ok(())
    }

    #[test]
    fn test_song_file_roundtrip_and_delete() -> anyhow::Result<()> {
        let (dir, store) = store()?;
        let downloads = tempfile::tempdir()?;

        let listed = ApiSong {
            path: Some("Artist/Album/01.mp3".into()),
            size: Some(5),
            ..song("s", "Song")
        };
        store.ingest(None, Payload::Song(listed))?;
        assert!(store.get_song_uri("s").is_err_and(|e| e.is_miss()));

        let file = buffer(&downloads, "s.part", b"audio")?;
        let info = store.ingest(Some("s"), Payload::SongFile(file))?;
        assert!(info.valid);
        assert_eq!(info.size, Some(5));
        assert!(info.file_hash.is_some());

        let uri = store.get_song_uri("s")?;
        let expected = dir.path().join("music/Artist/Album/01.mp3");
        assert_eq!(uri, format!("file://{}", expected.display()));
        assert_eq!(fs::read(&expected)?, b"audio");

        let statuses = store.cached_statuses(&["s".to_string(), "other".to_string()])?;
        assert_eq!(statuses["s"], SongCacheStatus::Cached);
        assert_eq!(statuses["other"], SongCacheStatus::NotCached);

        store.delete(CachedDataKey::SongFile, Some("s"))?;
        assert!(!expected.exists());
        match store.get_song_uri("s") {
            Err(CacheError::Miss { partial }) => assert_eq!(partial, None),
            other => panic!("expected a miss without a path, got {other:?}"),
        }
        Ok(())
    }

    #[test]
    fn test_hostile_server_path_stays_inside_music_dir() -> anyhow::Result<()> {
        let (dir, store) = store()?;
        let downloads = tempfile::tempdir()?;

        let file = ApiFile {
            path: Some("../../etc/passwd".into()),
            ..buffer(&downloads, "evil.part", b"not a password file")?
        };
        let info = store.ingest(Some("s"), Payload::SongFilePermanent(file))?;
        assert!(info.cache_permanently);

        let hash = info.file_hash.unwrap_or_default();
        let landed = dir.path().join("music").join(&hash);
        assert_eq!(fs::read(&landed)?, b"not a password file");
        assert!(!dir.path().join("../etc/passwd").exists());

        store.ingest(None, Payload::Song(song("s", "Song")))?;
        let statuses = store.cached_statuses(&["s".to_string()])?;
        assert_eq!(statuses["s"], SongCacheStatus::PermanentlyCached);

        store.delete(CachedDataKey::SongFile, Some("s"))?;
        assert!(!landed.exists());
        Ok(())
    }

    #[test]
    fn test_cover_art_requires_bytes_on_disk() -> anyhow::Result<()> {
        let (_dir, store) = store()?;
        let downloads = tempfile::tempdir()?;

        let covered = ApiAlbum {
            cover_art: Some("al-1".into()),
            ..album("al", "Album")
        };
        store.ingest(None, Payload::Album(covered))?;
        assert!(!store.is_valid(CachedDataKey::CoverArtFile, Some("al-1"))?);

        let file = buffer(&downloads, "art.part", b"png")?;
        let info = store.ingest(Some("al-1"), Payload::CoverArtFile(file))?;
        let uri = store.get_cover_art_uri("al-1")?;
        assert!(uri.ends_with(info.file_hash.as_deref().unwrap_or("missing")));

        fs::remove_file(uri.trim_start_matches("file://"))?;
        assert!(store.get_cover_art_uri("al-1").is_err_and(|e| e.is_miss()));
        Ok(())
    }

    #[test]
    fn test_album_listing_serves_only_valid_materializations() -> anyhow::Result<()> {
        let (_dir, store) = store()?;
        let query = AlbumSearchQuery::new(AlbumListType::AlphabeticalByName);

        store.ingest(None, Payload::Album(album("b", "Beta")))?;
        match store.get_albums(&query) {
            Err(CacheError::Miss { partial: Some(albums) }) => assert_eq!(albums.len(), 1),
            other => panic!("expected an ad-hoc partial result, got {other:?}"),
        }

        store.ingest(
            Some(&query.strhash()),
            Payload::AlbumQueryResult(vec![album("b", "Beta"), album("a", "Alpha")]),
        )?;
        let ids: Vec<_> = store.get_albums(&query)?.into_iter().map(|a| a.id).collect();
        assert_eq!(ids, vec!["b", "a"]);

        store.invalidate(CachedDataKey::AlbumQueryResult, Some(&query.strhash()))?;
        assert!(store.get_albums(&query).is_err_and(|e| e.is_miss()));
        Ok(())
    }

    #[test]
    fn test_directory_children_and_search() -> anyhow::Result<()> {
        let (_dir, store) = store()?;

        let request: crate::ingest::payload::IngestRequest = serde_json::from_str(
            r#"{"payload": {"kind": "directory", "data": {
                "id": "root", "name": "Music",
                "children": [
                    {"type": "directory", "id": "sub", "name": "Jazz"},
                    {"type": "song", "id": "s1", "title": "So What"}
                ]
            }}}"#,
        )?;
        store.ingest(request.parameter.as_deref(), request.payload)?;

        let root = store.get_directory("root")?;
        assert_eq!(
            root.children,
            vec![
                crate::database::models::DirectoryChild::Directory("sub".into()),
                crate::database::models::DirectoryChild::Song("s1".into()),
            ]
        );
        let partial = store.get_directory("sub").err().and_then(CacheError::into_partial);
        assert_eq!(partial.and_then(|d| d.name).as_deref(), Some("Jazz"));
        assert!(store.get_song("s1").is_ok());

        let found = store.search("what").err().and_then(CacheError::into_partial);
        assert_eq!(found.map(|r| r.songs.len()), Some(1));
        Ok(())
    }

    #[test]
    fn test_delete_everything_empties_the_store() -> anyhow::Result<()> {
        let (dir, store) = store()?;
        let downloads = tempfile::tempdir()?;

        store.ingest(None, Payload::Song(song("s", "Song")))?;
        store.ingest(Some("s"), Payload::SongFile(buffer(&downloads, "s", b"x")?))?;
        store.ingest(Some("c"), Payload::CoverArtFile(buffer(&downloads, "c", b"y")?))?;

        store.delete(CachedDataKey::AllSongs, None)?;
        assert!(!store.is_valid(CachedDataKey::SongFile, Some("s"))?);
        assert!(!store.is_valid(CachedDataKey::CoverArtFile, Some("c"))?);
        assert_eq!(fs::read_dir(dir.path().join("music"))?.count(), 0);
        assert!(store.get_song("s").is_ok());

        store.delete(CachedDataKey::Everything, None)?;
        assert!(store.table_counts()?.iter().all(|(_, n)| *n == 0));
        assert!(!store.has_cached(CachedDataKey::Song)?);
        Ok(())
    }

    #[test]
    fn test_concurrent_writers_do_not_interleave() -> anyhow::Result<()> {
        let (_dir, store) = store()?;
        let store = Arc::new(store);

        let handles: Vec<_> = (0..8)
            .map(|worker| {
                let store = Arc::clone(&store);
                thread::spawn(move || -> StorageResult<()> {
                    for n in 0..10 {
                        let id = format!("al-{worker}-{n}");
                        let payload = ApiAlbum {
                            songs: Some(vec![
                                song(&format!("{id}-1"), "One"),
                                song(&format!("{id}-2"), "Two"),
                            ]),
                            ..album(&id, "Album")
                        };
                        store.ingest(None, Payload::Album(payload))?;
                        // readers run against whatever snapshot is committed
                        if let Ok(album) = store.get_album(&id) {
                            assert_eq!(album.song_ids.len(), 2);
                        }
                    }
                    Ok(())
                })
            })
            .collect();
        for handle in handles {
            handle.join().map_err(|_| anyhow::anyhow!("writer thread panicked"))??;
        }

        let counts: HashMap<_, _> = store.table_counts()?.into_iter().collect();
        assert_eq!(counts["albums"], 80);
        assert_eq!(counts["songs"], 160);
        assert_eq!(counts["album_songs"], 160);
        Ok(())
    }

    #[test]
    fn test_ground_truth_store_reports_not_found() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let store = CacheStore::open(dir.path(), StoreMode::GroundTruth)?;

        match store.get_song("missing") {
            Err(CacheError::NotFound { key, id }) => {
                assert_eq!(key, CachedDataKey::Song);
                assert_eq!(id, "missing");
            }
            other => panic!("expected NotFound, got {other:?}"),
        }
        assert!(store.has_cached(CachedDataKey::Artists)?);
        Ok(())
    }

    #[test]
    #[should_panic(expected = "pass-through")]
    fn test_ground_truth_store_rejects_mutation() {
        let dir = tempfile::tempdir().unwrap();
        let store = CacheStore::open(dir.path(), StoreMode::GroundTruth).unwrap();
        let _ = store.invalidate(CachedDataKey::Song, Some("1"));
    }
}

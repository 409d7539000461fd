pub const PRAGMAS: &str = "
    PRAGMA journal_mode = WAL;
    PRAGMA foreign_keys = ON;
    PRAGMA synchronous = NORMAL;
    PRAGMA busy_timeout = 15000;
";

pub const SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS cache_info (
        cache_key TEXT NOT NULL,
        parameter TEXT NOT NULL DEFAULT '',
        valid INTEGER NOT NULL DEFAULT 0,
        last_ingestion_time TEXT NOT NULL,
        file_id TEXT,
        file_hash TEXT,
        path TEXT,
        size INTEGER,
        cache_permanently INTEGER NOT NULL DEFAULT 0,
        PRIMARY KEY(cache_key, parameter)
    );

    CREATE TABLE IF NOT EXISTS genres (
        name TEXT PRIMARY KEY,
        song_count INTEGER,
        album_count INTEGER
    );

    CREATE TABLE IF NOT EXISTS artists (
        id TEXT PRIMARY KEY,
        name TEXT NOT NULL,
        album_count INTEGER,
        starred INTEGER,
        biography TEXT,
        music_brainz_id TEXT,
        last_fm_url TEXT,
        artist_image_url TEXT
    );

    CREATE TABLE IF NOT EXISTS similar_artists (
        artist_id TEXT NOT NULL,
        similar_artist_id TEXT NOT NULL,
        position INTEGER NOT NULL,
        FOREIGN KEY(artist_id) REFERENCES artists(id) ON DELETE CASCADE,
        FOREIGN KEY(similar_artist_id) REFERENCES artists(id) ON DELETE CASCADE,
        PRIMARY KEY(artist_id, similar_artist_id)
    );

    CREATE TABLE IF NOT EXISTS albums (
        id TEXT PRIMARY KEY,
        name TEXT NOT NULL,
        artist_id TEXT,
        genre TEXT,
        cover_art TEXT,
        created TEXT,
        changed TEXT,
        duration INTEGER,
        play_count INTEGER,
        song_count INTEGER,
        starred INTEGER,
        year INTEGER,
        FOREIGN KEY(artist_id) REFERENCES artists(id) ON DELETE SET NULL,
        FOREIGN KEY(genre) REFERENCES genres(name) ON DELETE SET NULL
    );

    CREATE TABLE IF NOT EXISTS artist_albums (
        artist_id TEXT NOT NULL,
        album_id TEXT NOT NULL,
        position INTEGER NOT NULL,
        FOREIGN KEY(artist_id) REFERENCES artists(id) ON DELETE CASCADE,
        FOREIGN KEY(album_id) REFERENCES albums(id) ON DELETE CASCADE,
        PRIMARY KEY(artist_id, album_id)
    );

    CREATE TABLE IF NOT EXISTS songs (
        id TEXT PRIMARY KEY,
        title TEXT NOT NULL,
        duration INTEGER,
        track INTEGER,
        year INTEGER,
        path TEXT,
        size INTEGER,
        parent_id TEXT,
        album_id TEXT,
        artist_id TEXT,
        genre TEXT,
        cover_art TEXT,
        FOREIGN KEY(album_id) REFERENCES albums(id) ON DELETE SET NULL,
        FOREIGN KEY(artist_id) REFERENCES artists(id) ON DELETE SET NULL,
        FOREIGN KEY(genre) REFERENCES genres(name) ON DELETE SET NULL
    );

    CREATE TABLE IF NOT EXISTS album_songs (
        album_id TEXT NOT NULL,
        position INTEGER NOT NULL,
        song_id TEXT NOT NULL,
        FOREIGN KEY(album_id) REFERENCES albums(id) ON DELETE CASCADE,
        FOREIGN KEY(song_id) REFERENCES songs(id) ON DELETE CASCADE,
        PRIMARY KEY(album_id, position)
    );

    CREATE TABLE IF NOT EXISTS playlists (
        id TEXT PRIMARY KEY,
        name TEXT NOT NULL,
        comment TEXT,
        owner TEXT,
        song_count INTEGER,
        duration INTEGER,
        created TEXT,
        changed TEXT,
        public INTEGER,
        cover_art TEXT
    );

    CREATE TABLE IF NOT EXISTS playlist_songs (
        playlist_id TEXT NOT NULL,
        position INTEGER NOT NULL,
        song_id TEXT NOT NULL,
        FOREIGN KEY(playlist_id) REFERENCES playlists(id) ON DELETE CASCADE,
        FOREIGN KEY(song_id) REFERENCES songs(id) ON DELETE CASCADE,
        PRIMARY KEY(playlist_id, position)
    );

    CREATE TABLE IF NOT EXISTS directories (
        id TEXT PRIMARY KEY,
        name TEXT,
        parent_id TEXT
    );

    CREATE TABLE IF NOT EXISTS directory_children (
        directory_id TEXT NOT NULL,
        position INTEGER NOT NULL,
        child_id TEXT NOT NULL,
        is_directory INTEGER NOT NULL,
        FOREIGN KEY(directory_id) REFERENCES directories(id) ON DELETE CASCADE,
        PRIMARY KEY(directory_id, position)
    );

    CREATE TABLE IF NOT EXISTS ignored_articles (
        name TEXT PRIMARY KEY
    );

    CREATE TABLE IF NOT EXISTS album_query_results (
        query_hash TEXT NOT NULL,
        position INTEGER NOT NULL,
        album_id TEXT NOT NULL,
        FOREIGN KEY(album_id) REFERENCES albums(id) ON DELETE CASCADE,
        PRIMARY KEY(query_hash, position)
    );

    CREATE INDEX IF NOT EXISTS songs_album_idx ON songs(album_id);
    CREATE INDEX IF NOT EXISTS albums_artist_idx ON albums(artist_id);
";

/// Tables in an order that can be cleared one by one with foreign keys on.
pub const ALL_TABLES: [&str; 14] = [
    "album_query_results",
    "directory_children",
    "directories",
    "playlist_songs",
    "playlists",
    "album_songs",
    "songs",
    "artist_albums",
    "similar_artists",
    "albums",
    "artists",
    "genres",
    "ignored_articles",
    "cache_info",
];

use std::fs;
use std::io;
use std::path::{Component, Path, PathBuf};

use tracing::{info, warn};

use crate::cache::validity::CacheInfo;

const MUSIC_DIR: &str = "music";
const COVER_ART_DIR: &str = "cover_art";
const DATABASE_FILE: &str = "cache.db";

/// On-disk layout of a store: song bytes, cover art bytes and the metadata database.
#[derive(Debug, Clone)]
pub struct ContentRoots {
    root: PathBuf,
    music_dir: PathBuf,
    cover_art_dir: PathBuf,
}

impl ContentRoots {
    pub fn create(root: &Path) -> io::Result<Self> {
        let roots = ContentRoots {
            root: root.to_path_buf(),
            music_dir: root.join(MUSIC_DIR),
            cover_art_dir: root.join(COVER_ART_DIR),
        };
        roots.ensure_dirs()?;
        Ok(roots)
    }

    fn ensure_dirs(&self) -> io::Result<()> {
        fs::create_dir_all(&self.music_dir)?;
        fs::create_dir_all(&self.cover_art_dir)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn music_dir(&self) -> &Path {
        &self.music_dir
    }

    pub fn cover_art_dir(&self) -> &Path {
        &self.cover_art_dir
    }

    pub fn database_path(&self) -> PathBuf {
        self.root.join(DATABASE_FILE)
    }

    pub fn cover_art_filename(&self, file_hash: &str) -> PathBuf {
        self.cover_art_dir.join(file_hash)
    }

    /// Where the bytes of a song file live.
    ///
    /// The server-supplied relative path is used only when it stays strictly inside
    /// the music directory; otherwise the content hash names the file. `None` when
    /// neither is usable.
    pub fn song_filename(&self, info: &CacheInfo) -> Option<PathBuf> {
        if let Some(path) = info.path.as_deref() {
            match contained_relative(path) {
                Some(relative) => return Some(self.music_dir.join(relative)),
                None => warn!(path, "server path escapes the music directory, using content hash"),
            }
        }
        info.file_hash
            .as_deref()
            .and_then(contained_relative)
            .map(|relative| self.music_dir.join(relative))
    }

    /// Removes both content directories and recreates them empty.
    pub fn wipe_media(&self) -> io::Result<()> {
        info!(root = %self.root.display(), "wiping cached media");
        for dir in [&self.music_dir, &self.cover_art_dir] {
            match fs::remove_dir_all(dir) {
                Ok(()) => {}
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(e) => return Err(e),
            }
        }
        self.ensure_dirs()
    }
}

/// Lexically normalizes `path` and returns it only if it names something strictly
/// below the directory it will be joined to.
fn contained_relative(path: &str) -> Option<PathBuf> {
    let mut relative = PathBuf::new();
    for component in Path::new(path).components() {
        match component {
            Component::Normal(part) => relative.push(part),
            Component::CurDir => {}
            Component::ParentDir | Component::RootDir | Component::Prefix(_) => return None,
        }
    }
    if relative.as_os_str().is_empty() {
        None
    } else {
        Some(relative)
    }
}

/// Unlinks a file, treating an already-missing file as success.
pub fn remove_if_exists(path: &Path) -> io::Result<()> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::keys::CachedDataKey;

    fn song_file_info(path: Option<&str>, hash: Option<&str>) -> CacheInfo {
        CacheInfo {
            path: path.map(str::to_string),
            file_hash: hash.map(str::to_string),
            ..CacheInfo::new(CachedDataKey::SongFile, Some("s1"))
        }
    }

    #[test]
    fn test_server_path_is_used_when_contained() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let roots = ContentRoots::create(dir.path())?;

        let info = song_file_info(Some("Artist/Album/01 - Song.flac"), Some("abc"));
        let filename = roots.song_filename(&info).unwrap();
        assert_eq!(filename, roots.music_dir().join("Artist/Album/01 - Song.flac"));
        Ok(())
    }

    #[test]
    fn test_traversal_falls_back_to_hash() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let roots = ContentRoots::create(dir.path())?;

        for hostile in ["../../etc/passwd", "/etc/passwd", "a/../../b", "", "."] {
            let info = song_file_info(Some(hostile), Some("deadbeef"));
            let filename = roots.song_filename(&info).unwrap();
            assert_eq!(filename, roots.music_dir().join("deadbeef"), "{hostile}");
            assert!(filename.starts_with(roots.music_dir()));
        }
        Ok(())
    }

    #[test]
    fn test_no_path_and_no_hash_has_no_filename() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let roots = ContentRoots::create(dir.path())?;

        assert_eq!(roots.song_filename(&song_file_info(None, None)), None);
        assert_eq!(roots.song_filename(&song_file_info(Some("../x"), None)), None);
        Ok(())
    }

    #[test]
    fn test_wipe_recreates_empty_dirs() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let roots = ContentRoots::create(dir.path())?;
        fs::write(roots.cover_art_filename("h"), b"art")?;

        roots.wipe_media()?;
        assert!(roots.cover_art_dir().is_dir());
        assert_eq!(fs::read_dir(roots.cover_art_dir())?.count(), 0);

        remove_if_exists(&roots.cover_art_filename("h"))?;
        Ok(())
    }
}

use walkdir::{WalkDir, DirEntry};
use std::path::{Path, PathBuf};
use crossbeam::channel::Sender;
use anyhow::Result;

/// Sends every visible `*.json` payload file under `root` down `tx`, in path order.
pub fn scan_payloads(root: &Path, tx: Sender<PathBuf>) -> Result<usize> {
    let walker = WalkDir::new(root).sort_by_file_name().into_iter();

    let mut sent = 0;
    for entry in walker.filter_entry(|e| !is_hidden(e)) {
        let entry = entry?;
        if entry.file_type().is_file() && is_payload(entry.path()) {
            // Receiver gone means the workers stopped; nothing left to feed.
            if tx.send(entry.path().to_path_buf()).is_err() {
                break;
            }
            sent += 1;
        }
    }
    Ok(sent)
}

fn is_payload(path: &Path) -> bool {
    path.extension().is_some_and(|ext| ext.eq_ignore_ascii_case("json"))
}

fn is_hidden(entry: &DirEntry) -> bool {
    entry.depth() > 0
        && entry
            .file_name()
            .to_str()
            .map(|s| s.starts_with('.'))
            .unwrap_or(false)
}

use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use memmap2::MmapOptions;
use sha2::{Digest, Sha256};

use crate::error::StorageResult;

const MMAP_THRESHOLD: u64 = 500 * 1024 * 1024; // 500 MB

/// SHA-256 of a file's bytes, hex encoded.
pub fn hash_file(path: &Path) -> StorageResult<String> {
    let file = File::open(path)?;
    let len = file.metadata()?.len();

    let mut hasher = Sha256::new();

    if len > MMAP_THRESHOLD {
        // The download buffer is owned by the caller for the duration of ingestion,
        // so the mapping is not truncated underneath us.
        let mmap = unsafe { MmapOptions::new().map(&file)? };
        hasher.update(&mmap);
    } else {
        let mut reader = BufReader::new(file);
        let mut buffer = [0; 8192];
        loop {
            let count = reader.read(&mut buffer)?;
            if count == 0 {
                break;
            }
            hasher.update(&buffer[..count]);
        }
    }

    Ok(hex::encode(hasher.finalize()))
}

pub fn hash_str(value: &str) -> String {
    hex::encode(Sha256::digest(value.as_bytes()))
}

//! BLAKE3 hashing utilities for rule set versions and patched tree digests

use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use blake3::Hasher;

use crate::error::{Result, fs as fs_err};

/// Hash prefix for BLAKE3 hashes
pub const HASH_PREFIX: &str = "blake3:";

/// Calculate BLAKE3 hash of an in-memory document
pub fn hash_bytes(bytes: &[u8]) -> String {
    format!("{}{}", HASH_PREFIX, blake3::hash(bytes).to_hex())
}

/// Calculate BLAKE3 digest over a set of files under `root`
///
/// Paths are tree-relative with forward slashes. They are hashed in sorted
/// order together with their contents, so the digest only depends on the
/// set of files and their bytes.
pub fn hash_tree_files(root: &Path, relative_paths: &[String]) -> Result<String> {
    let mut sorted: Vec<&String> = relative_paths.iter().collect();
    sorted.sort();
    sorted.dedup();

    let mut hasher = Hasher::new();
    for relative in sorted {
        hasher.update(relative.as_bytes());
        hasher.update(b"\0");

        let file_path = root.join(relative);
        let file = File::open(&file_path).map_err(|e| fs_err::read_failed(&file_path, e))?;
        let mut reader = BufReader::new(file);
        let mut buffer = [0u8; 8192];

        loop {
            let bytes_read = reader
                .read(&mut buffer)
                .map_err(|e| fs_err::read_failed(&file_path, e))?;

            if bytes_read == 0 {
                break;
            }

            hasher.update(&buffer[..bytes_read]);
        }

        hasher.update(b"\0");
    }

    Ok(format!("{}{}", HASH_PREFIX, hasher.finalize().to_hex()))
}

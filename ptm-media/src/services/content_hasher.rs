//! Streaming content digest
//!
//! SHA-256 over the file bytes, read in 64 KiB chunks, rendered as
//! lowercase hex. The digest identifies byte-identical files for
//! deduplication.

use sha2::{Digest, Sha256};
use std::fs::File;
use std::io::Read;
use std::path::Path;

pub const HASH_CHUNK_BYTES: usize = 64 * 1024;

/// Digest of everything `reader` yields
pub fn hash_reader<R: Read>(mut reader: R) -> std::io::Result<String> {
    let mut hasher = Sha256::new();
    let mut buffer = vec![0u8; HASH_CHUNK_BYTES];

    loop {
        let bytes_read = reader.read(&mut buffer)?;
        if bytes_read == 0 {
            break;
        }
        hasher.update(&buffer[..bytes_read]);
    }

    Ok(format!("{:x}", hasher.finalize()))
}

/// Digest of a file's contents (blocking)
pub fn hash_file(path: &Path) -> std::io::Result<String> {
    let file = File::open(path)?;
    hash_reader(file)
}

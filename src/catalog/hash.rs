// Content hashing module
// Streams files through MD5 in fixed-size chunks

use md5::{Digest, Md5};
use std::fs::File;
use std::io::Read;
use std::path::Path;

use crate::config::HASH_CHUNK_SIZE;
use crate::error::SyncUtilityError;

/// Computes content fingerprints with bounded memory use.
///
/// MD5 is used as a content-equality fingerprint, not for security;
/// collision resistance against adversarial input is not a goal here.
pub struct HashComputer {
    chunk_size: usize,
}

impl HashComputer {
    /// Create a computer with the default 8 KiB chunk size
    pub fn new() -> Self {
        Self { chunk_size: HASH_CHUNK_SIZE }
    }

    pub fn with_chunk_size(chunk_size: usize) -> Self {
        Self { chunk_size }
    }

    /// Hash the full content of a file, streaming it chunk by chunk.
    /// A zero-length file yields the empty-content digest.
    pub fn hash_file(&self, path: &Path) -> Result<String, SyncUtilityError> {
        let mut file = File::open(path).map_err(|e| {
            SyncUtilityError::from_io_error(e, "hashing", Some(path.to_path_buf()))
        })?;

        let mut hasher = Md5::new();
        let mut buffer = vec![0u8; self.chunk_size];

        loop {
            let bytes_read = file.read(&mut buffer).map_err(|e| {
                SyncUtilityError::from_io_error(e, "hashing", Some(path.to_path_buf()))
            })?;
            if bytes_read == 0 {
                break;
            }
            hasher.update(&buffer[..bytes_read]);
        }

        Ok(bytes_to_hex(&hasher.finalize()))
    }
}

impl Default for HashComputer {
    fn default() -> Self {
        Self::new()
    }
}

/// Hash an in-memory byte slice
pub fn hash_bytes(data: &[u8]) -> String {
    let mut hasher = Md5::new();
    hasher.update(data);
    bytes_to_hex(&hasher.finalize())
}

/// Convert bytes to a lowercase hexadecimal string
fn bytes_to_hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}

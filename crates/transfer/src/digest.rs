use std::io::Read;
use std::path::Path;

use sha2::{Digest, Sha256};

use crate::TransferError;

/// Read buffer used while hashing files.
const HASH_BUFFER_SIZE: usize = 64 * 1024;

/// Computes SHA-256 of `data` and returns the hex-encoded digest.
pub fn checksum_bytes(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}

/// Computes SHA-256 of an entire file and returns the hex-encoded digest.
pub fn calculate_file_checksum(path: &Path) -> Result<String, TransferError> {
    let mut file = std::fs::File::open(path)?;
    let mut hasher = Sha256::new();
    let mut buf = vec![0u8; HASH_BUFFER_SIZE];
    loop {
        let n = file.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(hex::encode(hasher.finalize()))
}

/// Hashes a file on the blocking pool.
pub async fn sha256_of(path: &Path) -> Result<String, TransferError> {
    let path = path.to_path_buf();
    tokio::task::spawn_blocking(move || calculate_file_checksum(&path))
        .await
        .map_err(|e| TransferError::Io(std::io::Error::other(format!("hash task failed: {e}"))))?
}

/// Returns the digest to announce for a file of `size` bytes.
///
/// Empty files have no digest.
pub async fn sha256_if_nonempty(path: &Path, size: u64) -> Result<Option<String>, TransferError> {
    if size == 0 {
        return Ok(None);
    }
    sha256_of(path).await.map(Some)
}

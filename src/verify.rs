//! File verification utilities (SHA-256 checksums).

use crate::error::SyncError;
use sha2::{Digest, Sha256};
use std::io::Read;
use std::path::{Path, PathBuf};

/// Computes the SHA-256 hash of a local file.
///
/// Reads the file in 1 MiB chunks; the result is identical to hashing the
/// whole content at once.
///
/// # Returns
///
/// The digest as a lowercase hexadecimal string, or an error if the file
/// cannot be read.
pub fn sha256_file(filename: &Path) -> Result<String, SyncError> {
    let file = std::fs::File::open(filename)?;
    let mut reader = std::io::BufReader::with_capacity(1024 * 1024, file);

    let mut hasher = Sha256::new();
    let mut buffer = vec![0u8; 1024 * 1024];

    loop {
        let n = reader.read(&mut buffer)?;
        if n == 0 {
            break;
        }
        hasher.update(&buffer[..n]);
    }

    Ok(format!("{:x}", hasher.finalize()))
}

/// Async variant of [`sha256_file`]; hashes on the blocking thread pool.
pub async fn compute_file_sha256(filename: &Path) -> Result<String, SyncError> {
    let filename: PathBuf = filename.to_path_buf();

    tokio::task::spawn_blocking(move || sha256_file(&filename))
        .await
        .map_err(|e| SyncError::IoError(std::io::Error::other(format!("Task join error: {}", e))))?
}

/// Returns whether the file's digest equals `expected` (case-insensitive).
pub fn digest_matches(filename: &Path, expected: &str) -> Result<bool, SyncError> {
    Ok(sha256_file(filename)?.eq_ignore_ascii_case(expected))
}

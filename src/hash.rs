//! Content hashing utilities
//!
//! BLAKE3 for artifact fingerprints in version files, SHA-256 for the
//! URL-derived component of binary cache file names.

use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use blake3::Hasher;
use sha2::{Digest, Sha256};

use crate::error::{Result, UticaError};

/// BLAKE3 hash of a file's contents, hex encoded
pub fn hash_file(path: &Path) -> Result<String> {
    let file = File::open(path).map_err(|e| UticaError::FileReadFailed {
        path: path.display().to_string(),
        reason: e.to_string(),
    })?;

    let mut reader = BufReader::new(file);
    let mut hasher = Hasher::new();
    let mut buffer = [0u8; 8192];

    loop {
        let bytes_read = reader
            .read(&mut buffer)
            .map_err(|e| UticaError::FileReadFailed {
                path: path.display().to_string(),
                reason: e.to_string(),
            })?;
        if bytes_read == 0 {
            break;
        }
        hasher.update(&buffer[..bytes_read]);
    }

    Ok(hasher.finalize().to_hex().to_string())
}

/// BLAKE3 hash of a byte slice, hex encoded
#[allow(dead_code)]
pub fn hash_bytes(data: &[u8]) -> String {
    blake3::hash(data).to_hex().to_string()
}

/// SHA-256 of a URL string, hex encoded; used to key cached binary assets
pub fn sha256_of_url(url: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(url.as_bytes());
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_hash_bytes_deterministic() {
        assert_eq!(hash_bytes(b"framework"), hash_bytes(b"framework"));
        assert_ne!(hash_bytes(b"a"), hash_bytes(b"b"));
        assert_eq!(hash_bytes(b"framework").len(), 64);
    }

    #[test]
    fn test_hash_file_matches_bytes() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("binary");
        std::fs::write(&path, b"machine code").unwrap();
        assert_eq!(hash_file(&path).unwrap(), hash_bytes(b"machine code"));
    }

    #[test]
    fn test_hash_file_not_found() {
        assert!(hash_file(Path::new("/nonexistent/binary")).is_err());
    }

    #[test]
    fn test_sha256_of_url() {
        let digest = sha256_of_url("https://example.com/fw.zip");
        assert_eq!(digest.len(), 64);
        assert!(digest.chars().all(|c| c.is_ascii_hexdigit()));
        assert_eq!(digest, sha256_of_url("https://example.com/fw.zip"));
    }
}

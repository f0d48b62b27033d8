//! Content digests used as asset fingerprints.
//!
//! Both hashers stream input in 8MB chunks and produce lowercase hex.

use crate::config::HashAlgorithm;
use crate::error::{Result, ScoretagError};
use blake3::Hasher as Blake3State;
use sha2::{Digest, Sha256};
use std::io::Read;
use std::path::Path;
use std::sync::Arc;

/// Chunk size for reading files (8MB, optimal for SSDs).
const CHUNK_SIZE: usize = 8 * 1024 * 1024;

/// Deterministic digest of asset bytes.
pub trait Hasher: Send + Sync {
    /// Short algorithm name, e.g. `"blake3"`.
    fn algorithm(&self) -> &'static str;

    /// Hash an in-memory buffer.
    fn hash(&self, bytes: &[u8]) -> Result<String>;

    /// Hash everything a reader yields.
    fn hash_reader(&self, reader: &mut dyn Read) -> Result<String>;

    /// Hash a file on disk.
    fn hash_file(&self, path: &Path) -> Result<String> {
        let mut file = std::fs::File::open(path).map_err(|e| ScoretagError::io_with_path(e, path))?;
        self.hash_reader(&mut file)
    }
}

/// BLAKE3 fingerprints (default).
#[derive(Debug, Clone, Copy, Default)]
pub struct Blake3Hasher;

impl Hasher for Blake3Hasher {
    fn algorithm(&self) -> &'static str {
        "blake3"
    }

    fn hash(&self, bytes: &[u8]) -> Result<String> {
        Ok(blake3::hash(bytes).to_hex().to_string())
    }

    fn hash_reader(&self, reader: &mut dyn Read) -> Result<String> {
        let mut state = Blake3State::new();
        let mut buffer = vec![0u8; CHUNK_SIZE];
        loop {
            let bytes_read = reader.read(&mut buffer)?;
            if bytes_read == 0 {
                break;
            }
            state.update(&buffer[..bytes_read]);
        }
        Ok(state.finalize().to_hex().to_string())
    }
}

/// SHA-256 fingerprints, for stores shared with tools that key on SHA-256.
#[derive(Debug, Clone, Copy, Default)]
pub struct Sha256Hasher;

impl Hasher for Sha256Hasher {
    fn algorithm(&self) -> &'static str {
        "sha256"
    }

    fn hash(&self, bytes: &[u8]) -> Result<String> {
        Ok(hex::encode(Sha256::digest(bytes)))
    }

    fn hash_reader(&self, reader: &mut dyn Read) -> Result<String> {
        let mut state = Sha256::new();
        let mut buffer = vec![0u8; CHUNK_SIZE];
        loop {
            let bytes_read = reader.read(&mut buffer)?;
            if bytes_read == 0 {
                break;
            }
            state.update(&buffer[..bytes_read]);
        }
        Ok(hex::encode(state.finalize()))
    }
}

/// Build the hasher for a configured algorithm.
pub fn hasher_for(algorithm: HashAlgorithm) -> Arc<dyn Hasher> {
    match algorithm {
        HashAlgorithm::Blake3 => Arc::new(Blake3Hasher),
        HashAlgorithm::Sha256 => Arc::new(Sha256Hasher),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_sha256_known_vector() {
        assert_eq!(
            Sha256Hasher.hash(b"hello world").unwrap(),
            "b94d27b9934d3e08a52e52d7da7dabfac484efe37a5380ee9088f7ace2efcde9"
        );
    }

    #[test]
    fn test_blake3_known_vector() {
        assert_eq!(
            Blake3Hasher.hash(b"hello world").unwrap(),
            "d74981efa70a0c880b8d8c1985d075dbcbf679b99a5f9914e5aaf96b831a9e24"
        );
    }

    #[test]
    fn test_file_hash_matches_buffer_hash() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(b"cue bytes").unwrap();
        file.flush().unwrap();

        for hasher in [hasher_for(HashAlgorithm::Blake3), hasher_for(HashAlgorithm::Sha256)] {
            assert_eq!(
                hasher.hash_file(file.path()).unwrap(),
                hasher.hash(b"cue bytes").unwrap()
            );
        }
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let result = Blake3Hasher.hash_file(Path::new("/nonexistent/cue.wav"));
        assert!(matches!(result, Err(ScoretagError::Io { .. })));
    }
}

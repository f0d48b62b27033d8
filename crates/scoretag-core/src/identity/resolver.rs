//! Fingerprint resolution with name fallback.

use super::hashing::{hasher_for, Hasher};
use crate::config::IdentityConfig;
use crate::models::Identity;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, warn};

/// Where an asset's bytes can be read from.
#[derive(Debug, Clone, Default)]
pub enum AssetContent {
    Bytes(Arc<[u8]>),
    Path(PathBuf),
    #[default]
    Unavailable,
}

/// Derives the identity of an asset.
///
/// Returns a fingerprint when hashing is enabled and succeeds, and the
/// display name otherwise. Failures only degrade dedup quality; they are
/// logged and never returned.
#[derive(Clone)]
pub struct FingerprintResolver {
    hasher: Option<Arc<dyn Hasher>>,
}

impl FingerprintResolver {
    pub fn new(hasher: Arc<dyn Hasher>) -> Self {
        Self {
            hasher: Some(hasher),
        }
    }

    /// A resolver that always falls back to names.
    pub fn disabled() -> Self {
        Self { hasher: None }
    }

    pub fn from_config(config: &IdentityConfig) -> Self {
        if config.hash_enabled {
            Self::new(hasher_for(config.algorithm))
        } else {
            Self::disabled()
        }
    }

    /// Resolve from an optional in-memory buffer.
    pub fn resolve(&self, bytes: Option<&[u8]>, name: &str) -> Identity {
        let (Some(hasher), Some(bytes)) = (&self.hasher, bytes) else {
            debug!("Fingerprint skipped for {}, using name identity", name);
            return Identity::Name(name.to_string());
        };

        match hasher.hash(bytes) {
            Ok(fp) => Identity::Fingerprint(fp),
            Err(e) => {
                warn!("Fingerprint failed for {}, falling back to name: {}", name, e);
                Identity::Name(name.to_string())
            }
        }
    }

    /// Resolve from an optional file path, hashing on a blocking thread.
    pub async fn resolve_path(&self, path: Option<&Path>, name: &str) -> Identity {
        let (Some(hasher), Some(path)) = (&self.hasher, path) else {
            debug!("Fingerprint skipped for {}, using name identity", name);
            return Identity::Name(name.to_string());
        };

        let hasher = Arc::clone(hasher);
        let path_buf = path.to_path_buf();
        match tokio::task::spawn_blocking(move || hasher.hash_file(&path_buf)).await {
            Ok(Ok(fp)) => Identity::Fingerprint(fp),
            Ok(Err(e)) => {
                warn!("Fingerprint failed for {}, falling back to name: {}", name, e);
                Identity::Name(name.to_string())
            }
            Err(e) => {
                warn!("Fingerprint task failed for {}, falling back to name: {}", name, e);
                Identity::Name(name.to_string())
            }
        }
    }

    /// Resolve whichever content form the asset carries.
    pub async fn resolve_content(&self, content: &AssetContent, name: &str) -> Identity {
        match content {
            AssetContent::Bytes(bytes) => self.resolve(Some(&bytes[..]), name),
            AssetContent::Path(path) => self.resolve_path(Some(path), name).await,
            AssetContent::Unavailable => self.resolve(None, name),
        }
    }
}

impl std::fmt::Debug for FingerprintResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FingerprintResolver")
            .field("algorithm", &self.hasher.as_ref().map(|h| h.algorithm()))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{Result, ScoretagError};
    use crate::identity::Blake3Hasher;
    use std::io::Read;

    struct BrokenHasher;

    impl Hasher for BrokenHasher {
        fn algorithm(&self) -> &'static str {
            "broken"
        }

        fn hash(&self, _bytes: &[u8]) -> Result<String> {
            Err(ScoretagError::Other("digest unavailable".into()))
        }

        fn hash_reader(&self, _reader: &mut dyn Read) -> Result<String> {
            Err(ScoretagError::Other("digest unavailable".into()))
        }
    }

    #[test]
    fn test_resolve_returns_fingerprint() {
        let resolver = FingerprintResolver::new(Arc::new(Blake3Hasher));
        let identity = resolver.resolve(Some(b"hello world"), "cue.wav");
        assert_eq!(
            identity,
            Identity::Fingerprint(
                "d74981efa70a0c880b8d8c1985d075dbcbf679b99a5f9914e5aaf96b831a9e24".into()
            )
        );
    }

    #[test]
    fn test_skipped_hash_falls_back_to_name() {
        let resolver = FingerprintResolver::disabled();
        assert_eq!(
            resolver.resolve(Some(b"bytes"), "cue.wav"),
            Identity::Name("cue.wav".into())
        );

        let resolver = FingerprintResolver::new(Arc::new(Blake3Hasher));
        assert_eq!(resolver.resolve(None, "cue.wav"), Identity::Name("cue.wav".into()));
    }

    #[test]
    fn test_hash_failure_falls_back_to_name() {
        let resolver = FingerprintResolver::new(Arc::new(BrokenHasher));
        assert_eq!(
            resolver.resolve(Some(b"bytes"), "cue.wav"),
            Identity::Name("cue.wav".into())
        );
    }

    #[tokio::test]
    async fn test_resolve_missing_path_falls_back_to_name() {
        let resolver = FingerprintResolver::new(Arc::new(Blake3Hasher));
        let identity = resolver
            .resolve_path(Some(Path::new("/nonexistent/cue.wav")), "cue.wav")
            .await;
        assert_eq!(identity, Identity::Name("cue.wav".into()));
    }

    #[tokio::test]
    async fn test_resolve_content_bytes_and_path_agree() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let path = temp_dir.path().join("cue.wav");
        std::fs::write(&path, b"same bytes").unwrap();

        let resolver = FingerprintResolver::new(Arc::new(Blake3Hasher));
        let from_bytes = resolver
            .resolve_content(&AssetContent::Bytes(Arc::from(&b"same bytes"[..])), "a")
            .await;
        let from_path = resolver
            .resolve_content(&AssetContent::Path(path), "b")
            .await;
        assert!(from_bytes.is_fingerprint());
        assert_eq!(from_bytes, from_path);
    }
}

//! Asset identity: content fingerprints with name fallback.

mod hashing;
mod resolver;

pub use hashing::{hasher_for, Blake3Hasher, Hasher, Sha256Hasher};
pub use resolver::{AssetContent, FingerprintResolver};

//! Store traits consumed by the cache cascade and the upsert coordinator.

use crate::error::Result;
use crate::models::{AnalysisRecord, CommittedRecord, Identity};
use async_trait::async_trait;

/// Single-process durable store keyed by fingerprint.
#[async_trait]
pub trait LocalStore: Send + Sync {
    /// Get the record cached for a fingerprint.
    async fn get(&self, fingerprint: &str) -> Result<Option<AnalysisRecord>>;

    /// Cache a record under a fingerprint, replacing any previous one.
    async fn put(&self, fingerprint: &str, record: &AnalysisRecord) -> Result<()>;
}

/// Shared store holding the authoritative records.
///
/// `upsert` must be a single conditional insert-or-update keyed by the
/// identity's storage key. Implementations never check for existence and
/// insert in two steps.
#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// Short label used in logs.
    fn label(&self) -> &str;

    async fn get_by_fingerprint(&self, fingerprint: &str) -> Result<Option<AnalysisRecord>>;

    /// Most recently updated record carrying this display name.
    async fn get_by_name(&self, name: &str) -> Result<Option<AnalysisRecord>>;

    /// Atomically insert or update the record for `identity`.
    ///
    /// Constraint failures on anything other than the identity key are
    /// reported as `ScoretagError::CommitConflict` with nothing written.
    async fn upsert(&self, identity: &Identity, record: &AnalysisRecord)
        -> Result<CommittedRecord>;
}

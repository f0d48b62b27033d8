//! Single writer for the shared store.

use crate::error::{Result, ScoretagError};
use crate::models::{AnalysisRecord, CommittedRecord, Identity};
use crate::store::RemoteStore;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// Commits records through the store's atomic upsert.
///
/// Concurrent commits for the same identity all land on one row. Nothing
/// here reads before writing.
pub struct UpsertCoordinator {
    store: Arc<dyn RemoteStore>,
    timeout: Duration,
}

impl UpsertCoordinator {
    pub fn new(store: Arc<dyn RemoteStore>, timeout: Duration) -> Self {
        Self { store, timeout }
    }

    pub async fn commit(&self, identity: &Identity, record: &AnalysisRecord) -> Result<CommittedRecord> {
        let result = match tokio::time::timeout(self.timeout, self.store.upsert(identity, record)).await
        {
            Ok(result) => result,
            Err(_) => Err(ScoretagError::Timeout(self.timeout)),
        };

        match &result {
            Ok(committed) => info!(
                "Committed {} ({}) to {} store as #{}",
                identity,
                record.name,
                self.store.label(),
                committed.store_id
            ),
            Err(e) => warn!("Commit of {} to {} store failed: {}", identity, self.store.label(), e),
        }
        result
    }
}

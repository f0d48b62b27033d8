//! In-process shared store.
//!
//! Useful for embedding the pipeline without a database and for tests. The
//! upsert runs under one lock acquisition, which is the in-memory equivalent
//! of a conditional insert-or-update.

use super::traits::RemoteStore;
use crate::error::{Result, ScoretagError};
use crate::models::{AnalysisRecord, CommittedRecord, Identity};
use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::Mutex;

#[derive(Default)]
struct MemoryState {
    next_id: u64,
    /// storage key → (store id, record)
    records: HashMap<String, (u64, AnalysisRecord)>,
}

/// Shared store backed by a locked map.
#[derive(Default)]
pub struct InMemoryRemoteStore {
    state: Mutex<MemoryState>,
}

impl InMemoryRemoteStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored records.
    pub fn len(&self) -> usize {
        self.state.lock().map(|s| s.records.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Insert a record as if a curator had edited it directly in the store.
    pub fn seed(&self, record: AnalysisRecord) -> Result<()> {
        let mut state = self
            .state
            .lock()
            .map_err(|_| ScoretagError::Other("in-memory store lock poisoned".into()))?;
        state.next_id += 1;
        let id = state.next_id;
        state
            .records
            .insert(record.identity.storage_key(), (id, record));
        Ok(())
    }
}

#[async_trait]
impl RemoteStore for InMemoryRemoteStore {
    fn label(&self) -> &str {
        "in-memory"
    }

    async fn get_by_fingerprint(&self, fingerprint: &str) -> Result<Option<AnalysisRecord>> {
        let key = Identity::Fingerprint(fingerprint.to_string()).storage_key();
        let state = self
            .state
            .lock()
            .map_err(|_| ScoretagError::Other("in-memory store lock poisoned".into()))?;
        Ok(state.records.get(&key).map(|(_, record)| record.clone()))
    }

    async fn get_by_name(&self, name: &str) -> Result<Option<AnalysisRecord>> {
        let state = self
            .state
            .lock()
            .map_err(|_| ScoretagError::Other("in-memory store lock poisoned".into()))?;
        Ok(state
            .records
            .values()
            .filter(|(_, record)| record.name == name)
            .max_by_key(|(id, record)| (record.updated_at, *id))
            .map(|(_, record)| record.clone()))
    }

    async fn upsert(
        &self,
        identity: &Identity,
        record: &AnalysisRecord,
    ) -> Result<CommittedRecord> {
        let mut state = self
            .state
            .lock()
            .map_err(|_| ScoretagError::Other("in-memory store lock poisoned".into()))?;

        let key = identity.storage_key();
        let mut committed = record.clone();
        committed.identity = identity.clone();
        committed.updated_at = Utc::now();

        let id = match state.records.get(&key) {
            Some((id, existing)) => {
                committed.created_at = existing.created_at;
                *id
            }
            None => {
                state.next_id += 1;
                state.next_id
            }
        };
        state.records.insert(key, (id, committed.clone()));

        Ok(CommittedRecord {
            store_id: id.to_string(),
            record: committed,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_upsert_reuses_store_id() {
        let store = InMemoryRemoteStore::new();
        let identity = Identity::Fingerprint("abc123".into());
        let record = AnalysisRecord::new(identity.clone(), "cue.wav");

        let first = store.upsert(&identity, &record).await.unwrap();
        let second = store.upsert(&identity, &record).await.unwrap();

        assert_eq!(first.store_id, second.store_id);
        assert_eq!(store.len(), 1);
        assert!(store.get_by_fingerprint("abc123").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_seeded_record_found_by_name() {
        let store = InMemoryRemoteStore::new();
        store
            .seed(AnalysisRecord::new(
                Identity::Fingerprint("other-device".into()),
                "cue.wav",
            ))
            .unwrap();

        let found = store.get_by_name("cue.wav").await.unwrap().unwrap();
        assert_eq!(found.identity.as_str(), "other-device");
        assert!(store.get_by_fingerprint("abc123").await.unwrap().is_none());
    }
}

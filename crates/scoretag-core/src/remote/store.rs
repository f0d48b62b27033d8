//! Shared store reached over HTTP.
//!
//! Wire format (JSON, camelCase):
//! - `GET {base}/records/by-fingerprint/{fp}` → `AnalysisRecord` | 404
//! - `GET {base}/records/by-name/{name}` → latest `AnalysisRecord` | 404
//! - `PUT {base}/records/{storageKey}` `AnalysisRecord` → `CommittedRecord` | 409
//!
//! The PUT is the server's conditional insert-or-update for that key.

use super::client::HttpClient;
use crate::error::{Result, ScoretagError};
use crate::models::{AnalysisRecord, CommittedRecord, Identity};
use crate::store::RemoteStore;
use async_trait::async_trait;
use tracing::info;

pub struct HttpRemoteStore {
    client: HttpClient,
}

impl HttpRemoteStore {
    pub fn new(base_url: &str) -> Result<Self> {
        Ok(Self {
            client: HttpClient::new("records", base_url)?,
        })
    }
}

#[async_trait]
impl RemoteStore for HttpRemoteStore {
    fn label(&self) -> &str {
        "http"
    }

    async fn get_by_fingerprint(&self, fingerprint: &str) -> Result<Option<AnalysisRecord>> {
        self.client
            .get_json(&["records", "by-fingerprint", fingerprint])
            .await
    }

    async fn get_by_name(&self, name: &str) -> Result<Option<AnalysisRecord>> {
        self.client.get_json(&["records", "by-name", name]).await
    }

    async fn upsert(
        &self,
        identity: &Identity,
        record: &AnalysisRecord,
    ) -> Result<CommittedRecord> {
        let key = identity.storage_key();
        let mut body = record.clone();
        body.identity = identity.clone();

        match self
            .client
            .put_json::<_, CommittedRecord>(&["records", &key], &body)
            .await
        {
            Ok(committed) => {
                info!("Committed {} to shared store as {}", identity, committed.store_id);
                Ok(committed)
            }
            Err(ScoretagError::RemoteStatus {
                status: 409,
                message,
                ..
            }) => Err(ScoretagError::CommitConflict {
                identity: identity.to_string(),
                message,
            }),
            Err(e) => Err(e),
        }
    }
}

//! SQLite-backed local durable store.

use super::traits::LocalStore;
use super::{configure_connection, open_connection, with_connection};
use crate::error::{Result, ScoretagError};
use crate::models::AnalysisRecord;
use async_trait::async_trait;
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tracing::{debug, warn};

/// Local cache of analysis records keyed by fingerprint.
///
/// Thread-safe via an internal mutex on the connection.
pub struct SqliteLocalStore {
    db_path: PathBuf,
    conn: Arc<Mutex<Connection>>,
}

impl SqliteLocalStore {
    /// Create or open a local store at the given path.
    pub fn open(db_path: impl Into<PathBuf>) -> Result<Self> {
        let db_path = db_path.into();
        let conn = open_connection(&db_path)?;
        Self::ensure_schema(&conn)?;

        Ok(Self {
            db_path,
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// In-memory store, used by tests and one-shot runs.
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        configure_connection(&conn)?;
        Self::ensure_schema(&conn)?;
        Ok(Self {
            db_path: PathBuf::from(":memory:"),
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    fn ensure_schema(conn: &Connection) -> Result<()> {
        conn.execute(
            "CREATE TABLE IF NOT EXISTS local_records (
                fingerprint TEXT PRIMARY KEY,
                record_json TEXT NOT NULL,
                cached_at TEXT NOT NULL
            )",
            [],
        )?;
        Ok(())
    }

    pub fn db_path(&self) -> &Path {
        &self.db_path
    }

    /// Number of cached records.
    pub fn count(&self) -> Result<usize> {
        let conn = self.conn.lock().map_err(|_| ScoretagError::lock_poisoned())?;
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM local_records", [], |row| {
            row.get(0)
        })?;
        Ok(count as usize)
    }
}

#[async_trait]
impl LocalStore for SqliteLocalStore {
    async fn get(&self, fingerprint: &str) -> Result<Option<AnalysisRecord>> {
        let key = fingerprint.to_string();
        let json: Option<String> = with_connection(&self.conn, move |conn| {
            let json = conn
                .query_row(
                    "SELECT record_json FROM local_records WHERE fingerprint = ?1",
                    params![key],
                    |row| row.get(0),
                )
                .optional()?;
            Ok(json)
        })
        .await?;

        let Some(json) = json else {
            return Ok(None);
        };

        match serde_json::from_str(&json) {
            Ok(record) => Ok(Some(record)),
            Err(e) => {
                // An unreadable row is a miss; the next commit overwrites it.
                warn!("Discarding unreadable local record {}: {}", fingerprint, e);
                Ok(None)
            }
        }
    }

    async fn put(&self, fingerprint: &str, record: &AnalysisRecord) -> Result<()> {
        let json = serde_json::to_string(record)?;
        let key = fingerprint.to_string();

        with_connection(&self.conn, move |conn| {
            conn.execute(
                "INSERT INTO local_records (fingerprint, record_json, cached_at)
                 VALUES (?1, ?2, ?3)
                 ON CONFLICT(fingerprint) DO UPDATE SET
                     record_json=excluded.record_json,
                     cached_at=excluded.cached_at",
                params![key, json, Utc::now().to_rfc3339()],
            )?;
            Ok(())
        })
        .await?;

        debug!("Cached local record: {}", fingerprint);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Identity;
    use tempfile::TempDir;

    fn create_test_store() -> (SqliteLocalStore, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let store = SqliteLocalStore::open(temp_dir.path().join("local.sqlite")).unwrap();
        (store, temp_dir)
    }

    #[tokio::test]
    async fn test_put_and_get() {
        let (store, _temp) = create_test_store();
        let mut record = AnalysisRecord::new(Identity::Fingerprint("abc123".into()), "cue.wav");
        record
            .standardized_labels
            .insert("scenario".into(), vec!["潜入".into()]);

        store.put("abc123", &record).await.unwrap();

        let loaded = store.get("abc123").await.unwrap().unwrap();
        assert_eq!(loaded, record);
        assert!(store.get("other").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_put_replaces_existing() {
        let (store, _temp) = create_test_store();
        let identity = Identity::Fingerprint("abc123".into());

        store
            .put("abc123", &AnalysisRecord::new(identity.clone(), "old.wav"))
            .await
            .unwrap();
        store
            .put("abc123", &AnalysisRecord::new(identity, "new.wav"))
            .await
            .unwrap();

        assert_eq!(store.count().unwrap(), 1);
        assert_eq!(store.get("abc123").await.unwrap().unwrap().name, "new.wav");
    }

    #[tokio::test]
    async fn test_reopen_keeps_records() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("local.sqlite");
        let record = AnalysisRecord::new(Identity::Fingerprint("abc123".into()), "cue.wav");

        {
            let store = SqliteLocalStore::open(&path).unwrap();
            store.put("abc123", &record).await.unwrap();
        }

        let store = SqliteLocalStore::open(&path).unwrap();
        assert!(store.get("abc123").await.unwrap().is_some());
    }
}

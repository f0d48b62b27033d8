//! SQLite-backed shared record store.
//!
//! Several processes may open the same database file; WAL mode and a busy
//! timeout let them interleave. Every write goes through a single
//! `INSERT … ON CONFLICT(identity_key) DO UPDATE … RETURNING` statement, so
//! concurrent commits for one identity can never produce two rows.

use super::traits::RemoteStore;
use super::{configure_connection, open_connection, with_connection};
use crate::error::{Result, ScoretagError};
use crate::models::{
    AnalysisRecord, CommittedRecord, ConfidenceTier, Identity, ProvenanceInfo, RawLabels,
    StandardizedLabels,
};
use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::types::Type;
use rusqlite::{params, Connection, ErrorCode, OptionalExtension, Row};
use serde::de::DeserializeOwned;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tracing::{debug, warn};

const SELECT_COLUMNS: &str = "identity_key, name, raw_labels_json, standardized_labels_json,
                              provenance_json, confidence_tier, created_at, updated_at";

/// Shared store of analysis records.
pub struct SqliteSharedStore {
    db_path: PathBuf,
    conn: Arc<Mutex<Connection>>,
}

impl SqliteSharedStore {
    /// Create or open a shared store at the given path.
    pub fn open(db_path: impl Into<PathBuf>) -> Result<Self> {
        let db_path = db_path.into();
        let conn = open_connection(&db_path)?;
        Self::ensure_schema(&conn)?;

        Ok(Self {
            db_path,
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// In-memory store, used by tests.
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
            "CREATE TABLE IF NOT EXISTS analysis_records (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                identity_key TEXT NOT NULL UNIQUE,
                fingerprint TEXT UNIQUE,
                name TEXT NOT NULL,
                raw_labels_json TEXT NOT NULL,
                standardized_labels_json TEXT NOT NULL,
                provenance_json TEXT NOT NULL,
                confidence_tier TEXT NOT NULL
                    CHECK (confidence_tier IN ('high', 'medium', 'low')),
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            )",
            [],
        )?;

        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_records_name
                ON analysis_records(name, updated_at)",
            [],
        )?;

        Ok(())
    }

    pub fn db_path(&self) -> &Path {
        &self.db_path
    }

    /// Number of stored records.
    pub fn count(&self) -> Result<usize> {
        let conn = self.conn.lock().map_err(|_| ScoretagError::lock_poisoned())?;
        let count: i64 =
            conn.query_row("SELECT COUNT(*) FROM analysis_records", [], |row| row.get(0))?;
        Ok(count as usize)
    }

    /// Get a record by its exact identity.
    pub fn get_by_identity(&self, identity: &Identity) -> Result<Option<AnalysisRecord>> {
        let conn = self.conn.lock().map_err(|_| ScoretagError::lock_poisoned())?;
        Self::query_one(
            &conn,
            &format!(
                "SELECT {} FROM analysis_records WHERE identity_key = ?1",
                SELECT_COLUMNS
            ),
            &identity.storage_key(),
        )
    }

    /// Decode a row. Unreadable columns are an error, never a blank record,
    /// so the cache counts a corrupt row as a miss.
    fn row_to_record(row: &Row) -> rusqlite::Result<AnalysisRecord> {
        let identity_key: String = row.get(0)?;
        let name: String = row.get(1)?;
        let raw_labels: RawLabels = json_column(row, 2)?;
        let standardized_labels: StandardizedLabels = json_column(row, 3)?;
        let provenance: ProvenanceInfo = json_column(row, 4)?;
        let tier: String = row.get(5)?;

        let identity = Identity::from_storage_key(&identity_key).unwrap_or_else(|| {
            warn!("Unrecognized identity key {}, treating as name", identity_key);
            Identity::Name(identity_key.clone())
        });

        Ok(AnalysisRecord {
            identity,
            name,
            raw_labels,
            standardized_labels,
            provenance,
            confidence_tier: tier.parse().unwrap_or(ConfidenceTier::Low),
            created_at: timestamp_column(row, 6)?,
            updated_at: timestamp_column(row, 7)?,
        })
    }

    fn query_one(conn: &Connection, sql: &str, value: &str) -> Result<Option<AnalysisRecord>> {
        let record = conn
            .query_row(sql, params![value], Self::row_to_record)
            .optional()?;
        Ok(record)
    }

    /// Run the single conditional upsert statement.
    fn upsert_sync(
        conn: &Connection,
        identity: &Identity,
        record: &AnalysisRecord,
    ) -> Result<CommittedRecord> {
        let raw_labels_json = serde_json::to_string(&record.raw_labels)?;
        let standardized_json = serde_json::to_string(&record.standardized_labels)?;
        let provenance_json = serde_json::to_string(&record.provenance)?;
        let now = Utc::now();

        let result = conn.query_row(
            "INSERT INTO analysis_records (identity_key, fingerprint, name, raw_labels_json,
                                           standardized_labels_json, provenance_json,
                                           confidence_tier, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
             ON CONFLICT(identity_key) DO UPDATE SET
                 name=excluded.name,
                 raw_labels_json=excluded.raw_labels_json,
                 standardized_labels_json=excluded.standardized_labels_json,
                 provenance_json=excluded.provenance_json,
                 confidence_tier=excluded.confidence_tier,
                 updated_at=excluded.updated_at
             RETURNING id, created_at",
            params![
                identity.storage_key(),
                identity.fingerprint(),
                record.name,
                raw_labels_json,
                standardized_json,
                provenance_json,
                record.confidence_tier.as_str(),
                format_timestamp(&record.created_at),
                format_timestamp(&now),
            ],
            |row| Ok((row.get::<_, i64>(0)?, row.get::<_, String>(1)?)),
        );

        let (id, created_at) = match result {
            Ok(row) => row,
            Err(rusqlite::Error::SqliteFailure(err, message))
                if err.code == ErrorCode::ConstraintViolation =>
            {
                return Err(ScoretagError::CommitConflict {
                    identity: identity.to_string(),
                    message: message.unwrap_or_else(|| err.to_string()),
                });
            }
            Err(e) => return Err(e.into()),
        };

        debug!("Upserted record {} as row {}", identity, id);

        let mut committed = record.clone();
        committed.identity = identity.clone();
        committed.created_at = parse_timestamp(&created_at).unwrap_or(record.created_at);
        committed.updated_at = now;

        Ok(CommittedRecord {
            store_id: id.to_string(),
            record: committed,
        })
    }
}

/// Fixed-width timestamps so `ORDER BY updated_at` sorts chronologically.
fn format_timestamp(value: &DateTime<Utc>) -> String {
    value.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_timestamp(value: &str) -> std::result::Result<DateTime<Utc>, chrono::ParseError> {
    DateTime::parse_from_rfc3339(value).map(|dt| dt.with_timezone(&Utc))
}

fn timestamp_column(row: &Row, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let value: String = row.get(idx)?;
    parse_timestamp(&value)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

fn json_column<T: DeserializeOwned>(row: &Row, idx: usize) -> rusqlite::Result<T> {
    let value: String = row.get(idx)?;
    serde_json::from_str(&value)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

#[async_trait]
impl RemoteStore for SqliteSharedStore {
    fn label(&self) -> &str {
        "sqlite-shared"
    }

    async fn get_by_fingerprint(&self, fingerprint: &str) -> Result<Option<AnalysisRecord>> {
        let sql = format!(
            "SELECT {} FROM analysis_records WHERE fingerprint = ?1",
            SELECT_COLUMNS
        );
        let fingerprint = fingerprint.to_string();
        with_connection(&self.conn, move |conn| {
            Self::query_one(conn, &sql, &fingerprint)
        })
        .await
    }

    async fn get_by_name(&self, name: &str) -> Result<Option<AnalysisRecord>> {
        let sql = format!(
            "SELECT {} FROM analysis_records WHERE name = ?1
             ORDER BY updated_at DESC, id DESC LIMIT 1",
            SELECT_COLUMNS
        );
        let name = name.to_string();
        with_connection(&self.conn, move |conn| Self::query_one(conn, &sql, &name)).await
    }

    async fn upsert(
        &self,
        identity: &Identity,
        record: &AnalysisRecord,
    ) -> Result<CommittedRecord> {
        let identity = identity.clone();
        let record = record.clone();
        with_connection(&self.conn, move |conn| {
            Self::upsert_sync(conn, &identity, &record)
        })
        .await
    }
}

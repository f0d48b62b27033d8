//! Human review queue for unresolved labels.
//!
//! Candidates are keyed by `(category, term)`. Submitting the same pair again
//! merges suggestions into the existing row instead of adding a duplicate, so
//! re-running generation for the same input is harmless. Review status is
//! owned by the external approval workflow and never reset here.

use crate::error::{Result, ScoretagError};
use crate::models::{CandidateStatus, CandidateTerm};
use crate::store::{open_connection, with_connection};
use async_trait::async_trait;
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tracing::debug;

/// Labels that carry no information and must never become candidates.
const PLACEHOLDER_LABELS: &[&str] = &[
    "unknown", "none", "null", "nil", "n/a", "na", "tbd", "other", "misc", "-", "?", "无", "未知",
    "暂无", "不明", "其他", "其它", "空",
];

/// Whether an unresolved label is worth a reviewer's time.
pub fn is_plausible_candidate(label: &str, max_chars: usize) -> bool {
    let label = label.trim();
    if label.is_empty() || label.chars().count() > max_chars {
        return false;
    }
    let folded = label.to_lowercase();
    if PLACEHOLDER_LABELS.contains(&folded.as_str()) {
        return false;
    }
    // Purely numeric or punctuation labels are classifier noise.
    label.chars().any(char::is_alphabetic)
}

fn merge_into(existing: &mut CandidateTerm, incoming: CandidateTerm) {
    existing.suggested_aliases.extend(incoming.suggested_aliases);
    existing.suggested_contexts.extend(incoming.suggested_contexts);
    if incoming.confidence > existing.confidence {
        existing.confidence = incoming.confidence;
    }
}

/// Destination for review candidates.
#[async_trait]
pub trait CandidateSink: Send + Sync {
    /// Record a candidate, merging with any existing `(category, term)` entry.
    async fn submit(&self, candidate: CandidateTerm) -> Result<()>;
}

/// SQLite-backed review queue.
pub struct SqliteCandidateQueue {
    db_path: PathBuf,
    conn: Arc<Mutex<Connection>>,
}

impl SqliteCandidateQueue {
    pub fn open(db_path: impl AsRef<Path>) -> Result<Self> {
        let db_path = db_path.as_ref().to_path_buf();
        let conn = open_connection(&db_path)?;
        let queue = Self {
            db_path,
            conn: Arc::new(Mutex::new(conn)),
        };
        queue.initialize_schema()?;
        Ok(queue)
    }

    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let queue = Self {
            db_path: PathBuf::from(":memory:"),
            conn: Arc::new(Mutex::new(conn)),
        };
        queue.initialize_schema()?;
        Ok(queue)
    }

    pub fn db_path(&self) -> &Path {
        &self.db_path
    }

    fn initialize_schema(&self) -> Result<()> {
        let conn = self.conn.lock().map_err(|_| ScoretagError::lock_poisoned())?;
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS review_candidates (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                category TEXT NOT NULL,
                term TEXT NOT NULL,
                suggested_aliases TEXT NOT NULL DEFAULT '[]',
                suggested_contexts TEXT NOT NULL DEFAULT '[]',
                confidence REAL NOT NULL,
                status TEXT NOT NULL DEFAULT 'pendingReview',
                occurrences INTEGER NOT NULL DEFAULT 1,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL,
                UNIQUE(category, term)
            );
            CREATE INDEX IF NOT EXISTS idx_review_candidates_status
                ON review_candidates(status);",
        )?;
        Ok(())
    }

    fn submit_sync(conn: &mut Connection, mut candidate: CandidateTerm) -> Result<()> {
        candidate.term = candidate.term.trim().to_string();
        let tx = conn.transaction()?;
        let now = Utc::now().to_rfc3339();

        let existing = tx
            .query_row(
                "SELECT suggested_aliases, suggested_contexts, confidence, status
                 FROM review_candidates WHERE category = ?1 AND term = ?2",
                params![candidate.category, candidate.term],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, f64>(2)?,
                        row.get::<_, String>(3)?,
                    ))
                },
            )
            .optional()?;

        match existing {
            Some((aliases, contexts, confidence, status)) => {
                let mut merged = CandidateTerm {
                    term: candidate.term.clone(),
                    category: candidate.category.clone(),
                    suggested_aliases: serde_json::from_str(&aliases).unwrap_or_default(),
                    suggested_contexts: serde_json::from_str(&contexts).unwrap_or_default(),
                    confidence,
                    status: status.parse().unwrap_or_default(),
                };
                merge_into(&mut merged, candidate);
                tx.execute(
                    "UPDATE review_candidates
                     SET suggested_aliases = ?3, suggested_contexts = ?4, confidence = ?5,
                         occurrences = occurrences + 1, updated_at = ?6
                     WHERE category = ?1 AND term = ?2",
                    params![
                        merged.category,
                        merged.term,
                        serde_json::to_string(&merged.suggested_aliases)?,
                        serde_json::to_string(&merged.suggested_contexts)?,
                        merged.confidence,
                        now,
                    ],
                )?;
                debug!(
                    "Merged review candidate {}/{} ({})",
                    merged.category,
                    merged.term,
                    merged.status.as_str()
                );
            }
            None => {
                tx.execute(
                    "INSERT INTO review_candidates
                     (category, term, suggested_aliases, suggested_contexts, confidence,
                      status, created_at, updated_at)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?7)",
                    params![
                        candidate.category,
                        candidate.term,
                        serde_json::to_string(&candidate.suggested_aliases)?,
                        serde_json::to_string(&candidate.suggested_contexts)?,
                        candidate.confidence,
                        CandidateStatus::PendingReview.as_str(),
                        now,
                    ],
                )?;
                debug!(
                    "Queued review candidate {}/{}",
                    candidate.category, candidate.term
                );
            }
        }

        tx.commit()?;
        Ok(())
    }

    /// Candidates with the given status, most frequently seen first.
    pub fn list(&self, status: CandidateStatus) -> Result<Vec<CandidateTerm>> {
        let conn = self.conn.lock().map_err(|_| ScoretagError::lock_poisoned())?;
        let mut stmt = conn.prepare(
            "SELECT category, term, suggested_aliases, suggested_contexts, confidence, status
             FROM review_candidates WHERE status = ?1
             ORDER BY occurrences DESC, category, term",
        )?;
        let rows = stmt.query_map(params![status.as_str()], |row| {
            let aliases: String = row.get(2)?;
            let contexts: String = row.get(3)?;
            let status: String = row.get(5)?;
            Ok(CandidateTerm {
                category: row.get(0)?,
                term: row.get(1)?,
                suggested_aliases: serde_json::from_str(&aliases).unwrap_or_default(),
                suggested_contexts: serde_json::from_str(&contexts).unwrap_or_default(),
                confidence: row.get(4)?,
                status: status.parse().unwrap_or_default(),
            })
        })?;
        Ok(rows.collect::<std::result::Result<Vec<_>, _>>()?)
    }

    pub fn list_pending(&self) -> Result<Vec<CandidateTerm>> {
        self.list(CandidateStatus::PendingReview)
    }

    /// How many times a candidate has been submitted.
    pub fn occurrences(&self, category: &str, term: &str) -> Result<u64> {
        let conn = self.conn.lock().map_err(|_| ScoretagError::lock_poisoned())?;
        let count: Option<i64> = conn
            .query_row(
                "SELECT occurrences FROM review_candidates WHERE category = ?1 AND term = ?2",
                params![category, term.trim()],
                |row| row.get(0),
            )
            .optional()?;
        Ok(count.unwrap_or(0) as u64)
    }

    pub fn count(&self) -> Result<usize> {
        let conn = self.conn.lock().map_err(|_| ScoretagError::lock_poisoned())?;
        let count: i64 =
            conn.query_row("SELECT COUNT(*) FROM review_candidates", [], |row| row.get(0))?;
        Ok(count as usize)
    }
}

#[async_trait]
impl CandidateSink for SqliteCandidateQueue {
    async fn submit(&self, candidate: CandidateTerm) -> Result<()> {
        with_connection(&self.conn, move |conn| Self::submit_sync(conn, candidate)).await
    }
}

/// Review queue held in memory.
#[derive(Default)]
pub struct InMemoryCandidateQueue {
    candidates: Mutex<BTreeMap<(String, String), CandidateTerm>>,
}

impl InMemoryCandidateQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.candidates.lock().map(|c| c.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn get(&self, category: &str, term: &str) -> Option<CandidateTerm> {
        self.candidates
            .lock()
            .ok()?
            .get(&(category.to_string(), term.trim().to_string()))
            .cloned()
    }

    /// Every candidate, ordered by `(category, term)`.
    pub fn all(&self) -> Vec<CandidateTerm> {
        self.candidates
            .lock()
            .map(|c| c.values().cloned().collect())
            .unwrap_or_default()
    }
}

#[async_trait]
impl CandidateSink for InMemoryCandidateQueue {
    async fn submit(&self, mut candidate: CandidateTerm) -> Result<()> {
        candidate.term = candidate.term.trim().to_string();
        let mut candidates = self
            .candidates
            .lock()
            .map_err(|_| ScoretagError::lock_poisoned())?;
        let key = (candidate.category.clone(), candidate.term.clone());
        match candidates.get_mut(&key) {
            Some(existing) => merge_into(existing, candidate),
            None => {
                candidates.insert(key, candidate);
            }
        }
        Ok(())
    }
}

/// Build a pending candidate.
pub(crate) fn pending_candidate(
    term: &str,
    category: &str,
    aliases: BTreeSet<String>,
    contexts: BTreeSet<String>,
    confidence: f64,
) -> CandidateTerm {
    CandidateTerm {
        term: term.trim().to_string(),
        category: category.to_string(),
        suggested_aliases: aliases,
        suggested_contexts: contexts,
        confidence,
        status: CandidateStatus::PendingReview,
    }
}

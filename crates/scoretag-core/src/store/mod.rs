//! Record stores.
//!
//! - [`SqliteLocalStore`]: single-process durable cache keyed by fingerprint
//! - [`SqliteSharedStore`]: shared authoritative store with atomic upsert
//! - [`InMemoryRemoteStore`]: shared store for embedding and tests
//!
//! The HTTP-backed shared store lives in [`crate::remote`].

mod memory;
mod sqlite_local;
mod sqlite_shared;
mod traits;

pub use memory::InMemoryRemoteStore;
pub use sqlite_local::SqliteLocalStore;
pub use sqlite_shared::SqliteSharedStore;
pub use traits::{LocalStore, RemoteStore};

use crate::config::StoreConfig;
use crate::error::{Result, ScoretagError};
use rusqlite::Connection;
use std::path::Path;
use std::sync::{Arc, Mutex};

/// Open a database file, creating its parent directory if needed.
pub(crate) fn open_connection(db_path: &Path) -> Result<Connection> {
    if let Some(parent) = db_path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            std::fs::create_dir_all(parent).map_err(|e| ScoretagError::Io {
                message: format!("Failed to create directory {}", parent.display()),
                path: Some(parent.to_path_buf()),
                source: Some(e),
            })?;
        }
    }

    let conn = Connection::open(db_path)?;
    configure_connection(&conn)?;
    Ok(conn)
}

/// Configure connection with WAL and a busy timeout for cross-process access.
pub(crate) fn configure_connection(conn: &Connection) -> Result<()> {
    conn.execute_batch(&format!(
        "PRAGMA journal_mode=WAL;
         PRAGMA busy_timeout={};
         PRAGMA synchronous=NORMAL;",
        StoreConfig::BUSY_TIMEOUT_MS
    ))?;
    Ok(())
}

/// Run SQLite work on the blocking pool.
///
/// The connection lock and every rusqlite call happen off the async
/// workers, so a caller's timeout can fire while the database is busy.
pub(crate) async fn with_connection<T, F>(conn: &Arc<Mutex<Connection>>, work: F) -> Result<T>
where
    F: FnOnce(&mut Connection) -> Result<T> + Send + 'static,
    T: Send + 'static,
{
    let conn = Arc::clone(conn);
    tokio::task::spawn_blocking(move || {
        let mut conn = conn.lock().map_err(|_| ScoretagError::lock_poisoned())?;
        work(&mut conn)
    })
    .await
    .map_err(|e| ScoretagError::Other(format!("Database task failed: {}", e)))?
}

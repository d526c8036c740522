/// SQLite-backed durable session store.
///
/// Uses `rusqlite` to persist flat key/value rows in a `kv_entries` table.
/// Each row carries a version counter so concurrent writers (the widget and
/// the admin panel) can detect each other instead of silently overwriting.
use std::path::Path;
use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use rusqlite::{params, Connection, ErrorCode, OptionalExtension, TransactionBehavior};
use tokio::sync::Mutex;
use tracing::{debug, info};

use concierge_core::{ConciergeError, Result};

use crate::store::{check_expect, Expect, KeyValueStore, Versioned};

const SCHEMA: &str = "CREATE TABLE IF NOT EXISTS kv_entries (
         key         TEXT PRIMARY KEY,
         value       TEXT NOT NULL,
         version     INTEGER NOT NULL,
         updated_at  INTEGER NOT NULL
     );";

/// How long a connection waits on another connection's write lock.
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

pub struct SqliteStore {
    conn: Mutex<Connection>,
}

fn storage_err(e: rusqlite::Error) -> ConciergeError {
    match e.sqlite_error_code() {
        Some(ErrorCode::DatabaseBusy | ErrorCode::DatabaseLocked) => {
            ConciergeError::StoreBusy(e.to_string())
        }
        _ => ConciergeError::Storage(e.to_string()),
    }
}

impl SqliteStore {
    /// Create or open a database at the given path.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let conn = Connection::open(path.as_ref())
            .context("Failed to open SQLite session database")?;

        conn.busy_timeout(BUSY_TIMEOUT)
            .context("Failed to set busy timeout")?;
        conn.execute_batch("PRAGMA journal_mode=WAL;")
            .context("Failed to enable WAL mode")?;
        conn.execute_batch(SCHEMA)
            .context("Failed to initialize kv_entries schema")?;

        info!("SqliteStore opened at {:?}", path.as_ref());
        Ok(Self { conn: Mutex::new(conn) })
    }

    /// Open an in-memory database (for tests).
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(storage_err)?;
        conn.execute_batch(SCHEMA).map_err(storage_err)?;
        Ok(Self { conn: Mutex::new(conn) })
    }
}

#[async_trait]
impl KeyValueStore for SqliteStore {
    async fn get(&self, key: &str) -> Result<Option<Versioned>> {
        let conn = self.conn.lock().await;
        conn.query_row(
            "SELECT value, version FROM kv_entries WHERE key = ?1",
            params![key],
            |row| {
                Ok(Versioned {
                    value: row.get(0)?,
                    version: row.get::<_, i64>(1)? as u64,
                })
            },
        )
        .optional()
        .map_err(storage_err)
    }

    async fn put(&self, key: &str, value: String, expect: Expect) -> Result<u64> {
        let mut conn = self.conn.lock().await;
        // Take the write lock up front so the version read and the write
        // cannot interleave with another connection.
        let tx = conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .map_err(storage_err)?;

        let current: u64 = tx
            .query_row(
                "SELECT version FROM kv_entries WHERE key = ?1",
                params![key],
                |row| row.get::<_, i64>(0),
            )
            .optional()
            .map_err(storage_err)?
            .map(|v| v as u64)
            .unwrap_or(0);
        check_expect(key, expect, current)?;

        let version = current + 1;
        tx.execute(
            "INSERT OR REPLACE INTO kv_entries (key, value, version, updated_at)
             VALUES (?1, ?2, ?3, ?4)",
            params![key, value, version as i64, chrono::Utc::now().timestamp_millis()],
        )
        .map_err(storage_err)?;
        tx.commit().map_err(storage_err)?;

        debug!(key = %key, version, "Stored entry");
        Ok(version)
    }

    async fn keys_with_prefix(&self, prefix: &str) -> Result<Vec<String>> {
        let conn = self.conn.lock().await;
        let mut stmt = conn
            .prepare(
                "SELECT key FROM kv_entries
                 WHERE substr(key, 1, length(?1)) = ?1
                 ORDER BY key ASC",
            )
            .map_err(storage_err)?;

        let keys = stmt
            .query_map(params![prefix], |row| row.get::<_, String>(0))
            .map_err(storage_err)?
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(storage_err)?;
        Ok(keys)
    }
}

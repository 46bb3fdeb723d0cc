//! SQLite Seen Store
//!
//! Durable tier of the dedup store. One row per listing id in
//! `seen_listings`; rows older than the retention window are swept by
//! `cleanup_before`.

use std::path::Path;

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};

use crate::ports::seen_store::{SeenStore, StoreError, StoreStats};

/// Same layout as SQLite's CURRENT_TIMESTAMP, always UTC
const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS seen_listings (
    id          TEXT PRIMARY KEY,
    notified    BOOLEAN DEFAULT 0,
    created_at  TIMESTAMP DEFAULT CURRENT_TIMESTAMP
);
CREATE INDEX IF NOT EXISTS idx_seen_listings_created_at ON seen_listings(created_at);
"#;

/// rusqlite-backed `SeenStore`
#[derive(Debug)]
pub struct SqliteSeenStore {
    conn: Connection,
    path: String,
}

impl SqliteSeenStore {
    /// Open (or create) the database file, creating parent directories
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, StoreError> {
        let path = path.as_ref();
        let display = path.display().to_string();
        let open_err = |reason: String| StoreError::Open {
            path: display.clone(),
            reason,
        };

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| open_err(e.to_string()))?;
            }
        }

        let conn = Connection::open(path).map_err(|e| open_err(e.to_string()))?;
        Self::init(conn, display)
    }

    /// Private in-memory database
    pub fn open_in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory().map_err(|e| StoreError::Open {
            path: ":memory:".to_string(),
            reason: e.to_string(),
        })?;
        Self::init(conn, ":memory:".to_string())
    }

    fn init(conn: Connection, path: String) -> Result<Self, StoreError> {
        conn.execute_batch(SCHEMA).map_err(|e| StoreError::Open {
            path: path.clone(),
            reason: format!("schema: {}", e),
        })?;
        tracing::debug!("Seen store ready at {}", path);
        Ok(Self { conn, path })
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    /// Insert a row with an explicit creation time
    pub fn insert_with_timestamp(
        &mut self,
        id: &str,
        notified: bool,
        created_at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        self.conn
            .execute(
                "INSERT OR REPLACE INTO seen_listings (id, notified, created_at) VALUES (?1, ?2, ?3)",
                params![id, notified, format_timestamp(created_at)],
            )
            .map_err(|e| StoreError::Write(e.to_string()))?;
        Ok(())
    }
}

fn format_timestamp(ts: DateTime<Utc>) -> String {
    ts.format(TIMESTAMP_FORMAT).to_string()
}

impl SeenStore for SqliteSeenStore {
    fn is_seen(&self, id: &str) -> Result<bool, StoreError> {
        let mut stmt = self
            .conn
            .prepare_cached("SELECT 1 FROM seen_listings WHERE id = ?1")
            .map_err(|e| StoreError::Query(e.to_string()))?;
        stmt.exists(params![id])
            .map_err(|e| StoreError::Query(e.to_string()))
    }

    fn is_notified(&self, id: &str) -> Result<bool, StoreError> {
        let notified: Option<bool> = self
            .conn
            .query_row(
                "SELECT notified FROM seen_listings WHERE id = ?1",
                params![id],
                |row| row.get(0),
            )
            .optional()
            .map_err(|e| StoreError::Query(e.to_string()))?;
        Ok(notified.unwrap_or(false))
    }

    fn mark_seen(&mut self, id: &str) -> Result<(), StoreError> {
        self.conn
            .execute(
                "INSERT OR IGNORE INTO seen_listings (id, notified, created_at) VALUES (?1, 0, ?2)",
                params![id, format_timestamp(Utc::now())],
            )
            .map_err(|e| StoreError::Write(e.to_string()))?;
        Ok(())
    }

    fn mark_notified(&mut self, id: &str) -> Result<bool, StoreError> {
        let changed = self
            .conn
            .execute(
                "INSERT INTO seen_listings (id, notified, created_at) VALUES (?1, 1, ?2)
                 ON CONFLICT(id) DO UPDATE SET notified = 1 WHERE notified = 0",
                params![id, format_timestamp(Utc::now())],
            )
            .map_err(|e| StoreError::Write(e.to_string()))?;
        Ok(changed > 0)
    }

    fn cleanup_before(&mut self, cutoff: DateTime<Utc>) -> Result<usize, StoreError> {
        let deleted = self
            .conn
            .execute(
                "DELETE FROM seen_listings WHERE created_at < ?1",
                params![format_timestamp(cutoff)],
            )
            .map_err(|e| StoreError::Write(e.to_string()))?;
        Ok(deleted)
    }

    fn stats(&self) -> Result<StoreStats, StoreError> {
        self.conn
            .query_row(
                "SELECT COUNT(*), COALESCE(SUM(CASE WHEN notified THEN 1 ELSE 0 END), 0)
                 FROM seen_listings",
                [],
                |row| {
                    Ok(StoreStats {
                        total: row.get::<_, i64>(0)? as u64,
                        notified: row.get::<_, i64>(1)? as u64,
                    })
                },
            )
            .map_err(|e| StoreError::Query(e.to_string()))
    }
}

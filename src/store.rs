//! Persistent State Store
//!
//! Key/value watermark storage plus the append-only interaction log, backed
//! by SQLite. Every operation opens its own connection under one
//! process-wide lock and closes it before returning, so no connection is
//! ever held across an await point.

use crate::mention::InteractionRecord;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// State key holding the highest processed mention id
pub const MENTIONS_SINCE_ID: &str = "mentions_since_id";

/// Error types for store operations
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid stored value for {key}: {value}")]
    InvalidValue { key: String, value: String },
}

/// Persistence operations consumed by the mention pipeline
pub trait Store: Send + Sync {
    /// Read a scalar state value
    fn get_state(&self, key: &str) -> Result<Option<String>, StoreError>;

    /// Insert or overwrite a scalar state value
    fn set_state(&self, key: &str, value: &str) -> Result<(), StoreError>;

    /// Append an interaction record
    fn log_interaction(&self, record: &InteractionRecord) -> Result<(), StoreError>;
}

/// SQLite-backed store
pub struct SqliteStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl SqliteStore {
    /// Open or create the database and its schema
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let store = Self {
            path: path.to_path_buf(),
            lock: Mutex::new(()),
        };
        store.init_schema()?;

        info!("State store opened: {}", path.display());
        Ok(store)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn init_schema(&self) -> Result<(), StoreError> {
        self.with_conn(|conn| {
            conn.execute_batch(
                r#"
                CREATE TABLE IF NOT EXISTS state (
                    key TEXT PRIMARY KEY,
                    value TEXT
                );

                CREATE TABLE IF NOT EXISTS interactions (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    user_id TEXT,
                    username TEXT,
                    tweet_id TEXT,
                    interaction_type TEXT,
                    our_response TEXT,
                    sentiment REAL,
                    created_at TIMESTAMP
                );

                CREATE INDEX IF NOT EXISTS idx_interactions_created_at
                    ON interactions(created_at);
                "#,
            )?;
            Ok(())
        })
    }

    /// Run `f` on a fresh connection inside the global critical section.
    /// The connection is committed (autocommit) and dropped on every path.
    fn with_conn<T>(
        &self,
        f: impl FnOnce(&Connection) -> Result<T, StoreError>,
    ) -> Result<T, StoreError> {
        let _guard = self.lock.lock();
        let conn = Connection::open(&self.path)?;
        let result = f(&conn);
        match conn.close() {
            Ok(()) => result,
            Err((_, e)) => result.and(Err(StoreError::Sqlite(e))),
        }
    }

    /// Most recent interactions, newest first
    pub fn recent_interactions(&self, limit: usize) -> Result<Vec<InteractionRecord>, StoreError> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT user_id, username, tweet_id, interaction_type, our_response, sentiment, created_at
                 FROM interactions
                 ORDER BY id DESC
                 LIMIT ?1",
            )?;

            let rows = stmt
                .query_map(params![limit as i64], |row| {
                    Ok(InteractionRecord {
                        user_id: row.get(0)?,
                        username: row.get(1)?,
                        tweet_id: row.get(2)?,
                        interaction_type: row.get(3)?,
                        our_response: row.get(4)?,
                        sentiment: row.get(5)?,
                        created_at: row.get::<_, DateTime<Utc>>(6)?,
                    })
                })?
                .collect::<Result<Vec<_>, _>>()?;

            Ok(rows)
        })
    }

    /// Total number of logged interactions
    pub fn interaction_count(&self) -> Result<usize, StoreError> {
        self.with_conn(|conn| {
            let count: i64 =
                conn.query_row("SELECT COUNT(*) FROM interactions", [], |row| row.get(0))?;
            Ok(count as usize)
        })
    }
}

impl Store for SqliteStore {
    fn get_state(&self, key: &str) -> Result<Option<String>, StoreError> {
        self.with_conn(|conn| {
            let value = conn
                .query_row(
                    "SELECT value FROM state WHERE key = ?1",
                    params![key],
                    |row| row.get::<_, Option<String>>(0),
                )
                .optional()?
                .flatten();
            Ok(value)
        })
    }

    fn set_state(&self, key: &str, value: &str) -> Result<(), StoreError> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO state (key, value) VALUES (?1, ?2)
                 ON CONFLICT(key) DO UPDATE SET value = excluded.value",
                params![key, value],
            )?;
            debug!("State {} = {}", key, value);
            Ok(())
        })
    }

    fn log_interaction(&self, record: &InteractionRecord) -> Result<(), StoreError> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO interactions
                    (user_id, username, tweet_id, interaction_type, our_response, sentiment, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    record.user_id,
                    record.username,
                    record.tweet_id,
                    record.interaction_type,
                    record.our_response,
                    record.sentiment,
                    record.created_at,
                ],
            )?;
            Ok(())
        })
    }
}

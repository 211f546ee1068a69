//! Per-source progress records
//!
//! A checkpoint is the only state that survives a restart. Its two
//! boundaries encode which phase a source is in:
//!
//! - `first_event_time`: oldest boundary reached by the backward backfill
//!   walk; only ever decreases
//! - `last_event_time`: newest boundary fully flushed by catch-up; only ever
//!   increases, and once set the source never backfills again
//! - `backfill_ceiling`: upper end of the backfill range, fixed by the first
//!   backfill tick and carried across resumed ticks so catch-up starts there

use crate::error::{IngestError, Result};
use async_trait::async_trait;
use auditsync_common::EpochMillis;
use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::{Arc, Mutex};

/// Persisted progress for one source
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Checkpoint {
    /// Source name
    pub key: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub first_event_time: Option<EpochMillis>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_event_time: Option<EpochMillis>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub backfill_ceiling: Option<EpochMillis>,
}

/// Ingestion phase derived from a checkpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Walking backward toward the configured start time
    Backfilling {
        first_event_time: Option<EpochMillis>,
    },
    /// Walking forward from the last flushed boundary
    CatchingUp { last_event_time: EpochMillis },
}

impl Checkpoint {
    /// Empty checkpoint for a source that has never run
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            first_event_time: None,
            last_event_time: None,
            backfill_ceiling: None,
        }
    }

    pub fn phase(&self) -> Phase {
        match self.last_event_time {
            Some(last_event_time) => Phase::CatchingUp { last_event_time },
            None => Phase::Backfilling {
                first_event_time: self.first_event_time,
            },
        }
    }
}

/// Checkpoint storage contract
///
/// `get` distinguishes "never written" (`Ok(None)`) from a stored checkpoint
/// whose fields are empty. `upsert` updates the row for `checkpoint.key` or
/// inserts it.
#[async_trait]
pub trait CheckpointStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<Checkpoint>>;

    async fn upsert(&self, checkpoint: &Checkpoint) -> Result<()>;
}

/// SQLite-backed checkpoint store
pub struct SqliteCheckpointStore {
    db: Arc<Mutex<Connection>>,
}

impl SqliteCheckpointStore {
    /// Open (or create) the store at `db_path`
    pub fn open(db_path: impl AsRef<Path>) -> Result<Self> {
        let db_path = db_path.as_ref();
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(db_path).map_err(|e| {
            IngestError::checkpoint_store(format!(
                "Failed to open checkpoint database {}: {}",
                db_path.display(),
                e
            ))
        })?;

        Self::with_connection(conn)
    }

    /// Create an in-memory store
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(|e| {
            IngestError::checkpoint_store(format!("Failed to create in-memory database: {}", e))
        })?;

        Self::with_connection(conn)
    }

    fn with_connection(conn: Connection) -> Result<Self> {
        conn.execute(
            r#"
            CREATE TABLE IF NOT EXISTS checkpoints (
                key TEXT PRIMARY KEY,
                first_event_time INTEGER,
                last_event_time INTEGER,
                backfill_ceiling INTEGER,
                updated_at TEXT NOT NULL
            )
            "#,
            [],
        )
        .map_err(|e| IngestError::checkpoint_store(format!("Failed to create schema: {}", e)))?;

        Ok(Self {
            db: Arc::new(Mutex::new(conn)),
        })
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Connection>> {
        self.db
            .lock()
            .map_err(|e| IngestError::checkpoint_store(format!("Failed to acquire lock: {}", e)))
    }
}

#[async_trait]
impl CheckpointStore for SqliteCheckpointStore {
    async fn get(&self, key: &str) -> Result<Option<Checkpoint>> {
        let conn = self.lock()?;

        conn.query_row(
            r#"
            SELECT key, first_event_time, last_event_time, backfill_ceiling
            FROM checkpoints WHERE key = ?1
            "#,
            params![key],
            |row| {
                Ok(Checkpoint {
                    key: row.get(0)?,
                    first_event_time: row.get(1)?,
                    last_event_time: row.get(2)?,
                    backfill_ceiling: row.get(3)?,
                })
            },
        )
        .optional()
        .map_err(|e| IngestError::checkpoint_store(format!("Failed to read '{}': {}", key, e)))
    }

    async fn upsert(&self, checkpoint: &Checkpoint) -> Result<()> {
        let conn = self.lock()?;

        conn.execute(
            r#"
            INSERT INTO checkpoints
                (key, first_event_time, last_event_time, backfill_ceiling, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5)
            ON CONFLICT(key) DO UPDATE SET
                first_event_time = excluded.first_event_time,
                last_event_time = excluded.last_event_time,
                backfill_ceiling = excluded.backfill_ceiling,
                updated_at = excluded.updated_at
            "#,
            params![
                checkpoint.key,
                checkpoint.first_event_time,
                checkpoint.last_event_time,
                checkpoint.backfill_ceiling,
                chrono::Utc::now().to_rfc3339(),
            ],
        )
        .map_err(|e| {
            IngestError::checkpoint_store(format!("Failed to write '{}': {}", checkpoint.key, e))
        })?;

        Ok(())
    }
}

//! Version Store
//!
//! Persists the ordered history of applied migrations. Each record gets an
//! `AUTOINCREMENT` id, so ids strictly increase and are never handed out
//! twice, even after a record is deleted.

use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use rusqlite::types::Type;
use rusqlite::{Connection, ErrorCode, OptionalExtension, Row, params};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{MigrateError, Result};

/// One applied migration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MigrationRecord {
    pub id: i64,
    pub name: String,
    pub applied_at: DateTime<Utc>,
}

/// Storage contract for applied-migration history.
///
/// Reads must observe the latest committed state; every mutation is a single
/// atomic write.
pub trait VersionStore {
    /// Record `name` as applied. Fails with `DuplicateName` if it already is.
    fn insert(&self, name: &str) -> Result<MigrationRecord>;

    /// Remove the record for `name`. Succeeds when nothing matches.
    fn delete(&self, name: &str) -> Result<()>;

    fn find_by_name(&self, name: &str) -> Result<MigrationRecord>;

    /// All records in insertion order.
    fn find_all(&self) -> Result<Vec<MigrationRecord>>;

    /// Record with the lowest id.
    fn first(&self) -> Result<MigrationRecord>;

    /// Record with the highest id.
    fn last(&self) -> Result<MigrationRecord>;

    /// Id of the last applied record, or 0 for an empty store.
    fn last_applied_id(&self) -> Result<i64> {
        match self.last() {
            Ok(record) => Ok(record.id),
            Err(e) if e.is_not_found() => Ok(0),
            Err(e) => Err(e),
        }
    }
}

/// SQLite-backed [`VersionStore`].
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    pub fn open(db_path: &Path) -> Result<Self> {
        info!("opening version store at {}", db_path.display());
        let conn = Connection::open(db_path)
            .map_err(|e| MigrateError::store_read(format!("failed to open database: {e}")))?;
        Self::with_connection(conn)
    }

    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(|e| {
            MigrateError::store_read(format!("failed to open in-memory database: {e}"))
        })?;
        Self::with_connection(conn)
    }

    fn with_connection(conn: Connection) -> Result<Self> {
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.create_schema()?;
        Ok(store)
    }

    fn connection(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| MigrateError::store_read("version store lock poisoned"))
    }

    fn create_schema(&self) -> Result<()> {
        let conn = self.connection()?;
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS versions (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL UNIQUE,
                applied_at TEXT NOT NULL
            );",
        )
        .map_err(|e| MigrateError::store_write(format!("failed to create db schema: {e}")))?;
        Ok(())
    }

    fn query_one(&self, sql: &str, what: &str, key: Option<&str>) -> Result<MigrationRecord> {
        let conn = self.connection()?;
        let record = match key {
            Some(name) => conn.query_row(sql, params![name], record_from_row),
            None => conn.query_row(sql, [], record_from_row),
        }
        .optional()
        .map_err(|e| MigrateError::store_read(format!("failed to find {what}: {e}")))?;

        record.ok_or_else(|| MigrateError::NotFound(what.to_string()))
    }
}

impl VersionStore for SqliteStore {
    fn insert(&self, name: &str) -> Result<MigrationRecord> {
        let applied_at = Utc::now();
        let conn = self.connection()?;
        conn.execute(
            "INSERT INTO versions (name, applied_at) VALUES (?1, ?2)",
            params![name, applied_at.to_rfc3339()],
        )
        .map_err(|e| match e.sqlite_error_code() {
            Some(ErrorCode::ConstraintViolation) => MigrateError::DuplicateName(name.to_string()),
            _ => MigrateError::store_write(format!("failed to insert migration record: {e}")),
        })?;

        let id = conn.last_insert_rowid();
        debug!("recorded migration {} with id {}", name, id);
        Ok(MigrationRecord {
            id,
            name: name.to_string(),
            applied_at,
        })
    }

    fn delete(&self, name: &str) -> Result<()> {
        let conn = self.connection()?;
        let removed = conn
            .execute("DELETE FROM versions WHERE name = ?1", params![name])
            .map_err(|e| {
                MigrateError::store_write(format!("failed to delete migration record: {e}"))
            })?;
        debug!("deleted {} record(s) named {}", removed, name);
        Ok(())
    }

    fn find_by_name(&self, name: &str) -> Result<MigrationRecord> {
        self.query_one(
            "SELECT id, name, applied_at FROM versions WHERE name = ?1",
            name,
            Some(name),
        )
    }

    fn find_all(&self) -> Result<Vec<MigrationRecord>> {
        let conn = self.connection()?;
        let mut stmt = conn
            .prepare("SELECT id, name, applied_at FROM versions ORDER BY id ASC")
            .map_err(|e| MigrateError::store_read(format!("failed to prepare query: {e}")))?;

        let rows = stmt
            .query_map([], record_from_row)
            .map_err(|e| MigrateError::store_read(format!("failed to query records: {e}")))?;

        let mut records = Vec::new();
        for row in rows {
            records.push(
                row.map_err(|e| MigrateError::store_read(format!("failed to read record row: {e}")))?,
            );
        }
        Ok(records)
    }

    fn first(&self) -> Result<MigrationRecord> {
        self.query_one(
            "SELECT id, name, applied_at FROM versions ORDER BY id ASC LIMIT 1",
            "first record",
            None,
        )
    }

    fn last(&self) -> Result<MigrationRecord> {
        self.query_one(
            "SELECT id, name, applied_at FROM versions ORDER BY id DESC LIMIT 1",
            "last record",
            None,
        )
    }
}

fn record_from_row(row: &Row<'_>) -> rusqlite::Result<MigrationRecord> {
    let applied_at: String = row.get(2)?;
    Ok(MigrationRecord {
        id: row.get(0)?,
        name: row.get(1)?,
        applied_at: parse_datetime(&applied_at).map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(2, Type::Text, Box::new(e))
        })?,
    })
}

fn parse_datetime(s: &str) -> std::result::Result<DateTime<Utc>, chrono::ParseError> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .or_else(|_| {
            // Rows written by hand with datetime('now') use "YYYY-MM-DD HH:MM:SS"
            chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S")
                .map(|naive| naive.and_utc())
        })
}

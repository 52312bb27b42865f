// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Local persistence for catalogs, field documents and sync checkpoints.
//!
//! [`LocalStore`] is the seam the sync engine writes through; [`Database`]
//! is its SQLite implementation.

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension};
use serde_json::Value;
use std::path::Path;

use crate::catalog::RecordKind;
use crate::document::{Document, DocumentCategory, SendStatus};
use crate::error::{Error, Result};

/// SQL schema for the local store.
pub const SCHEMA: &str = r#"
-- Catalog rows keyed by their natural key within a record kind
CREATE TABLE IF NOT EXISTS catalog_records (
    account_id TEXT NOT NULL,
    kind TEXT NOT NULL,
    natural_key TEXT NOT NULL,
    payload TEXT NOT NULL,
    synced_at INTEGER NOT NULL,
    PRIMARY KEY (account_id, kind, natural_key)
);

-- Documents created in the field
CREATE TABLE IF NOT EXISTS documents (
    account_id TEXT NOT NULL,
    category TEXT NOT NULL,
    id TEXT NOT NULL,
    payload TEXT NOT NULL,
    status TEXT NOT NULL DEFAULT 'unsent',
    created_at TEXT NOT NULL,
    PRIMARY KEY (account_id, category, id)
);

-- Last successful runs per account
CREATE TABLE IF NOT EXISTS sync_checkpoints (
    account_id TEXT PRIMARY KEY,
    full_sync_at INTEGER,
    differential_sync_at INTEGER
);

CREATE INDEX IF NOT EXISTS idx_catalog_synced ON catalog_records(account_id, kind, synced_at);
CREATE INDEX IF NOT EXISTS idx_documents_status ON documents(account_id, category, status);
"#;

/// A catalog row as written by the ingestion engine.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredRecord {
    pub kind: RecordKind,
    pub key: String,
    pub payload: Value,
    /// Sync start time in unix milliseconds.
    pub synced_at: i64,
}

/// Row counts produced by one [`LocalStore::upsert`] call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UpsertOutcome {
    pub inserted: usize,
    pub updated: usize,
}

impl UpsertOutcome {
    pub fn total(&self) -> usize {
        self.inserted + self.updated
    }
}

/// Which run a checkpoint records.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckpointKind {
    Full,
    Differential,
}

/// Completion times of the last successful runs, in unix milliseconds.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncCheckpoint {
    pub full_sync_at: Option<i64>,
    pub differential_sync_at: Option<i64>,
}

/// Storage operations the sync engine relies on.
pub trait LocalStore: Send + Sync {
    /// Writes records idempotently: rows matching by natural key are updated,
    /// the rest inserted.
    fn upsert(&self, account_id: &str, records: &[StoredRecord]) -> Result<UpsertOutcome>;

    /// Deletes rows of `kind` whose sync time predates `cutoff`.
    fn delete_older_than(&self, account_id: &str, kind: RecordKind, cutoff: i64) -> Result<usize>;

    /// Documents of a category not yet delivered, oldest first.
    fn fetch_unsent(&self, account_id: &str, category: DocumentCategory) -> Result<Vec<Document>>;

    fn mark_sent(
        &self,
        account_id: &str,
        category: DocumentCategory,
        id: &str,
        status: SendStatus,
    ) -> Result<()>;

    fn save_checkpoint(&self, account_id: &str, kind: CheckpointKind, at: i64) -> Result<()>;
}

/// Parse a string value from the database, returning a rusqlite error on parse failure.
fn parse_db<T: std::str::FromStr>(
    value: &str,
    column: &str,
) -> std::result::Result<T, rusqlite::Error> {
    value.parse().map_err(|_| {
        rusqlite::Error::FromSqlConversionFailure(
            0,
            rusqlite::types::Type::Text,
            Box::new(Error::CorruptedData(format!(
                "invalid value '{value}' in column '{column}'"
            ))),
        )
    })
}

fn parse_payload(value: &str, column: &str) -> std::result::Result<Value, rusqlite::Error> {
    serde_json::from_str(value).map_err(|_| {
        rusqlite::Error::FromSqlConversionFailure(
            0,
            rusqlite::types::Type::Text,
            Box::new(Error::CorruptedData(format!(
                "invalid json in column '{column}'"
            ))),
        )
    })
}

fn parse_timestamp(
    value: &str,
    column: &str,
) -> std::result::Result<DateTime<Utc>, rusqlite::Error> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|_| {
            rusqlite::Error::FromSqlConversionFailure(
                0,
                rusqlite::types::Type::Text,
                Box::new(Error::CorruptedData(format!(
                    "invalid timestamp '{value}' in column '{column}'"
                ))),
            )
        })
}

/// Run schema creation and all migrations on a database connection.
pub fn run_migrations(conn: &Connection) -> Result<()> {
    conn.execute_batch(SCHEMA)?;
    migrate_add_sent_at(conn)?;
    Ok(())
}

/// Migration: record when a document was delivered.
fn migrate_add_sent_at(conn: &Connection) -> Result<()> {
    let has_sent_at: bool = conn
        .query_row(
            "SELECT COUNT(*) > 0 FROM pragma_table_info('documents') WHERE name = 'sent_at'",
            [],
            |row| row.get(0),
        )
        .unwrap_or(false);

    if !has_sent_at {
        conn.execute("ALTER TABLE documents ADD COLUMN sent_at TEXT", [])?;
    }
    Ok(())
}

fn document_from_row(row: &rusqlite::Row<'_>) -> std::result::Result<Document, rusqlite::Error> {
    let category: String = row.get(0)?;
    let payload: String = row.get(2)?;
    let status: String = row.get(3)?;
    let created_at: String = row.get(4)?;
    Ok(Document {
        category: parse_db(&category, "category")?,
        id: row.get(1)?,
        payload: parse_payload(&payload, "payload")?,
        status: parse_db(&status, "status")?,
        created_at: parse_timestamp(&created_at, "created_at")?,
    })
}

/// SQLite database holding the local replica of one or more accounts.
pub struct Database {
    conn: Mutex<Connection>,
}

impl Database {
    /// Open a database connection at the given path, creating and migrating if needed.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let conn = Connection::open(path)?;
        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA busy_timeout = 5000;",
        )?;
        run_migrations(&conn)?;
        Ok(Database {
            conn: Mutex::new(conn),
        })
    }

    /// Open an in-memory database (for testing).
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        run_migrations(&conn)?;
        Ok(Database {
            conn: Mutex::new(conn),
        })
    }

    /// Saves a document as unsent, replacing any earlier version with the same id.
    pub fn add_document(&self, account_id: &str, document: &Document) -> Result<()> {
        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO documents (account_id, category, id, payload, status, created_at)
             VALUES (?1, ?2, ?3, ?4, 'unsent', ?5)
             ON CONFLICT(account_id, category, id) DO UPDATE SET
                 payload = excluded.payload,
                 status = 'unsent',
                 sent_at = NULL",
            params![
                account_id,
                document.category.as_str(),
                document.id,
                document.payload.to_string(),
                document.created_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    pub fn get_document(
        &self,
        account_id: &str,
        category: DocumentCategory,
        id: &str,
    ) -> Result<Document> {
        let conn = self.conn.lock();
        conn.query_row(
            "SELECT category, id, payload, status, created_at FROM documents
             WHERE account_id = ?1 AND category = ?2 AND id = ?3",
            params![account_id, category.as_str(), id],
            document_from_row,
        )
        .optional()?
        .ok_or_else(|| Error::DocumentNotFound {
            category: category.to_string(),
            id: id.to_string(),
        })
    }

    pub fn count_unsent(&self, account_id: &str, category: DocumentCategory) -> Result<usize> {
        let conn = self.conn.lock();
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM documents
             WHERE account_id = ?1 AND category = ?2 AND status = 'unsent'",
            params![account_id, category.as_str()],
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }

    pub fn get_record(
        &self,
        account_id: &str,
        kind: RecordKind,
        key: &str,
    ) -> Result<Option<StoredRecord>> {
        let conn = self.conn.lock();
        let record = conn
            .query_row(
                "SELECT payload, synced_at FROM catalog_records
                 WHERE account_id = ?1 AND kind = ?2 AND natural_key = ?3",
                params![account_id, kind.as_str(), key],
                |row| {
                    let payload: String = row.get(0)?;
                    Ok(StoredRecord {
                        kind,
                        key: key.to_string(),
                        payload: parse_payload(&payload, "payload")?,
                        synced_at: row.get(1)?,
                    })
                },
            )
            .optional()?;
        Ok(record)
    }

    pub fn count_records(&self, account_id: &str, kind: RecordKind) -> Result<usize> {
        let conn = self.conn.lock();
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM catalog_records WHERE account_id = ?1 AND kind = ?2",
            params![account_id, kind.as_str()],
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }

    pub fn checkpoint(&self, account_id: &str) -> Result<SyncCheckpoint> {
        let conn = self.conn.lock();
        let checkpoint = conn
            .query_row(
                "SELECT full_sync_at, differential_sync_at FROM sync_checkpoints
                 WHERE account_id = ?1",
                params![account_id],
                |row| {
                    Ok(SyncCheckpoint {
                        full_sync_at: row.get(0)?,
                        differential_sync_at: row.get(1)?,
                    })
                },
            )
            .optional()?;
        Ok(checkpoint.unwrap_or_default())
    }
}

impl LocalStore for Database {
    fn upsert(&self, account_id: &str, records: &[StoredRecord]) -> Result<UpsertOutcome> {
        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;
        let mut outcome = UpsertOutcome::default();
        {
            let mut update = tx.prepare_cached(
                "UPDATE catalog_records SET payload = ?4, synced_at = ?5
                 WHERE account_id = ?1 AND kind = ?2 AND natural_key = ?3",
            )?;
            let mut insert = tx.prepare_cached(
                "INSERT INTO catalog_records (account_id, kind, natural_key, payload, synced_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
            )?;
            for record in records {
                let kind = record.kind.as_str();
                let payload = record.payload.to_string();
                let args = params![account_id, kind, record.key, payload, record.synced_at];
                if update.execute(args)? == 0 {
                    insert.execute(args)?;
                    outcome.inserted += 1;
                } else {
                    outcome.updated += 1;
                }
            }
        }
        tx.commit()?;
        Ok(outcome)
    }

    fn delete_older_than(&self, account_id: &str, kind: RecordKind, cutoff: i64) -> Result<usize> {
        let conn = self.conn.lock();
        let deleted = conn.execute(
            "DELETE FROM catalog_records
             WHERE account_id = ?1 AND kind = ?2 AND synced_at < ?3",
            params![account_id, kind.as_str(), cutoff],
        )?;
        Ok(deleted)
    }

    fn fetch_unsent(&self, account_id: &str, category: DocumentCategory) -> Result<Vec<Document>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            "SELECT category, id, payload, status, created_at FROM documents
             WHERE account_id = ?1 AND category = ?2 AND status = 'unsent'
             ORDER BY created_at, id",
        )?;
        let documents = stmt
            .query_map(params![account_id, category.as_str()], document_from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(documents)
    }

    fn mark_sent(
        &self,
        account_id: &str,
        category: DocumentCategory,
        id: &str,
        status: SendStatus,
    ) -> Result<()> {
        let conn = self.conn.lock();
        let sent_at = match status {
            SendStatus::Sent => Some(Utc::now().to_rfc3339()),
            SendStatus::Unsent => None,
        };
        let changed = conn.execute(
            "UPDATE documents SET status = ?4, sent_at = ?5
             WHERE account_id = ?1 AND category = ?2 AND id = ?3",
            params![account_id, category.as_str(), id, status.as_str(), sent_at],
        )?;
        if changed == 0 {
            return Err(Error::DocumentNotFound {
                category: category.to_string(),
                id: id.to_string(),
            });
        }
        Ok(())
    }

    fn save_checkpoint(&self, account_id: &str, kind: CheckpointKind, at: i64) -> Result<()> {
        let conn = self.conn.lock();
        let sql = match kind {
            CheckpointKind::Full => {
                "INSERT INTO sync_checkpoints (account_id, full_sync_at) VALUES (?1, ?2)
                 ON CONFLICT(account_id) DO UPDATE SET full_sync_at = excluded.full_sync_at"
            }
            CheckpointKind::Differential => {
                "INSERT INTO sync_checkpoints (account_id, differential_sync_at) VALUES (?1, ?2)
                 ON CONFLICT(account_id) DO UPDATE SET
                     differential_sync_at = excluded.differential_sync_at"
            }
        };
        conn.execute(sql, params![account_id, at])?;
        Ok(())
    }
}

#[cfg(test)]
#[path = "store_tests.rs"]
mod tests;

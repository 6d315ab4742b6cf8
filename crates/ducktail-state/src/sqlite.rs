//! `SQLite`-backed implementation of [`WatermarkStore`].
//!
//! Uses a single `Mutex<Connection>` for thread safety. Each pipeline is
//! one row; the value is stored as its JSON scalar next to its kind.

use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use ducktail_types::{PipelineName, WatermarkKind, WatermarkRecord, WatermarkValue};
use rusqlite::{Connection, OptionalExtension};

use crate::backend::WatermarkStore;
use crate::error::{self, StateError};

/// Idempotent DDL for the watermark table.
const CREATE_TABLES: &str = r"
CREATE TABLE IF NOT EXISTS watermarks (
    pipeline TEXT PRIMARY KEY,
    watermark TEXT NOT NULL,
    watermark_type TEXT NOT NULL,
    last_run INTEGER NOT NULL
);
";

/// `SQLite`-backed watermark storage.
///
/// Create with [`SqliteWatermarkStore::open`] for file-backed persistence
/// or [`SqliteWatermarkStore::in_memory`] for tests.
pub struct SqliteWatermarkStore {
    conn: Mutex<Connection>,
}

impl SqliteWatermarkStore {
    /// Open or create a `SQLite` state database at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`StateError::Io`] if the directory can't be created,
    /// or [`StateError::Sqlite`] if the database can't be opened.
    pub fn open(path: &Path) -> error::Result<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| StateError::io(parent, e))?;
        }
        let conn = Connection::open(path)?;
        conn.execute_batch(CREATE_TABLES)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Create an in-memory `SQLite` store (for testing).
    ///
    /// # Errors
    ///
    /// Returns [`StateError::Sqlite`] if the database can't be initialized.
    pub fn in_memory() -> error::Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(CREATE_TABLES)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn lock_conn(&self) -> error::Result<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|_| StateError::LockPoisoned)
    }

    fn decode(pipeline: &str, raw: &str, kind: &str) -> Option<WatermarkValue> {
        let scalar: serde_json::Value = serde_json::from_str(raw).ok()?;
        let kind: Option<WatermarkKind> =
            serde_json::from_value(serde_json::Value::from(kind)).ok();
        let value = WatermarkValue::from_json(&scalar, kind);
        if value.is_none() {
            tracing::warn!(pipeline, "Ignoring unreadable watermark row");
        }
        value
    }
}

impl WatermarkStore for SqliteWatermarkStore {
    fn get(&self, pipeline: &PipelineName) -> error::Result<Option<WatermarkValue>> {
        let conn = self.lock_conn()?;
        let row: Option<(String, String)> = conn
            .query_row(
                "SELECT watermark, watermark_type FROM watermarks WHERE pipeline = ?1",
                [pipeline.as_str()],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?;
        Ok(row.and_then(|(raw, kind)| Self::decode(pipeline.as_str(), &raw, &kind)))
    }

    fn set(
        &self,
        pipeline: &PipelineName,
        value: &WatermarkValue,
        last_run: i64,
    ) -> error::Result<()> {
        let conn = self.lock_conn()?;
        conn.execute(
            "INSERT INTO watermarks (pipeline, watermark, watermark_type, last_run) \
             VALUES (?1, ?2, ?3, ?4) \
             ON CONFLICT(pipeline) \
             DO UPDATE SET watermark = ?2, watermark_type = ?3, last_run = ?4",
            rusqlite::params![
                pipeline.as_str(),
                value.to_json().to_string(),
                value.kind().as_str(),
                last_run,
            ],
        )?;
        Ok(())
    }

    fn records(&self) -> error::Result<Vec<WatermarkRecord>> {
        let conn = self.lock_conn()?;
        let mut stmt = conn.prepare(
            "SELECT pipeline, watermark, watermark_type, last_run \
             FROM watermarks ORDER BY pipeline",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, i64>(3)?,
            ))
        })?;

        let mut records = Vec::new();
        for row in rows {
            let (pipeline, raw, kind, last_run) = row?;
            if let Some(value) = Self::decode(&pipeline, &raw, &kind) {
                records.push(WatermarkRecord {
                    pipeline: PipelineName::new(pipeline),
                    value,
                    last_run,
                });
            }
        }
        Ok(records)
    }

    fn clear(&self, pipeline: &PipelineName) -> error::Result<bool> {
        let conn = self.lock_conn()?;
        let removed = conn.execute(
            "DELETE FROM watermarks WHERE pipeline = ?1",
            [pipeline.as_str()],
        )?;
        Ok(removed > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_store_has_no_watermark() {
        let store = SqliteWatermarkStore::in_memory().unwrap();
        assert_eq!(store.get(&PipelineName::new("p")).unwrap(), None);
    }

    #[test]
    fn set_overwrites_previous_value() {
        let store = SqliteWatermarkStore::in_memory().unwrap();
        let name = PipelineName::new("orders");
        store.set(&name, &WatermarkValue::Int(200), 10).unwrap();
        store.set(&name, &WatermarkValue::Int(300), 20).unwrap();

        assert_eq!(store.get(&name).unwrap(), Some(WatermarkValue::Int(300)));
        let records = store.records().unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].last_run, 20);
    }

    #[test]
    fn typed_values_survive_storage() {
        let store = SqliteWatermarkStore::in_memory().unwrap();
        let name = PipelineName::new("events");
        let ts = WatermarkValue::Timestamp("2024-05-01 12:30:00".into());
        store.set(&name, &ts, 1).unwrap();
        assert_eq!(store.get(&name).unwrap(), Some(ts));

        let dec = WatermarkValue::Decimal("10.50".into());
        store.set(&name, &dec, 2).unwrap();
        assert_eq!(store.get(&name).unwrap(), Some(dec));

        let ns = WatermarkValue::TimestampNs("2024-05-01 12:30:00.000000007".into());
        store.set(&name, &ns, 3).unwrap();
        assert_eq!(store.get(&name).unwrap(), Some(ns));
    }

    #[test]
    fn infinite_float_is_not_lost() {
        let store = SqliteWatermarkStore::in_memory().unwrap();
        let name = PipelineName::new("scores");
        store.set(&name, &WatermarkValue::Float(f64::INFINITY), 1).unwrap();
        assert_eq!(
            store.get(&name).unwrap(),
            Some(WatermarkValue::Float(f64::INFINITY))
        );
    }

    #[test]
    fn clear_reports_whether_row_existed() {
        let store = SqliteWatermarkStore::in_memory().unwrap();
        let name = PipelineName::new("p");
        assert!(!store.clear(&name).unwrap());
        store.set(&name, &WatermarkValue::Int(1), 1).unwrap();
        assert!(store.clear(&name).unwrap());
        assert_eq!(store.get(&name).unwrap(), None);
    }

    #[test]
    fn open_creates_parent_directories() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("state.db");
        let store = SqliteWatermarkStore::open(&path).unwrap();
        store
            .set(&PipelineName::new("p"), &WatermarkValue::Int(9), 1)
            .unwrap();
        drop(store);

        let reopened = SqliteWatermarkStore::open(&path).unwrap();
        assert_eq!(
            reopened.get(&PipelineName::new("p")).unwrap(),
            Some(WatermarkValue::Int(9))
        );
    }
}

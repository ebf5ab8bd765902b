//! Snapshot persistence: the whole matrix as JSON under one key.

use std::collections::HashMap;
use std::path::Path;

use rusqlite::{Connection, OptionalExtension};

use crate::error::{GridError, Result};
use crate::value::{Matrix, check_rectangular};

/// Durable string key/value slots.
pub trait SnapshotStore {
    fn get(&self, key: &str) -> Result<Option<String>>;
    fn set(&mut self, key: &str, value: &str) -> Result<()>;
}

/// Key/value table in a SQLite file.
pub struct SqliteStore {
    conn: Connection,
}

impl SqliteStore {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let conn = Connection::open(path.as_ref())?;
        // best effort: some filesystems refuse WAL
        let _ = conn.pragma_update(None, "journal_mode", "WAL");
        let _ = conn.pragma_update(None, "synchronous", "NORMAL");
        Self::with_connection(conn)
    }

    pub fn in_memory() -> Result<Self> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> Result<Self> {
        conn.execute(
            "CREATE TABLE IF NOT EXISTS snapshots (key TEXT PRIMARY KEY, value TEXT NOT NULL)",
            [],
        )?;
        Ok(Self { conn })
    }
}

impl SnapshotStore for SqliteStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        let value = self
            .conn
            .query_row("SELECT value FROM snapshots WHERE key = ?1", [key], |row| row.get(0))
            .optional()?;
        Ok(value)
    }

    fn set(&mut self, key: &str, value: &str) -> Result<()> {
        self.conn.execute(
            "INSERT INTO snapshots (key, value) VALUES (?1, ?2)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value",
            (key, value),
        )?;
        Ok(())
    }
}

/// Process-local store; nothing survives the process.
#[derive(Debug, Default)]
pub struct MemoryStore {
    slots: HashMap<String, String>,
}

impl SnapshotStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.slots.get(key).cloned())
    }

    fn set(&mut self, key: &str, value: &str) -> Result<()> {
        self.slots.insert(key.to_string(), value.to_string());
        Ok(())
    }
}

/// Saves and restores the matrix in a single fixed slot of a store.
pub struct PersistenceGateway<S> {
    store: S,
    key: String,
}

impl<S: SnapshotStore> PersistenceGateway<S> {
    pub fn new(store: S, key: impl Into<String>) -> Self {
        Self {
            store,
            key: key.into(),
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    /// Overwrite the slot with `matrix`.
    pub fn save(&mut self, matrix: &Matrix) -> Result<()> {
        let json = serde_json::to_string(matrix)
            .map_err(|e| GridError::CorruptSnapshot(e.to_string()))?;
        self.store.set(&self.key, &json)?;
        tracing::info!(key = %self.key, rows = matrix.len(), "snapshot saved");
        Ok(())
    }

    /// `None` when nothing was ever saved under the key.
    pub fn restore(&self) -> Result<Option<Matrix>> {
        let Some(json) = self.store.get(&self.key)? else {
            tracing::debug!(key = %self.key, "no snapshot to restore");
            return Ok(None);
        };
        let matrix = decode(&json)?;
        tracing::info!(key = %self.key, rows = matrix.len(), "snapshot restored");
        Ok(Some(matrix))
    }
}

/// Parse a snapshot, rejecting anything but a rectangular array of
/// arrays of scalars.
pub fn decode(json: &str) -> Result<Matrix> {
    let matrix: Matrix =
        serde_json::from_str(json).map_err(|e| GridError::CorruptSnapshot(e.to_string()))?;
    check_rectangular(&matrix).map_err(|(row, len, expected)| {
        GridError::CorruptSnapshot(format!("row {row} has {len} cells, expected {expected}"))
    })?;
    Ok(matrix)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::{CellValue, default_seed};
    use pretty_assertions::assert_eq;

    #[test]
    fn absent_key_restores_nothing() {
        let gw = PersistenceGateway::new(MemoryStore::default(), "spreadsheetData");
        assert_eq!(gw.restore().unwrap(), None);
    }

    #[test]
    fn round_trip_preserves_matrix() {
        let mut gw = PersistenceGateway::new(MemoryStore::default(), "k");
        let m = default_seed();
        gw.save(&m).unwrap();
        assert_eq!(gw.restore().unwrap(), Some(m));
    }

    #[test]
    fn save_overwrites_previous_snapshot() {
        let mut gw = PersistenceGateway::new(SqliteStore::in_memory().unwrap(), "k");
        gw.save(&vec![vec![CellValue::Number(1.0)]]).unwrap();
        let second = vec![vec![CellValue::text("b"), CellValue::Empty]];
        gw.save(&second).unwrap();
        assert_eq!(gw.restore().unwrap(), Some(second));
    }

    #[test]
    fn malformed_snapshots_are_corrupt() {
        for bad in ["{\"a\":1}", "[[1,2],[3]]", "[[[1]]]", "not json", "[1,2]"] {
            let mut store = MemoryStore::default();
            store.set("k", bad).unwrap();
            let gw = PersistenceGateway::new(store, "k");
            assert!(
                matches!(gw.restore(), Err(GridError::CorruptSnapshot(_))),
                "{bad} should be rejected"
            );
        }
    }

    #[test]
    fn null_cells_decode_as_empty() {
        assert_eq!(
            decode("[[\"a\",null],[1.5,\"\"]]").unwrap(),
            vec![
                vec![CellValue::text("a"), CellValue::Empty],
                vec![CellValue::Number(1.5), CellValue::text("")],
            ]
        );
    }
}

//! SQLite key-value storage for usage counters.

use rusqlite::{params, Connection, OptionalExtension};
use safecut_core::{KeyValueStore, MemoryStore, StoreError};
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SqliteError {
    #[error("cannot create data directory {0}: {1}")]
    CreateDir(String, std::io::Error),
    #[error("database: {0}")]
    Database(#[from] rusqlite::Error),
}

/// One `kv` table of string keys and values.
pub struct SqliteStore {
    conn: Connection,
}

impl SqliteStore {
    /// Open (or create) the database at `path`, creating parent directories.
    pub fn open(path: &Path) -> Result<Self, SqliteError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .map_err(|e| SqliteError::CreateDir(parent.display().to_string(), e))?;
        }
        let conn = Connection::open(path)?;
        let store = Self::init(conn)?;
        tracing::info!(path = %path.display(), "usage database opened");
        Ok(store)
    }

    /// Database that lives only as long as the store.
    pub fn open_in_memory() -> Result<Self, SqliteError> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self, SqliteError> {
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS kv (
                key   TEXT PRIMARY KEY NOT NULL,
                value TEXT NOT NULL
            );",
        )?;
        Ok(Self { conn })
    }
}

impl KeyValueStore for SqliteStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        self.conn
            .query_row("SELECT value FROM kv WHERE key = ?1", params![key], |row| {
                row.get::<_, String>(0)
            })
            .optional()
            .map_err(|e| StoreError::Read {
                key: key.to_string(),
                reason: e.to_string(),
            })
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), StoreError> {
        self.conn
            .execute(
                "INSERT INTO kv (key, value) VALUES (?1, ?2)
                 ON CONFLICT(key) DO UPDATE SET value = excluded.value",
                params![key, value],
            )
            .map(|_| ())
            .map_err(|e| StoreError::Write {
                key: key.to_string(),
                reason: e.to_string(),
            })
    }
}

/// Usage storage at `path`, or a session-only store if it cannot be opened.
pub fn open_usage_store(path: &Path) -> Box<dyn KeyValueStore> {
    match SqliteStore::open(path) {
        Ok(store) => Box::new(store),
        Err(e) => {
            tracing::warn!(
                path = %path.display(),
                error = %e,
                "usage storage unavailable; counts will not survive this session"
            );
            Box::new(MemoryStore::new())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use safecut_core::{FixedClock, UsageStore};

    #[test]
    fn test_get_missing_key() {
        let store = SqliteStore::open_in_memory().unwrap();
        assert_eq!(store.get("usage").unwrap(), None);
    }

    #[test]
    fn test_set_overwrites() {
        let mut store = SqliteStore::open_in_memory().unwrap();
        store.set("credits", "1").unwrap();
        store.set("credits", "2").unwrap();
        assert_eq!(store.get("credits").unwrap().as_deref(), Some("2"));
    }

    #[test]
    fn test_values_survive_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("usage.db");

        {
            let mut store = SqliteStore::open(&path).unwrap();
            store.set("usage", "4").unwrap();
        }

        let store = SqliteStore::open(&path).unwrap();
        assert_eq!(store.get("usage").unwrap().as_deref(), Some("4"));
    }

    #[test]
    fn test_usage_store_round_trip_through_sqlite() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("usage.db");
        let clock = FixedClock::new(june_10());

        {
            let mut usage = UsageStore::open(SqliteStore::open(&path).unwrap(), clock.clone());
            usage.record_analysis();
            usage.grant_credit();
        }

        let usage = UsageStore::open(SqliteStore::open(&path).unwrap(), clock.clone());
        assert_eq!(usage.record().count, 1);
        assert_eq!(usage.record().bonus_credits, 1);

        clock.advance_days(1);
        let usage = UsageStore::open(SqliteStore::open(&path).unwrap(), clock);
        assert_eq!(usage.record().count, 0);
        assert_eq!(usage.record().bonus_credits, 1);
    }

    #[test]
    fn test_unopenable_path_falls_back_to_memory() {
        let dir = tempfile::tempdir().unwrap();
        // A regular file where the parent directory should be.
        let blocker = dir.path().join("blocker");
        std::fs::write(&blocker, b"x").unwrap();

        let mut store = open_usage_store(&blocker.join("usage.db"));
        store.set("usage", "1").unwrap();
        assert_eq!(store.get("usage").unwrap().as_deref(), Some("1"));
    }

    fn june_10() -> chrono::NaiveDate {
        chrono::NaiveDate::from_ymd_opt(2025, 6, 10).unwrap()
    }
}

use std::path::Path;

use rusqlite::{params, Connection};

use super::{schema, RecordStore};
use crate::error::Result;

/// SQLite-backed record store: one row per versioned record key.
pub struct SqliteStore {
    conn: Connection,
}

impl SqliteStore {
    /// Open or create a store at the given path with WAL mode.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        schema::initialize(&conn)?;
        schema::migrate(&conn)?;
        Ok(Self { conn })
    }

    /// Open an in-memory store (for testing).
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        schema::initialize(&conn)?;
        schema::migrate(&conn)?;
        Ok(Self { conn })
    }

    /// Keys of every stored record, sorted.
    pub fn keys(&self) -> Result<Vec<String>> {
        let mut stmt = self.conn.prepare("SELECT key FROM records ORDER BY key")?;
        let keys = stmt
            .query_map([], |row| row.get(0))?
            .collect::<std::result::Result<Vec<String>, _>>()?;
        Ok(keys)
    }
}

impl RecordStore for SqliteStore {
    fn read(&self, key: &str) -> Result<Option<String>> {
        let mut stmt = self.conn.prepare("SELECT value FROM records WHERE key = ?1")?;
        let mut rows = stmt.query(params![key])?;
        match rows.next()? {
            Some(row) => Ok(Some(row.get(0)?)),
            None => Ok(None),
        }
    }

    fn write(&self, key: &str, value: &str) -> Result<()> {
        self.conn.execute(
            "INSERT INTO records (key, value, updated_at) VALUES (?1, ?2, ?3)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
            params![key, value, chrono::Utc::now().to_rfc3339()],
        )?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use super::*;
    use crate::catalog::{self, SEED_DETAILS_ID};
    use crate::domain::CorrectionSettings;
    use crate::error::Error;
    use crate::store::{
        CatalogStore, SelectionStore, SettingsStore, CATALOG_KEY, SELECTION_KEY, SETTINGS_KEY,
    };

    #[test]
    fn test_open_creates_file_and_parents() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("sub/dir/studio.db");
        let _store = SqliteStore::open(&path).unwrap();
        assert!(path.exists());
    }

    #[test]
    fn test_write_and_read_record() {
        let store = SqliteStore::open_in_memory().unwrap();
        assert_eq!(store.read("a").unwrap(), None);
        store.write("a", "1").unwrap();
        store.write("a", "2").unwrap();
        assert_eq!(store.read("a").unwrap().as_deref(), Some("2"));
        assert_eq!(store.keys().unwrap(), vec!["a"]);
    }

    #[test]
    fn test_records_survive_reopen() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("studio.db");
        let settings = CorrectionSettings {
            strength: 33,
            ..CorrectionSettings::default()
        };
        let selection: BTreeSet<String> = [SEED_DETAILS_ID.to_string()].into();
        {
            let store = SqliteStore::open(&path).unwrap();
            store.save_settings(&settings).unwrap();
            store.save_selection(&selection).unwrap();
            store.save_catalog(&catalog::seed_packs()[..1]).unwrap();
        }
        let store = SqliteStore::open(&path).unwrap();
        assert_eq!(store.load_settings(), settings);
        assert_eq!(store.load_selection(), Some(selection));
        assert_eq!(store.load_catalog().len(), 1);
        assert_eq!(store.keys().unwrap(), vec![CATALOG_KEY, SELECTION_KEY, SETTINGS_KEY]);
    }

    #[test]
    fn test_corrupt_record_falls_back() {
        let store = SqliteStore::open_in_memory().unwrap();
        store.write(SETTINGS_KEY, "garbage").unwrap();
        assert_eq!(store.load_settings(), CorrectionSettings::default());
    }

    // ── Schema version tracking ─────────────────────────────────

    #[test]
    fn test_schema_version_set_on_fresh_db() {
        let store = SqliteStore::open_in_memory().unwrap();
        let version: i64 = store
            .conn
            .pragma_query_value(None, "user_version", |row| row.get(0))
            .unwrap();
        assert_eq!(version, schema::SCHEMA_VERSION);
    }

    #[test]
    fn test_reject_future_schema_version() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("studio.db");
        {
            let conn = Connection::open(&path).unwrap();
            conn.pragma_update(None, "user_version", 99).unwrap();
        }
        match SqliteStore::open(&path) {
            Err(Error::UnsupportedSchemaVersion { found, supported }) => {
                assert_eq!(found, 99);
                assert_eq!(supported, schema::SCHEMA_VERSION);
            }
            Err(other) => panic!("unexpected error: {other}"),
            Ok(_) => panic!("future schema accepted"),
        }
    }

    #[test]
    fn test_migration_check_is_idempotent() {
        let store = SqliteStore::open_in_memory().unwrap();
        schema::migrate(&store.conn).unwrap();
        schema::migrate(&store.conn).unwrap();
    }

    #[test]
    fn test_records_columns() {
        let store = SqliteStore::open_in_memory().unwrap();
        let mut stmt = store
            .conn
            .prepare("SELECT name FROM pragma_table_info('records') ORDER BY cid")
            .unwrap();
        let columns: Vec<String> = stmt
            .query_map([], |row| row.get(0))
            .unwrap()
            .map(|r| r.unwrap())
            .collect();
        assert_eq!(columns, vec!["key", "value", "updated_at"]);
    }
}

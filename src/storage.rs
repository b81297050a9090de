use crate::error::Result;
use rusqlite::{params, Connection, OptionalExtension};
use serde::{de::DeserializeOwned, Serialize};
use std::cell::RefCell;
use std::collections::HashMap;
use std::path::Path;
use tracing::{debug, error};

/// Key holding the ordered result log
pub const RESULTS_KEY: &str = "results";
/// Key holding the cumulative per-character mistake counts
pub const MISTAKES_KEY: &str = "mistakes";

/// Narrow string key-value persistence used by the result log and the
/// mistake ledger
pub trait KeyValueStore {
    fn get(&self, key: &str) -> Result<Option<String>>;
    fn set(&self, key: &str, value: &str) -> Result<()>;
}

/// SQLite-backed store with a single `kv` table
#[derive(Debug)]
pub struct SqliteStore {
    conn: Connection,
}

impl SqliteStore {
    /// Open (or create) the database at `path`, creating parent directories
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)?;
        Self::init(conn)
    }

    pub fn open_in_memory() -> Result<Self> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self> {
        conn.execute(
            r#"
            CREATE TABLE IF NOT EXISTS kv (
                key TEXT PRIMARY KEY NOT NULL,
                value TEXT NOT NULL,
                updated_at DATETIME DEFAULT CURRENT_TIMESTAMP
            )
            "#,
            [],
        )?;
        Ok(SqliteStore { conn })
    }
}

impl KeyValueStore for SqliteStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        let value = self
            .conn
            .query_row("SELECT value FROM kv WHERE key = ?1", [key], |row| {
                row.get::<_, String>(0)
            })
            .optional()?;
        Ok(value)
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        self.conn.execute(
            r#"
            INSERT INTO kv (key, value) VALUES (?1, ?2)
            ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = CURRENT_TIMESTAMP
            "#,
            params![key, value],
        )?;
        Ok(())
    }
}

/// Volatile store, used in tests and when the on-disk store can't be opened
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: RefCell<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.entries.borrow().get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        self.entries
            .borrow_mut()
            .insert(key.to_string(), value.to_string());
        Ok(())
    }
}

/// Read and decode `key`, falling back to `T::default()` on any failure
pub fn load_or_default<T>(store: &dyn KeyValueStore, key: &str) -> T
where
    T: DeserializeOwned + Default,
{
    let raw = match store.get(key) {
        Ok(Some(raw)) => raw,
        Ok(None) => return T::default(),
        Err(e) => {
            error!(key, error = %e, "failed to read from store");
            return T::default();
        }
    };

    match serde_json::from_str(&raw) {
        Ok(value) => value,
        Err(e) => {
            error!(key, error = %e, "stored value is corrupt, using default");
            T::default()
        }
    }
}

/// Encode and write `value` under `key`. Failures are logged and dropped.
pub fn save<T: Serialize + ?Sized>(store: &dyn KeyValueStore, key: &str, value: &T) {
    let encoded = match serde_json::to_string(value) {
        Ok(encoded) => encoded,
        Err(e) => {
            error!(key, error = %e, "failed to encode value for store");
            return;
        }
    };

    match store.set(key, &encoded) {
        Ok(()) => debug!(key, bytes = encoded.len(), "saved to store"),
        Err(e) => error!(key, error = %e, "failed to write to store"),
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::error::Error;
    use std::collections::BTreeMap;

    /// Store whose every operation fails, for exercising degrade paths
    pub(crate) struct FailingStore;

    impl KeyValueStore for FailingStore {
        fn get(&self, _key: &str) -> Result<Option<String>> {
            Err(Error::Io(std::io::Error::other("quota exceeded")))
        }

        fn set(&self, _key: &str, _value: &str) -> Result<()> {
            Err(Error::Io(std::io::Error::other("quota exceeded")))
        }
    }

    #[test]
    fn sqlite_store_set_and_get() {
        let store = SqliteStore::open_in_memory().unwrap();
        assert_eq!(store.get("missing").unwrap(), None);

        store.set("k", "v1").unwrap();
        assert_eq!(store.get("k").unwrap().as_deref(), Some("v1"));

        store.set("k", "v2").unwrap();
        assert_eq!(store.get("k").unwrap().as_deref(), Some("v2"));
    }

    #[test]
    fn sqlite_store_persists_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("store.db");

        {
            let store = SqliteStore::open(&path).unwrap();
            store.set(RESULTS_KEY, "[]").unwrap();
        }

        let store = SqliteStore::open(&path).unwrap();
        assert_eq!(store.get(RESULTS_KEY).unwrap().as_deref(), Some("[]"));
    }

    #[test]
    fn load_or_default_missing_key() {
        let store = MemoryStore::new();
        let v: Vec<u32> = load_or_default(&store, RESULTS_KEY);
        assert!(v.is_empty());
    }

    #[test]
    fn load_or_default_corrupt_value() {
        let store = MemoryStore::new();
        store.set(MISTAKES_KEY, "{not json").unwrap();
        let v: BTreeMap<char, u32> = load_or_default(&store, MISTAKES_KEY);
        assert!(v.is_empty());
    }

    #[test]
    fn load_or_default_read_failure() {
        let v: Vec<u32> = load_or_default(&FailingStore, RESULTS_KEY);
        assert!(v.is_empty());
    }

    #[test]
    fn save_then_load_char_keyed_map() {
        let store = MemoryStore::new();
        let mut map = BTreeMap::new();
        map.insert('о', 3u32);
        map.insert(' ', 1u32);
        save(&store, MISTAKES_KEY, &map);

        let loaded: BTreeMap<char, u32> = load_or_default(&store, MISTAKES_KEY);
        assert_eq!(loaded, map);
    }

    #[test]
    fn save_swallows_write_failure() {
        save(&FailingStore, RESULTS_KEY, &vec![1, 2, 3]);
    }
}

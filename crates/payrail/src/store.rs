//! Key-value configuration store.
//!
//! Chain and token configuration live under two well-known keys in a shared
//! store. The dispatcher takes the store as an injected trait object so tests
//! can substitute an in-memory backend and record accesses.

use std::sync::Mutex;

use dashmap::DashMap;
use serde_json::Value;

use crate::error::DispatchError;

/// Store key for the chain configuration record.
pub const CHAIN_CONFIG_KEY: &str = "rpc";

/// Store key for the token registry record.
pub const TOKEN_REGISTRY_KEY: &str = "tokens";

/// Trait for configuration storage backends.
///
/// Implementations must be thread-safe (`Send + Sync`). Values are JSON so
/// the stored shape matches the records described in the data model exactly.
pub trait ConfigStore: Send + Sync {
    /// Fetch the value under `key`, or `None` if the key was never set.
    fn get(&self, key: &str) -> Result<Option<Value>, DispatchError>;

    /// Write `value` under `key`, replacing any previous value.
    fn set(&self, key: &str, value: &Value) -> Result<(), DispatchError>;
}

/// In-memory store backed by DashMap. Lost on restart; used in tests and
/// embedded setups.
#[derive(Default)]
pub struct InMemoryConfigStore {
    entries: DashMap<String, Value>,
}

impl InMemoryConfigStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ConfigStore for InMemoryConfigStore {
    fn get(&self, key: &str) -> Result<Option<Value>, DispatchError> {
        Ok(self.entries.get(key).map(|v| v.value().clone()))
    }

    fn set(&self, key: &str, value: &Value) -> Result<(), DispatchError> {
        self.entries.insert(key.to_string(), value.clone());
        Ok(())
    }
}

/// Persistent store backed by SQLite. Survives restarts.
pub struct SqliteConfigStore {
    conn: Mutex<rusqlite::Connection>,
}

impl SqliteConfigStore {
    /// Open (or create) the configuration database at the given path.
    ///
    /// On Unix the database file permissions are restricted to 0600, since
    /// the chain record holds the custodial private key.
    pub fn open(path: &str) -> Result<Self, rusqlite::Error> {
        let conn = rusqlite::Connection::open(path)?;
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS config (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL
            );
            PRAGMA journal_mode=WAL;",
        )?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            if let Err(e) =
                std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))
            {
                tracing::warn!(
                    path = %path,
                    error = %e,
                    "failed to set config database file permissions to 0600"
                );
            }
        }

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, rusqlite::Connection> {
        match self.conn.lock() {
            Ok(c) => c,
            Err(poisoned) => {
                tracing::error!("config store mutex poisoned, recovering");
                poisoned.into_inner()
            }
        }
    }
}

impl ConfigStore for SqliteConfigStore {
    fn get(&self, key: &str) -> Result<Option<Value>, DispatchError> {
        let conn = self.lock();
        let raw: Option<String> = conn
            .query_row("SELECT value FROM config WHERE key = ?1", [key], |row| {
                row.get(0)
            })
            .map(Some)
            .or_else(|e| match e {
                rusqlite::Error::QueryReturnedNoRows => Ok(None),
                other => Err(DispatchError::Store(other.to_string())),
            })?;

        match raw {
            Some(text) => serde_json::from_str(&text)
                .map(Some)
                .map_err(|e| DispatchError::Store(e.to_string())),
            None => Ok(None),
        }
    }

    fn set(&self, key: &str, value: &Value) -> Result<(), DispatchError> {
        let text =
            serde_json::to_string(value).map_err(|e| DispatchError::Store(e.to_string()))?;
        let conn = self.lock();
        conn.execute(
            "INSERT INTO config (key, value) VALUES (?1, ?2)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value",
            rusqlite::params![key, text],
        )
        .map_err(|e| DispatchError::Store(e.to_string()))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn in_memory_get_set() {
        let store = InMemoryConfigStore::new();
        assert!(store.get("rpc").unwrap().is_none());

        store.set("rpc", &json!({"chainId": 8453})).unwrap();
        assert_eq!(store.get("rpc").unwrap().unwrap()["chainId"], 8453);
    }

    #[test]
    fn in_memory_overwrite() {
        let store = InMemoryConfigStore::new();
        store.set("tokens", &json!({"$usdc": {}})).unwrap();
        store.set("tokens", &json!({"$dai": {}})).unwrap();
        let tokens = store.get("tokens").unwrap().unwrap();
        assert!(tokens.get("$usdc").is_none());
        assert!(tokens.get("$dai").is_some());
    }

    #[test]
    fn sqlite_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.db");
        let store = SqliteConfigStore::open(path.to_str().unwrap()).unwrap();

        assert!(store.get("rpc").unwrap().is_none());
        store
            .set("rpc", &json!({"chainName": "Base", "chainId": 8453}))
            .unwrap();
        let value = store.get("rpc").unwrap().unwrap();
        assert_eq!(value["chainName"], "Base");
        assert_eq!(value["chainId"], 8453);
    }

    #[test]
    fn sqlite_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.db");
        let path = path.to_str().unwrap();

        {
            let store = SqliteConfigStore::open(path).unwrap();
            store.set("tokens", &json!({"$usdc": {"decimals": "6"}})).unwrap();
        }
        let store = SqliteConfigStore::open(path).unwrap();
        let tokens = store.get("tokens").unwrap().unwrap();
        assert_eq!(tokens["$usdc"]["decimals"], "6");
    }
}

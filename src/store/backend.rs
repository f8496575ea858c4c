//! Synchronous string key/value backends.

use color_eyre::{eyre::eyre, Result};
use rusqlite::{params, OptionalExtension};
use std::collections::BTreeMap;
use std::sync::Mutex;

use crate::db::Database;

/// A synchronous string store in the manner of the browser's local storage.
///
/// Namespacing is a convention of the callers (see `JsonStore`); the backend
/// itself knows nothing about prefixes beyond `keys_with_prefix`.
pub trait KeyValueBackend: Send + Sync {
  fn get(&self, key: &str) -> Result<Option<String>>;

  fn set(&self, key: &str, value: &str) -> Result<()>;

  fn remove(&self, key: &str) -> Result<()>;

  /// All keys starting with `prefix`, sorted.
  fn keys_with_prefix(&self, prefix: &str) -> Result<Vec<String>>;
}

/// Backend that lives only as long as the process.
#[derive(Debug, Default)]
pub struct MemoryBackend {
  entries: Mutex<BTreeMap<String, String>>,
}

impl MemoryBackend {
  pub fn new() -> Self {
    Self::default()
  }

  fn entries(&self) -> Result<std::sync::MutexGuard<'_, BTreeMap<String, String>>> {
    self
      .entries
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))
  }
}

impl KeyValueBackend for MemoryBackend {
  fn get(&self, key: &str) -> Result<Option<String>> {
    Ok(self.entries()?.get(key).cloned())
  }

  fn set(&self, key: &str, value: &str) -> Result<()> {
    self.entries()?.insert(key.to_string(), value.to_string());
    Ok(())
  }

  fn remove(&self, key: &str) -> Result<()> {
    self.entries()?.remove(key);
    Ok(())
  }

  fn keys_with_prefix(&self, prefix: &str) -> Result<Vec<String>> {
    Ok(
      self
        .entries()?
        .keys()
        .filter(|k| k.starts_with(prefix))
        .cloned()
        .collect(),
    )
  }
}

/// SQLite-backed key/value store that survives restarts.
#[derive(Clone)]
pub struct SqliteBackend {
  db: Database,
}

impl SqliteBackend {
  pub fn new(db: Database) -> Self {
    Self { db }
  }
}

impl KeyValueBackend for SqliteBackend {
  fn get(&self, key: &str) -> Result<Option<String>> {
    let conn = self.db.conn()?;
    conn
      .query_row(
        "SELECT value FROM kv_store WHERE key = ?",
        params![key],
        |row| row.get(0),
      )
      .optional()
      .map_err(|e| eyre!("Failed to read key {}: {}", key, e))
  }

  fn set(&self, key: &str, value: &str) -> Result<()> {
    let conn = self.db.conn()?;
    conn
      .execute(
        "INSERT OR REPLACE INTO kv_store (key, value, updated_at)
         VALUES (?, ?, datetime('now'))",
        params![key, value],
      )
      .map_err(|e| eyre!("Failed to write key {}: {}", key, e))?;
    Ok(())
  }

  fn remove(&self, key: &str) -> Result<()> {
    let conn = self.db.conn()?;
    conn
      .execute("DELETE FROM kv_store WHERE key = ?", params![key])
      .map_err(|e| eyre!("Failed to remove key {}: {}", key, e))?;
    Ok(())
  }

  fn keys_with_prefix(&self, prefix: &str) -> Result<Vec<String>> {
    let conn = self.db.conn()?;
    let mut stmt = conn
      .prepare("SELECT key FROM kv_store WHERE substr(key, 1, length(?1)) = ?1 ORDER BY key")
      .map_err(|e| eyre!("Failed to prepare key query: {}", e))?;

    let keys = stmt
      .query_map(params![prefix], |row| row.get::<_, String>(0))
      .map_err(|e| eyre!("Failed to list keys: {}", e))?
      .filter_map(|r| r.ok())
      .collect();

    Ok(keys)
  }
}

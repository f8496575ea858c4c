//! Cache storage trait and SQLite implementation.

use color_eyre::{eyre::eyre, Result};
use rusqlite::{params, OptionalExtension};

use crate::db::Database;
use crate::http::{Headers, Response, ResponseType};

/// Named caches of response snapshots, in the manner of the platform's
/// `CacheStorage`.
pub trait CacheStorage: Send + Sync {
  /// Create the named cache if it does not exist.
  fn open(&self, name: &str) -> Result<()>;

  fn has(&self, name: &str) -> Result<bool>;

  /// Delete a cache and every entry in it. Returns whether it existed.
  fn delete(&self, name: &str) -> Result<bool>;

  /// Names of all caches, sorted.
  fn names(&self) -> Result<Vec<String>>;

  /// Look up a stored response.
  fn match_entry(&self, name: &str, key: &str) -> Result<Option<Response>>;

  /// Store a response, overwriting any previous entry for the key.
  fn put(&self, name: &str, key: &str, response: &Response) -> Result<()>;

  /// Request keys stored in a cache, sorted.
  fn keys(&self, name: &str) -> Result<Vec<String>>;
}

/// Storage implementation that doesn't cache anything.
/// Used when the runtime offers no persistent storage.
pub struct NoopCacheStorage;

impl CacheStorage for NoopCacheStorage {
  fn open(&self, _name: &str) -> Result<()> {
    Ok(())
  }

  fn has(&self, _name: &str) -> Result<bool> {
    Ok(false)
  }

  fn delete(&self, _name: &str) -> Result<bool> {
    Ok(false)
  }

  fn names(&self) -> Result<Vec<String>> {
    Ok(Vec::new())
  }

  fn match_entry(&self, _name: &str, _key: &str) -> Result<Option<Response>> {
    Ok(None) // Always miss
  }

  fn put(&self, _name: &str, _key: &str, _response: &Response) -> Result<()> {
    Ok(()) // Discard
  }

  fn keys(&self, _name: &str) -> Result<Vec<String>> {
    Ok(Vec::new())
  }
}

/// SQLite-based cache storage implementation.
#[derive(Clone)]
pub struct SqliteCacheStorage {
  db: Database,
}

impl SqliteCacheStorage {
  pub fn new(db: Database) -> Self {
    Self { db }
  }
}

impl CacheStorage for SqliteCacheStorage {
  fn open(&self, name: &str) -> Result<()> {
    let conn = self.db.conn()?;
    conn
      .execute(
        "INSERT OR IGNORE INTO cache_names (name, created_at) VALUES (?, datetime('now'))",
        params![name],
      )
      .map_err(|e| eyre!("Failed to open cache {}: {}", name, e))?;
    Ok(())
  }

  fn has(&self, name: &str) -> Result<bool> {
    let conn = self.db.conn()?;
    let found: Option<i64> = conn
      .query_row(
        "SELECT 1 FROM cache_names WHERE name = ?",
        params![name],
        |row| row.get(0),
      )
      .optional()
      .map_err(|e| eyre!("Failed to look up cache {}: {}", name, e))?;
    Ok(found.is_some())
  }

  fn delete(&self, name: &str) -> Result<bool> {
    let mut conn = self.db.conn()?;

    // Rolled back on drop if either statement fails
    let tx = conn
      .transaction()
      .map_err(|e| eyre!("Failed to begin transaction: {}", e))?;

    tx.execute(
      "DELETE FROM cache_entries WHERE cache_name = ?",
      params![name],
    )
    .map_err(|e| eyre!("Failed to delete entries of {}: {}", name, e))?;

    let removed = tx
      .execute("DELETE FROM cache_names WHERE name = ?", params![name])
      .map_err(|e| eyre!("Failed to delete cache {}: {}", name, e))?;

    tx.commit()
      .map_err(|e| eyre!("Failed to commit transaction: {}", e))?;

    Ok(removed > 0)
  }

  fn names(&self) -> Result<Vec<String>> {
    let conn = self.db.conn()?;
    let mut stmt = conn
      .prepare("SELECT name FROM cache_names ORDER BY name")
      .map_err(|e| eyre!("Failed to prepare query: {}", e))?;

    let names = stmt
      .query_map([], |row| row.get::<_, String>(0))
      .map_err(|e| eyre!("Failed to list caches: {}", e))?
      .filter_map(|r| r.ok())
      .collect();

    Ok(names)
  }

  fn match_entry(&self, name: &str, key: &str) -> Result<Option<Response>> {
    let conn = self.db.conn()?;
    let mut stmt = conn
      .prepare(
        "SELECT status, response_type, headers, body FROM cache_entries
         WHERE cache_name = ? AND request_key = ?",
      )
      .map_err(|e| eyre!("Failed to prepare query: {}", e))?;

    let row: Option<(u16, String, String, Vec<u8>)> = stmt
      .query_row(params![name, key], |row| {
        Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?))
      })
      .optional()
      .map_err(|e| eyre!("Failed to read cache entry {}: {}", key, e))?;

    match row {
      Some((status, response_type, headers, body)) => {
        let headers: Headers = serde_json::from_str(&headers)
          .map_err(|e| eyre!("Failed to deserialize headers of {}: {}", key, e))?;
        Ok(Some(Response {
          status,
          response_type: ResponseType::parse(&response_type),
          headers,
          body,
        }))
      }
      None => Ok(None),
    }
  }

  fn put(&self, name: &str, key: &str, response: &Response) -> Result<()> {
    let conn = self.db.conn()?;
    let headers = serde_json::to_string(&response.headers)
      .map_err(|e| eyre!("Failed to serialize headers: {}", e))?;

    conn
      .execute(
        "INSERT OR IGNORE INTO cache_names (name, created_at) VALUES (?, datetime('now'))",
        params![name],
      )
      .map_err(|e| eyre!("Failed to open cache {}: {}", name, e))?;

    conn
      .execute(
        "INSERT OR REPLACE INTO cache_entries
           (cache_name, request_key, status, response_type, headers, body, cached_at)
         VALUES (?, ?, ?, ?, ?, ?, datetime('now'))",
        params![
          name,
          key,
          response.status,
          response.response_type.as_str(),
          headers,
          response.body
        ],
      )
      .map_err(|e| eyre!("Failed to store cache entry {}: {}", key, e))?;

    Ok(())
  }

  fn keys(&self, name: &str) -> Result<Vec<String>> {
    let conn = self.db.conn()?;
    let mut stmt = conn
      .prepare("SELECT request_key FROM cache_entries WHERE cache_name = ? ORDER BY request_key")
      .map_err(|e| eyre!("Failed to prepare query: {}", e))?;

    let keys = stmt
      .query_map(params![name], |row| row.get::<_, String>(0))
      .map_err(|e| eyre!("Failed to list cache keys: {}", e))?
      .filter_map(|r| r.ok())
      .collect();

    Ok(keys)
  }
}

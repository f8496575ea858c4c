//! JSON (de)serialization and key namespacing over a `KeyValueBackend`.

use color_eyre::{eyre::eyre, Result};
use serde::{de::DeserializeOwned, Serialize};
use std::sync::Arc;
use tracing::warn;

use super::backend::KeyValueBackend;

/// A namespaced view over a shared backend.
///
/// Keys are `{namespace}:{name}`. Components get disjoint namespaces via
/// `scope`, which is how collisions are avoided.
#[derive(Clone)]
pub struct JsonStore {
  backend: Arc<dyn KeyValueBackend>,
  namespace: String,
}

impl JsonStore {
  pub fn new(backend: Arc<dyn KeyValueBackend>, namespace: impl Into<String>) -> Self {
    Self {
      backend,
      namespace: namespace.into(),
    }
  }

  /// Child store under `{namespace}:{scope}`.
  pub fn scope(&self, scope: &str) -> Self {
    Self {
      backend: Arc::clone(&self.backend),
      namespace: format!("{}:{}", self.namespace, scope),
    }
  }

  pub fn namespace(&self) -> &str {
    &self.namespace
  }

  /// Full backend key for `name`.
  pub fn key(&self, name: &str) -> String {
    format!("{}:{}", self.namespace, name)
  }

  /// Read and deserialize a value.
  ///
  /// Unreadable or malformed values are logged and reported as absent.
  pub fn read<T: DeserializeOwned>(&self, name: &str) -> Option<T> {
    let key = self.key(name);
    let raw = match self.backend.get(&key) {
      Ok(raw) => raw?,
      Err(e) => {
        warn!(key = %key, error = %e, "store read failed");
        return None;
      }
    };

    match serde_json::from_str(&raw) {
      Ok(value) => Some(value),
      Err(e) => {
        warn!(key = %key, error = %e, "discarding malformed stored value");
        None
      }
    }
  }

  /// Read a list, treating absent or corrupt data as empty.
  pub fn read_list<T: DeserializeOwned>(&self, name: &str) -> Vec<T> {
    self.read(name).unwrap_or_default()
  }

  pub fn write<T: Serialize + ?Sized>(&self, name: &str, value: &T) -> Result<()> {
    let key = self.key(name);
    let raw =
      serde_json::to_string(value).map_err(|e| eyre!("Failed to serialize {}: {}", key, e))?;
    self.backend.set(&key, &raw)
  }

  pub fn remove(&self, name: &str) -> Result<()> {
    self.backend.remove(&self.key(name))
  }

  /// Read a list once and delete it, whatever its contents were.
  pub fn take_list<T: DeserializeOwned>(&self, name: &str) -> Vec<T> {
    let list = self.read_list(name);
    if let Err(e) = self.remove(name) {
      warn!(key = %self.key(name), error = %e, "failed to clear consumed list");
    }
    list
  }

  /// Names (without the namespace) of every key in this store.
  pub fn names(&self) -> Result<Vec<String>> {
    let prefix = format!("{}:", self.namespace);
    Ok(
      self
        .backend
        .keys_with_prefix(&prefix)?
        .into_iter()
        .map(|k| k[prefix.len()..].to_string())
        .collect(),
    )
  }
}

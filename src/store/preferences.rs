use color_eyre::Result;
use serde::{de::DeserializeOwned, Serialize};

use super::JsonStore;

/// User preferences stored under the `prefs` scope of the shared store.
#[derive(Clone)]
pub struct Preferences {
  store: JsonStore,
}

impl Preferences {
  pub fn new(root: &JsonStore) -> Self {
    Self {
      store: root.scope("prefs"),
    }
  }

  pub fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
    self.store.read(key)
  }

  pub fn set<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> Result<()> {
    self.store.write(key, value)
  }

  pub fn remove(&self, key: &str) -> Result<()> {
    self.store.remove(key)
  }

  pub fn keys(&self) -> Result<Vec<String>> {
    self.store.names()
  }
}

use color_eyre::{eyre::eyre, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

use crate::notify::NotificationKind;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
  /// Base URL of the library server; relative request paths resolve against it
  pub api_url: String,
  /// Path prefix that marks REST API requests (network-first, api cache)
  pub api_prefix: String,
  pub cache: CacheConfig,
  pub network: NetworkConfig,
  pub notifications: NotificationConfig,
  pub storage: StorageConfig,
}

impl Default for Config {
  fn default() -> Self {
    Self {
      api_url: "http://localhost:8080/".to_string(),
      api_prefix: "/api/".to_string(),
      cache: CacheConfig::default(),
      network: NetworkConfig::default(),
      notifications: NotificationConfig::default(),
      storage: StorageConfig::default(),
    }
  }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
  /// Leading part of every cache generation name
  pub prefix: String,
  /// Bumped manually to force a new generation without touching the manifest
  pub version: String,
  /// Critical assets fetched on install
  pub precache: Vec<String>,
  /// Document served to page navigations when nothing else is available
  pub offline_page: Option<String>,
  /// Path extensions served cache-first (lowercase, without the dot)
  #[serde(deserialize_with = "deserialize_lowercase_list")]
  pub static_extensions: Vec<String>,
}

impl Default for CacheConfig {
  fn default() -> Self {
    Self {
      prefix: "shelf".to_string(),
      version: "v1".to_string(),
      precache: vec![
        "/".to_string(),
        "/offline.html".to_string(),
        "/static/css/style.css".to_string(),
        "/static/js/app.js".to_string(),
        "/static/js/notifications.js".to_string(),
        "/static/manifest.json".to_string(),
      ],
      offline_page: Some("/offline.html".to_string()),
      static_extensions: [
        "js", "css", "png", "jpg", "jpeg", "gif", "svg", "ico", "webp", "woff", "woff2", "ttf",
        "eot",
      ]
      .iter()
      .map(|s| s.to_string())
      .collect(),
    }
  }
}

fn deserialize_lowercase_list<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
  D: serde::Deserializer<'de>,
{
  let v: Vec<String> = Vec::deserialize(deserializer)?;
  Ok(
    v.into_iter()
      .map(|s| s.trim_start_matches('.').to_lowercase())
      .collect(),
  )
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
  /// Per-request timeout when the caller supplies none
  pub timeout_ms: u64,
  /// How often `watch` probes the server for connectivity
  pub probe_interval_ms: u64,
}

impl Default for NetworkConfig {
  fn default() -> Self {
    Self {
      timeout_ms: 10_000,
      probe_interval_ms: 5_000,
    }
  }
}

impl NetworkConfig {
  pub fn timeout(&self) -> Duration {
    Duration::from_millis(self.timeout_ms)
  }

  pub fn probe_interval(&self) -> Duration {
    Duration::from_millis(self.probe_interval_ms.max(250))
  }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct NotificationConfig {
  pub success_ms: u64,
  pub error_ms: u64,
  pub warning_ms: u64,
  pub info_ms: u64,
}

impl Default for NotificationConfig {
  fn default() -> Self {
    Self {
      success_ms: 3_000,
      error_ms: 5_000,
      warning_ms: 4_000,
      info_ms: 3_000,
    }
  }
}

impl NotificationConfig {
  pub fn duration_for(&self, kind: NotificationKind) -> u64 {
    match kind {
      NotificationKind::Success => self.success_ms,
      NotificationKind::Error => self.error_ms,
      NotificationKind::Warning => self.warning_ms,
      NotificationKind::Info => self.info_ms,
    }
  }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
  /// Shared prefix for every persisted key
  pub namespace: String,
  /// Database location (defaults to the user data directory)
  pub path: Option<PathBuf>,
  /// When false, nothing is persisted and caching is a no-op
  pub enabled: bool,
}

impl Default for StorageConfig {
  fn default() -> Self {
    Self {
      namespace: "shelf".to_string(),
      path: None,
      enabled: true,
    }
  }
}

impl StorageConfig {
  /// Resolve the database path, falling back to the data directory.
  pub fn database_path(&self) -> Result<PathBuf> {
    if let Some(path) = &self.path {
      return Ok(path.clone());
    }
    Ok(data_dir()?.join("offline.db"))
  }
}

/// Per-user data directory for the database and log file.
pub fn data_dir() -> Result<PathBuf> {
  let data_dir = dirs::data_dir()
    .or_else(|| dirs::home_dir().map(|p| p.join(".local/share")))
    .ok_or_else(|| eyre!("Could not determine data directory"))?;

  Ok(data_dir.join("shelf-offline"))
}

impl Config {
  /// Load configuration from file.
  ///
  /// Search order:
  /// 1. Explicit path if provided (must exist)
  /// 2. ./shelf-offline.yaml (current directory)
  /// 3. $XDG_CONFIG_HOME/shelf-offline/config.yaml
  ///
  /// Without any file the defaults are used.
  pub fn load(explicit_path: Option<&Path>) -> Result<Self> {
    let path = if let Some(p) = explicit_path {
      if p.exists() {
        Some(p.to_path_buf())
      } else {
        return Err(eyre!("Config file not found: {}", p.display()));
      }
    } else {
      Self::find_config_file()
    };

    match path {
      Some(p) => Self::load_from_path(&p),
      None => {
        debug!("no config file found, using defaults");
        Ok(Self::default())
      }
    }
  }

  fn find_config_file() -> Option<PathBuf> {
    let local = PathBuf::from("shelf-offline.yaml");
    if local.exists() {
      return Some(local);
    }

    if let Some(config_dir) = dirs::config_dir() {
      let xdg_path = config_dir.join("shelf-offline").join("config.yaml");
      if xdg_path.exists() {
        return Some(xdg_path);
      }
    }

    None
  }

  fn load_from_path(path: &Path) -> Result<Self> {
    let contents = std::fs::read_to_string(path)
      .map_err(|e| eyre!("Failed to read config file {}: {}", path.display(), e))?;

    Self::from_yaml(&contents)
      .map_err(|e| eyre!("Failed to parse config file {}: {}", path.display(), e))
  }

  pub fn from_yaml(contents: &str) -> Result<Self> {
    let config: Config = serde_yaml::from_str(contents)?;
    Ok(config)
  }
}

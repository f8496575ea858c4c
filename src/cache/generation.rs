//! Versioned cache namespaces.

use sha2::{Digest, Sha256};
use std::fmt;

use crate::config::CacheConfig;

/// Resource class a cache generation holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CacheKind {
  Static,
  Dynamic,
  Api,
}

impl CacheKind {
  pub const ALL: [CacheKind; 3] = [CacheKind::Static, CacheKind::Dynamic, CacheKind::Api];

  pub fn as_str(self) -> &'static str {
    match self {
      CacheKind::Static => "static",
      CacheKind::Dynamic => "dynamic",
      CacheKind::Api => "api",
    }
  }
}

impl fmt::Display for CacheKind {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

/// One named cache. Superseded wholesale, never patched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheGeneration {
  pub name: String,
  pub kind: CacheKind,
}

/// The active generation of each kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Generations {
  version: String,
  current: [CacheGeneration; 3],
}

impl Generations {
  pub fn new(prefix: &str, version: &str) -> Self {
    let current = CacheKind::ALL.map(|kind| CacheGeneration {
      name: format!("{}-{}-{}", prefix, kind, version),
      kind,
    });
    Self {
      version: version.to_string(),
      current,
    }
  }

  /// Generations for a configuration. The version embeds a digest of the
  /// precache manifest, so editing the manifest rotates every generation.
  pub fn from_config(config: &CacheConfig) -> Self {
    Self::new(
      &config.prefix,
      &manifest_version(&config.version, &config.precache),
    )
  }

  pub fn version(&self) -> &str {
    &self.version
  }

  pub fn for_kind(&self, kind: CacheKind) -> &CacheGeneration {
    match kind {
      CacheKind::Static => &self.current[0],
      CacheKind::Dynamic => &self.current[1],
      CacheKind::Api => &self.current[2],
    }
  }

  pub fn iter(&self) -> impl Iterator<Item = &CacheGeneration> {
    self.current.iter()
  }

  pub fn is_current(&self, name: &str) -> bool {
    self.current.iter().any(|g| g.name == name)
  }
}

fn manifest_version(version: &str, manifest: &[String]) -> String {
  let mut hasher = Sha256::new();
  for entry in manifest {
    hasher.update(entry.as_bytes());
    hasher.update(b"\n");
  }
  let digest = hex::encode(hasher.finalize());
  format!("{}-{}", version, &digest[..8])
}

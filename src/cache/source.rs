//! Served responses and where they came from.

use crate::http::Response;

/// Indicates where a served response came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheSource {
  /// Fresh response from the network
  Network,
  /// Stored entry (cache-first hit, or network-first fallback)
  Cache,
  /// Network and cache both failed; the offline placeholder was served
  OfflinePage,
  /// Request bypassed the cache entirely (non-GET or non-http)
  Passthrough,
}

impl CacheSource {
  pub fn as_str(self) -> &'static str {
    match self {
      CacheSource::Network => "network",
      CacheSource::Cache => "cache",
      CacheSource::OfflinePage => "offline-page",
      CacheSource::Passthrough => "passthrough",
    }
  }
}

/// Result from the cache engine, including the response and its source.
#[derive(Debug, Clone)]
pub struct Served {
  pub response: Response,
  pub source: CacheSource,
}

impl Served {
  pub fn from_network(response: Response) -> Self {
    Self {
      response,
      source: CacheSource::Network,
    }
  }

  pub fn from_cache(response: Response) -> Self {
    Self {
      response,
      source: CacheSource::Cache,
    }
  }

  pub fn offline_page(response: Response) -> Self {
    Self {
      response,
      source: CacheSource::OfflinePage,
    }
  }

  pub fn passthrough(response: Response) -> Self {
    Self {
      response,
      source: CacheSource::Passthrough,
    }
  }
}

//! Request classification.

use std::collections::HashSet;
use url::Url;

use super::generation::CacheKind;
use crate::http::{Method, Request};

/// Which source is consulted first.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
  CacheFirst,
  NetworkFirst,
}

/// Outcome of classifying a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Route {
  pub strategy: Strategy,
  pub kind: CacheKind,
  /// Page navigation; may fall back to the offline placeholder.
  pub document: bool,
}

/// Maps requests to a strategy and cache generation.
#[derive(Debug, Clone)]
pub struct Router {
  api_prefix: String,
  static_extensions: HashSet<String>,
}

impl Router {
  pub fn new(api_prefix: &str, static_extensions: &[String]) -> Self {
    Self {
      api_prefix: api_prefix.to_string(),
      static_extensions: static_extensions.iter().map(|e| e.to_lowercase()).collect(),
    }
  }

  /// The URL to cache under, or `None` if the request must bypass the cache
  /// (non-GET, unparseable, or not http/https).
  pub fn cache_key(request: &Request) -> Option<Url> {
    if request.method != Method::Get {
      return None;
    }
    let mut url = Url::parse(&request.url).ok()?;
    if !matches!(url.scheme(), "http" | "https") {
      return None;
    }
    url.set_fragment(None);
    Some(url)
  }

  /// First match wins: API prefix, static extension, HTML accept, default.
  pub fn classify(&self, url: &Url, request: &Request) -> Route {
    let path = url.path();
    let document = request.accepts_html();

    let (strategy, kind) = if path.starts_with(&self.api_prefix) {
      (Strategy::NetworkFirst, CacheKind::Api)
    } else if self.is_static_asset(path) {
      (Strategy::CacheFirst, CacheKind::Static)
    } else {
      // HTML navigations and the default share the dynamic generation
      (Strategy::NetworkFirst, CacheKind::Dynamic)
    };

    Route {
      strategy,
      kind,
      document,
    }
  }

  fn is_static_asset(&self, path: &str) -> bool {
    let file = path.rsplit('/').next().unwrap_or_default();
    match file.rsplit_once('.') {
      Some((stem, ext)) if !stem.is_empty() => {
        self.static_extensions.contains(&ext.to_ascii_lowercase())
      }
      _ => false,
    }
  }
}

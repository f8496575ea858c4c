//! Cache engine that applies a strategy per request class.

use color_eyre::{eyre::eyre, Result};
use futures::future::join_all;
use std::sync::Arc;
use tracing::{debug, info, warn};
use url::Url;

use super::generation::{CacheKind, Generations};
use super::route::{Route, Router, Strategy};
use super::source::Served;
use super::storage::CacheStorage;
use crate::config::Config;
use crate::http::{FetchError, Network, Request, Response};

/// Outcome of priming the static generation.
#[derive(Debug, Clone, Default)]
pub struct InstallReport {
  pub generation: String,
  pub cached: Vec<String>,
  /// Manifest entries that could not be cached, with the reason
  pub skipped: Vec<(String, String)>,
}

/// Outcome of deleting stale generations.
#[derive(Debug, Clone, Default)]
pub struct ActivationReport {
  pub current: Vec<String>,
  pub deleted: Vec<String>,
}

/// Interposes on outgoing requests and serves them cache-first or
/// network-first against the current generations.
///
/// The engine never retries; a request with neither network nor fallback
/// resolves to the fetch error.
#[derive(Clone)]
pub struct CacheEngine {
  storage: Arc<dyn CacheStorage>,
  network: Arc<dyn Network>,
  generations: Generations,
  router: Router,
  /// Absolute URLs fetched on install
  precache: Vec<String>,
  /// Absolute URL of the offline placeholder document
  offline_page: Option<String>,
}

impl CacheEngine {
  pub fn new(
    config: &Config,
    storage: Arc<dyn CacheStorage>,
    network: Arc<dyn Network>,
  ) -> Result<Self> {
    let base = Url::parse(&config.api_url)
      .map_err(|e| eyre!("Invalid api_url {}: {}", config.api_url, e))?;
    let resolve = |path: &str| {
      base
        .join(path)
        .map(String::from)
        .map_err(|e| eyre!("Invalid cache path {}: {}", path, e))
    };

    let mut precache = config
      .cache
      .precache
      .iter()
      .map(|p| resolve(p.as_str()))
      .collect::<Result<Vec<_>>>()?;
    let offline_page = config
      .cache
      .offline_page
      .as_deref()
      .map(resolve)
      .transpose()?;

    // The placeholder is only ever served from the static generation
    if let Some(page) = &offline_page {
      if !precache.contains(page) {
        precache.push(page.clone());
      }
    }

    Ok(Self {
      storage,
      network,
      generations: Generations::from_config(&config.cache),
      router: Router::new(&config.api_prefix, &config.cache.static_extensions),
      precache,
      offline_page,
    })
  }

  pub fn generations(&self) -> &Generations {
    &self.generations
  }

  pub fn storage(&self) -> &Arc<dyn CacheStorage> {
    &self.storage
  }

  /// Serve a request.
  pub async fn handle(&self, request: &Request) -> Result<Served, FetchError> {
    let Some(url) = Router::cache_key(request) else {
      return self
        .network
        .fetch(request)
        .await
        .map(Served::passthrough);
    };

    let route = self.router.classify(&url, request);
    let key = url.as_str();
    debug!(url = %key, ?route, "intercepted");

    match route.strategy {
      Strategy::CacheFirst => self.cache_first(request, key, route).await,
      Strategy::NetworkFirst => self.network_first(request, key, route).await,
    }
  }

  /// 1. Stored entry present - return it without touching the network
  /// 2. Otherwise fetch, store a qualifying response, return it
  /// 3. On network failure, offline placeholder for documents, else the error
  async fn cache_first(
    &self,
    request: &Request,
    key: &str,
    route: Route,
  ) -> Result<Served, FetchError> {
    let cache_name = &self.generations.for_kind(route.kind).name;

    if let Some(cached) = self.lookup(cache_name, key) {
      return Ok(Served::from_cache(cached));
    }

    match self.network.fetch(request).await {
      Ok(response) => {
        self.store(cache_name, key, &response);
        Ok(Served::from_network(response))
      }
      Err(e) => self.offline_fallback(route, e),
    }
  }

  /// 1. Always try the network; store (overwrite) a qualifying response
  /// 2. On network failure, the stored entry for the key
  /// 3. Then the offline placeholder for documents, else the error
  async fn network_first(
    &self,
    request: &Request,
    key: &str,
    route: Route,
  ) -> Result<Served, FetchError> {
    let cache_name = &self.generations.for_kind(route.kind).name;

    match self.network.fetch(request).await {
      Ok(response) => {
        self.store(cache_name, key, &response);
        Ok(Served::from_network(response))
      }
      Err(e) => {
        if let Some(cached) = self.lookup(cache_name, key) {
          debug!(url = %key, error = %e, "network failed, serving cached entry");
          return Ok(Served::from_cache(cached));
        }
        self.offline_fallback(route, e)
      }
    }
  }

  fn offline_fallback(&self, route: Route, error: FetchError) -> Result<Served, FetchError> {
    if route.document {
      if let Some(page) = &self.offline_page {
        let static_cache = &self.generations.for_kind(CacheKind::Static).name;
        if let Some(placeholder) = self.lookup(static_cache, page) {
          return Ok(Served::offline_page(placeholder));
        }
      }
    }
    Err(error)
  }

  fn lookup(&self, cache_name: &str, key: &str) -> Option<Response> {
    match self.storage.match_entry(cache_name, key) {
      Ok(hit) => hit,
      Err(e) => {
        warn!(cache = %cache_name, url = %key, error = %e, "cache read failed");
        None
      }
    }
  }

  /// Store a clone of a qualifying response. Write failures are swallowed;
  /// the caller still gets the response.
  fn store(&self, cache_name: &str, key: &str, response: &Response) {
    if !response.is_cacheable() {
      return;
    }
    if let Err(e) = self.storage.put(cache_name, key, response) {
      warn!(cache = %cache_name, url = %key, error = %e, "cache write failed");
    }
  }

  /// Fetch the precache manifest into the static generation.
  ///
  /// Entries that fail are logged and skipped; they never abort the install.
  pub async fn install(&self) -> Result<InstallReport> {
    let cache_name = self.generations.for_kind(CacheKind::Static).name.clone();
    self.storage.open(&cache_name)?;

    let fetches = self.precache.iter().map(|url| async move {
      let result = self.network.fetch(&Request::get(url.as_str())).await;
      (url, result)
    });
    let results = join_all(fetches).await;

    let mut report = InstallReport {
      generation: cache_name.clone(),
      ..Default::default()
    };

    for (url, result) in results {
      let outcome = match result {
        Ok(response) if response.is_cacheable() => self
          .storage
          .put(&cache_name, url, &response)
          .map_err(|e| e.to_string()),
        Ok(response) => Err(format!("status {}", response.status)),
        Err(e) => Err(e.to_string()),
      };

      match outcome {
        Ok(()) => report.cached.push(url.clone()),
        Err(reason) => {
          warn!(url = %url, reason = %reason, "skipping precache entry");
          report.skipped.push((url.clone(), reason));
        }
      }
    }

    info!(
      generation = %cache_name,
      cached = report.cached.len(),
      skipped = report.skipped.len(),
      "installed"
    );
    Ok(report)
  }

  /// Make the current generations the only ones present.
  pub async fn activate(&self) -> Result<ActivationReport> {
    let report = self.cleanup_stale_generations()?;
    info!(deleted = report.deleted.len(), "activated");
    Ok(report)
  }

  /// Ensure the three current caches exist and delete every other cache.
  /// Running it twice in a row changes nothing the second time.
  pub fn cleanup_stale_generations(&self) -> Result<ActivationReport> {
    let mut report = ActivationReport::default();

    for generation in self.generations.iter() {
      self.storage.open(&generation.name)?;
      report.current.push(generation.name.clone());
    }

    for name in self.storage.names()? {
      if self.generations.is_current(&name) {
        continue;
      }
      if self.storage.delete(&name)? {
        info!(cache = %name, "deleted stale cache generation");
        report.deleted.push(name);
      }
    }

    Ok(report)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::cache::{CacheSource, SqliteCacheStorage};
  use crate::db::Database;
  use crate::testing::FakeNetwork;

  const BASE: &str = "http://localhost:8080";

  fn config() -> Config {
    let mut config = Config::default();
    config.api_url = format!("{}/", BASE);
    config.cache.precache = vec![
      "/".to_string(),
      "/offline.html".to_string(),
      "/static/css/style.css".to_string(),
    ];
    config
  }

  fn engine_with(
    storage: Arc<dyn CacheStorage>,
  ) -> (CacheEngine, Arc<FakeNetwork>) {
    let network = Arc::new(FakeNetwork::new());
    let engine = CacheEngine::new(&config(), storage, network.clone()).unwrap();
    (engine, network)
  }

  fn engine() -> (CacheEngine, Arc<FakeNetwork>, Arc<SqliteCacheStorage>) {
    let storage = Arc::new(SqliteCacheStorage::new(Database::in_memory().unwrap()));
    let (engine, network) = engine_with(storage.clone());
    (engine, network, storage)
  }

  fn url(path: &str) -> String {
    format!("{}{}", BASE, path)
  }

  fn html(path: &str) -> Request {
    Request::get(url(path)).with_header("accept", "text/html,application/xhtml+xml")
  }

  #[tokio::test]
  async fn test_static_asset_served_from_cache_without_network() {
    let (engine, network, _) = engine();
    let asset = url("/static/js/app.js");
    network.respond(&asset, Response::ok("console.log(1)"));

    let first = engine.handle(&Request::get(asset.as_str())).await.unwrap();
    assert_eq!(first.source, CacheSource::Network);

    network.set_offline(true);
    for _ in 0..3 {
      let again = engine.handle(&Request::get(asset.as_str())).await.unwrap();
      assert_eq!(again.source, CacheSource::Cache);
      assert_eq!(again.response.text(), "console.log(1)");
    }
    assert_eq!(network.call_count(&asset), 1);
  }

  #[tokio::test]
  async fn test_api_network_first_returns_fresh_and_updates_cache() {
    let (engine, network, storage) = engine();
    let api = url("/api/series");
    let api_cache = engine.generations().for_kind(CacheKind::Api).name.clone();

    network.respond(&api, Response::ok("[1]"));
    engine.handle(&Request::get(api.as_str())).await.unwrap();

    network.respond(&api, Response::ok("[1,2]"));
    let served = engine.handle(&Request::get(api.as_str())).await.unwrap();

    assert_eq!(served.source, CacheSource::Network);
    assert_eq!(served.response.text(), "[1,2]");
    let stored = storage.match_entry(&api_cache, &api).unwrap().unwrap();
    assert_eq!(stored.text(), "[1,2]");
  }

  #[tokio::test]
  async fn test_api_falls_back_to_cache_when_offline() {
    let (engine, network, _) = engine();
    let api = url("/api/authors");
    network.respond(&api, Response::ok("[\"le guin\"]"));
    engine.handle(&Request::get(api.as_str())).await.unwrap();

    network.set_offline(true);
    let served = engine.handle(&Request::get(api.as_str())).await.unwrap();
    assert_eq!(served.source, CacheSource::Cache);
    assert_eq!(served.response.text(), "[\"le guin\"]");
  }

  #[tokio::test]
  async fn test_non_200_responses_are_returned_but_not_cached() {
    let (engine, network, storage) = engine();
    let api = url("/api/series/9");
    let api_cache = engine.generations().for_kind(CacheKind::Api).name.clone();

    network.respond(&api, Response::new(404, "missing"));
    let served = engine.handle(&Request::get(api.as_str())).await.unwrap();
    assert_eq!(served.response.status, 404);
    assert!(storage.match_entry(&api_cache, &api).unwrap().is_none());

    network.respond(
      &api,
      Response::ok("x").with_type(crate::http::ResponseType::Error),
    );
    engine.handle(&Request::get(api.as_str())).await.unwrap();
    assert!(storage.match_entry(&api_cache, &api).unwrap().is_none());
  }

  #[tokio::test]
  async fn test_offline_page_for_documents_only() {
    let (engine, network, _) = engine();
    network.respond(&url("/offline.html"), Response::ok("<h1>offline</h1>"));
    engine.install().await.unwrap();

    network.set_offline(true);
    let page = engine.handle(&html("/collections")).await.unwrap();
    assert_eq!(page.source, CacheSource::OfflinePage);
    assert_eq!(page.response.text(), "<h1>offline</h1>");

    let api = engine.handle(&Request::get(url("/api/collections"))).await;
    assert!(matches!(api, Err(FetchError::Unreachable(_))));

    let image = engine.handle(&Request::get(url("/static/img/cover.png"))).await;
    assert!(image.is_err());
  }

  #[tokio::test]
  async fn test_offline_page_is_primed_even_when_not_in_manifest() {
    let mut config = config();
    config.cache.precache = vec!["/".to_string()];
    config.cache.offline_page = Some("/fallback.html".to_string());

    let network = Arc::new(FakeNetwork::new());
    let storage = Arc::new(SqliteCacheStorage::new(Database::in_memory().unwrap()));
    let engine = CacheEngine::new(&config, storage, network.clone()).unwrap();
    network.respond(&url("/"), Response::ok("home"));
    network.respond(&url("/fallback.html"), Response::ok("offline"));

    let report = engine.install().await.unwrap();
    assert_eq!(report.cached, vec![url("/"), url("/fallback.html")]);

    network.set_offline(true);
    let page = engine.handle(&html("/authors")).await.unwrap();
    assert_eq!(page.source, CacheSource::OfflinePage);
    assert_eq!(page.response.text(), "offline");
  }

  #[tokio::test]
  async fn test_listed_offline_page_is_fetched_once() {
    let (engine, network, _) = engine();
    network.respond_all(Response::ok("x"));

    engine.install().await.unwrap();
    assert_eq!(network.call_count(&url("/offline.html")), 1);
  }

  #[tokio::test]
  async fn test_document_prefers_its_own_cached_copy_over_placeholder() {
    let (engine, network, _) = engine();
    network.respond(&url("/offline.html"), Response::ok("offline"));
    network.respond(&url("/authors"), Response::ok("authors page"));
    engine.install().await.unwrap();
    engine.handle(&html("/authors")).await.unwrap();

    network.set_offline(true);
    let served = engine.handle(&html("/authors")).await.unwrap();
    assert_eq!(served.source, CacheSource::Cache);
    assert_eq!(served.response.text(), "authors page");
  }

  #[tokio::test]
  async fn test_non_get_bypasses_cache() {
    let (engine, network, storage) = engine();
    let api = url("/api/series");
    network.respond(&api, Response::new(201, "created"));

    let request = Request::new(crate::http::Method::Post, api.as_str()).with_body("{}");
    let served = engine.handle(&request).await.unwrap();
    assert_eq!(served.source, CacheSource::Passthrough);
    for name in storage.names().unwrap() {
      assert!(storage.keys(&name).unwrap().is_empty());
    }
  }

  #[tokio::test]
  async fn test_timeout_counts_as_network_failure() {
    let (engine, network, _) = engine();
    let api = url("/api/rootfolders");
    network.respond(&api, Response::ok("[]"));
    engine.handle(&Request::get(api.as_str())).await.unwrap();

    network.fail(&api, FetchError::Timeout(50));
    let served = engine
      .handle(&Request::get(api.as_str()).with_timeout(std::time::Duration::from_millis(50)))
      .await
      .unwrap();
    assert_eq!(served.source, CacheSource::Cache);
  }

  #[tokio::test]
  async fn test_cache_write_failure_still_returns_response() {
    let (engine, network) = engine_with(Arc::new(crate::testing::FullCacheStorage));
    let api = url("/api/series");
    network.respond(&api, Response::ok("[]"));

    let served = engine.handle(&Request::get(api.as_str())).await.unwrap();
    assert_eq!(served.source, CacheSource::Network);
    assert_eq!(served.response.text(), "[]");
  }

  #[tokio::test]
  async fn test_install_skips_unreachable_manifest_entries() {
    let (engine, network, storage) = engine();
    network.respond(&url("/"), Response::ok("home"));
    network.respond(&url("/offline.html"), Response::ok("offline"));
    // /static/css/style.css is unreachable

    let report = engine.install().await.unwrap();

    assert_eq!(report.cached.len(), 2);
    assert_eq!(report.skipped.len(), 1);
    assert_eq!(report.skipped[0].0, url("/static/css/style.css"));

    let static_cache = &engine.generations().for_kind(CacheKind::Static).name;
    assert_eq!(
      storage.keys(static_cache).unwrap(),
      vec![url("/"), url("/offline.html")]
    );
  }

  #[tokio::test]
  async fn test_activation_cleanup_is_idempotent() {
    let (engine, _, storage) = engine();
    storage.put("shelf-static-v0", "k", &Response::ok("old")).unwrap();
    storage.open("unrelated").unwrap();

    let first = engine.activate().await.unwrap();
    assert_eq!(first.deleted, vec!["shelf-static-v0", "unrelated"]);

    let second = engine.activate().await.unwrap();
    assert!(second.deleted.is_empty());

    let mut expected: Vec<String> = engine
      .generations()
      .iter()
      .map(|g| g.name.clone())
      .collect();
    expected.sort();
    assert_eq!(storage.names().unwrap(), expected);
  }
}

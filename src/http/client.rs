use async_trait::async_trait;
use color_eyre::{eyre::eyre, Result};
use std::time::Duration;
use tracing::debug;
use url::Url;

use super::{FetchError, Headers, Method, Network, Request, Response, ResponseType};
use crate::config::Config;

/// reqwest-backed network used outside of tests.
#[derive(Clone)]
pub struct HttpNetwork {
  client: reqwest::Client,
  base: Url,
  default_timeout: Duration,
}

impl HttpNetwork {
  pub fn new(config: &Config) -> Result<Self> {
    let base = Url::parse(&config.api_url)
      .map_err(|e| eyre!("Invalid api_url {}: {}", config.api_url, e))?;

    let client = reqwest::Client::builder()
      .build()
      .map_err(|e| eyre!("Failed to create HTTP client: {}", e))?;

    Ok(Self {
      client,
      base,
      default_timeout: config.network.timeout(),
    })
  }

  /// Resolve a path (or absolute URL) against the configured server.
  pub fn resolve(&self, path: &str) -> Result<String> {
    self
      .base
      .join(path)
      .map(String::from)
      .map_err(|e| eyre!("Invalid request path {}: {}", path, e))
  }

  /// Cheap reachability check against the server root.
  pub async fn probe(&self) -> bool {
    let request = Request::new(Method::Head, self.base.as_str())
      .with_timeout(Duration::from_secs(3));
    self.fetch(&request).await.is_ok()
  }
}

fn to_reqwest_method(method: Method) -> reqwest::Method {
  match method {
    Method::Get => reqwest::Method::GET,
    Method::Head => reqwest::Method::HEAD,
    Method::Post => reqwest::Method::POST,
    Method::Put => reqwest::Method::PUT,
    Method::Patch => reqwest::Method::PATCH,
    Method::Delete => reqwest::Method::DELETE,
  }
}

#[async_trait]
impl Network for HttpNetwork {
  async fn fetch(&self, request: &Request) -> Result<Response, FetchError> {
    let timeout = request.timeout.unwrap_or(self.default_timeout);

    let mut builder = self
      .client
      .request(to_reqwest_method(request.method), &request.url)
      .timeout(timeout);
    for (name, value) in &request.headers {
      builder = builder.header(name.as_str(), value.as_str());
    }
    if let Some(body) = &request.body {
      builder = builder.body(body.clone());
    }

    let map_err = |e: reqwest::Error| {
      if e.is_timeout() {
        FetchError::Timeout(timeout.as_millis() as u64)
      } else if e.is_builder() {
        FetchError::InvalidRequest(e.to_string())
      } else {
        FetchError::Unreachable(e.to_string())
      }
    };

    let response = builder.send().await.map_err(map_err)?;
    let status = response.status().as_u16();
    let headers: Headers = response
      .headers()
      .iter()
      .filter_map(|(name, value)| {
        value
          .to_str()
          .ok()
          .map(|v| (name.as_str().to_ascii_lowercase(), v.to_string()))
      })
      .collect();
    let body = response.bytes().await.map_err(map_err)?;

    debug!(method = %request.method, url = %request.url, status, "fetched");

    Ok(Response {
      status,
      response_type: ResponseType::Basic,
      headers,
      body: body.to_vec(),
    })
  }
}

//! Request and response snapshots exchanged with the platform's network.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use super::FetchError;

/// HTTP method of an intercepted request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Method {
  Get,
  Head,
  Post,
  Put,
  Patch,
  Delete,
}

impl Method {
  /// Methods that change server state and may be deferred while offline.
  pub fn is_mutating(self) -> bool {
    matches!(
      self,
      Method::Post | Method::Put | Method::Patch | Method::Delete
    )
  }

  pub fn as_str(self) -> &'static str {
    match self {
      Method::Get => "GET",
      Method::Head => "HEAD",
      Method::Post => "POST",
      Method::Put => "PUT",
      Method::Patch => "PATCH",
      Method::Delete => "DELETE",
    }
  }
}

impl fmt::Display for Method {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

impl FromStr for Method {
  type Err = FetchError;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s.to_ascii_uppercase().as_str() {
      "GET" => Ok(Method::Get),
      "HEAD" => Ok(Method::Head),
      "POST" => Ok(Method::Post),
      "PUT" => Ok(Method::Put),
      "PATCH" => Ok(Method::Patch),
      "DELETE" => Ok(Method::Delete),
      other => Err(FetchError::InvalidRequest(format!(
        "unsupported method {}",
        other
      ))),
    }
  }
}

/// Header map with lowercased names.
pub type Headers = BTreeMap<String, String>;

/// An outgoing request. `url` is always absolute.
#[derive(Debug, Clone, PartialEq)]
pub struct Request {
  pub method: Method,
  pub url: String,
  pub headers: Headers,
  pub body: Option<String>,
  /// Caller-supplied deadline; expiry counts as a network failure.
  pub timeout: Option<Duration>,
}

impl Request {
  pub fn new(method: Method, url: impl Into<String>) -> Self {
    Self {
      method,
      url: url.into(),
      headers: Headers::new(),
      body: None,
      timeout: None,
    }
  }

  pub fn get(url: impl Into<String>) -> Self {
    Self::new(Method::Get, url)
  }

  pub fn with_header(mut self, name: &str, value: impl Into<String>) -> Self {
    self.headers.insert(name.to_ascii_lowercase(), value.into());
    self
  }

  pub fn with_body(mut self, body: impl Into<String>) -> Self {
    self.body = Some(body.into());
    self
  }

  pub fn with_timeout(mut self, timeout: Duration) -> Self {
    self.timeout = Some(timeout);
    self
  }

  pub fn header(&self, name: &str) -> Option<&str> {
    self
      .headers
      .get(&name.to_ascii_lowercase())
      .map(String::as_str)
  }

  /// Whether the request asks for an HTML document (a page navigation).
  pub fn accepts_html(&self) -> bool {
    self
      .header("accept")
      .is_some_and(|accept| accept.contains("text/html"))
  }
}

/// Kind of response, mirroring the platform's response types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponseType {
  Basic,
  Cors,
  Opaque,
  /// Surrogate produced for failed fetches; never cached.
  Error,
}

impl ResponseType {
  pub fn as_str(self) -> &'static str {
    match self {
      ResponseType::Basic => "basic",
      ResponseType::Cors => "cors",
      ResponseType::Opaque => "opaque",
      ResponseType::Error => "error",
    }
  }

  pub fn parse(s: &str) -> Self {
    match s {
      "cors" => ResponseType::Cors,
      "opaque" => ResponseType::Opaque,
      "error" => ResponseType::Error,
      _ => ResponseType::Basic,
    }
  }
}

/// A response snapshot. Cloning it is how a response is both cached and
/// returned.
#[derive(Debug, Clone, PartialEq)]
pub struct Response {
  pub status: u16,
  pub response_type: ResponseType,
  pub headers: Headers,
  pub body: Vec<u8>,
}

impl Response {
  pub fn new(status: u16, body: impl Into<Vec<u8>>) -> Self {
    Self {
      status,
      response_type: ResponseType::Basic,
      headers: Headers::new(),
      body: body.into(),
    }
  }

  pub fn ok(body: impl Into<Vec<u8>>) -> Self {
    Self::new(200, body)
  }

  pub fn with_type(mut self, response_type: ResponseType) -> Self {
    self.response_type = response_type;
    self
  }

  pub fn with_header(mut self, name: &str, value: impl Into<String>) -> Self {
    self.headers.insert(name.to_ascii_lowercase(), value.into());
    self
  }

  pub fn is_success(&self) -> bool {
    (200..300).contains(&self.status)
  }

  /// Only a plain 200 that is not an error surrogate may be cached.
  pub fn is_cacheable(&self) -> bool {
    self.status == 200 && self.response_type != ResponseType::Error
  }

  pub fn text(&self) -> String {
    String::from_utf8_lossy(&self.body).into_owned()
  }
}

use serde::{Deserialize, Serialize};

use crate::http::{Headers, Method, Request};

/// A mutating request captured while offline.
///
/// Field names are the persisted JSON schema.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueuedAction {
  pub url: String,
  pub method: Method,
  #[serde(default)]
  pub body: Option<String>,
  #[serde(default)]
  pub headers: Headers,
  /// Enqueue time, epoch milliseconds
  pub timestamp: i64,
}

impl QueuedAction {
  pub fn from_request(request: &Request, now_ms: i64) -> Self {
    Self {
      url: request.url.clone(),
      method: request.method,
      body: request.body.clone(),
      headers: request.headers.clone(),
      timestamp: now_ms,
    }
  }

  pub fn to_request(&self) -> Request {
    Request {
      method: self.method,
      url: self.url.clone(),
      headers: self.headers.clone(),
      body: self.body.clone(),
      timeout: None,
    }
  }

  pub fn describe(&self) -> String {
    format!("{} {}", self.method, self.url)
  }
}

//! Network boundary: request/response snapshots, the `Network` trait the
//! cache engine and mutation queue fetch through, and connectivity state.

mod client;
mod types;

pub use client::HttpNetwork;
pub use types::{Headers, Method, Request, Response, ResponseType};

use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use thiserror::Error;

/// Why a fetch produced no response.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
  #[error("request timed out after {0} ms")]
  Timeout(u64),
  #[error("network unreachable: {0}")]
  Unreachable(String),
  #[error("invalid request: {0}")]
  InvalidRequest(String),
}

/// Anything that can perform a fetch. HTTP error statuses are responses,
/// not errors.
#[async_trait]
pub trait Network: Send + Sync {
  async fn fetch(&self, request: &Request) -> Result<Response, FetchError>;
}

/// Shared online/offline flag, as reported by the runtime.
#[derive(Debug, Clone)]
pub struct Connectivity {
  online: Arc<AtomicBool>,
}

impl Connectivity {
  pub fn new(online: bool) -> Self {
    Self {
      online: Arc::new(AtomicBool::new(online)),
    }
  }

  pub fn is_online(&self) -> bool {
    self.online.load(Ordering::SeqCst)
  }

  /// Record the new state. Returns true if it changed.
  pub fn set_online(&self, online: bool) -> bool {
    self.online.swap(online, Ordering::SeqCst) != online
  }
}

impl Default for Connectivity {
  fn default() -> Self {
    Self::new(true)
  }
}

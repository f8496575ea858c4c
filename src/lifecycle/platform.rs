use async_trait::async_trait;
use color_eyre::Result;
use serde::Deserialize;
use tracing::{debug, info};

pub type ClientId = u64;

const DEFAULT_PUSH_TITLE: &str = "Shelf";

/// Decoded push payload.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct PushMessage {
  pub title: String,
  #[serde(default)]
  pub body: String,
  /// Page opened when the notification is clicked
  #[serde(default = "default_push_url")]
  pub url: String,
}

fn default_push_url() -> String {
  "/".to_string()
}

impl PushMessage {
  /// Decode a push payload. JSON objects are read field by field; anything
  /// else becomes the body of a notification with the default title.
  pub fn from_payload(data: &[u8]) -> Self {
    serde_json::from_slice(data).unwrap_or_else(|_| Self {
      title: DEFAULT_PUSH_TITLE.to_string(),
      body: String::from_utf8_lossy(data).into_owned(),
      url: default_push_url(),
    })
  }
}

/// Platform services outside the page: system notifications, window
/// clients, display mode.
#[async_trait]
pub trait Platform: Send + Sync {
  async fn show_system_notification(&self, message: &PushMessage) -> Result<()>;

  /// An open client whose URL matches, if any.
  async fn matching_client(&self, url: &str) -> Result<Option<ClientId>>;

  async fn focus_client(&self, id: ClientId) -> Result<()>;

  async fn open_window(&self, url: &str) -> Result<()>;

  /// Running as an installed app.
  fn is_standalone(&self) -> bool;

  /// A newer generation finished installing and waits for activation.
  fn has_waiting_update(&self) -> bool;
}

/// Platform for headless runs: no clients, everything is logged.
#[derive(Debug, Default)]
pub struct HeadlessPlatform;

#[async_trait]
impl Platform for HeadlessPlatform {
  async fn show_system_notification(&self, message: &PushMessage) -> Result<()> {
    info!(title = %message.title, url = %message.url, "{}", message.body);
    Ok(())
  }

  async fn matching_client(&self, _url: &str) -> Result<Option<ClientId>> {
    Ok(None)
  }

  async fn focus_client(&self, id: ClientId) -> Result<()> {
    debug!(client = id, "focus client");
    Ok(())
  }

  async fn open_window(&self, url: &str) -> Result<()> {
    info!(url = %url, "open window");
    Ok(())
  }

  fn is_standalone(&self) -> bool {
    false
  }

  fn has_waiting_update(&self) -> bool {
    false
  }
}

//! Lifecycle manager.
//!
//! Routes platform signals into the cache engine, the mutation queue and the
//! notification center. It owns the notification center for the page and is
//! the only place connectivity transitions are recorded, which is what keeps
//! replay to exactly one run per offline to online transition.

mod install;
mod platform;

pub use install::{InstallOutcome, InstallPrompt};
pub use platform::{ClientId, HeadlessPlatform, Platform, PushMessage};

use color_eyre::Result;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::cache::{ActivationReport, CacheEngine, InstallReport, Served};
use crate::event::Signal;
use crate::http::{Connectivity, FetchError, Request};
use crate::notify::{NotificationCenter, NotificationId, NotificationKind};
use crate::queue::{MutationQueue, QueueError, ReplayReport, SubmitOutcome};
use install::InstallState;

pub struct LifecycleManager {
  engine: CacheEngine,
  queue: MutationQueue,
  notifications: NotificationCenter,
  connectivity: Connectivity,
  platform: Arc<dyn Platform>,
  install: InstallState,
  /// Sticky "update available" notice, if showing
  update_notice: Option<NotificationId>,
  /// Sticky "offline" notice, if showing
  offline_notice: Option<NotificationId>,
}

impl LifecycleManager {
  pub fn new(
    engine: CacheEngine,
    queue: MutationQueue,
    notifications: NotificationCenter,
    connectivity: Connectivity,
    platform: Arc<dyn Platform>,
  ) -> Self {
    Self {
      engine,
      queue,
      notifications,
      connectivity,
      platform,
      install: InstallState::default(),
      update_notice: None,
      offline_notice: None,
    }
  }

  pub fn engine(&self) -> &CacheEngine {
    &self.engine
  }

  pub fn queue(&self) -> &MutationQueue {
    &self.queue
  }

  pub fn notifications(&mut self) -> &mut NotificationCenter {
    &mut self.notifications
  }

  pub fn is_online(&self) -> bool {
    self.connectivity.is_online()
  }

  /// Page initialization: restore notifications carried over from the
  /// previous page, read the display mode and re-announce an update that is
  /// still waiting from an earlier page.
  pub fn on_page_load(&mut self) -> Vec<NotificationId> {
    if self.platform.is_standalone() {
      self.install = InstallState::Hidden;
    }
    let restored = self.notifications.restore_pending();
    if self.platform.has_waiting_update() {
      self.announce_update();
    }
    restored
  }

  /// Serve a read through the cache engine.
  pub async fn fetch(&self, request: &Request) -> Result<Served, FetchError> {
    self.engine.handle(request).await
  }

  /// Issue a request through the mutation queue.
  pub async fn submit(&mut self, request: Request) -> Result<SubmitOutcome, QueueError> {
    let outcome = self.queue.submit(request).await?;
    if let SubmitOutcome::Queued { position } = outcome {
      self.notifications.info(format!(
        "Saved offline. Will sync when back online ({} pending)",
        position
      ));
    }
    Ok(outcome)
  }

  pub async fn handle(&mut self, signal: Signal) -> Result<()> {
    match signal {
      Signal::Install => {
        self.engine.install().await?;
      }
      Signal::Activate => {
        self.engine.activate().await?;
      }
      Signal::UpdateReady { controlled } => self.on_update_ready(controlled).await?,
      Signal::BeforeInstallPrompt(prompt) => self.capture_install_prompt(prompt),
      Signal::AppInstalled => {
        info!("app installed");
        self.install = InstallState::Hidden;
      }
      Signal::Online => self.on_online().await,
      Signal::Offline => self.on_offline(),
      Signal::Push(message) => self.platform.show_system_notification(&message).await?,
      Signal::NotificationClick { url } => self.open_client(&url).await?,
      Signal::NotificationClose { url } => debug!(url = %url, "system notification closed"),
      Signal::Sync { tag } => {
        debug!(tag = %tag, "background sync");
        self.replay().await;
      }
      Signal::Visibility { visible } => {
        if visible {
          self.engine.cleanup_stale_generations()?;
        }
      }
      Signal::Navigate => {
        self.notifications.snapshot_for_navigation();
      }
      Signal::Tick => {
        self.notifications.poll();
      }
    }
    Ok(())
  }

  /// Prime the static generation.
  pub async fn install(&self) -> Result<InstallReport> {
    self.engine.install().await
  }

  async fn on_update_ready(&mut self, controlled: bool) -> Result<()> {
    if !controlled {
      // Nothing open runs the old generation
      self.engine.activate().await?;
      return Ok(());
    }
    self.announce_update();
    Ok(())
  }

  fn announce_update(&mut self) {
    if self.update_notice.is_some() {
      return;
    }
    let id = self.notifications.sticky(
      "A new version is available. Reload to update.",
      NotificationKind::Info,
    );
    self.update_notice = Some(id);
  }

  /// Activate a waiting update at the user's request.
  pub async fn apply_update(&mut self) -> Result<ActivationReport> {
    let report = self.engine.activate().await?;
    if let Some(id) = self.update_notice.take() {
      self.notifications.dismiss(id);
    }
    Ok(report)
  }

  fn capture_install_prompt(&mut self, prompt: InstallPrompt) {
    match self.install {
      InstallState::Unavailable => self.install = InstallState::Available(prompt),
      InstallState::Available(_) => debug!("install prompt already captured"),
      InstallState::Hidden => debug!("install prompt ignored, affordance hidden"),
    }
  }

  pub fn can_install(&self) -> bool {
    self.install.is_available()
  }

  /// Show the captured install prompt. `None` when no prompt is available.
  pub async fn prompt_install(&mut self) -> Option<InstallOutcome> {
    if !self.install.is_available() {
      return None;
    }
    let InstallState::Available(prompt) = std::mem::replace(&mut self.install, InstallState::Hidden)
    else {
      return None;
    };

    let outcome = prompt.prompt().await;
    info!(?outcome, "install prompt answered");
    Some(outcome)
  }

  async fn on_online(&mut self) {
    if !self.connectivity.set_online(true) {
      return;
    }
    info!("back online");

    if let Some(id) = self.offline_notice.take() {
      self.notifications.dismiss(id);
    }
    self.notifications.success("Back online");
    self.replay().await;
  }

  fn on_offline(&mut self) {
    if !self.connectivity.set_online(false) {
      return;
    }
    warn!("connection lost");

    let id = self.notifications.sticky(
      "You are offline. Changes will be saved and synced later.",
      NotificationKind::Warning,
    );
    self.offline_notice = Some(id);
  }

  /// Replay the mutation queue and tell the user how it went.
  pub async fn replay(&mut self) -> ReplayReport {
    let report = self.queue.replay().await;
    if report.attempted() == 0 {
      return report;
    }

    if report.is_clean() {
      self.notifications.success(format!(
        "Synced {} offline change(s)",
        report.succeeded.len()
      ));
    } else {
      self.notifications.error(format!(
        "{} offline change(s) could not be synced and were discarded",
        report.failed.len()
      ));
    }
    report
  }

  /// Focus a client showing `url`, or open one.
  async fn open_client(&self, url: &str) -> Result<()> {
    match self.platform.matching_client(url).await? {
      Some(id) => self.platform.focus_client(id).await,
      None => self.platform.open_window(url).await,
    }
  }
}

use tracing::{debug, info};

use super::notification::{Notification, NotificationId};

/// How a notification enters the surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Entrance {
  /// New event: insert, then trigger the entrance transition on the next tick
  Animated,
  /// Continuation restored after navigation: appear in place
  Immediate,
}

/// Whatever owns the page's UI tree.
pub trait Surface: Send {
  fn insert(&mut self, id: NotificationId, notification: &Notification, entrance: Entrance);

  /// Visible countdown, display only.
  fn countdown(&mut self, id: NotificationId, seconds_left: u64);

  /// Start the exit animation.
  fn begin_exit(&mut self, id: NotificationId);

  fn remove(&mut self, id: NotificationId);

  fn open_dialog(&mut self, id: NotificationId, message: &str);

  fn close_dialog(&mut self, id: NotificationId);
}

/// Surface for headless runs: notifications go to the log.
#[derive(Debug, Default)]
pub struct TracingSurface;

impl Surface for TracingSurface {
  fn insert(&mut self, id: NotificationId, notification: &Notification, entrance: Entrance) {
    info!(
      id,
      kind = %notification.kind,
      restored = entrance == Entrance::Immediate,
      "{}",
      notification.message
    );
  }

  fn countdown(&mut self, id: NotificationId, seconds_left: u64) {
    debug!(id, seconds_left, "notification countdown");
  }

  fn begin_exit(&mut self, id: NotificationId) {
    debug!(id, "notification closing");
  }

  fn remove(&mut self, id: NotificationId) {
    debug!(id, "notification removed");
  }

  fn open_dialog(&mut self, id: NotificationId, message: &str) {
    info!(id, "confirm: {}", message);
  }

  fn close_dialog(&mut self, id: NotificationId) {
    debug!(id, "dialog closed");
  }
}

use serde::{Deserialize, Serialize};
use std::fmt;

pub type NotificationId = u64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationKind {
  Success,
  Error,
  Warning,
  Info,
}

impl fmt::Display for NotificationKind {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(match self {
      NotificationKind::Success => "success",
      NotificationKind::Error => "error",
      NotificationKind::Warning => "warning",
      NotificationKind::Info => "info",
    })
  }
}

/// Lifecycle of a single notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationState {
  Created,
  Shown,
  /// Closed by the user; removed after the exit animation
  Dismissed,
  /// Deadline passed; removed after the exit animation
  Expired,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Notification {
  pub message: String,
  pub kind: NotificationKind,
  /// `None` never auto-dismisses
  pub total_duration_ms: Option<u64>,
  /// Epoch milliseconds
  pub created_at: i64,
}

impl Notification {
  /// The instant the notification expires. Display ticks never move it.
  pub fn deadline(&self) -> Option<i64> {
    self
      .total_duration_ms
      .map(|d| self.created_at.saturating_add(d as i64))
  }

  /// Remaining lifetime at `now`, clamped to zero.
  pub fn remaining_at(&self, now_ms: i64) -> Option<u64> {
    self.deadline().map(|d| (d - now_ms).max(0) as u64)
  }
}

/// Snapshot written before navigation and consumed after the next load.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingNotification {
  pub message: String,
  #[serde(rename = "type")]
  pub kind: NotificationKind,
  /// Remaining lifetime when the snapshot was taken
  pub duration: u64,
  /// Snapshot time, epoch milliseconds
  pub timestamp: i64,
}

impl PendingNotification {
  /// True remaining lifetime at `now`, within `[0, duration]`; zero means
  /// expired. A timestamp in the future counts as no time elapsed.
  pub fn remaining_at(&self, now_ms: i64) -> i64 {
    let duration = i64::try_from(self.duration).unwrap_or(i64::MAX);
    let elapsed = now_ms.saturating_sub(self.timestamp).max(0);
    duration.saturating_sub(elapsed).clamp(0, duration)
  }
}

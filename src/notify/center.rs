//! Notification context for one page.

use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::oneshot;
use tracing::{debug, warn};

use super::dialog::{Confirmation, DialogAction};
use super::notification::{
  Notification, NotificationId, NotificationKind, NotificationState, PendingNotification,
};
use super::surface::{Entrance, Surface};
use crate::clock::Clock;
use crate::config::NotificationConfig;
use crate::store::JsonStore;

/// Delay between dismissal/expiry and removal from the surface.
pub const EXIT_ANIMATION_MS: i64 = 300;

const PENDING_KEY: &str = "pending";

struct Entry {
  id: NotificationId,
  notification: Notification,
  state: NotificationState,
  removal_at: Option<i64>,
  last_countdown: Option<u64>,
}

/// Owns the notifications of the current page.
///
/// Time only advances through `poll`: expiry is decided by comparing the
/// clock against each deadline, so however irregular the polling, nothing
/// expires early or drifts late by more than one poll interval.
pub struct NotificationCenter {
  store: JsonStore,
  clock: Arc<dyn Clock>,
  surface: Box<dyn Surface>,
  durations: NotificationConfig,
  entries: Vec<Entry>,
  dialogs: BTreeMap<NotificationId, oneshot::Sender<bool>>,
  next_id: NotificationId,
}

impl NotificationCenter {
  pub fn new(
    root: &JsonStore,
    clock: Arc<dyn Clock>,
    surface: Box<dyn Surface>,
    durations: NotificationConfig,
  ) -> Self {
    Self {
      store: root.scope("notifications"),
      clock,
      surface,
      durations,
      entries: Vec::new(),
      dialogs: BTreeMap::new(),
      next_id: 1,
    }
  }

  /// Show a notification. `duration_ms = None` keeps it until dismissed.
  pub fn show(
    &mut self,
    message: impl Into<String>,
    kind: NotificationKind,
    duration_ms: Option<u64>,
  ) -> NotificationId {
    let notification = Notification {
      message: message.into(),
      kind,
      total_duration_ms: duration_ms,
      created_at: self.clock.now_ms(),
    };
    self.present(notification, Entrance::Animated)
  }

  pub fn success(&mut self, message: impl Into<String>) -> NotificationId {
    self.show_default(message, NotificationKind::Success)
  }

  pub fn error(&mut self, message: impl Into<String>) -> NotificationId {
    self.show_default(message, NotificationKind::Error)
  }

  pub fn warning(&mut self, message: impl Into<String>) -> NotificationId {
    self.show_default(message, NotificationKind::Warning)
  }

  pub fn info(&mut self, message: impl Into<String>) -> NotificationId {
    self.show_default(message, NotificationKind::Info)
  }

  /// Notification that stays until dismissed.
  pub fn sticky(&mut self, message: impl Into<String>, kind: NotificationKind) -> NotificationId {
    self.show(message, kind, None)
  }

  fn show_default(&mut self, message: impl Into<String>, kind: NotificationKind) -> NotificationId {
    let duration = self.durations.duration_for(kind);
    self.show(message, kind, Some(duration))
  }

  fn present(&mut self, notification: Notification, entrance: Entrance) -> NotificationId {
    let id = self.next_id;
    self.next_id += 1;

    let mut entry = Entry {
      id,
      notification,
      state: NotificationState::Created,
      removal_at: None,
      last_countdown: None,
    };

    self.surface.insert(id, &entry.notification, entrance);
    entry.state = NotificationState::Shown;

    let now = self.clock.now_ms();
    if let Some(remaining) = entry.notification.remaining_at(now) {
      let seconds = seconds_left(remaining);
      self.surface.countdown(id, seconds);
      entry.last_countdown = Some(seconds);
    }

    self.entries.push(entry);
    id
  }

  /// Explicit close. Returns false if the notification is not showing.
  pub fn dismiss(&mut self, id: NotificationId) -> bool {
    let now = self.clock.now_ms();
    let Some(entry) = self
      .entries
      .iter_mut()
      .find(|e| e.id == id && e.state == NotificationState::Shown)
    else {
      return false;
    };

    entry.state = NotificationState::Dismissed;
    entry.removal_at = Some(now + EXIT_ANIMATION_MS);
    self.surface.begin_exit(id);
    true
  }

  /// Advance timers: refresh countdowns, expire notifications whose deadline
  /// has passed, and remove those whose exit animation finished.
  ///
  /// Returns true if anything changed.
  pub fn poll(&mut self) -> bool {
    let now = self.clock.now_ms();
    let mut changed = false;

    for entry in &mut self.entries {
      if entry.state != NotificationState::Shown {
        continue;
      }
      let Some(deadline) = entry.notification.deadline() else {
        continue;
      };

      if now >= deadline {
        entry.state = NotificationState::Expired;
        entry.removal_at = Some(now + EXIT_ANIMATION_MS);
        self.surface.begin_exit(entry.id);
        changed = true;
        continue;
      }

      let seconds = seconds_left((deadline - now) as u64);
      if entry.last_countdown != Some(seconds) {
        entry.last_countdown = Some(seconds);
        self.surface.countdown(entry.id, seconds);
        changed = true;
      }
    }

    let surface = &mut self.surface;
    self.entries.retain(|entry| match entry.removal_at {
      Some(at) if now >= at => {
        surface.remove(entry.id);
        changed = true;
        false
      }
      _ => true,
    });

    changed
  }

  pub fn state(&self, id: NotificationId) -> Option<NotificationState> {
    self.entries.iter().find(|e| e.id == id).map(|e| e.state)
  }

  /// Notifications currently showing, oldest first.
  pub fn visible(&self) -> Vec<(NotificationId, &Notification)> {
    self
      .entries
      .iter()
      .filter(|e| e.state == NotificationState::Shown)
      .map(|e| (e.id, &e.notification))
      .collect()
  }

  /// Persist every showing timed notification ahead of a navigation.
  ///
  /// Snapshots are appended to the pending list. Sticky notifications and
  /// open dialogs do not survive navigation; dialogs resolve as cancelled.
  /// Returns the number of snapshots written.
  pub fn snapshot_for_navigation(&mut self) -> usize {
    let now = self.clock.now_ms();

    let snapshots: Vec<PendingNotification> = self
      .entries
      .iter()
      .filter(|e| e.state == NotificationState::Shown)
      .filter_map(|e| {
        let remaining = e.notification.remaining_at(now)?;
        (remaining > 0).then(|| PendingNotification {
          message: e.notification.message.clone(),
          kind: e.notification.kind,
          duration: remaining,
          timestamp: now,
        })
      })
      .collect();

    for (id, answer) in std::mem::take(&mut self.dialogs) {
      let _ = answer.send(false);
      self.surface.close_dialog(id);
    }

    if snapshots.is_empty() {
      return 0;
    }

    let mut pending: Vec<PendingNotification> = self.store.read_list(PENDING_KEY);
    pending.extend(snapshots.iter().cloned());
    if let Err(e) = self.store.write(PENDING_KEY, &pending) {
      warn!(error = %e, "failed to persist notifications before navigation");
      return 0;
    }

    debug!(count = snapshots.len(), "persisted notifications");
    snapshots.len()
  }

  /// Show the notifications persisted by the previous page.
  ///
  /// The pending list is consumed exactly once: it is cleared whatever its
  /// contents. Entries whose lifetime ran out in transit are dropped.
  pub fn restore_pending(&mut self) -> Vec<NotificationId> {
    let pending: Vec<PendingNotification> = self.store.take_list(PENDING_KEY);
    let now = self.clock.now_ms();

    let mut restored = Vec::new();
    for snapshot in pending {
      let remaining = snapshot.remaining_at(now);
      if remaining <= 0 {
        debug!(message = %snapshot.message, "dropping expired notification");
        continue;
      }

      let notification = Notification {
        message: snapshot.message,
        kind: snapshot.kind,
        total_duration_ms: Some(remaining as u64),
        created_at: now,
      };
      restored.push(self.present(notification, Entrance::Immediate));
    }

    restored
  }

  /// Open a confirmation dialog. Not persisted, no timer.
  pub fn confirm(&mut self, message: &str) -> Confirmation {
    let id = self.next_id;
    self.next_id += 1;

    let (tx, rx) = oneshot::channel();
    self.dialogs.insert(id, tx);
    self.surface.open_dialog(id, message);
    Confirmation::new(id, rx)
  }

  /// Close a dialog. Returns false if it was not open.
  pub fn resolve_dialog(&mut self, id: NotificationId, action: DialogAction) -> bool {
    let Some(answer) = self.dialogs.remove(&id) else {
      return false;
    };
    let _ = answer.send(action.confirmed());
    self.surface.close_dialog(id);
    true
  }
}

/// Whole seconds shown by the countdown (rounded up).
fn seconds_left(remaining_ms: u64) -> u64 {
  remaining_ms.div_ceil(1_000)
}

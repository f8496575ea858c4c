use tokio::sync::oneshot;

use super::notification::NotificationId;

/// How a confirmation dialog was closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DialogAction {
  Confirm,
  Cancel,
  /// Click outside the dialog; same as cancel
  Backdrop,
}

impl DialogAction {
  pub fn confirmed(self) -> bool {
    matches!(self, DialogAction::Confirm)
  }
}

/// Pending answer to a confirmation dialog.
///
/// Resolves to `false` unless the user explicitly confirms, including when
/// the dialog is torn down by navigation.
#[derive(Debug)]
pub struct Confirmation {
  id: NotificationId,
  answer: oneshot::Receiver<bool>,
}

impl Confirmation {
  pub(crate) fn new(id: NotificationId, answer: oneshot::Receiver<bool>) -> Self {
    Self { id, answer }
  }

  pub fn id(&self) -> NotificationId {
    self.id
  }

  pub async fn wait(self) -> bool {
    self.answer.await.unwrap_or(false)
  }
}

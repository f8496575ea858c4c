use tokio::sync::oneshot;

/// The user's answer to the install prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstallOutcome {
  Accepted,
  Dismissed,
}

/// Deferred install prompt captured from the platform.
///
/// Single-shot: `prompt` consumes the handle.
#[derive(Debug)]
pub struct InstallPrompt {
  choice: oneshot::Receiver<InstallOutcome>,
}

impl InstallPrompt {
  /// Create a prompt and the sender the platform answers through.
  pub fn channel() -> (Self, oneshot::Sender<InstallOutcome>) {
    let (tx, rx) = oneshot::channel();
    (Self { choice: rx }, tx)
  }

  /// Show the prompt and wait for the user's choice. A prompt the platform
  /// tears down without answering counts as dismissed.
  pub async fn prompt(self) -> InstallOutcome {
    self.choice.await.unwrap_or(InstallOutcome::Dismissed)
  }
}

/// Install affordance for the current session.
#[derive(Debug, Default)]
pub(crate) enum InstallState {
  #[default]
  Unavailable,
  Available(InstallPrompt),
  /// Prompt used or app running installed; stays hidden for the session
  Hidden,
}

impl InstallState {
  pub(crate) fn is_available(&self) -> bool {
    matches!(self, InstallState::Available(_))
  }
}

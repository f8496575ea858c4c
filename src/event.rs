use std::time::Duration;
use tokio::sync::mpsc;
use tracing::debug;

use crate::http::HttpNetwork;
use crate::lifecycle::{InstallPrompt, PushMessage};

/// Platform signals consumed by the lifecycle manager
#[derive(Debug)]
pub enum Signal {
  /// A new generation is being installed
  Install,
  /// The new generation took control
  Activate,
  /// A new generation finished installing. `controlled` is true while an
  /// older generation still controls the page.
  UpdateReady { controlled: bool },
  /// Deferred install prompt became available
  BeforeInstallPrompt(InstallPrompt),
  /// The app reports itself installed
  AppInstalled,
  Online,
  Offline,
  Push(PushMessage),
  NotificationClick { url: String },
  NotificationClose { url: String },
  /// Background sync fired
  Sync { tag: String },
  Visibility { visible: bool },
  /// The page is about to unload or navigate away
  Navigate,
  /// Periodic tick for notification timers
  Tick,
}

/// Signal queue with a background connectivity probe
pub struct SignalBus {
  tx: mpsc::UnboundedSender<Signal>,
  rx: mpsc::UnboundedReceiver<Signal>,
}

impl SignalBus {
  pub fn new() -> Self {
    let (tx, rx) = mpsc::unbounded_channel();
    Self { tx, rx }
  }

  pub fn sender(&self) -> mpsc::UnboundedSender<Signal> {
    self.tx.clone()
  }

  /// Spawn the probe task. It emits `Tick` every `tick_rate` and an
  /// `Online`/`Offline` signal after every probe; the lifecycle manager
  /// ignores repeats.
  pub fn spawn_probe(&self, network: HttpNetwork, probe_interval: Duration, tick_rate: Duration) {
    let tx = self.tx.clone();

    tokio::spawn(async move {
      let mut ticks = tokio::time::interval(tick_rate);
      let mut probes = tokio::time::interval(probe_interval);

      loop {
        let signal = tokio::select! {
          _ = ticks.tick() => Signal::Tick,
          _ = probes.tick() => {
            let online = network.probe().await;
            debug!(online, "connectivity probe");
            if online { Signal::Online } else { Signal::Offline }
          }
        };

        if tx.send(signal).is_err() {
          break;
        }
      }
    });
  }

  /// Receive the next signal
  pub async fn next(&mut self) -> Option<Signal> {
    self.rx.recv().await
  }
}

impl Default for SignalBus {
  fn default() -> Self {
    Self::new()
  }
}

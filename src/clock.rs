//! Wall-clock abstraction.
//!
//! Notification lifetimes and queue timestamps are epoch milliseconds so that
//! they survive serialization and can be compared across page loads.

use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

/// Source of the current time in epoch milliseconds.
pub trait Clock: Send + Sync {
  fn now_ms(&self) -> i64;
}

/// Clock backed by the system time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
  fn now_ms(&self) -> i64 {
    chrono::Utc::now().timestamp_millis()
  }
}

/// Clock that only moves when told to. Cloned handles share the same time.
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
  now: Arc<AtomicI64>,
}

impl ManualClock {
  pub fn new(start_ms: i64) -> Self {
    Self {
      now: Arc::new(AtomicI64::new(start_ms)),
    }
  }

  pub fn set(&self, now_ms: i64) {
    self.now.store(now_ms, Ordering::SeqCst);
  }

  pub fn advance(&self, delta_ms: i64) {
    self.now.fetch_add(delta_ms, Ordering::SeqCst);
  }
}

impl Clock for ManualClock {
  fn now_ms(&self) -> i64 {
    self.now.load(Ordering::SeqCst)
  }
}

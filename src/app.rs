use color_eyre::Result;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use crate::cache::{CacheEngine, CacheStorage, NoopCacheStorage, SqliteCacheStorage};
use crate::clock::{Clock, SystemClock};
use crate::config::{Config, StorageConfig};
use crate::db::Database;
use crate::event::{Signal, SignalBus};
use crate::http::{Connectivity, HttpNetwork};
use crate::lifecycle::{HeadlessPlatform, LifecycleManager};
use crate::notify::{NotificationCenter, TracingSurface};
use crate::queue::MutationQueue;
use crate::store::{JsonStore, KeyValueBackend, MemoryBackend, Preferences, SqliteBackend};

/// Notification timers are refreshed at this rate while watching
const TICK_RATE: Duration = Duration::from_millis(250);

/// Persistence chosen by the startup capability check
pub struct Backends {
  pub kv: Arc<dyn KeyValueBackend>,
  pub caches: Arc<dyn CacheStorage>,
  /// False when state only lives as long as the process
  pub persistent: bool,
}

impl Backends {
  /// Select SQLite-backed storage when it is enabled and the database opens;
  /// otherwise an in-memory store and a cache that stores nothing.
  pub fn detect(config: &StorageConfig) -> Self {
    if !config.enabled {
      info!("storage disabled, running without persistence");
      return Self::ephemeral();
    }

    let db = config
      .database_path()
      .and_then(|path| Database::open(&path));
    match db {
      Ok(db) => Self {
        kv: Arc::new(SqliteBackend::new(db.clone())),
        caches: Arc::new(SqliteCacheStorage::new(db)),
        persistent: true,
      },
      Err(e) => {
        warn!(error = %e, "persistent storage unavailable, falling back to memory");
        Self::ephemeral()
      }
    }
  }

  fn ephemeral() -> Self {
    Self {
      kv: Arc::new(MemoryBackend::new()),
      caches: Arc::new(NoopCacheStorage),
      persistent: false,
    }
  }
}

/// Snapshot printed by `status`
#[derive(Debug, Clone)]
pub struct Status {
  pub online: bool,
  pub persistent: bool,
  pub generations: Vec<String>,
  pub caches: Vec<String>,
  pub queued: usize,
}

/// Main application state
pub struct App {
  network: HttpNetwork,
  preferences: Preferences,
  lifecycle: LifecycleManager,
  persistent: bool,
  probe_interval: Duration,
}

impl App {
  pub fn new(config: Config) -> Result<Self> {
    let backends = Backends::detect(&config.storage);
    let network = HttpNetwork::new(&config)?;
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let connectivity = Connectivity::default();

    let root = JsonStore::new(backends.kv, config.storage.namespace.as_str());
    let engine = CacheEngine::new(&config, backends.caches, Arc::new(network.clone()))?;
    let queue = MutationQueue::new(
      &root,
      Arc::new(network.clone()),
      connectivity.clone(),
      clock.clone(),
    );
    let notifications = NotificationCenter::new(
      &root,
      clock,
      Box::new(TracingSurface),
      config.notifications.clone(),
    );
    let lifecycle = LifecycleManager::new(
      engine,
      queue,
      notifications,
      connectivity,
      Arc::new(HeadlessPlatform),
    );

    Ok(Self {
      network,
      preferences: Preferences::new(&root),
      lifecycle,
      persistent: backends.persistent,
      probe_interval: config.network.probe_interval(),
    })
  }

  pub fn lifecycle(&mut self) -> &mut LifecycleManager {
    &mut self.lifecycle
  }

  pub fn preferences(&self) -> &Preferences {
    &self.preferences
  }

  pub fn network(&self) -> &HttpNetwork {
    &self.network
  }

  /// Treat the invocation as a page load: restore carried-over notifications
  /// and record the current connectivity.
  pub async fn start(&mut self) -> Result<()> {
    self.lifecycle.on_page_load();
    let signal = if self.network.probe().await {
      Signal::Online
    } else {
      Signal::Offline
    };
    self.lifecycle.handle(signal).await
  }

  /// Treat the end of the invocation as a navigation away.
  pub async fn finish(&mut self) -> Result<()> {
    self.lifecycle.handle(Signal::Navigate).await
  }

  /// Drive the lifecycle manager from the connectivity probe until Ctrl-C.
  pub async fn run(&mut self) -> Result<()> {
    let mut bus = SignalBus::new();
    bus.spawn_probe(self.network.clone(), self.probe_interval, TICK_RATE);

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    loop {
      tokio::select! {
        signal = bus.next() => {
          let Some(signal) = signal else { break };
          if let Err(e) = self.lifecycle.handle(signal).await {
            warn!(error = %e, "signal handling failed");
          }
        }
        _ = &mut ctrl_c => {
          info!("interrupted");
          break;
        }
      }
    }

    Ok(())
  }

  pub fn status(&self) -> Result<Status> {
    let engine = self.lifecycle.engine();
    Ok(Status {
      online: self.lifecycle.is_online(),
      persistent: self.persistent,
      generations: engine.generations().iter().map(|g| g.name.clone()).collect(),
      caches: engine.storage().names()?,
      queued: self.lifecycle.queue().len(),
    })
  }
}

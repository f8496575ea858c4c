//! Offline mutation queue.
//!
//! Mutating requests issued while offline are persisted in insertion order
//! and replayed sequentially once connectivity returns. Replay is
//! at-most-once: whatever was attempted is removed from the queue, and a
//! rejected action drops everything after it.

mod action;

pub use action::QueuedAction;

use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::clock::Clock;
use crate::http::{Connectivity, FetchError, Network, Request, Response};
use crate::store::JsonStore;

const QUEUE_KEY: &str = "mutations";

/// What `submit` did with a request.
#[derive(Debug, Clone, PartialEq)]
pub enum SubmitOutcome {
  /// Executed immediately (online, or not a mutation)
  Completed(Response),
  /// Persisted for replay; `position` is 1-based
  Queued { position: usize },
}

#[derive(Debug, Error)]
pub enum QueueError {
  #[error(transparent)]
  Fetch(#[from] FetchError),
  #[error("failed to persist queued action: {0}")]
  Persist(String),
}

/// Outcome of one replay pass.
#[derive(Debug, Clone, Default)]
pub struct ReplayReport {
  pub succeeded: Vec<QueuedAction>,
  /// The rejected action followed by everything queued after it
  pub failed: Vec<QueuedAction>,
  pub failure: Option<String>,
}

impl ReplayReport {
  pub fn attempted(&self) -> usize {
    self.succeeded.len() + self.failed.len()
  }

  pub fn is_clean(&self) -> bool {
    self.failed.is_empty()
  }
}

/// Durable FIFO of deferred mutations.
#[derive(Clone)]
pub struct MutationQueue {
  store: JsonStore,
  network: Arc<dyn Network>,
  connectivity: Connectivity,
  clock: Arc<dyn Clock>,
}

impl MutationQueue {
  pub fn new(
    root: &JsonStore,
    network: Arc<dyn Network>,
    connectivity: Connectivity,
    clock: Arc<dyn Clock>,
  ) -> Self {
    Self {
      store: root.scope("queue"),
      network,
      connectivity,
      clock,
    }
  }

  /// Execute a request now, or defer it if it is a mutation and the runtime
  /// is offline. Online results are returned unchanged.
  pub async fn submit(&self, request: Request) -> Result<SubmitOutcome, QueueError> {
    if self.connectivity.is_online() || !request.method.is_mutating() {
      let response = self.network.fetch(&request).await?;
      return Ok(SubmitOutcome::Completed(response));
    }

    let action = QueuedAction::from_request(&request, self.clock.now_ms());
    let mut actions = self.pending();
    actions.push(action);
    self
      .store
      .write(QUEUE_KEY, &actions)
      .map_err(|e| QueueError::Persist(e.to_string()))?;

    info!(
      method = %request.method,
      url = %request.url,
      position = actions.len(),
      "queued offline mutation"
    );
    Ok(SubmitOutcome::Queued {
      position: actions.len(),
    })
  }

  /// Persisted actions in replay order.
  pub fn pending(&self) -> Vec<QueuedAction> {
    self.store.read_list(QUEUE_KEY)
  }

  pub fn len(&self) -> usize {
    self.pending().len()
  }

  pub fn is_empty(&self) -> bool {
    self.len() == 0
  }

  /// Replay every queued action in enqueue order, one at a time.
  ///
  /// Each action is awaited before the next starts. A network failure or a
  /// non-2xx status halts the pass; the rejected action and the rest are
  /// dropped, not retried. Not cancellable once started.
  ///
  /// While offline nothing is attempted and the queue is left as it is.
  pub async fn replay(&self) -> ReplayReport {
    let mut report = ReplayReport::default();
    if !self.connectivity.is_online() {
      debug!("offline, replay deferred");
      return report;
    }

    let actions = self.pending();
    if actions.is_empty() {
      return report;
    }

    info!(count = actions.len(), "replaying offline mutations");

    let mut halted_at = None;
    for (index, action) in actions.iter().enumerate() {
      let failure = match self.network.fetch(&action.to_request()).await {
        Ok(response) if response.is_success() => None,
        Ok(response) => Some(format!(
          "{} rejected with status {}",
          action.describe(),
          response.status
        )),
        Err(e) => Some(format!("{} failed: {}", action.describe(), e)),
      };

      match failure {
        None => report.succeeded.push(action.clone()),
        Some(reason) => {
          report.failure = Some(reason);
          halted_at = Some(index);
          break;
        }
      }
    }

    if let Some(index) = halted_at {
      report.failed = actions[index..].to_vec();
      for action in &report.failed {
        warn!(action = %action.describe(), "dropping unreplayable mutation");
      }
    }

    self.remove_replayed(actions.len());

    info!(
      succeeded = report.succeeded.len(),
      failed = report.failed.len(),
      "replay finished"
    );
    report
  }

  /// Drop the first `count` actions in a single write. Anything queued while
  /// the replay was in flight sits after them and is kept.
  fn remove_replayed(&self, count: usize) {
    let mut current = self.pending();
    let rest = if current.len() > count {
      current.split_off(count)
    } else {
      Vec::new()
    };

    let result = if rest.is_empty() {
      self.store.remove(QUEUE_KEY)
    } else {
      self.store.write(QUEUE_KEY, &rest)
    };
    if let Err(e) = result {
      warn!(error = %e, "failed to clear replayed mutations");
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::clock::ManualClock;
  use crate::http::Method;
  use crate::store::{KeyValueBackend, MemoryBackend};
  use crate::testing::FakeNetwork;

  struct Fixture {
    queue: MutationQueue,
    network: Arc<FakeNetwork>,
    connectivity: Connectivity,
    backend: Arc<MemoryBackend>,
  }

  fn fixture() -> Fixture {
    let backend = Arc::new(MemoryBackend::new());
    let root = JsonStore::new(backend.clone(), "shelf");
    let network = Arc::new(FakeNetwork::new());
    let connectivity = Connectivity::new(false);
    let queue = MutationQueue::new(
      &root,
      network.clone(),
      connectivity.clone(),
      Arc::new(ManualClock::new(1_000)),
    );
    Fixture {
      queue,
      network,
      connectivity,
      backend,
    }
  }

  fn post(path: &str, body: &str) -> Request {
    Request::new(Method::Post, format!("http://localhost{}", path)).with_body(body)
  }

  fn delete(path: &str) -> Request {
    Request::new(Method::Delete, format!("http://localhost{}", path))
  }

  #[tokio::test]
  async fn test_online_submit_is_pass_through() {
    let f = fixture();
    f.connectivity.set_online(true);
    f.network
      .respond("http://localhost/api/series", Response::new(201, "created"));

    let outcome = f.queue.submit(post("/api/series", "{}")).await.unwrap();
    assert_eq!(outcome, SubmitOutcome::Completed(Response::new(201, "created")));
    assert!(f.queue.is_empty());
  }

  #[tokio::test]
  async fn test_online_network_error_is_returned_unchanged() {
    let f = fixture();
    f.connectivity.set_online(true);

    let result = f.queue.submit(post("/api/series", "{}")).await;
    assert!(matches!(
      result,
      Err(QueueError::Fetch(FetchError::Unreachable(_)))
    ));
    assert!(f.queue.is_empty());
  }

  #[tokio::test]
  async fn test_offline_submit_queues_without_executing() {
    let f = fixture();

    let first = f.queue.submit(post("/api/series", "A")).await.unwrap();
    let second = f.queue.submit(delete("/api/series/5")).await.unwrap();

    assert_eq!(first, SubmitOutcome::Queued { position: 1 });
    assert_eq!(second, SubmitOutcome::Queued { position: 2 });
    assert!(f.network.calls().is_empty());

    let pending = f.queue.pending();
    assert_eq!(pending[0].method, Method::Post);
    assert_eq!(pending[0].timestamp, 1_000);
    assert_eq!(pending[1].url, "http://localhost/api/series/5");
  }

  #[tokio::test]
  async fn test_non_mutating_requests_are_never_queued() {
    let f = fixture();
    let result = f
      .queue
      .submit(Request::get("http://localhost/api/series"))
      .await;
    assert!(result.is_err());
    assert!(f.queue.is_empty());
  }

  #[tokio::test]
  async fn test_replay_preserves_order_and_empties_queue() {
    let f = fixture();
    for i in 0..5 {
      f.queue
        .submit(post(&format!("/api/collections/{}", i), "{}"))
        .await
        .unwrap();
    }

    f.connectivity.set_online(true);
    f.network.respond_all(Response::ok("ok"));
    let report = f.queue.replay().await;

    assert!(report.is_clean());
    assert_eq!(report.succeeded.len(), 5);
    let urls: Vec<String> = f.network.calls().into_iter().map(|(_, url)| url).collect();
    let expected: Vec<String> = (0..5)
      .map(|i| format!("http://localhost/api/collections/{}", i))
      .collect();
    assert_eq!(urls, expected);
    assert!(f.queue.is_empty());
    assert_eq!(f.backend.get("shelf:queue:mutations").unwrap(), None);
  }

  #[tokio::test]
  async fn test_create_is_replayed_before_delete() {
    let f = fixture();
    f.queue.submit(post("/api/series", "A")).await.unwrap();
    f.queue.submit(delete("/api/series/5")).await.unwrap();

    f.connectivity.set_online(true);
    f.network.respond_all(Response::ok(""));
    f.queue.replay().await;

    assert_eq!(
      f.network.calls(),
      vec![
        (Method::Post, "http://localhost/api/series".to_string()),
        (Method::Delete, "http://localhost/api/series/5".to_string()),
      ]
    );
  }

  #[tokio::test]
  async fn test_rejected_action_halts_and_drops_the_rest() {
    let f = fixture();
    f.queue.submit(post("/api/series", "A")).await.unwrap();
    f.queue.submit(post("/api/authors", "B")).await.unwrap();
    f.queue.submit(delete("/api/series/5")).await.unwrap();

    f.connectivity.set_online(true);
    f.network.respond_all(Response::ok(""));
    f.network
      .respond("http://localhost/api/authors", Response::new(422, "invalid"));

    let report = f.queue.replay().await;

    assert_eq!(report.succeeded.len(), 1);
    assert_eq!(report.failed.len(), 2);
    assert!(report.failure.as_deref().unwrap().contains("422"));
    // The delete after the rejection is never attempted
    assert_eq!(f.network.calls().len(), 2);
    assert!(f.queue.is_empty());

    // A second replay has nothing left to do
    assert_eq!(f.queue.replay().await.attempted(), 0);
  }

  #[tokio::test]
  async fn test_network_failure_during_replay_drops_queue() {
    let f = fixture();
    f.queue.submit(post("/api/series", "A")).await.unwrap();

    // Reported online, but the server is unreachable
    f.connectivity.set_online(true);
    let report = f.queue.replay().await;
    assert_eq!(report.failed.len(), 1);
    assert!(f.queue.is_empty());
  }

  #[tokio::test]
  async fn test_replay_while_offline_keeps_queue() {
    let f = fixture();
    f.queue.submit(post("/api/series", "A")).await.unwrap();
    f.queue.submit(delete("/api/series/5")).await.unwrap();

    let report = f.queue.replay().await;

    assert_eq!(report.attempted(), 0);
    assert!(report.is_clean());
    assert!(f.network.calls().is_empty());
    assert_eq!(f.queue.len(), 2);
  }

  #[tokio::test]
  async fn test_actions_queued_during_replay_survive() {
    let f = fixture();
    f.queue.submit(post("/api/series", "A")).await.unwrap();
    f.queue.submit(post("/api/series", "B")).await.unwrap();
    f.queue.submit(post("/api/series", "late")).await.unwrap();

    f.queue.remove_replayed(2);

    let pending = f.queue.pending();
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].body.as_deref(), Some("late"));
  }

  #[tokio::test]
  async fn test_corrupt_queue_reads_as_empty() {
    let f = fixture();
    f.backend.set("shelf:queue:mutations", "{oops").unwrap();

    assert!(f.queue.is_empty());
    let outcome = f.queue.submit(post("/api/series", "A")).await.unwrap();
    assert_eq!(outcome, SubmitOutcome::Queued { position: 1 });
  }
}

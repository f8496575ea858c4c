//! Scripted fakes for the platform traits.

use async_trait::async_trait;
use color_eyre::{eyre::eyre, Result};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use crate::cache::CacheStorage;
use crate::http::{FetchError, Method, Network, Request, Response};
use crate::lifecycle::{ClientId, Platform, PushMessage};
use crate::notify::{Entrance, Notification, NotificationId, Surface};

/// Network that answers from a table of canned outcomes.
///
/// Lookup order: exact URL, then the catch-all response, then unreachable.
#[derive(Default)]
pub struct FakeNetwork {
  routes: Mutex<HashMap<String, Result<Response, FetchError>>>,
  fallback: Mutex<Option<Response>>,
  offline: AtomicBool,
  calls: Mutex<Vec<(Method, String)>>,
}

impl FakeNetwork {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn respond(&self, url: &str, response: Response) {
    self
      .routes
      .lock()
      .unwrap()
      .insert(url.to_string(), Ok(response));
  }

  pub fn respond_all(&self, response: Response) {
    *self.fallback.lock().unwrap() = Some(response);
  }

  pub fn fail(&self, url: &str, error: FetchError) {
    self
      .routes
      .lock()
      .unwrap()
      .insert(url.to_string(), Err(error));
  }

  pub fn set_offline(&self, offline: bool) {
    self.offline.store(offline, Ordering::SeqCst);
  }

  pub fn calls(&self) -> Vec<(Method, String)> {
    self.calls.lock().unwrap().clone()
  }

  pub fn call_count(&self, url: &str) -> usize {
    self
      .calls
      .lock()
      .unwrap()
      .iter()
      .filter(|(_, u)| u == url)
      .count()
  }
}

#[async_trait]
impl Network for FakeNetwork {
  async fn fetch(&self, request: &Request) -> Result<Response, FetchError> {
    self
      .calls
      .lock()
      .unwrap()
      .push((request.method, request.url.clone()));

    if self.offline.load(Ordering::SeqCst) {
      return Err(FetchError::Unreachable("offline".to_string()));
    }
    if let Some(outcome) = self.routes.lock().unwrap().get(&request.url) {
      return outcome.clone();
    }
    self
      .fallback
      .lock()
      .unwrap()
      .clone()
      .ok_or_else(|| FetchError::Unreachable(format!("no route for {}", request.url)))
  }
}

/// Cache storage whose writes always fail.
pub struct FullCacheStorage;

impl CacheStorage for FullCacheStorage {
  fn open(&self, _name: &str) -> Result<()> {
    Ok(())
  }

  fn has(&self, _name: &str) -> Result<bool> {
    Ok(false)
  }

  fn delete(&self, _name: &str) -> Result<bool> {
    Ok(false)
  }

  fn names(&self) -> Result<Vec<String>> {
    Ok(Vec::new())
  }

  fn match_entry(&self, _name: &str, _key: &str) -> Result<Option<Response>> {
    Ok(None)
  }

  fn put(&self, _name: &str, _key: &str, _response: &Response) -> Result<()> {
    Err(eyre!("quota exceeded"))
  }

  fn keys(&self, _name: &str) -> Result<Vec<String>> {
    Ok(Vec::new())
  }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SurfaceOp {
  Insert(NotificationId, String, Entrance),
  Countdown(NotificationId, u64),
  BeginExit(NotificationId),
  Remove(NotificationId),
  OpenDialog(NotificationId, String),
  CloseDialog(NotificationId),
}

/// Surface that records every call. Clones share the record.
#[derive(Clone, Default)]
pub struct RecordingSurface {
  ops: Arc<Mutex<Vec<SurfaceOp>>>,
}

impl RecordingSurface {
  pub fn ops(&self) -> Vec<SurfaceOp> {
    self.ops.lock().unwrap().clone()
  }

  /// Messages inserted so far, in order.
  pub fn messages(&self) -> Vec<String> {
    self
      .ops()
      .into_iter()
      .filter_map(|op| match op {
        SurfaceOp::Insert(_, message, _) => Some(message),
        _ => None,
      })
      .collect()
  }

  fn push(&self, op: SurfaceOp) {
    self.ops.lock().unwrap().push(op);
  }
}

impl Surface for RecordingSurface {
  fn insert(&mut self, id: NotificationId, notification: &Notification, entrance: Entrance) {
    self.push(SurfaceOp::Insert(id, notification.message.clone(), entrance));
  }

  fn countdown(&mut self, id: NotificationId, seconds_left: u64) {
    self.push(SurfaceOp::Countdown(id, seconds_left));
  }

  fn begin_exit(&mut self, id: NotificationId) {
    self.push(SurfaceOp::BeginExit(id));
  }

  fn remove(&mut self, id: NotificationId) {
    self.push(SurfaceOp::Remove(id));
  }

  fn open_dialog(&mut self, id: NotificationId, message: &str) {
    self.push(SurfaceOp::OpenDialog(id, message.to_string()));
  }

  fn close_dialog(&mut self, id: NotificationId) {
    self.push(SurfaceOp::CloseDialog(id));
  }
}

#[derive(Debug, Clone, PartialEq)]
pub enum PlatformOp {
  SystemNotification(String),
  Focus(ClientId),
  OpenWindow(String),
}

/// Platform with a fixed set of open clients that records every call.
#[derive(Default)]
pub struct RecordingPlatform {
  clients: Mutex<Vec<(ClientId, String)>>,
  standalone: AtomicBool,
  waiting_update: AtomicBool,
  ops: Mutex<Vec<PlatformOp>>,
}

impl RecordingPlatform {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn with_client(self, id: ClientId, url: &str) -> Self {
    self.clients.lock().unwrap().push((id, url.to_string()));
    self
  }

  pub fn standalone(self) -> Self {
    self.standalone.store(true, Ordering::SeqCst);
    self
  }

  pub fn with_waiting_update(self) -> Self {
    self.waiting_update.store(true, Ordering::SeqCst);
    self
  }

  pub fn ops(&self) -> Vec<PlatformOp> {
    self.ops.lock().unwrap().clone()
  }
}

#[async_trait]
impl Platform for RecordingPlatform {
  async fn show_system_notification(&self, message: &PushMessage) -> Result<()> {
    self
      .ops
      .lock()
      .unwrap()
      .push(PlatformOp::SystemNotification(message.title.clone()));
    Ok(())
  }

  async fn matching_client(&self, url: &str) -> Result<Option<ClientId>> {
    Ok(
      self
        .clients
        .lock()
        .unwrap()
        .iter()
        .find(|(_, u)| u == url)
        .map(|(id, _)| *id),
    )
  }

  async fn focus_client(&self, id: ClientId) -> Result<()> {
    self.ops.lock().unwrap().push(PlatformOp::Focus(id));
    Ok(())
  }

  async fn open_window(&self, url: &str) -> Result<()> {
    self
      .ops
      .lock()
      .unwrap()
      .push(PlatformOp::OpenWindow(url.to_string()));
    Ok(())
  }

  fn is_standalone(&self) -> bool {
    self.standalone.load(Ordering::SeqCst)
  }

  fn has_waiting_update(&self) -> bool {
    self.waiting_update.load(Ordering::SeqCst)
  }
}

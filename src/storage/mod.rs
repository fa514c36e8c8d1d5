//! Durable key-value stores.
//!
//! Two independent stores back the data layer:
//! - a *persistent* store (favorites, read-list, ratings, notes, preferences)
//! - a *session* store (browse caches, scroll positions, last clicked work)
//!
//! Every operation is infallible from the caller's point of view. A storage
//! failure (disabled storage, quota, serialization) is logged and treated as
//! "absent" on read and "dropped" on write, so the rest of the system degrades
//! to in-memory behaviour instead of failing.
//!
//! Each store handle is one execution context. Writes made through one handle
//! are announced to subscribers of every *other* handle on the same backing
//! data, which is how collections stay consistent across contexts.

pub mod keys;
mod memory;
mod sqlite;

pub use memory::{MemoryStore, NoopStore};
pub use sqlite::{data_dir, SqliteStore};

use serde::{de::DeserializeOwned, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, warn};

/// Origin id used for changes whose writer is unknown (another process).
pub const EXTERNAL_ORIGIN: u64 = 0;

static NEXT_ORIGIN: AtomicU64 = AtomicU64::new(1);

/// Allocate an origin id for a new store handle.
pub(crate) fn next_origin() -> u64 {
  NEXT_ORIGIN.fetch_add(1, Ordering::Relaxed)
}

/// Notification that a key changed in some execution context.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageEvent {
  /// Changed key, or `None` when the set of changed keys is unknown.
  pub key: Option<String>,
  /// Handle that made the change.
  pub origin: u64,
}

impl StorageEvent {
  pub fn key(key: &str, origin: u64) -> Self {
    Self {
      key: Some(key.to_string()),
      origin,
    }
  }

  pub fn everything(origin: u64) -> Self {
    Self { key: None, origin }
  }

  /// Whether a consumer of `key` must reload.
  pub fn affects(&self, key: &str) -> bool {
    self.key.as_deref().map_or(true, |k| k == key)
  }
}

/// Stream of changes made by other execution contexts.
pub struct StorageSubscription {
  rx: broadcast::Receiver<StorageEvent>,
  origin: u64,
}

impl StorageSubscription {
  pub(crate) fn new(rx: broadcast::Receiver<StorageEvent>, origin: u64) -> Self {
    Self { rx, origin }
  }

  /// Wait for the next foreign change. Returns `None` once the store is gone.
  ///
  /// If the subscriber fell behind, a catch-all event is returned so the
  /// consumer reloads everything it mirrors.
  pub async fn next(&mut self) -> Option<StorageEvent> {
    loop {
      match self.rx.recv().await {
        Ok(event) if event.origin == self.origin => continue,
        Ok(event) => return Some(event),
        Err(broadcast::error::RecvError::Lagged(skipped)) => {
          debug!("Storage subscriber lagged by {} events", skipped);
          return Some(StorageEvent::everything(EXTERNAL_ORIGIN));
        }
        Err(broadcast::error::RecvError::Closed) => return None,
      }
    }
  }

  /// Non-blocking variant of [`next`](Self::next).
  pub fn try_next(&mut self) -> Option<StorageEvent> {
    loop {
      match self.rx.try_recv() {
        Ok(event) if event.origin == self.origin => continue,
        Ok(event) => return Some(event),
        Err(broadcast::error::TryRecvError::Lagged(_)) => {
          return Some(StorageEvent::everything(EXTERNAL_ORIGIN))
        }
        Err(_) => return None,
      }
    }
  }
}

/// Raw string key-value store.
pub trait KeyValueStore: Send + Sync {
  /// Read a value. Any failure reads as absent.
  fn get(&self, key: &str) -> Option<String>;

  /// Write a value. Any failure silently drops the write.
  fn set(&self, key: &str, value: &str);

  /// Delete a value. Any failure is ignored.
  fn remove(&self, key: &str);

  /// Subscribe to changes made through other handles.
  fn subscribe(&self) -> StorageSubscription;
}

/// JSON helpers available on every store.
pub trait KeyValueStoreExt {
  /// Read and decode a JSON value. Malformed data reads as absent.
  fn get_json<T: DeserializeOwned>(&self, key: &str) -> Option<T>;

  /// Encode and write a JSON value.
  fn set_json<T: Serialize + ?Sized>(&self, key: &str, value: &T);
}

impl<S: KeyValueStore + ?Sized> KeyValueStoreExt for S {
  fn get_json<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
    let raw = self.get(key)?;
    match serde_json::from_str(&raw) {
      Ok(value) => Some(value),
      Err(e) => {
        debug!("Ignoring malformed value under {}: {}", key, e);
        None
      }
    }
  }

  fn set_json<T: Serialize + ?Sized>(&self, key: &str, value: &T) {
    match serde_json::to_string(value) {
      Ok(raw) => self.set(key, &raw),
      Err(e) => warn!("Failed to serialize value for {}: {}", key, e),
    }
  }
}

/// The pair of stores the data layer runs on.
#[derive(Clone)]
pub struct Stores {
  pub persistent: Arc<dyn KeyValueStore>,
  pub session: Arc<dyn KeyValueStore>,
}

impl Stores {
  /// Both stores held in memory only.
  pub fn in_memory() -> Self {
    Self {
      persistent: Arc::new(MemoryStore::new()),
      session: Arc::new(MemoryStore::new()),
    }
  }
}

//! In-process stores.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::sync::broadcast;
use tracing::warn;

use super::{next_origin, KeyValueStore, StorageEvent, StorageSubscription};

const EVENT_CAPACITY: usize = 64;

struct Shared {
  values: Mutex<HashMap<String, String>>,
  events: broadcast::Sender<StorageEvent>,
  /// Maximum total bytes of keys plus values, if limited.
  quota: Option<usize>,
}

/// Store held in process memory.
///
/// [`attach`](MemoryStore::attach) opens another handle on the same data,
/// standing in for a second execution context.
pub struct MemoryStore {
  shared: Arc<Shared>,
  origin: u64,
}

impl MemoryStore {
  pub fn new() -> Self {
    Self::build(None)
  }

  /// Store that drops writes once the data would exceed `bytes`.
  pub fn with_quota(bytes: usize) -> Self {
    Self::build(Some(bytes))
  }

  fn build(quota: Option<usize>) -> Self {
    let (events, _) = broadcast::channel(EVENT_CAPACITY);
    Self {
      shared: Arc::new(Shared {
        values: Mutex::new(HashMap::new()),
        events,
        quota,
      }),
      origin: next_origin(),
    }
  }

  /// Open another context on the same data.
  pub fn attach(&self) -> Self {
    Self {
      shared: Arc::clone(&self.shared),
      origin: next_origin(),
    }
  }

  fn announce(&self, key: &str) {
    // No receivers is fine.
    let _ = self.shared.events.send(StorageEvent::key(key, self.origin));
  }
}

impl Default for MemoryStore {
  fn default() -> Self {
    Self::new()
  }
}

impl KeyValueStore for MemoryStore {
  fn get(&self, key: &str) -> Option<String> {
    let values = self.shared.values.lock().ok()?;
    values.get(key).cloned()
  }

  fn set(&self, key: &str, value: &str) {
    {
      let Ok(mut values) = self.shared.values.lock() else {
        warn!("Memory store lock poisoned, dropping write to {}", key);
        return;
      };

      if let Some(quota) = self.shared.quota {
        let used: usize = values
          .iter()
          .filter(|(k, _)| k.as_str() != key)
          .map(|(k, v)| k.len() + v.len())
          .sum();
        if used + key.len() + value.len() > quota {
          warn!("Storage quota exceeded, dropping write to {}", key);
          return;
        }
      }

      values.insert(key.to_string(), value.to_string());
    }
    self.announce(key);
  }

  fn remove(&self, key: &str) {
    let removed = match self.shared.values.lock() {
      Ok(mut values) => values.remove(key).is_some(),
      Err(_) => false,
    };
    if removed {
      self.announce(key);
    }
  }

  fn subscribe(&self) -> StorageSubscription {
    StorageSubscription::new(self.shared.events.subscribe(), self.origin)
  }
}

/// Store that keeps nothing. Stands in for disabled storage.
pub struct NoopStore {
  events: broadcast::Sender<StorageEvent>,
}

impl NoopStore {
  pub fn new() -> Self {
    let (events, _) = broadcast::channel(1);
    Self { events }
  }
}

impl Default for NoopStore {
  fn default() -> Self {
    Self::new()
  }
}

impl KeyValueStore for NoopStore {
  fn get(&self, _key: &str) -> Option<String> {
    None // Always miss
  }

  fn set(&self, _key: &str, _value: &str) {} // Discard

  fn remove(&self, _key: &str) {}

  fn subscribe(&self) -> StorageSubscription {
    StorageSubscription::new(self.events.subscribe(), 0)
  }
}

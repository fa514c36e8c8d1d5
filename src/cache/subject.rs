//! Two-tier subject browse cache with request coalescing.

use chrono::{DateTime, Duration, Utc};
use futures::future::{BoxFuture, FutureExt, Shared};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use tracing::debug;

use crate::catalog::{BookSearchItem, CatalogClient, CatalogError};
use crate::clock::Clock;
use crate::storage::{keys, KeyValueStore, KeyValueStoreExt};

/// Default time-to-live of a subject listing, in hours.
pub const DEFAULT_SUBJECT_TTL_HOURS: i64 = 6;

/// Cached listing for one (subject, limit).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubjectCacheEntry {
  pub subject: String,
  pub limit: u32,
  pub items: Vec<BookSearchItem>,
  pub saved_at: DateTime<Utc>,
}

type SubjectResult = Result<Vec<BookSearchItem>, CatalogError>;
type PendingFetch = Shared<BoxFuture<'static, SubjectResult>>;

struct Inner {
  client: CatalogClient,
  session: Arc<dyn KeyValueStore>,
  clock: Arc<dyn Clock>,
  memory: Mutex<HashMap<String, SubjectCacheEntry>>,
  inflight: Mutex<HashMap<String, PendingFetch>>,
  /// Bumped by `reset`; fetches started under an older generation must not
  /// write their results.
  generation: AtomicU64,
}

impl Inner {
  fn remember(&self, key: &str, entry: SubjectCacheEntry) {
    self.session.set_json(key, &entry);
    if let Ok(mut memory) = self.memory.lock() {
      memory.insert(key.to_string(), entry);
    }
  }

  /// Look up both tiers; promotes session hits into memory.
  fn lookup(&self, key: &str) -> Option<SubjectCacheEntry> {
    if let Some(hit) = self.memory.lock().ok()?.get(key).cloned() {
      return Some(hit);
    }
    let hit = self.session.get_json::<SubjectCacheEntry>(key)?;
    if let Ok(mut memory) = self.memory.lock() {
      memory.insert(key.to_string(), hit.clone());
    }
    Some(hit)
  }
}

/// Subject listings cached in memory and in the session store.
///
/// Lookup order is memory, then session, then network. Concurrent fetches of
/// the same (subject, limit) share one network request; a failure reaches
/// every waiter and leaves nothing behind, so the key can be fetched again
/// right away.
#[derive(Clone)]
pub struct SubjectCache {
  inner: Arc<Inner>,
}

impl SubjectCache {
  pub fn new(client: CatalogClient, session: Arc<dyn KeyValueStore>, clock: Arc<dyn Clock>) -> Self {
    Self {
      inner: Arc::new(Inner {
        client,
        session,
        clock,
        memory: Mutex::new(HashMap::new()),
        inflight: Mutex::new(HashMap::new()),
        generation: AtomicU64::new(0),
      }),
    }
  }

  /// Cached listing regardless of age. Never touches the network.
  pub fn peek(&self, subject: &str, limit: u32) -> Option<Vec<BookSearchItem>> {
    self
      .inner
      .lookup(&keys::subject(subject, limit))
      .map(|entry| entry.items)
  }

  /// Listing no older than `ttl`, fetching it if needed.
  pub async fn fetch(&self, subject: &str, limit: u32, ttl: Duration) -> SubjectResult {
    let key = keys::subject(subject, limit);

    if let Some(entry) = self.inner.lookup(&key) {
      if self.inner.clock.now() - entry.saved_at < ttl {
        debug!("Subject {} served from cache", subject);
        return Ok(entry.items);
      }
    }

    let pending = {
      let mut inflight = self
        .inner
        .inflight
        .lock()
        .map_err(|e| CatalogError::Transport(format!("Lock poisoned: {}", e)))?;
      match inflight.get(&key) {
        Some(pending) => {
          debug!("Joining in-flight fetch for subject {}", subject);
          pending.clone()
        }
        None => {
          let pending = self.start_fetch(key.clone(), subject.to_string(), limit);
          inflight.insert(key, pending.clone());
          pending
        }
      }
    };

    pending.await
  }

  /// Forget the memory tier and any pending fetches.
  ///
  /// Fetches already running complete for their callers but no longer write
  /// to either tier. Session entries stay and expire by TTL.
  pub fn reset(&self) {
    self.inner.generation.fetch_add(1, Ordering::SeqCst);
    if let Ok(mut memory) = self.inner.memory.lock() {
      memory.clear();
    }
    if let Ok(mut inflight) = self.inner.inflight.lock() {
      inflight.clear();
    }
  }

  /// Number of fetches currently outstanding.
  pub fn pending(&self) -> usize {
    self.inner.inflight.lock().map(|m| m.len()).unwrap_or(0)
  }

  /// Run the fetch as its own task so it completes, writes its result and
  /// leaves `inflight` even if every waiter is dropped.
  fn start_fetch(&self, key: String, subject: String, limit: u32) -> PendingFetch {
    let inner = Arc::clone(&self.inner);
    let generation = inner.generation.load(Ordering::SeqCst);

    let task = tokio::spawn(async move {
      let result = inner.client.get_subject_books(&subject, limit).await;
      let current = inner.generation.load(Ordering::SeqCst) == generation;

      if current {
        if let Ok(items) = &result {
          let entry = SubjectCacheEntry {
            subject: subject.clone(),
            limit,
            items: items.clone(),
            saved_at: inner.clock.now(),
          };
          inner.remember(&key, entry);
        }
        if let Ok(mut inflight) = inner.inflight.lock() {
          inflight.remove(&key);
        }
      } else {
        debug!("Discarding superseded fetch for subject {}", subject);
      }

      result
    });

    async move {
      task
        .await
        .unwrap_or_else(|e| Err(CatalogError::Transport(format!("Subject fetch aborted: {}", e))))
    }
    .boxed()
    .shared()
  }
}

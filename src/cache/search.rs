//! Bounded, expiring cache of search result pages.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex};
use tracing::debug;

use crate::catalog::{BookSearchItem, SearchPage};
use crate::clock::Clock;
use crate::storage::{keys, KeyValueStore, KeyValueStoreExt};

/// Default time-to-live of a cached page, in minutes.
pub const DEFAULT_SEARCH_TTL_MINUTES: i64 = 30;
/// Default maximum number of cached pages.
pub const DEFAULT_SEARCH_MAX_ENTRIES: usize = 50;

/// One cached page, keyed by (normalized query, page).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchCacheEntry {
  pub q: String,
  pub page: u32,
  pub items: Vec<BookSearchItem>,
  pub num_found: u64,
  /// Last write or read; drives both expiry and recency.
  pub saved_at: DateTime<Utc>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct CacheDb {
  #[serde(default)]
  entries: Vec<SearchCacheEntry>,
}

/// Normalize a query for cache keying.
pub fn normalize_query(query: &str) -> String {
  query.trim().to_lowercase()
}

/// Session-backed cache of (query, page) → results.
///
/// Every read and write first prunes: entries older than the TTL are dropped,
/// the rest are ordered most recent first and truncated to the entry bound.
/// A read hit refreshes the entry's recency.
pub struct SearchResultCache {
  session: Arc<dyn KeyValueStore>,
  clock: Arc<dyn Clock>,
  ttl: Duration,
  max_entries: usize,
  /// Serializes load-modify-save cycles.
  guard: Mutex<()>,
}

impl SearchResultCache {
  pub fn new(session: Arc<dyn KeyValueStore>, clock: Arc<dyn Clock>) -> Self {
    Self {
      session,
      clock,
      ttl: Duration::minutes(DEFAULT_SEARCH_TTL_MINUTES),
      max_entries: DEFAULT_SEARCH_MAX_ENTRIES,
      guard: Mutex::new(()),
    }
  }

  pub fn with_ttl(mut self, ttl: Duration) -> Self {
    self.ttl = ttl;
    self
  }

  pub fn with_max_entries(mut self, max_entries: usize) -> Self {
    self.max_entries = max_entries;
    self
  }

  /// Cached page for `query`, if present and fresh.
  pub fn get_page(&self, query: &str, page: u32) -> Option<SearchPage> {
    let _guard = self.guard.lock().ok()?;
    let now = self.clock.now();
    let mut db = self.load();
    self.prune(&mut db, now);

    let q = normalize_query(query);
    let position = db.entries.iter().position(|e| e.q == q && e.page == page);
    let Some(position) = position else {
      debug!("Search cache miss for {:?} page {}", q, page);
      return None;
    };

    // Refresh recency and move to the front so equal timestamps keep LRU order.
    let mut entry = db.entries.remove(position);
    entry.saved_at = now;
    let hit = SearchPage {
      items: entry.items.clone(),
      num_found: entry.num_found,
    };
    db.entries.insert(0, entry);
    self.save(&db);

    debug!("Search cache hit for {:?} page {}", q, page);
    Some(hit)
  }

  /// Store a page, replacing any entry for the same (query, page).
  pub fn put_page(&self, query: &str, page: u32, items: &[BookSearchItem], num_found: u64) {
    let Ok(_guard) = self.guard.lock() else {
      return;
    };
    let now = self.clock.now();
    let mut db = self.load();
    self.prune(&mut db, now);

    let q = normalize_query(query);
    db.entries.retain(|e| !(e.q == q && e.page == page));
    db.entries.insert(
      0,
      SearchCacheEntry {
        q,
        page,
        items: items.to_vec(),
        num_found,
        saved_at: now,
      },
    );

    self.prune(&mut db, now);
    self.save(&db);
  }

  /// Drop every cached page.
  pub fn clear(&self) {
    self.session.remove(keys::SEARCH_CACHE);
  }

  /// Number of live entries.
  pub fn len(&self) -> usize {
    let mut db = self.load();
    self.prune(&mut db, self.clock.now());
    db.entries.len()
  }

  pub fn is_empty(&self) -> bool {
    self.len() == 0
  }

  fn load(&self) -> CacheDb {
    self
      .session
      .get_json::<CacheDb>(keys::SEARCH_CACHE)
      .unwrap_or_default()
  }

  fn save(&self, db: &CacheDb) {
    self.session.set_json(keys::SEARCH_CACHE, db);
  }

  fn prune(&self, db: &mut CacheDb, now: DateTime<Utc>) {
    db.entries.retain(|e| now - e.saved_at <= self.ttl);
    // Stable: ties keep their current (front = most recent) order.
    db.entries.sort_by(|a, b| b.saved_at.cmp(&a.saved_at));
    db.entries.truncate(self.max_entries);
  }
}

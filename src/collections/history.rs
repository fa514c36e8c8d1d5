use std::sync::Arc;

use crate::storage::{keys, KeyValueStore, KeyValueStoreExt};

/// Number of past queries kept.
pub const MAX_HISTORY: usize = 10;

/// Recent search queries, most recent first.
#[derive(Clone)]
pub struct SearchHistory {
  store: Arc<dyn KeyValueStore>,
}

impl SearchHistory {
  pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
    Self { store }
  }

  /// Record a query. Blank queries are ignored; an earlier query differing
  /// only in case is replaced.
  pub fn add(&self, query: &str) {
    let q = query.trim();
    if q.is_empty() {
      return;
    }
    let lowered = q.to_lowercase();
    let mut items = self.list();
    items.retain(|x| x.to_lowercase() != lowered);
    items.insert(0, q.to_string());
    items.truncate(MAX_HISTORY);
    self.store.set_json(keys::SEARCH_HISTORY, &items);
  }

  pub fn list(&self) -> Vec<String> {
    self
      .store
      .get_json(keys::SEARCH_HISTORY)
      .unwrap_or_default()
  }

  pub fn clear(&self) {
    self.store.remove(keys::SEARCH_HISTORY);
  }

  /// Past queries containing `input`, case-insensitively.
  pub fn matching(&self, input: &str, limit: usize) -> Vec<String> {
    let q = input.trim().to_lowercase();
    if q.is_empty() {
      return Vec::new();
    }
    self
      .list()
      .into_iter()
      .filter(|h| h.to_lowercase().contains(&q))
      .take(limit)
      .collect()
  }
}

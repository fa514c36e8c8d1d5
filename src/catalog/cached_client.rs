//! Catalog client with the rating lookup cached across the session.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tracing::{debug, warn};

use crate::storage::{keys, KeyValueStore, KeyValueStoreExt};

use super::client::CatalogClient;
use super::error::CatalogError;
use super::types::{AuthorDetail, SearchPage, WorkDetail, WorkRating};

/// Catalog access point for the rest of the system.
///
/// Search, work and author lookups go straight to the network and surface
/// their errors. Rating summaries are cached in memory and in the session
/// store without expiry, and a failed lookup caches an empty summary so a
/// broken endpoint is not hit again for the same work.
#[derive(Clone)]
pub struct CachedCatalog {
  inner: CatalogClient,
  ratings: Arc<Mutex<HashMap<String, WorkRating>>>,
  session: Arc<dyn KeyValueStore>,
}

impl CachedCatalog {
  pub fn new(inner: CatalogClient, session: Arc<dyn KeyValueStore>) -> Self {
    Self {
      inner,
      ratings: Arc::new(Mutex::new(HashMap::new())),
      session,
    }
  }

  /// The uncached client.
  pub fn client(&self) -> &CatalogClient {
    &self.inner
  }

  pub async fn search_books(&self, query: &str, page: u32) -> Result<SearchPage, CatalogError> {
    self.inner.search_books(query, page).await
  }

  pub async fn get_work_detail(&self, work_id: &str) -> Result<WorkDetail, CatalogError> {
    self.inner.get_work_detail(work_id).await
  }

  pub async fn get_author_detail(&self, author_id: &str) -> Result<AuthorDetail, CatalogError> {
    self.inner.get_author_detail(author_id).await
  }

  /// Rating summary for a work. Never fails.
  pub async fn get_work_rating(&self, work_id: &str) -> WorkRating {
    if let Some(hit) = self.memory_rating(work_id) {
      return hit;
    }

    let key = keys::work_rating(work_id);
    if let Some(hit) = self.session.get_json::<WorkRating>(&key) {
      debug!("Rating for {} served from session store", work_id);
      self.remember_rating(work_id, &hit);
      return hit;
    }

    let rating = match self.inner.get_work_rating(work_id).await {
      Ok(rating) => rating,
      Err(e) => {
        warn!("Rating lookup for {} failed, caching empty summary: {}", work_id, e);
        WorkRating::default()
      }
    };

    self.remember_rating(work_id, &rating);
    self.session.set_json(&key, &rating);
    rating
  }

  fn memory_rating(&self, work_id: &str) -> Option<WorkRating> {
    self.ratings.lock().ok()?.get(work_id).cloned()
  }

  fn remember_rating(&self, work_id: &str, rating: &WorkRating) {
    if let Ok(mut ratings) = self.ratings.lock() {
      ratings.insert(work_id.to_string(), rating.clone());
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::catalog::mock::MockTransport;
  use crate::storage::MemoryStore;
  use serde_json::json;

  fn catalog(mock: &MockTransport, session: Arc<dyn KeyValueStore>) -> CachedCatalog {
    let client = CatalogClient::new("https://openlibrary.org", Arc::new(mock.clone())).unwrap();
    CachedCatalog::new(client, session)
  }

  #[tokio::test]
  async fn test_rating_cached_in_both_tiers() {
    let mock = MockTransport::new();
    mock.json(
      "/works/OL1W/ratings.json",
      json!({"summary": {"average": 4.0, "count": 2}}),
    );
    let session: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::new());
    let catalog = catalog(&mock, Arc::clone(&session));

    let first = catalog.get_work_rating("OL1W").await;
    let second = catalog.get_work_rating("OL1W").await;
    assert_eq!(first.average, Some(4.0));
    assert_eq!(first, second);
    assert_eq!(mock.calls("/works/OL1W/ratings.json"), 1);
    assert!(session.get(&keys::work_rating("OL1W")).is_some());
  }

  #[tokio::test]
  async fn test_rating_served_from_session_after_reload() {
    let mock = MockTransport::new();
    let session: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::new());
    session.set_json(
      &keys::work_rating("OL1W"),
      &WorkRating {
        average: Some(2.5),
        count: Some(8),
        counts: None,
      },
    );

    // Fresh instance, as after a page reload.
    let rating = catalog(&mock, session).get_work_rating("OL1W").await;
    assert_eq!(rating.count, Some(8));
    assert_eq!(mock.total_calls(), 0);
  }

  #[tokio::test]
  async fn test_failed_rating_is_cached_as_empty() {
    let mock = MockTransport::new();
    mock.status("/works/OL1W/ratings.json", 500, json!({}));
    let catalog = catalog(&mock, Arc::new(MemoryStore::new()));

    assert!(catalog.get_work_rating("OL1W").await.is_empty());
    assert!(catalog.get_work_rating("OL1W").await.is_empty());
    assert_eq!(mock.calls("/works/OL1W/ratings.json"), 1);
  }
}

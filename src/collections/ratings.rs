use std::collections::BTreeMap;
use std::sync::Arc;

use crate::storage::{keys, KeyValueStore, KeyValueStoreExt};

/// Highest personal rating.
pub const MAX_RATING: u8 = 5;

/// Personal star ratings for read works, 1..=5. Zero means unrated and is
/// never stored.
///
/// Reads go to the store every time, so changes from other contexts are
/// always visible.
#[derive(Clone)]
pub struct ReadRatings {
  store: Arc<dyn KeyValueStore>,
}

impl ReadRatings {
  pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
    Self { store }
  }

  /// Rating for a work, or 0 when unrated.
  pub fn get_rating(&self, work_id: &str) -> u8 {
    self
      .all()
      .get(work_id)
      .copied()
      .filter(|r| (1..=MAX_RATING).contains(r))
      .unwrap_or(0)
  }

  /// Set a rating, clamped to 0..=5. A rating of 0 deletes the entry.
  pub fn set_rating(&self, work_id: &str, rating: i64) {
    let rating = rating.clamp(0, MAX_RATING as i64) as u8;
    let mut all = self.all();
    if rating == 0 {
      all.remove(work_id);
    } else {
      all.insert(work_id.to_string(), rating);
    }
    self.store.set_json(keys::READ_RATINGS, &all);
  }

  pub fn remove_rating(&self, work_id: &str) {
    self.set_rating(work_id, 0);
  }

  /// Every stored rating.
  pub fn all(&self) -> BTreeMap<String, u8> {
    self
      .store
      .get_json(keys::READ_RATINGS)
      .unwrap_or_default()
  }
}

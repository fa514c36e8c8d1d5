//! Sort and filter preferences for the read-list and favorites views.

use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::storage::{keys, KeyValueStore, KeyValueStoreExt};

use super::ratings::MAX_RATING;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ReadSort {
  /// Order of addition to the read-list
  Recent,
  TitleAsc,
  TitleDesc,
  #[default]
  RatingDesc,
  RatingAsc,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FavoritesSort {
  #[default]
  TitleAsc,
  TitleDesc,
  AuthorAsc,
  AuthorDesc,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ReadPrefs {
  pub sort: ReadSort,
  /// Hide works rated below this, 0..=5.
  pub min_rating: u8,
}

impl ReadPrefs {
  fn clamped(mut self) -> Self {
    self.min_rating = self.min_rating.min(MAX_RATING);
    self
  }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FavoritesPrefs {
  pub sort: FavoritesSort,
  pub filter: String,
}

/// Persisted view preferences.
#[derive(Clone)]
pub struct Preferences {
  store: Arc<dyn KeyValueStore>,
}

impl Preferences {
  pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
    Self { store }
  }

  /// Stored read-view preferences; malformed data yields the defaults.
  pub fn read_prefs(&self) -> ReadPrefs {
    self
      .store
      .get_json::<ReadPrefs>(keys::READ_PREFS)
      .unwrap_or_default()
      .clamped()
  }

  pub fn set_read_prefs(&self, prefs: ReadPrefs) {
    self.store.set_json(keys::READ_PREFS, &prefs.clamped());
  }

  pub fn favorites_prefs(&self) -> FavoritesPrefs {
    self
      .store
      .get_json(keys::FAVORITES_PREFS)
      .unwrap_or_default()
  }

  pub fn set_favorites_prefs(&self, prefs: &FavoritesPrefs) {
    self.store.set_json(keys::FAVORITES_PREFS, prefs);
  }
}

//! Session-scoped positional state: scroll offsets, last focused work, last
//! search location.
//!
//! Locations are logical (path + query string), so `/?q=dune&page=1` and
//! `/?q=dune&page=2` remember independent offsets.

use std::sync::Arc;

use crate::storage::{keys, KeyValueStore};

/// Location returned when no search was remembered.
pub const DEFAULT_SEARCH_URL: &str = "/";

#[derive(Clone)]
pub struct NavigationMemory {
  session: Arc<dyn KeyValueStore>,
}

impl NavigationMemory {
  pub fn new(session: Arc<dyn KeyValueStore>) -> Self {
    Self { session }
  }

  /// Remember the scroll offset at `location`. Negative offsets are stored
  /// as 0; non-finite offsets are ignored.
  pub fn save_scroll_position(&self, location: &str, y: f64) {
    if !y.is_finite() {
      return;
    }
    self
      .session
      .set(&keys::scroll(location), &y.max(0.0).to_string());
  }

  pub fn restore_scroll_position(&self, location: &str) -> Option<f64> {
    let raw = self.session.get(&keys::scroll(location))?;
    raw
      .trim()
      .parse::<f64>()
      .ok()
      .filter(|y| y.is_finite() && *y >= 0.0)
  }

  /// Remember the work the user last opened, to refocus it on return.
  pub fn set_last_focused_work(&self, work_id: &str) {
    self.session.set(keys::LAST_CLICKED_WORK, work_id);
  }

  /// Take the last focused work. A second call returns `None`.
  pub fn consume_last_focused_work(&self) -> Option<String> {
    let work_id = self.session.get(keys::LAST_CLICKED_WORK)?;
    self.session.remove(keys::LAST_CLICKED_WORK);
    Some(work_id).filter(|id| !id.is_empty())
  }

  pub fn set_last_search_url(&self, url: &str) {
    self.session.set(keys::LAST_SEARCH_URL, url);
  }

  /// Location of the last search, or `/`.
  pub fn last_search_url(&self) -> String {
    self
      .session
      .get(keys::LAST_SEARCH_URL)
      .filter(|url| !url.is_empty())
      .unwrap_or_else(|| DEFAULT_SEARCH_URL.to_string())
  }
}

//! Storage key names.

use sha2::{Digest, Sha256};

// Persistent store
pub const FAVORITES: &str = "libris:favorites";
pub const READ_LIST: &str = "libris:read:v1";
pub const READ_RATINGS: &str = "libris:read-ratings:v1";
pub const READ_NOTES: &str = "libris:read-notes:v1";
pub const READ_PREFS: &str = "libris:read-prefs:v1";
pub const FAVORITES_PREFS: &str = "libris:favorites-prefs:v2";
pub const SEARCH_HISTORY: &str = "libris:search-history:v1";

// Session store
pub const SEARCH_CACHE: &str = "libris:search-cache:v2";
pub const LAST_CLICKED_WORK: &str = "libris:last-clicked-workid:v1";
pub const LAST_SEARCH_URL: &str = "libris:last-search-url:v1";

/// Browse cache entry for one subject listing.
pub fn subject(subject: &str, limit: u32) -> String {
  format!("libris:subject:v1:{}:{}", subject, limit)
}

/// Cached rating summary for one work.
pub fn work_rating(work_id: &str) -> String {
  format!("libris:ol-ratings:v1:{}", work_id)
}

/// Remembered scroll offset for a logical location (path + query).
///
/// Locations are hashed so arbitrarily long URLs map to fixed-length keys.
pub fn scroll(location: &str) -> String {
  let mut hasher = Sha256::new();
  hasher.update(location.as_bytes());
  format!("libris:scroll:{}", hex::encode(hasher.finalize()))
}

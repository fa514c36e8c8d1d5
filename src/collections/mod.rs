//! User-owned data kept in the persistent store.

mod history;
mod list;
mod notes;
mod prefs;
mod ratings;

pub use history::{SearchHistory, MAX_HISTORY};
pub use list::EntityCollection;
pub use notes::ReadNotes;
pub use prefs::{FavoritesPrefs, FavoritesSort, Preferences, ReadPrefs, ReadSort};
pub use ratings::{ReadRatings, MAX_RATING};

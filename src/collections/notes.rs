use std::collections::BTreeMap;
use std::sync::Arc;

use crate::storage::{keys, KeyValueStore, KeyValueStoreExt};

/// Free-text personal notes per work.
#[derive(Clone)]
pub struct ReadNotes {
  store: Arc<dyn KeyValueStore>,
}

impl ReadNotes {
  pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
    Self { store }
  }

  /// Note for a work, or "" when there is none.
  pub fn get_note(&self, work_id: &str) -> String {
    self.all().remove(work_id).unwrap_or_default()
  }

  /// Store a note as written. Blank text deletes the note instead.
  pub fn set_note(&self, work_id: &str, note: &str) {
    let mut all = self.all();
    if note.trim().is_empty() {
      all.remove(work_id);
    } else {
      all.insert(work_id.to_string(), note.to_string());
    }
    self.store.set_json(keys::READ_NOTES, &all);
  }

  pub fn remove_note(&self, work_id: &str) {
    self.set_note(work_id, "");
  }

  pub fn all(&self) -> BTreeMap<String, String> {
    self.store.get_json(keys::READ_NOTES).unwrap_or_default()
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::storage::MemoryStore;

  #[test]
  fn test_whitespace_note_deletes() {
    let notes = ReadNotes::new(Arc::new(MemoryStore::new()));
    notes.set_note("OL1W", "Loved the ending");
    assert_eq!(notes.get_note("OL1W"), "Loved the ending");

    notes.set_note("OL1W", "  ");
    assert_eq!(notes.get_note("OL1W"), "");
    assert!(notes.all().is_empty());
  }

  #[test]
  fn test_note_kept_verbatim() {
    let notes = ReadNotes::new(Arc::new(MemoryStore::new()));
    notes.set_note("OL1W", "  two\nlines ");
    assert_eq!(notes.get_note("OL1W"), "  two\nlines ");
    notes.remove_note("OL1W");
    assert_eq!(notes.get_note("OL1W"), "");
  }
}

//! Ordered, unique-by-work collections persisted as a whole.

use std::sync::{Arc, Mutex, MutexGuard, Weak};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::catalog::BookSearchItem;
use crate::storage::{keys, KeyValueStore, KeyValueStoreExt, StorageEvent};

/// A named list of works, unique by work id, in order of addition.
///
/// Loaded once from the persistent store; every mutation rewrites the whole
/// list. A change to the same key from another context replaces local state
/// with a fresh load.
pub struct EntityCollection {
  key: String,
  store: Arc<dyn KeyValueStore>,
  items: Mutex<Vec<BookSearchItem>>,
}

impl EntityCollection {
  /// Load the collection stored under `key`.
  pub fn load(store: Arc<dyn KeyValueStore>, key: &str) -> Self {
    let items = read_items(store.as_ref(), key);
    Self {
      key: key.to_string(),
      store,
      items: Mutex::new(items),
    }
  }

  pub fn favorites(store: Arc<dyn KeyValueStore>) -> Self {
    Self::load(store, keys::FAVORITES)
  }

  pub fn read_list(store: Arc<dyn KeyValueStore>) -> Self {
    Self::load(store, keys::READ_LIST)
  }

  pub fn key(&self) -> &str {
    &self.key
  }

  /// Items in order of addition.
  pub fn list(&self) -> Vec<BookSearchItem> {
    self.lock().clone()
  }

  pub fn len(&self) -> usize {
    self.lock().len()
  }

  pub fn is_empty(&self) -> bool {
    self.lock().is_empty()
  }

  pub fn contains(&self, work_id: &str) -> bool {
    self.lock().iter().any(|b| b.work_id == work_id)
  }

  /// Append `item` unless its work is already present.
  pub fn add(&self, item: BookSearchItem) {
    self.mutate(|items| {
      if !items.iter().any(|b| b.work_id == item.work_id) {
        items.push(item);
      }
    });
  }

  pub fn remove(&self, work_id: &str) {
    self.mutate(|items| items.retain(|b| b.work_id != work_id));
  }

  /// Remove `item`'s work if present, otherwise append it.
  ///
  /// Returns whether the work is present afterwards.
  pub fn toggle(&self, item: BookSearchItem) -> bool {
    let mut present = false;
    self.mutate(|items| {
      if items.iter().any(|b| b.work_id == item.work_id) {
        items.retain(|b| b.work_id != item.work_id);
      } else {
        items.push(item);
        present = true;
      }
    });
    present
  }

  pub fn clear(&self) {
    self.mutate(|items| items.clear());
  }

  /// Replace local state with what the store holds now.
  pub fn reload(&self) {
    let fresh = read_items(self.store.as_ref(), &self.key);
    *self.lock() = fresh;
  }

  /// Reload if `event` concerns this collection. Returns whether it did.
  pub fn handle_event(&self, event: &StorageEvent) -> bool {
    if !event.affects(&self.key) {
      return false;
    }
    debug!("Reloading {} after change in another context", self.key);
    self.reload();
    true
  }

  /// Follow changes made by other contexts until the collection is dropped.
  pub fn watch(self: &Arc<Self>) -> JoinHandle<()> {
    let mut subscription = self.store.subscribe();
    let weak: Weak<Self> = Arc::downgrade(self);
    tokio::spawn(async move {
      while let Some(event) = subscription.next().await {
        match weak.upgrade() {
          Some(collection) => {
            collection.handle_event(&event);
          }
          None => break,
        }
      }
    })
  }

  /// Apply `change` and persist the result. The lock is held through the
  /// write so stored snapshots land in mutation order.
  fn mutate(&self, change: impl FnOnce(&mut Vec<BookSearchItem>)) {
    let mut items = self.lock();
    change(&mut items);
    self.store.set_json(&self.key, &*items);
  }

  fn lock(&self) -> MutexGuard<'_, Vec<BookSearchItem>> {
    self.items.lock().unwrap_or_else(|e| {
      warn!("Collection lock poisoned, recovering");
      e.into_inner()
    })
  }
}

/// Stored items, deduplicated by work id keeping the first occurrence.
fn read_items(store: &dyn KeyValueStore, key: &str) -> Vec<BookSearchItem> {
  let stored: Vec<BookSearchItem> = store.get_json(key).unwrap_or_default();
  let mut items: Vec<BookSearchItem> = Vec::with_capacity(stored.len());
  for item in stored {
    if !items.iter().any(|b| b.work_id == item.work_id) {
      items.push(item);
    }
  }
  items
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::catalog::mock::item;
  use crate::storage::MemoryStore;
  use std::time::Duration;

  fn ids(collection: &EntityCollection) -> Vec<String> {
    collection.list().into_iter().map(|b| b.work_id).collect()
  }

  fn favorites() -> (EntityCollection, Arc<MemoryStore>) {
    let store = Arc::new(MemoryStore::new());
    (EntityCollection::favorites(store.clone()), store)
  }

  #[test]
  fn test_add_is_idempotent() {
    let (favs, _) = favorites();
    favs.add(item("a", "A"));
    let once = favs.list();
    favs.add(item("a", "A"));
    assert_eq!(favs.list(), once);
  }

  #[test]
  fn test_add_keeps_first_copy_and_order() {
    let (favs, _) = favorites();
    favs.add(item("a", "A"));
    favs.add(item("b", "B"));
    favs.add(item("a", "Renamed"));
    assert_eq!(ids(&favs), vec!["a", "b"]);
    assert_eq!(favs.list()[0].title, "A");
  }

  #[test]
  fn test_toggle_twice_restores_collection() {
    let (favs, _) = favorites();
    favs.add(item("a", "A"));
    favs.add(item("b", "B"));
    let before = favs.list();

    assert!(favs.toggle(item("c", "C")));
    assert!(!favs.toggle(item("c", "C")));
    assert_eq!(favs.list(), before);
  }

  #[test]
  fn test_toggle_off_then_on_moves_to_end() {
    let (favs, _) = favorites();
    favs.add(item("a", "A"));
    favs.add(item("b", "B"));
    favs.toggle(item("a", "A"));
    favs.toggle(item("a", "A"));
    assert_eq!(ids(&favs), vec!["b", "a"]);
  }

  #[test]
  fn test_no_duplicates_under_mixed_operations() {
    let (favs, _) = favorites();
    let ops = ["a", "b", "a", "c", "b", "a", "a", "c", "d", "d"];
    for (i, id) in ops.iter().enumerate() {
      if i % 2 == 0 {
        favs.add(item(id, id));
      } else {
        favs.toggle(item(id, id));
      }
      let mut seen = ids(&favs);
      let len = seen.len();
      seen.sort();
      seen.dedup();
      assert_eq!(seen.len(), len);
    }
  }

  #[test]
  fn test_every_mutation_is_persisted() {
    let (favs, store) = favorites();
    favs.add(item("a", "A"));
    favs.add(item("b", "B"));
    favs.remove("a");

    let reloaded = EntityCollection::favorites(store.clone());
    assert_eq!(ids(&reloaded), vec!["b"]);

    favs.clear();
    assert!(EntityCollection::favorites(store).is_empty());
  }

  #[test]
  fn test_load_drops_duplicates_and_tolerates_garbage() {
    let store = Arc::new(MemoryStore::new());
    store.set_json(keys::READ_LIST, &vec![item("a", "A"), item("a", "A2")]);
    assert_eq!(EntityCollection::read_list(store.clone()).len(), 1);

    store.set(keys::READ_LIST, "garbage");
    assert!(EntityCollection::read_list(store).is_empty());
  }

  #[test]
  fn test_handle_event_reloads_only_own_key() {
    let tab_a = Arc::new(MemoryStore::new());
    let tab_b = Arc::new(tab_a.attach());
    let favs_a = EntityCollection::favorites(tab_a.clone());
    let favs_b = EntityCollection::favorites(tab_b.clone());
    let mut sub_b = tab_b.subscribe();

    favs_a.add(item("a", "A"));
    assert!(favs_b.is_empty());

    let event = sub_b.try_next().unwrap();
    assert!(favs_b.handle_event(&event));
    assert!(favs_b.contains("a"));

    assert!(!favs_b.handle_event(&StorageEvent::key(keys::READ_LIST, 0)));
  }

  /// Store whose first write stalls.
  struct StallingStore {
    inner: MemoryStore,
    stalled: std::sync::atomic::AtomicBool,
  }

  impl KeyValueStore for StallingStore {
    fn get(&self, key: &str) -> Option<String> {
      self.inner.get(key)
    }

    fn set(&self, key: &str, value: &str) {
      if !self.stalled.swap(true, std::sync::atomic::Ordering::SeqCst) {
        std::thread::sleep(Duration::from_millis(100));
      }
      self.inner.set(key, value);
    }

    fn remove(&self, key: &str) {
      self.inner.remove(key);
    }

    fn subscribe(&self) -> crate::storage::StorageSubscription {
      self.inner.subscribe()
    }
  }

  #[test]
  fn test_concurrent_mutations_persist_in_order() {
    let store = Arc::new(StallingStore {
      inner: MemoryStore::new(),
      stalled: std::sync::atomic::AtomicBool::new(false),
    });
    let favs = Arc::new(EntityCollection::favorites(store.clone()));

    let first = {
      let favs = Arc::clone(&favs);
      std::thread::spawn(move || favs.add(item("a", "A")))
    };
    std::thread::sleep(Duration::from_millis(20));
    let second = {
      let favs = Arc::clone(&favs);
      std::thread::spawn(move || favs.add(item("b", "B")))
    };
    first.join().unwrap();
    second.join().unwrap();

    let persisted: Vec<BookSearchItem> = store.get_json(keys::FAVORITES).unwrap();
    assert_eq!(persisted, favs.list());
    assert_eq!(ids(&favs), vec!["a", "b"]);
  }

  #[tokio::test]
  async fn test_watch_follows_other_context() {
    let tab_a = Arc::new(MemoryStore::new());
    let tab_b = Arc::new(tab_a.attach());
    let favs_a = EntityCollection::favorites(tab_a.clone());
    let favs_b = Arc::new(EntityCollection::favorites(tab_b.clone()));
    let watcher = favs_b.watch();

    favs_a.add(item("a", "A"));
    favs_a.add(item("b", "B"));
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert_eq!(ids(&favs_b), vec!["a", "b"]);

    // Own writes do not bounce back.
    favs_b.remove("a");
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert_eq!(ids(&favs_b), vec!["b"]);

    drop(favs_b);
    favs_a.clear();
    tokio::time::timeout(Duration::from_millis(200), watcher)
      .await
      .unwrap()
      .unwrap();
  }
}

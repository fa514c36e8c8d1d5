use color_eyre::Result;
use futures::future::join_all;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::cache::{SearchResultCache, SubjectCache};
use crate::catalog::{
  BookSearchItem, CachedCatalog, CatalogClient, CatalogError, ReqwestTransport, Transport,
};
use crate::clock::{Clock, SystemClock};
use crate::collections::{EntityCollection, Preferences, ReadNotes, ReadRatings, SearchHistory};
use crate::config::{Category, Config};
use crate::navigation::NavigationMemory;
use crate::pager::SearchPager;
use crate::storage::{KeyValueStore, MemoryStore, SqliteStore, Stores};
use crate::suggest::{SuggestConfig, Suggester};

/// How often SQLite stores look for commits from other processes.
const EXTERNAL_POLL_INTERVAL: Duration = Duration::from_millis(500);

/// One home-screen row. Each row carries its own outcome.
#[derive(Debug, Clone)]
pub struct CategoryRow {
  pub category: Category,
  pub result: Result<Vec<BookSearchItem>, CatalogError>,
}

/// The data layer, constructed once per process and shared by the views.
pub struct App {
  config: Config,
  stores: Stores,
  /// SQLite handles behind `stores`, polled for external changes
  sqlite: Vec<Arc<SqliteStore>>,
  clock: Arc<dyn Clock>,
  catalog: CachedCatalog,
  search_cache: Arc<SearchResultCache>,
  subjects: SubjectCache,
  favorites: Arc<EntityCollection>,
  read_list: Arc<EntityCollection>,
  ratings: ReadRatings,
  notes: ReadNotes,
  history: SearchHistory,
  prefs: Preferences,
  navigation: NavigationMemory,
}

impl App {
  /// Open the on-disk stores and the HTTP catalog described by `config`.
  ///
  /// A store that cannot be opened is replaced by an in-memory one, so the
  /// app keeps working without durability.
  pub fn open(config: Config) -> Result<Self> {
    let data_dir = config.data_dir()?;
    let mut sqlite = Vec::new();

    let persistent: Arc<dyn KeyValueStore> =
      match SqliteStore::default_path(Some(&data_dir)).and_then(|p| SqliteStore::open(&p)) {
        Ok(store) => {
          let store = Arc::new(store);
          sqlite.push(Arc::clone(&store));
          store
        }
        Err(e) => {
          warn!("Persistent storage unavailable, using memory: {}", e);
          Arc::new(MemoryStore::new())
        }
      };

    let session: Arc<dyn KeyValueStore> = match &config.storage.session_id {
      Some(id) => {
        match SqliteStore::session_path(Some(&data_dir), id).and_then(|p| SqliteStore::open(&p)) {
          Ok(store) => {
            let store = Arc::new(store);
            sqlite.push(Arc::clone(&store));
            store
          }
          Err(e) => {
            warn!("Session storage unavailable, using memory: {}", e);
            Arc::new(MemoryStore::new())
          }
        }
      }
      None => Arc::new(MemoryStore::new()),
    };

    let transport = ReqwestTransport::new(&config.catalog.user_agent, config.catalog.timeout())?;
    let mut app = Self::with_parts(
      config,
      Stores {
        persistent,
        session,
      },
      Arc::new(transport),
      Arc::new(SystemClock),
    )?;
    app.sqlite = sqlite;
    Ok(app)
  }

  /// Assemble the app from explicit parts.
  pub fn with_parts(
    config: Config,
    stores: Stores,
    transport: Arc<dyn Transport>,
    clock: Arc<dyn Clock>,
  ) -> Result<Self> {
    let client = CatalogClient::new(&config.catalog.base_url, transport)?;
    let catalog = CachedCatalog::new(client.clone(), Arc::clone(&stores.session));
    let search_cache = Arc::new(
      SearchResultCache::new(Arc::clone(&stores.session), Arc::clone(&clock))
        .with_ttl(config.cache.search_ttl())
        .with_max_entries(config.cache.search_max_entries),
    );
    let subjects = SubjectCache::new(client, Arc::clone(&stores.session), Arc::clone(&clock));

    let persistent = &stores.persistent;
    info!("Data layer ready against {}", config.catalog.base_url);

    Ok(Self {
      favorites: Arc::new(EntityCollection::favorites(Arc::clone(persistent))),
      read_list: Arc::new(EntityCollection::read_list(Arc::clone(persistent))),
      ratings: ReadRatings::new(Arc::clone(persistent)),
      notes: ReadNotes::new(Arc::clone(persistent)),
      history: SearchHistory::new(Arc::clone(persistent)),
      prefs: Preferences::new(Arc::clone(persistent)),
      navigation: NavigationMemory::new(Arc::clone(&stores.session)),
      config,
      sqlite: Vec::new(),
      clock,
      catalog,
      search_cache,
      subjects,
      stores,
    })
  }

  pub fn config(&self) -> &Config {
    &self.config
  }

  pub fn stores(&self) -> &Stores {
    &self.stores
  }

  pub fn clock(&self) -> &Arc<dyn Clock> {
    &self.clock
  }

  pub fn catalog(&self) -> &CachedCatalog {
    &self.catalog
  }

  pub fn search_cache(&self) -> &Arc<SearchResultCache> {
    &self.search_cache
  }

  pub fn subjects(&self) -> &SubjectCache {
    &self.subjects
  }

  pub fn favorites(&self) -> &Arc<EntityCollection> {
    &self.favorites
  }

  pub fn read_list(&self) -> &Arc<EntityCollection> {
    &self.read_list
  }

  pub fn ratings(&self) -> &ReadRatings {
    &self.ratings
  }

  pub fn notes(&self) -> &ReadNotes {
    &self.notes
  }

  pub fn history(&self) -> &SearchHistory {
    &self.history
  }

  pub fn prefs(&self) -> &Preferences {
    &self.prefs
  }

  pub fn navigation(&self) -> &NavigationMemory {
    &self.navigation
  }

  /// A pager for one search view.
  pub fn pager(&self) -> SearchPager {
    SearchPager::new(self.catalog.clone(), Arc::clone(&self.search_cache))
  }

  pub fn suggester(&self) -> Suggester {
    Suggester::new(
      self.catalog.clone(),
      self.history.clone(),
      SuggestConfig::from(&self.config.suggest),
    )
  }

  /// Remove a work from the read-list along with its rating and note.
  pub fn forget_read(&self, work_id: &str) {
    self.read_list.remove(work_id);
    self.ratings.remove_rating(work_id);
    self.notes.remove_note(work_id);
  }

  /// Subject listing with the configured limit and TTL.
  pub async fn fetch_subject(&self, subject: &str) -> Result<Vec<BookSearchItem>, CatalogError> {
    self
      .subjects
      .fetch(subject, self.config.cache.subject_limit, self.config.cache.subject_ttl())
      .await
  }

  /// Load every configured category concurrently.
  pub async fn load_categories(&self) -> Vec<CategoryRow> {
    let rows = self.config.categories.0.iter().map(|category| async move {
      CategoryRow {
        category: category.clone(),
        result: self.fetch_subject(&category.subject).await,
      }
    });
    join_all(rows).await
  }

  /// Keep favorites and the read-list in step with other contexts.
  ///
  /// Also polls SQLite stores for commits made by other processes.
  pub fn watch_collections(&self) -> Vec<JoinHandle<()>> {
    let mut handles = vec![self.favorites.watch(), self.read_list.watch()];
    for store in &self.sqlite {
      handles.push(store.spawn_watcher(EXTERNAL_POLL_INTERVAL));
    }
    handles
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::catalog::mock::{item, MockTransport};
  use crate::clock::ManualClock;
  use crate::config::Categories;
  use serde_json::json;

  fn app_with(mock: &MockTransport, config: Config) -> App {
    App::with_parts(
      config,
      Stores::in_memory(),
      Arc::new(mock.clone()),
      Arc::new(ManualClock::default()),
    )
    .unwrap()
  }

  fn subject_body(titles: &[&str]) -> serde_json::Value {
    let works: Vec<_> = titles
      .iter()
      .enumerate()
      .map(|(i, t)| json!({ "key": format!("/works/OL{}W", i), "title": t, "authors": [] }))
      .collect();
    json!({ "works": works })
  }

  #[tokio::test]
  async fn test_categories_fail_independently() {
    let mock = MockTransport::new();
    mock.json("/subjects/fantasy.json", subject_body(&["The Hobbit"]));
    mock.status("/subjects/history.json", 500, json!({}));

    let config = Config {
      categories: Categories(vec![
        Category {
          title: "Fantasy".into(),
          subject: "fantasy".into(),
        },
        Category {
          title: "History".into(),
          subject: "history".into(),
        },
      ]),
      ..Config::default()
    };
    let app = app_with(&mock, config);

    let rows = app.load_categories().await;
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0].category.title, "Fantasy");
    assert_eq!(rows[0].result.as_ref().unwrap()[0].title, "The Hobbit");
    assert!(rows[1].result.is_err());
  }

  #[tokio::test]
  async fn test_pagers_share_search_cache() {
    let mock = MockTransport::new();
    mock.search_page(1, &[item("a", "A")], 1);
    let app = app_with(&mock, Config::default());

    app.pager().search("dune").await;
    let second = app.pager();
    second.search("dune").await;
    assert_eq!(second.items().len(), 1);
    assert_eq!(mock.search_calls(1), 1);
  }

  #[test]
  fn test_forget_read_clears_rating_and_note() {
    let mock = MockTransport::new();
    let app = app_with(&mock, Config::default());
    app.read_list().add(item("OL1W", "Dune"));
    app.ratings().set_rating("OL1W", 4);
    app.notes().set_note("OL1W", "spice");

    app.forget_read("OL1W");
    assert!(app.read_list().is_empty());
    assert_eq!(app.ratings().get_rating("OL1W"), 0);
    assert_eq!(app.notes().get_note("OL1W"), "");
  }

  #[test]
  fn test_open_with_session_uses_disk() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = Config::default();
    config.storage.data_dir = Some(dir.path().to_path_buf());
    config.storage.session_id = Some("tab-1".into());

    {
      let app = App::open(config.clone()).unwrap();
      app.favorites().add(item("OL1W", "Dune"));
      app.navigation().set_last_search_url("/?q=dune");
    }

    let app = App::open(config).unwrap();
    assert!(app.favorites().contains("OL1W"));
    assert_eq!(app.navigation().last_search_url(), "/?q=dune");
    assert!(dir.path().join("sessions").join("tab-1.db").exists());
  }
}

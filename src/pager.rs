//! Incremental search result loading.
//!
//! A `SearchPager` owns the result list of one search view. Loading page N
//! always materializes pages 1..=N in order, each from the search cache when
//! possible and from the network otherwise, so opening page 5 directly (say
//! from a shared link) yields exactly what scrolling there would.
//!
//! # Example
//!
//! ```ignore
//! let pager = app.pager();
//! pager.search("dune").await;
//!
//! // When the list end scrolls into view
//! pager.load_more().await;
//!
//! match pager.status() {
//!   PagerStatus::LoadingInitial => render_skeleton(),
//!   PagerStatus::ErrorInitial(e) => render_error_with_retry(e),
//!   PagerStatus::ErrorMore(e) => render_list_with_inline_retry(pager.items(), e),
//!   _ => render_list(pager.items()),
//! }
//! ```

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, info};

use crate::cache::{normalize_query, SearchResultCache};
use crate::catalog::{BookSearchItem, CachedCatalog, CatalogError};

/// Where the pager is in its load cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PagerStatus {
  /// No load outstanding
  Idle,
  /// Loading with nothing shown yet
  LoadingInitial,
  /// Loading further pages below the shown items
  LoadingMore,
  /// Nothing could be loaded; the list is blank
  ErrorInitial(String),
  /// A further page failed; shown items are kept
  ErrorMore(String),
  /// Every result is loaded
  Exhausted,
}

impl PagerStatus {
  pub fn is_loading(&self) -> bool {
    matches!(self, PagerStatus::LoadingInitial | PagerStatus::LoadingMore)
  }

  pub fn is_error(&self) -> bool {
    matches!(self, PagerStatus::ErrorInitial(_) | PagerStatus::ErrorMore(_))
  }

  pub fn error(&self) -> Option<&str> {
    match self {
      PagerStatus::ErrorInitial(e) | PagerStatus::ErrorMore(e) => Some(e),
      _ => None,
    }
  }
}

/// Copy of the pager state for rendering.
#[derive(Debug, Clone, PartialEq)]
pub struct PagerSnapshot {
  pub query: String,
  pub page: u32,
  pub items: Vec<BookSearchItem>,
  pub total_found: u64,
  pub status: PagerStatus,
}

#[derive(Debug)]
struct PagerState {
  /// Trimmed query as typed
  query: String,
  /// Highest page materialized
  page: u32,
  items: Vec<BookSearchItem>,
  total_found: u64,
  status: PagerStatus,
  /// Page whose load failed, for retry
  failed_page: Option<u32>,
  /// Bumped by every load; only the latest load may apply its result.
  token: u64,
}

impl PagerState {
  fn new() -> Self {
    Self {
      query: String::new(),
      page: 0,
      items: Vec::new(),
      total_found: 0,
      status: PagerStatus::Idle,
      failed_page: None,
      token: 0,
    }
  }
}

/// What a single load is asked to do.
#[derive(Debug, Clone)]
struct LoadRequest {
  token: u64,
  query: String,
  page: u32,
  initial: bool,
  /// Skip the cache for the target page (retry).
  bypass_cache: bool,
}

/// Infinite-scroll controller over the search cache and the catalog.
pub struct SearchPager {
  catalog: CachedCatalog,
  cache: Arc<SearchResultCache>,
  state: Mutex<PagerState>,
  cancelled: AtomicBool,
}

impl SearchPager {
  pub fn new(catalog: CachedCatalog, cache: Arc<SearchResultCache>) -> Self {
    Self {
      catalog,
      cache,
      state: Mutex::new(PagerState::new()),
      cancelled: AtomicBool::new(false),
    }
  }

  // --------------------------------------------------------------------------
  // Reads
  // --------------------------------------------------------------------------

  pub fn status(&self) -> PagerStatus {
    self.lock().status.clone()
  }

  pub fn items(&self) -> Vec<BookSearchItem> {
    self.lock().items.clone()
  }

  pub fn total_found(&self) -> u64 {
    self.lock().total_found
  }

  pub fn page(&self) -> u32 {
    self.lock().page
  }

  pub fn query(&self) -> String {
    self.lock().query.clone()
  }

  pub fn snapshot(&self) -> PagerSnapshot {
    let state = self.lock();
    PagerSnapshot {
      query: state.query.clone(),
      page: state.page,
      items: state.items.clone(),
      total_found: state.total_found,
      status: state.status.clone(),
    }
  }

  /// Whether `load_more` would start a load right now.
  pub fn can_load_more(&self) -> bool {
    let state = self.lock();
    Self::more_available(&state)
  }

  // --------------------------------------------------------------------------
  // Actions
  // --------------------------------------------------------------------------

  /// Start a new search at page 1.
  pub async fn search(&self, query: &str) {
    self.open(query, 1).await;
  }

  /// Show `query` up to `page`, materializing pages 1..=page.
  ///
  /// A different query discards accumulated items. A blank query resets the
  /// pager to an empty idle state.
  pub async fn open(&self, query: &str, page: u32) {
    let page = page.max(1);
    let request = {
      let mut state = self.lock();
      let trimmed = query.trim();
      state.token += 1;

      if trimmed.is_empty() {
        *state = PagerState {
          token: state.token,
          ..PagerState::new()
        };
        return;
      }

      let same_query = normalize_query(&state.query) == normalize_query(trimmed);
      if !same_query || page == 1 {
        state.items.clear();
        state.total_found = 0;
        state.page = 0;
      }
      state.query = trimmed.to_string();

      let initial = page == 1 || state.items.is_empty();
      Self::begin(&mut state, page, initial, false)
    };

    self.run(request).await;
  }

  /// Load the next page. No-op while loading, after an error, once every
  /// result is loaded, or without a query.
  ///
  /// Returns whether a load was started.
  pub async fn load_more(&self) -> bool {
    let request = {
      let mut state = self.lock();
      if !Self::more_available(&state) {
        return false;
      }
      state.token += 1;
      let next = state.page + 1;
      Self::begin(&mut state, next, false, false)
    };

    self.run(request).await;
    true
  }

  /// Re-issue the failed page load, bypassing the cache for that page.
  ///
  /// Returns whether a load was started.
  pub async fn retry(&self) -> bool {
    let request = {
      let mut state = self.lock();
      let initial = match state.status {
        PagerStatus::ErrorInitial(_) => true,
        PagerStatus::ErrorMore(_) => false,
        _ => return false,
      };
      let page = state.failed_page.unwrap_or(1);
      state.token += 1;
      if initial {
        state.items.clear();
        state.total_found = 0;
        state.page = 0;
      }
      Self::begin(&mut state, page, initial, true)
    };

    info!("Retrying page {}", request.page);
    self.run(request).await;
    true
  }

  /// Tear down: loads still in flight complete without touching state.
  pub fn cancel(&self) {
    self.cancelled.store(true, Ordering::SeqCst);
  }

  // --------------------------------------------------------------------------
  // Internals
  // --------------------------------------------------------------------------

  fn more_available(state: &PagerState) -> bool {
    !state.query.is_empty()
      && state.status == PagerStatus::Idle
      && !state.items.is_empty()
      && (state.items.len() as u64) < state.total_found
  }

  fn begin(state: &mut PagerState, page: u32, initial: bool, bypass_cache: bool) -> LoadRequest {
    state.status = if initial {
      PagerStatus::LoadingInitial
    } else {
      PagerStatus::LoadingMore
    };
    state.failed_page = None;
    LoadRequest {
      token: state.token,
      query: state.query.clone(),
      page,
      initial,
      bypass_cache,
    }
  }

  async fn run(&self, request: LoadRequest) {
    let result = self.materialize(&request).await;

    if self.cancelled.load(Ordering::SeqCst) {
      debug!("Pager torn down, dropping page {} result", request.page);
      return;
    }

    let mut state = self.lock();
    if state.token != request.token {
      debug!("Dropping superseded result for page {}", request.page);
      return;
    }

    match result {
      Ok(loaded) => {
        let exhausted = (loaded.items.len() as u64) >= loaded.total_found || loaded.last_page_empty;
        state.items = loaded.items;
        state.total_found = loaded.total_found;
        state.page = request.page;
        state.status = if exhausted {
          PagerStatus::Exhausted
        } else {
          PagerStatus::Idle
        };
      }
      Err(e) => {
        state.failed_page = Some(request.page);
        if request.initial {
          state.items.clear();
          state.total_found = 0;
          state.page = 0;
          state.status = PagerStatus::ErrorInitial(e.to_string());
        } else {
          state.status = PagerStatus::ErrorMore(e.to_string());
        }
      }
    }
  }

  /// Concatenate pages 1..=request.page in order.
  async fn materialize(&self, request: &LoadRequest) -> Result<Loaded, CatalogError> {
    let query = request.query.as_str();
    let mut items: Vec<BookSearchItem> = Vec::new();
    let mut total_found = 0;
    let mut last_page_empty = false;

    for p in 1..=request.page {
      let bypass = request.bypass_cache && p == request.page;
      let cached = if bypass {
        None
      } else {
        self.cache.get_page(query, p)
      };

      let page = match cached {
        Some(page) => page,
        None => {
          let page = self.catalog.search_books(query, p).await?;
          self
            .cache
            .put_page(query, p, &page.items, page.num_found);
          page
        }
      };

      last_page_empty = page.items.is_empty();
      total_found = page.num_found;
      items.extend(page.items);
    }

    Ok(Loaded {
      items,
      total_found,
      last_page_empty,
    })
  }

  fn lock(&self) -> MutexGuard<'_, PagerState> {
    self.state.lock().unwrap_or_else(|e| e.into_inner())
  }
}

struct Loaded {
  items: Vec<BookSearchItem>,
  total_found: u64,
  /// Catalog returned nothing for the last page even though it reported
  /// more results; treated as the end.
  last_page_empty: bool,
}

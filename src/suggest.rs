//! Search-as-you-type suggestions.
//!
//! History suggestions are instant. Catalog suggestions wait for the input to
//! settle, and only the most recent call may deliver a result.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tracing::debug;

use crate::catalog::CachedCatalog;
use crate::collections::SearchHistory;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SuggestionKind {
  History,
  Catalog,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Suggestion {
  pub kind: SuggestionKind,
  pub label: String,
  pub subtitle: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SuggestOutcome {
  Ready(Vec<Suggestion>),
  /// A newer `suggest` call began; drop this one.
  Superseded,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SuggestConfig {
  /// Shortest trimmed input that reaches the catalog
  pub min_chars: usize,
  /// Quiet period before querying
  pub debounce: Duration,
  pub max_results: usize,
}

impl Default for SuggestConfig {
  fn default() -> Self {
    Self {
      min_chars: 3,
      debounce: Duration::from_millis(300),
      max_results: 6,
    }
  }
}

pub struct Suggester {
  catalog: CachedCatalog,
  history: SearchHistory,
  config: SuggestConfig,
  latest: AtomicU64,
}

impl Suggester {
  pub fn new(catalog: CachedCatalog, history: SearchHistory, config: SuggestConfig) -> Self {
    Self {
      catalog,
      history,
      config,
      latest: AtomicU64::new(0),
    }
  }

  /// Past queries matching `input`.
  pub fn history_suggestions(&self, input: &str) -> Vec<Suggestion> {
    self
      .history
      .matching(input, self.config.max_results)
      .into_iter()
      .map(|label| Suggestion {
        kind: SuggestionKind::History,
        label,
        subtitle: None,
      })
      .collect()
  }

  /// Catalog suggestions for `input`, debounced.
  ///
  /// Every call supersedes the ones before it, including calls with too
  /// short an input. Fetch errors yield an empty list.
  pub async fn suggest(&self, input: &str) -> SuggestOutcome {
    let token = self.latest.fetch_add(1, Ordering::SeqCst) + 1;
    let q = input.trim();
    if q.chars().count() < self.config.min_chars {
      return SuggestOutcome::Ready(Vec::new());
    }

    tokio::time::sleep(self.config.debounce).await;
    if self.is_superseded(token) {
      return SuggestOutcome::Superseded;
    }

    let result = self.catalog.search_books(q, 1).await;
    if self.is_superseded(token) {
      debug!("Dropping superseded suggestions for {:?}", q);
      return SuggestOutcome::Superseded;
    }

    let items = match result {
      Ok(page) => page.items,
      Err(e) => {
        debug!("Suggestions for {:?} failed: {}", q, e);
        Vec::new()
      }
    };

    SuggestOutcome::Ready(
      items
        .into_iter()
        .take(self.config.max_results)
        .map(|book| Suggestion {
          kind: SuggestionKind::Catalog,
          subtitle: Some(book.authors.iter().take(2).cloned().collect::<Vec<_>>().join(", "))
            .filter(|s| !s.is_empty()),
          label: book.title,
        })
        .collect(),
    )
  }

  fn is_superseded(&self, token: u64) -> bool {
    self.latest.load(Ordering::SeqCst) != token
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::catalog::mock::{item, MockTransport};
  use crate::catalog::{BookSearchItem, CatalogClient};
  use crate::storage::MemoryStore;
  use std::sync::Arc;

  fn suggester(mock: &MockTransport) -> (Arc<Suggester>, SearchHistory) {
    let store = Arc::new(MemoryStore::new());
    let client = CatalogClient::new("https://openlibrary.org", Arc::new(mock.clone())).unwrap();
    let catalog = CachedCatalog::new(client, store.clone());
    let history = SearchHistory::new(store);
    let config = SuggestConfig {
      debounce: Duration::from_millis(20),
      ..SuggestConfig::default()
    };
    (
      Arc::new(Suggester::new(catalog, history.clone(), config)),
      history,
    )
  }

  #[tokio::test]
  async fn test_short_input_skips_catalog() {
    let mock = MockTransport::new();
    let (suggester, _) = suggester(&mock);
    assert_eq!(suggester.suggest("  du ").await, SuggestOutcome::Ready(Vec::new()));
    assert_eq!(mock.total_calls(), 0);
  }

  #[tokio::test]
  async fn test_top_results_with_author_subtitle() {
    let mock = MockTransport::new();
    let mut books: Vec<BookSearchItem> = (0..8)
      .map(|i| item(&format!("OL{}W", i), &format!("Dune {}", i)))
      .collect();
    books[0].authors = vec!["Frank Herbert".into(), "Brian Herbert".into(), "Kevin J. Anderson".into()];
    books[1].authors = Vec::new();
    mock.search_page(1, &books, 8);
    let (suggester, _) = suggester(&mock);

    let SuggestOutcome::Ready(list) = suggester.suggest("dune").await else {
      panic!("expected suggestions");
    };
    assert_eq!(list.len(), 6);
    assert_eq!(list[0].label, "Dune 0");
    assert_eq!(list[0].subtitle.as_deref(), Some("Frank Herbert, Brian Herbert"));
    assert_eq!(list[1].subtitle, None);
    assert!(list.iter().all(|s| s.kind == SuggestionKind::Catalog));
  }

  #[tokio::test]
  async fn test_rapid_typing_only_latest_fetches() {
    let mock = MockTransport::new();
    mock.search_page(1, &[item("a", "Dune")], 1);
    let (suggester, _) = suggester(&mock);

    let first = {
      let suggester = Arc::clone(&suggester);
      tokio::spawn(async move { suggester.suggest("dun").await })
    };
    tokio::time::sleep(Duration::from_millis(5)).await;
    let second = suggester.suggest("dune").await;

    assert_eq!(first.await.unwrap(), SuggestOutcome::Superseded);
    assert!(matches!(second, SuggestOutcome::Ready(ref list) if list.len() == 1));
    assert_eq!(mock.search_calls(1), 1);
  }

  #[tokio::test]
  async fn test_short_input_supersedes_pending() {
    let mock = MockTransport::new();
    mock.search_page(1, &[item("a", "Dune")], 1);
    let (suggester, _) = suggester(&mock);

    let pending = {
      let suggester = Arc::clone(&suggester);
      tokio::spawn(async move { suggester.suggest("dune").await })
    };
    tokio::time::sleep(Duration::from_millis(5)).await;
    suggester.suggest("d").await;

    assert_eq!(pending.await.unwrap(), SuggestOutcome::Superseded);
    assert_eq!(mock.total_calls(), 0);
  }

  #[tokio::test]
  async fn test_errors_yield_empty_list() {
    let mock = MockTransport::new();
    mock.fail_search_page(1, 500);
    let (suggester, _) = suggester(&mock);
    assert_eq!(suggester.suggest("dune").await, SuggestOutcome::Ready(Vec::new()));
  }

  #[test]
  fn test_history_suggestions() {
    let mock = MockTransport::new();
    let (suggester, history) = suggester(&mock);
    history.add("dune messiah");
    history.add("foundation");
    let list = suggester.history_suggestions("DUNE");
    assert_eq!(list.len(), 1);
    assert_eq!(list[0].label, "dune messiah");
    assert_eq!(list[0].kind, SuggestionKind::History);
  }
}

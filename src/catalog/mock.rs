//! Canned-response transport for tests.

use futures::future::BoxFuture;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use url::Url;

use super::error::CatalogError;
use super::transport::{HttpResponse, Transport};
use super::types::BookSearchItem;

#[derive(Default)]
struct Inner {
  /// Responses by URL path.
  routes: Mutex<HashMap<String, HttpResponse>>,
  /// Search responses by page number.
  search_pages: Mutex<HashMap<u32, HttpResponse>>,
  calls: Mutex<Vec<Url>>,
  total: AtomicUsize,
  delay: Mutex<Option<Duration>>,
}

/// Transport serving canned responses and counting calls.
#[derive(Clone, Default)]
pub struct MockTransport {
  inner: Arc<Inner>,
}

impl MockTransport {
  pub fn new() -> Self {
    Self::default()
  }

  /// Serve `body` with status 200 for `path`.
  pub fn json(&self, path: &str, body: Value) -> &Self {
    self.status(path, 200, body)
  }

  /// Serve `body` with `status` for `path`.
  pub fn status(&self, path: &str, status: u16, body: Value) -> &Self {
    self.inner.routes.lock().unwrap().insert(
      path.to_string(),
      HttpResponse {
        status,
        body: body.to_string(),
      },
    );
    self
  }

  /// Serve a search results page.
  pub fn search_page(&self, page: u32, items: &[BookSearchItem], num_found: u64) -> &Self {
    let docs: Vec<Value> = items
      .iter()
      .map(|item| {
        serde_json::json!({
          "key": format!("/works/{}", item.work_id),
          "title": item.title,
          "author_name": item.authors,
        })
      })
      .collect();
    let body = serde_json::json!({ "numFound": num_found, "docs": docs });
    self.inner.search_pages.lock().unwrap().insert(
      page,
      HttpResponse {
        status: 200,
        body: body.to_string(),
      },
    );
    self
  }

  /// Fail a search results page with `status`.
  pub fn fail_search_page(&self, page: u32, status: u16) -> &Self {
    self.inner.search_pages.lock().unwrap().insert(
      page,
      HttpResponse {
        status,
        body: String::new(),
      },
    );
    self
  }

  /// Hold every response for `delay` before returning it.
  pub fn delay(&self, delay: Duration) -> &Self {
    *self.inner.delay.lock().unwrap() = Some(delay);
    self
  }

  /// Number of requests made to `path`.
  pub fn calls(&self, path: &str) -> usize {
    self
      .inner
      .calls
      .lock()
      .unwrap()
      .iter()
      .filter(|u| u.path() == path)
      .count()
  }

  /// Number of search requests made for `page`.
  pub fn search_calls(&self, page: u32) -> usize {
    let page = page.to_string();
    self
      .inner
      .calls
      .lock()
      .unwrap()
      .iter()
      .filter(|u| u.path().ends_with("/search.json"))
      .filter(|u| u.query_pairs().any(|(k, v)| k == "page" && v == page.as_str()))
      .count()
  }

  pub fn total_calls(&self) -> usize {
    self.inner.total.load(Ordering::SeqCst)
  }

  pub fn requests(&self) -> Vec<Url> {
    self.inner.calls.lock().unwrap().clone()
  }

  fn respond(&self, url: &Url) -> HttpResponse {
    if url.path().ends_with("/search.json") {
      let page = url
        .query_pairs()
        .find(|(k, _)| k == "page")
        .and_then(|(_, v)| v.parse::<u32>().ok())
        .unwrap_or(1);
      if let Some(response) = self.inner.search_pages.lock().unwrap().get(&page) {
        return response.clone();
      }
    }
    self
      .inner
      .routes
      .lock()
      .unwrap()
      .get(url.path())
      .cloned()
      .unwrap_or(HttpResponse {
        status: 404,
        body: String::new(),
      })
  }
}

impl Transport for MockTransport {
  fn get(&self, url: Url) -> BoxFuture<'static, Result<HttpResponse, CatalogError>> {
    self.inner.calls.lock().unwrap().push(url.clone());
    self.inner.total.fetch_add(1, Ordering::SeqCst);
    let delay = *self.inner.delay.lock().unwrap();
    let this = self.clone();
    Box::pin(async move {
      if let Some(delay) = delay {
        tokio::time::sleep(delay).await;
      }
      Ok(this.respond(&url))
    })
  }
}

/// Shorthand for a search item with one author.
pub fn item(work_id: &str, title: &str) -> BookSearchItem {
  BookSearchItem {
    authors: vec![format!("Author of {}", title)],
    ..BookSearchItem::new(work_id, title)
  }
}

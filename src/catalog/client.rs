use futures::future::try_join_all;
use serde::de::DeserializeOwned;
use std::sync::Arc;
use tracing::debug;
use url::Url;

use crate::catalog::api_types::{
  ApiAuthorResponse, ApiRatingsResponse, ApiSearchResponse, ApiSubjectResponse, ApiWorkResponse,
  SEARCH_FIELDS,
};
use crate::catalog::error::CatalogError;
use crate::catalog::transport::Transport;
use crate::catalog::types::{AuthorDetail, BookSearchItem, SearchPage, WorkDetail, WorkRating};

/// Open Library API client.
///
/// Owns request construction and response mapping. Every call is a network
/// round trip; caching lives in the layers above.
#[derive(Clone)]
pub struct CatalogClient {
  transport: Arc<dyn Transport>,
  base: Url,
}

impl CatalogClient {
  pub fn new(base_url: &str, transport: Arc<dyn Transport>) -> Result<Self, CatalogError> {
    let base = Url::parse(base_url).map_err(|_| CatalogError::InvalidUrl(base_url.to_string()))?;
    Ok(Self { transport, base })
  }

  /// URL for `segments` appended to the base path. Segments are
  /// percent-encoded, so ids cannot inject a query or fragment.
  fn endpoint(&self, segments: &[&str]) -> Result<Url, CatalogError> {
    let mut url = self.base.clone();
    url
      .path_segments_mut()
      .map_err(|_| CatalogError::InvalidUrl(self.base.to_string()))?
      .pop_if_empty()
      .extend(segments);
    Ok(url)
  }

  /// GET `url` and decode the JSON body. Non-2xx becomes `CatalogError::Status`.
  async fn get_json<T: DeserializeOwned>(&self, url: Url, what: &str) -> Result<T, CatalogError> {
    let response = self.transport.get(url).await?;
    if !response.is_success() {
      return Err(CatalogError::Status {
        status: response.status,
        message: format!("Failed to load {}", what),
      });
    }
    serde_json::from_str(&response.body).map_err(|e| CatalogError::Decode(e.to_string()))
  }

  /// Search works. An empty or whitespace query returns an empty page without
  /// a network call.
  pub async fn search_books(&self, query: &str, page: u32) -> Result<SearchPage, CatalogError> {
    let q = query.trim();
    if q.is_empty() {
      return Ok(SearchPage::empty());
    }

    let mut url = self.endpoint(&["search.json"])?;
    url
      .query_pairs_mut()
      .append_pair("q", q)
      .append_pair("page", &page.max(1).to_string())
      .append_pair("fields", &SEARCH_FIELDS.join(","));

    debug!("Searching catalog for {:?} page {}", q, page);
    let response: ApiSearchResponse = self.get_json(url, "search results").await?;
    Ok(response.into())
  }

  /// Get a work with its author names resolved.
  ///
  /// Authors are fetched concurrently, one request per distinct author. If
  /// any of them fails the whole lookup fails.
  pub async fn get_work_detail(&self, work_id: &str) -> Result<WorkDetail, CatalogError> {
    let url = self.endpoint(&["works", format!("{}.json", work_id).as_str()])?;
    let work: ApiWorkResponse = self.get_json(url, &format!("work {}", work_id)).await?;

    let author_ids = work.author_ids();
    let authors = try_join_all(author_ids.iter().map(|id| self.get_author_detail(id))).await?;

    Ok(work.into_detail(work_id, authors))
  }

  /// Get an author by id.
  pub async fn get_author_detail(&self, author_id: &str) -> Result<AuthorDetail, CatalogError> {
    let url = self.endpoint(&["authors", format!("{}.json", author_id).as_str()])?;
    let author: ApiAuthorResponse = self
      .get_json(url, &format!("author {}", author_id))
      .await?;
    Ok(author.into_detail(author_id))
  }

  /// Get the community rating summary for a work.
  pub async fn get_work_rating(&self, work_id: &str) -> Result<WorkRating, CatalogError> {
    let url = self.endpoint(&["works", work_id, "ratings.json"])?;
    let ratings: ApiRatingsResponse = self
      .get_json(url, &format!("ratings for {}", work_id))
      .await?;
    Ok(ratings.into())
  }

  /// List works under a subject.
  pub async fn get_subject_books(
    &self,
    subject: &str,
    limit: u32,
  ) -> Result<Vec<BookSearchItem>, CatalogError> {
    let mut url = self.endpoint(&["subjects", format!("{}.json", subject).as_str()])?;
    url
      .query_pairs_mut()
      .append_pair("limit", &limit.to_string());

    let response: ApiSubjectResponse = self
      .get_json(url, &format!("subject {}", subject))
      .await?;
    Ok(response.into_items())
  }
}

//! Serde-deserializable types matching Open Library responses.
//!
//! These types are separate from domain types to allow clean deserialization
//! while keeping domain types focused on application needs. Every field the
//! catalog may omit is an `Option`, so "absent" never turns into zero.

use serde::Deserialize;
use std::collections::BTreeMap;

use super::types::{AuthorDetail, BookSearchItem, SearchPage, WorkDetail, WorkRating};

/// Fields requested from the search endpoint.
pub const SEARCH_FIELDS: &[&str] = &[
  "key",
  "title",
  "author_name",
  "first_publish_year",
  "cover_i",
  "ratings_average",
  "ratings_count",
];

/// Strip the "/works/" or "/authors/" prefix from a catalog key.
pub fn strip_key(key: &str, prefix: &str) -> String {
  key.strip_prefix(prefix).unwrap_or(key).to_string()
}

// ============================================================================
// Common nested field types
// ============================================================================

/// Text that the catalog returns either as a bare string or as `{"value": ...}`.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum ApiText {
  Plain(String),
  Typed { value: String },
}

impl ApiText {
  pub fn into_string(self) -> String {
    match self {
      ApiText::Plain(s) => s,
      ApiText::Typed { value } => value,
    }
  }
}

// ============================================================================
// Search
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct ApiSearchDoc {
  /// "/works/OL82563W"
  pub key: String,
  #[serde(default)]
  pub title: String,
  pub author_name: Option<Vec<String>>,
  pub first_publish_year: Option<i32>,
  pub cover_i: Option<i64>,
  pub ratings_average: Option<f64>,
  pub ratings_count: Option<u64>,
}

impl ApiSearchDoc {
  pub fn into_item(self) -> BookSearchItem {
    BookSearchItem {
      work_id: strip_key(&self.key, "/works/"),
      title: self.title,
      authors: self.author_name.unwrap_or_default(),
      cover_id: self.cover_i,
      first_publish_year: self.first_publish_year,
      ratings_average: self.ratings_average,
      ratings_count: self.ratings_count,
    }
  }
}

#[derive(Debug, Deserialize)]
pub struct ApiSearchResponse {
  #[serde(rename = "numFound", default)]
  pub num_found: u64,
  #[serde(default)]
  pub docs: Vec<ApiSearchDoc>,
}

impl From<ApiSearchResponse> for SearchPage {
  fn from(response: ApiSearchResponse) -> Self {
    SearchPage {
      items: response
        .docs
        .into_iter()
        .map(ApiSearchDoc::into_item)
        .collect(),
      num_found: response.num_found,
    }
  }
}

// ============================================================================
// Works and authors
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct ApiAuthorKey {
  pub key: String,
}

#[derive(Debug, Deserialize)]
pub struct ApiWorkAuthor {
  pub author: ApiAuthorKey,
}

#[derive(Debug, Deserialize)]
pub struct ApiWorkResponse {
  #[serde(default)]
  pub title: String,
  pub description: Option<ApiText>,
  pub subjects: Option<Vec<String>>,
  pub covers: Option<Vec<i64>>,
  pub authors: Option<Vec<ApiWorkAuthor>>,
}

impl ApiWorkResponse {
  /// Distinct author ids in first-seen order.
  pub fn author_ids(&self) -> Vec<String> {
    let mut ids: Vec<String> = Vec::new();
    for author in self.authors.iter().flatten() {
      let id = strip_key(&author.author.key, "/authors/");
      if !ids.contains(&id) {
        ids.push(id);
      }
    }
    ids
  }

  /// Build the detail record once author names are known.
  pub fn into_detail(self, work_id: &str, authors: Vec<AuthorDetail>) -> WorkDetail {
    WorkDetail {
      work_id: work_id.to_string(),
      title: self.title,
      description: self.description.map(ApiText::into_string),
      subjects: self.subjects.unwrap_or_default(),
      covers: self.covers.unwrap_or_default(),
      authors: authors
        .into_iter()
        .map(|a| super::types::AuthorRef {
          author_id: a.author_id,
          name: a.name,
        })
        .collect(),
    }
  }
}

#[derive(Debug, Deserialize)]
pub struct ApiAuthorResponse {
  #[serde(default)]
  pub name: String,
  pub bio: Option<ApiText>,
}

impl ApiAuthorResponse {
  pub fn into_detail(self, author_id: &str) -> AuthorDetail {
    AuthorDetail {
      author_id: author_id.to_string(),
      name: self.name,
      bio: self.bio.map(ApiText::into_string),
    }
  }
}

// ============================================================================
// Ratings
// ============================================================================

#[derive(Debug, Default, Deserialize)]
pub struct ApiRatingSummary {
  pub average: Option<f64>,
  pub count: Option<u64>,
}

#[derive(Debug, Deserialize)]
pub struct ApiRatingsResponse {
  #[serde(default)]
  pub summary: ApiRatingSummary,
  pub counts: Option<BTreeMap<String, u64>>,
}

impl From<ApiRatingsResponse> for WorkRating {
  fn from(response: ApiRatingsResponse) -> Self {
    WorkRating {
      average: response.summary.average,
      count: response.summary.count,
      counts: response.counts,
    }
  }
}

// ============================================================================
// Subjects
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct ApiSubjectAuthor {
  pub name: String,
}

#[derive(Debug, Deserialize)]
pub struct ApiSubjectWork {
  pub key: String,
  #[serde(default)]
  pub title: String,
  pub authors: Option<Vec<ApiSubjectAuthor>>,
  pub cover_id: Option<i64>,
  pub first_publish_year: Option<i32>,
}

#[derive(Debug, Deserialize)]
pub struct ApiSubjectResponse {
  pub works: Option<Vec<ApiSubjectWork>>,
}

impl ApiSubjectResponse {
  pub fn into_items(self) -> Vec<BookSearchItem> {
    self
      .works
      .unwrap_or_default()
      .into_iter()
      .map(|w| BookSearchItem {
        work_id: strip_key(&w.key, "/works/"),
        title: w.title,
        authors: w
          .authors
          .unwrap_or_default()
          .into_iter()
          .map(|a| a.name)
          .collect(),
        cover_id: w.cover_id,
        first_publish_year: w.first_publish_year,
        ratings_average: None,
        ratings_count: None,
      })
      .collect()
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_search_doc_missing_rating_stays_absent() {
    let response: ApiSearchResponse = serde_json::from_str(
      r#"{"numFound": 2, "docs": [
        {"key": "/works/OL1W", "title": "Dune", "author_name": ["Frank Herbert"], "ratings_average": 4.2, "ratings_count": 10},
        {"key": "/works/OL2W", "title": "Children of Dune"}
      ]}"#,
    )
    .unwrap();
    let page = SearchPage::from(response);
    assert_eq!(page.num_found, 2);
    assert_eq!(page.items[0].work_id, "OL1W");
    assert_eq!(page.items[0].ratings_average, Some(4.2));
    assert_eq!(page.items[1].ratings_average, None);
    assert_eq!(page.items[1].ratings_count, None);
    assert!(page.items[1].authors.is_empty());
  }

  #[test]
  fn test_description_plain_or_typed() {
    let plain: ApiWorkResponse =
      serde_json::from_str(r#"{"title": "A", "description": "text"}"#).unwrap();
    let typed: ApiWorkResponse = serde_json::from_str(
      r#"{"title": "A", "description": {"type": "/type/text", "value": "typed"}}"#,
    )
    .unwrap();
    assert_eq!(plain.into_detail("W", vec![]).description.as_deref(), Some("text"));
    assert_eq!(typed.into_detail("W", vec![]).description.as_deref(), Some("typed"));
  }

  #[test]
  fn test_author_ids_are_distinct() {
    let work: ApiWorkResponse = serde_json::from_str(
      r#"{"title": "A", "authors": [
        {"author": {"key": "/authors/OL1A"}},
        {"author": {"key": "/authors/OL2A"}},
        {"author": {"key": "/authors/OL1A"}}
      ]}"#,
    )
    .unwrap();
    assert_eq!(work.author_ids(), vec!["OL1A", "OL2A"]);
  }

  #[test]
  fn test_ratings_response() {
    let response: ApiRatingsResponse = serde_json::from_str(
      r#"{"summary": {"average": 3.5, "count": 4}, "counts": {"1": 0, "5": 2}}"#,
    )
    .unwrap();
    let rating = WorkRating::from(response);
    assert_eq!(rating.average, Some(3.5));
    assert_eq!(rating.counts.unwrap().get("5"), Some(&2));

    let empty: ApiRatingsResponse = serde_json::from_str("{}").unwrap();
    assert!(WorkRating::from(empty).is_empty());
  }
}

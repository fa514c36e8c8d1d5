use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A work as listed in search results, subject listings and user collections.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BookSearchItem {
  pub work_id: String,
  pub title: String,
  #[serde(default)]
  pub authors: Vec<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub cover_id: Option<i64>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub first_publish_year: Option<i32>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub ratings_average: Option<f64>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub ratings_count: Option<u64>,
}

impl BookSearchItem {
  /// Item with only the required fields set.
  pub fn new(work_id: impl Into<String>, title: impl Into<String>) -> Self {
    Self {
      work_id: work_id.into(),
      title: title.into(),
      authors: Vec::new(),
      cover_id: None,
      first_publish_year: None,
      ratings_average: None,
      ratings_count: None,
    }
  }

  /// Authors joined for display and text filtering.
  pub fn authors_line(&self) -> String {
    self.authors.join(", ")
  }
}

impl From<&WorkDetail> for BookSearchItem {
  fn from(work: &WorkDetail) -> Self {
    Self {
      work_id: work.work_id.clone(),
      title: work.title.clone(),
      authors: work.authors.iter().map(|a| a.name.clone()).collect(),
      cover_id: work.covers.first().copied(),
      first_publish_year: None,
      ratings_average: None,
      ratings_count: None,
    }
  }
}

/// One page of search results.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchPage {
  pub items: Vec<BookSearchItem>,
  /// Total number of matches reported by the catalog.
  pub num_found: u64,
}

impl SearchPage {
  pub fn empty() -> Self {
    Self {
      items: Vec::new(),
      num_found: 0,
    }
  }
}

/// Author reference inside a work.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthorRef {
  pub author_id: String,
  pub name: String,
}

/// Full work record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkDetail {
  pub work_id: String,
  pub title: String,
  pub description: Option<String>,
  pub subjects: Vec<String>,
  /// Cover ids
  pub covers: Vec<i64>,
  pub authors: Vec<AuthorRef>,
}

/// Author record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthorDetail {
  pub author_id: String,
  pub name: String,
  pub bio: Option<String>,
}

/// Community rating summary for a work.
///
/// The all-`None` value is what a failed lookup caches.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WorkRating {
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub average: Option<f64>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub count: Option<u64>,
  /// Number of ratings per star value ("1".."5").
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub counts: Option<BTreeMap<String, u64>>,
}

impl WorkRating {
  pub fn is_empty(&self) -> bool {
    self.average.is_none() && self.count.is_none() && self.counts.is_none()
  }
}

/// Cover image size.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoverSize {
  Small,
  Medium,
  Large,
}

impl CoverSize {
  fn suffix(self) -> &'static str {
    match self {
      CoverSize::Small => "S",
      CoverSize::Medium => "M",
      CoverSize::Large => "L",
    }
  }
}

/// Cover image URL for a cover id.
pub fn cover_url(covers_base: &str, cover_id: i64, size: CoverSize) -> String {
  format!(
    "{}/b/id/{}-{}.jpg",
    covers_base.trim_end_matches('/'),
    cover_id,
    size.suffix()
  )
}

/// Whole stars to display for an average rating.
///
/// Display only: stored ratings are never rounded through this.
pub fn display_stars(average: f64) -> u8 {
  if !average.is_finite() {
    return 0;
  }
  average.round().clamp(0.0, 5.0) as u8
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_item_serializes_camel_case_without_absent_fields() {
    let item = BookSearchItem::new("OL1W", "Dune");
    let json = serde_json::to_value(&item).unwrap();
    assert_eq!(
      json,
      serde_json::json!({"workId": "OL1W", "title": "Dune", "authors": []})
    );
  }

  #[test]
  fn test_cover_url() {
    assert_eq!(
      cover_url("https://covers.openlibrary.org/", 42, CoverSize::Medium),
      "https://covers.openlibrary.org/b/id/42-M.jpg"
    );
  }

  #[test]
  fn test_display_stars() {
    assert_eq!(display_stars(3.49), 3);
    assert_eq!(display_stars(3.5), 4);
    assert_eq!(display_stars(7.0), 5);
    assert_eq!(display_stars(-1.0), 0);
    assert_eq!(display_stars(f64::NAN), 0);
  }

  #[test]
  fn test_item_from_work_detail() {
    let work = WorkDetail {
      work_id: "OL1W".into(),
      title: "Dune".into(),
      description: None,
      subjects: vec![],
      covers: vec![7, 8],
      authors: vec![AuthorRef {
        author_id: "OL1A".into(),
        name: "Frank Herbert".into(),
      }],
    };
    let item = BookSearchItem::from(&work);
    assert_eq!(item.cover_id, Some(7));
    assert_eq!(item.authors, vec!["Frank Herbert".to_string()]);
  }
}

//! Filtered and sorted projections of the read-list and favorites.

use std::cmp::Ordering;
use std::collections::BTreeMap;

use crate::catalog::BookSearchItem;
use crate::collections::{FavoritesPrefs, FavoritesSort, ReadPrefs, ReadSort};

/// A read-list entry with its personal rating (0 = unrated).
#[derive(Debug, Clone, PartialEq)]
pub struct RatedBook {
  pub book: BookSearchItem,
  pub rating: u8,
}

/// Case-insensitive substring match on title or authors.
fn matches_text(book: &BookSearchItem, needle: &str) -> bool {
  let needle = needle.trim().to_lowercase();
  if needle.is_empty() {
    return true;
  }
  book.title.to_lowercase().contains(&needle) || book.authors_line().to_lowercase().contains(&needle)
}

fn by_text(a: &str, b: &str) -> Ordering {
  a.to_lowercase().cmp(&b.to_lowercase())
}

fn first_author(book: &BookSearchItem) -> &str {
  book.authors.first().map(String::as_str).unwrap_or("")
}

/// Read-list as shown: rating floor, text filter, then the chosen order.
/// Sorts are stable, so ties keep collection order.
pub fn read_view(
  items: &[BookSearchItem],
  ratings: &BTreeMap<String, u8>,
  prefs: &ReadPrefs,
  text_filter: &str,
) -> Vec<RatedBook> {
  let mut list: Vec<RatedBook> = items
    .iter()
    .map(|book| RatedBook {
      rating: ratings.get(&book.work_id).copied().unwrap_or(0),
      book: book.clone(),
    })
    .filter(|x| x.rating >= prefs.min_rating)
    .filter(|x| matches_text(&x.book, text_filter))
    .collect();

  match prefs.sort {
    ReadSort::Recent => {}
    ReadSort::TitleAsc => list.sort_by(|a, b| by_text(&a.book.title, &b.book.title)),
    ReadSort::TitleDesc => list.sort_by(|a, b| by_text(&b.book.title, &a.book.title)),
    ReadSort::RatingAsc => list.sort_by_key(|x| x.rating),
    ReadSort::RatingDesc => list.sort_by(|a, b| b.rating.cmp(&a.rating)),
  }
  list
}

/// Favorites as shown: `prefs.filter` applied, then the chosen order.
pub fn favorites_view(items: &[BookSearchItem], prefs: &FavoritesPrefs) -> Vec<BookSearchItem> {
  let mut list: Vec<BookSearchItem> = items
    .iter()
    .filter(|book| matches_text(book, &prefs.filter))
    .cloned()
    .collect();

  match prefs.sort {
    FavoritesSort::TitleAsc => list.sort_by(|a, b| by_text(&a.title, &b.title)),
    FavoritesSort::TitleDesc => list.sort_by(|a, b| by_text(&b.title, &a.title)),
    FavoritesSort::AuthorAsc => list.sort_by(|a, b| by_text(first_author(a), first_author(b))),
    FavoritesSort::AuthorDesc => list.sort_by(|a, b| by_text(first_author(b), first_author(a))),
  }
  list
}

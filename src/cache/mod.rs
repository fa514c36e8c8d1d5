//! Read-through caches between the UI and the catalog.
//!
//! - [`SearchResultCache`]: (query, page) → results, TTL + LRU bound, session store
//! - [`SubjectCache`]: subject listings, memory + session tiers, coalesced fetches

mod search;
mod subject;

pub use search::{
  normalize_query, SearchCacheEntry, SearchResultCache, DEFAULT_SEARCH_MAX_ENTRIES,
  DEFAULT_SEARCH_TTL_MINUTES,
};
pub use subject::{SubjectCache, SubjectCacheEntry, DEFAULT_SUBJECT_TTL_HOURS};

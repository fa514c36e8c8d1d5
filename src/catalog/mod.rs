//! Catalog access layer: the only component that talks to the network.

pub mod api_types;
mod cached_client;
mod client;
mod error;
#[cfg(test)]
pub(crate) mod mock;
mod transport;
pub mod types;

pub use cached_client::CachedCatalog;
pub use client::CatalogClient;
pub use error::CatalogError;
pub use transport::{HttpResponse, ReqwestTransport, Transport};
pub use types::{
  cover_url, display_stars, AuthorDetail, AuthorRef, BookSearchItem, CoverSize, SearchPage,
  WorkDetail, WorkRating,
};

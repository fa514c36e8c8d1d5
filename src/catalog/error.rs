use thiserror::Error;

/// Failure talking to the remote catalog.
///
/// Cloneable so a single failed request can be handed to every caller that
/// was waiting on it.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CatalogError {
  #[error("{message} (HTTP {status})")]
  Status { status: u16, message: String },
  #[error("Request failed: {0}")]
  Transport(String),
  #[error("Failed to decode catalog response: {0}")]
  Decode(String),
  #[error("Invalid catalog URL: {0}")]
  InvalidUrl(String),
}

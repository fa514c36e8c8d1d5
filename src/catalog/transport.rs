//! HTTP transport seam between the catalog client and the network.

use futures::future::BoxFuture;
use reqwest::Client;
use std::time::Duration;
use tracing::debug;
use url::Url;

use super::error::CatalogError;

/// Raw HTTP response.
#[derive(Clone, Debug)]
pub struct HttpResponse {
  pub status: u16,
  pub body: String,
}

impl HttpResponse {
  pub fn is_success(&self) -> bool {
    (200..300).contains(&self.status)
  }
}

/// Performs GET requests. The only place the data layer touches the network.
pub trait Transport: Send + Sync + 'static {
  fn get(&self, url: Url) -> BoxFuture<'static, Result<HttpResponse, CatalogError>>;
}

/// Transport over `reqwest`.
#[derive(Clone)]
pub struct ReqwestTransport {
  client: Client,
}

impl ReqwestTransport {
  pub fn new(user_agent: &str, timeout: Duration) -> Result<Self, CatalogError> {
    let client = Client::builder()
      .user_agent(user_agent)
      .timeout(timeout)
      .build()
      .map_err(|e| CatalogError::Transport(format!("Failed to create HTTP client: {}", e)))?;
    Ok(Self { client })
  }
}

impl Transport for ReqwestTransport {
  fn get(&self, url: Url) -> BoxFuture<'static, Result<HttpResponse, CatalogError>> {
    let client = self.client.clone();
    Box::pin(async move {
      debug!("GET {}", url);
      let response = client
        .get(url)
        .send()
        .await
        .map_err(|e| CatalogError::Transport(e.to_string()))?;

      let status = response.status().as_u16();
      let body = response
        .text()
        .await
        .map_err(|e| CatalogError::Transport(e.to_string()))?;

      Ok(HttpResponse { status, body })
    })
  }
}

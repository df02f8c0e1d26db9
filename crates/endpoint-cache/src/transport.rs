//! Endpoint transport seam.
//!
//! The store only needs "fetch this address, give me JSON or a failure".
//! Production code uses [`HttpTransport`]; tests mock the trait.

use async_trait::async_trait;
use serde_json::Value;

use crate::error::FetchError;

/// Fetches the JSON body of one endpoint address.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait EndpointTransport: Send + Sync {
    /// Issue a request to `address` and parse the body as JSON.
    ///
    /// Any non-success status, connection failure, or parse failure is
    /// reported as a [`FetchError`]; no retry is attempted here.
    async fn fetch_json(&self, address: &str) -> Result<Value, FetchError>;
}

/// HTTP transport backed by a shared `reqwest` client.
#[derive(Clone, Default)]
pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Use a pre-configured client (timeouts, proxies, connection pooling).
    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl EndpointTransport for HttpTransport {
    async fn fetch_json(&self, address: &str) -> Result<Value, FetchError> {
        let response = self
            .client
            .get(address)
            .send()
            .await
            .map_err(|e| FetchError::transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::status(status.as_u16()));
        }

        response
            .json()
            .await
            .map_err(|e| FetchError::parse(e.to_string()))
    }
}

//! HTTP event type source.
//!
//! Issues a single `GET` against the configured base URL and expects a JSON
//! array in return. Failures are reported with the status code and reason
//! phrase only; the response body never ends up in an error or a log line.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{ACCEPT, HeaderValue};

use super::EventTypeSource;
use crate::error::{ProviderError, Result};

/// Upper bound for a single request. The scheduler's timeout still applies to
/// the cycle as a whole.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Fetches event types over HTTP using a shared [`reqwest::Client`].
#[derive(Debug, Clone)]
pub struct HttpEventTypeSource {
    client: reqwest::Client,
}

impl HttpEventTypeSource {
    pub fn new() -> Result<Self> {
        Self::with_timeout(REQUEST_TIMEOUT)
    }

    /// Build a client whose requests give up after `timeout`.
    pub fn with_timeout(timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ProviderError::config(format!("failed to build HTTP client: {e}")))?;
        Ok(Self::with_client(client))
    }

    /// Use a preconfigured client (proxies, TLS roots, custom timeouts).
    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

fn transport_error(e: reqwest::Error) -> ProviderError {
    ProviderError::RemoteFetch {
        status: e.status().map(|s| s.as_u16()),
        message: e.without_url().to_string(),
    }
}

#[async_trait]
impl EventTypeSource for HttpEventTypeSource {
    async fn fetch(&self, base_url: &str) -> Result<Vec<serde_json::Value>> {
        let response = self
            .client
            .get(base_url)
            .header(ACCEPT, HeaderValue::from_static("application/json"))
            .send()
            .await
            .map_err(transport_error)?;

        let status = response.status();
        if !status.is_success() {
            return Err(ProviderError::RemoteFetch {
                status: Some(status.as_u16()),
                message: status
                    .canonical_reason()
                    .unwrap_or("unexpected status")
                    .to_string(),
            });
        }

        let body: serde_json::Value = response.json().await.map_err(transport_error)?;
        match body {
            serde_json::Value::Array(records) => Ok(records),
            _ => Err(ProviderError::RemoteFetch {
                status: None,
                message: "response body is not a JSON array".to_string(),
            }),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

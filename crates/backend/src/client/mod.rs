//! `reqwest`-based client for the workflow REST backend.
//!
//! One file per resource family; every request goes through the response
//! helpers below so backend error bodies surface as [`BackendError::Api`].

mod catalog;
mod runs;
mod time_plans;
mod workflows;

use std::time::Duration;

use serde::de::DeserializeOwned;
use tracing::debug;

use crate::models::ApiErrorBody;
use crate::BackendError;

/// Connection settings for [`HttpBackend`].
#[derive(Debug, Clone)]
pub struct BackendConfig {
    /// Base URL, e.g. `http://localhost:8080/api/v1`.
    pub base_url: String,
    /// Per-request timeout.
    pub timeout: Duration,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8080/api/v1".to_string(),
            timeout: Duration::from_secs(10),
        }
    }
}

/// HTTP client implementing every backend capability trait.
#[derive(Debug, Clone)]
pub struct HttpBackend {
    client: reqwest::Client,
    base_url: String,
}

impl HttpBackend {
    pub fn new(config: &BackendConfig) -> Result<Self, BackendError> {
        let client = reqwest::Client::builder().timeout(config.timeout).build()?;
        Ok(Self::with_client(client, &config.base_url))
    }

    /// Reuse an existing [`reqwest::Client`] (shared connection pool).
    pub fn with_client(client: reqwest::Client, base_url: &str) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_owned(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    // ---- private helpers ----

    /// Pass 2xx responses through; turn anything else into
    /// [`BackendError::Api`], decoding the error body when it has one.
    async fn ensure_success(response: reqwest::Response) -> Result<reqwest::Response, BackendError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        debug!(status = status.as_u16(), %body, "backend returned an error");
        let (code, message) = match serde_json::from_str::<ApiErrorBody>(&body) {
            Ok(parsed) => (parsed.code, parsed.message),
            Err(_) => (None, body),
        };
        Err(BackendError::Api {
            status: status.as_u16(),
            code,
            message,
        })
    }

    async fn parse_response<T: DeserializeOwned>(response: reqwest::Response) -> Result<T, BackendError> {
        let response = Self::ensure_success(response).await?;
        let bytes = response.bytes().await?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    async fn check_status(response: reqwest::Response) -> Result<(), BackendError> {
        Self::ensure_success(response).await.map(|_| ())
    }
}

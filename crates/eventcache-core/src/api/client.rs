//! HTTP client for the event site's REST API.
//!
//! `ApiClient` fetches cacheable content and POSTs queued form submissions.
//! It retries 429 responses with exponential backoff; every other failure is
//! returned to the caller, which owns the higher-level retry policy.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{header, Client};
use serde_json::Value;
use tracing::{debug, warn};

use super::ApiError;

// ============================================================================
// Constants
// ============================================================================

/// HTTP request timeout in seconds.
/// This is the only bound on a single delivery attempt.
const REQUEST_TIMEOUT_SECS: u64 = 30;

/// Maximum number of retries for rate-limited (429) requests.
const MAX_RATE_LIMIT_RETRIES: u32 = 3;

/// Initial backoff delay in milliseconds for rate limiting.
const INITIAL_BACKOFF_MS: u64 = 1000;

/// Remote side of the cache: where content comes from and where queued
/// submissions go.
#[async_trait]
pub trait RemoteApi: Send + Sync {
    /// GET `path` and return the decoded JSON body.
    async fn fetch(&self, path: &str) -> Result<Value, ApiError>;

    /// POST `body` as JSON to `path`. Any 2xx counts as delivered.
    async fn submit(&self, path: &str, body: &Value) -> Result<(), ApiError>;
}

/// API client for the event site.
/// Clone is cheap - reqwest::Client uses Arc internally for connection pooling.
#[derive(Clone)]
pub struct ApiClient {
    client: Client,
    base_url: String,
}

impl ApiClient {
    /// Create a new API client rooted at `base_url`
    pub fn new(base_url: impl Into<String>) -> Result<Self, ApiError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.into(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }

    /// Check if response is successful, returning an error with body if not.
    /// Returns Ok(Some(response)) for success, Ok(None) for rate limit (should retry),
    /// or Err for other errors.
    async fn check_response_for_retry(
        response: reqwest::Response,
    ) -> Result<Option<reqwest::Response>, ApiError> {
        if response.status().is_success() {
            Ok(Some(response))
        } else if response.status().as_u16() == 429 {
            Ok(None)
        } else {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            Err(ApiError::from_status(status, &body))
        }
    }

    /// Send the request built by `build`, backing off on 429.
    async fn send_with_backoff<F>(&self, url: &str, build: F) -> Result<reqwest::Response, ApiError>
    where
        F: Fn() -> reqwest::RequestBuilder,
    {
        let mut retries = 0;
        let mut backoff_ms = INITIAL_BACKOFF_MS;

        loop {
            let response = build().send().await?;

            match Self::check_response_for_retry(response).await? {
                Some(response) => return Ok(response),
                None => {
                    retries += 1;
                    if retries > MAX_RATE_LIMIT_RETRIES {
                        return Err(ApiError::RateLimited);
                    }
                    warn!(url = url, retry = retries, backoff_ms = backoff_ms, "Rate limited, backing off");
                    tokio::time::sleep(Duration::from_millis(backoff_ms)).await;
                    backoff_ms *= 2; // Exponential backoff
                }
            }
        }
    }
}

#[async_trait]
impl RemoteApi for ApiClient {
    async fn fetch(&self, path: &str) -> Result<Value, ApiError> {
        let url = self.url(path);
        let response = self
            .send_with_backoff(&url, || {
                self.client
                    .get(&url)
                    .header(header::ACCEPT, "application/json")
            })
            .await?;

        let text = response.text().await?;
        debug!(url = %url, bytes = text.len(), "Fetched content");
        serde_json::from_str(&text)
            .map_err(|e| ApiError::InvalidResponse(format!("{} returned invalid JSON: {}", url, e)))
    }

    async fn submit(&self, path: &str, body: &Value) -> Result<(), ApiError> {
        let url = self.url(path);
        self.send_with_backoff(&url, || self.client.post(&url).json(body))
            .await?;
        debug!(url = %url, "Submission accepted");
        Ok(())
    }
}

//! Retrying HTTP client for the API-backed tool backend.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
use thiserror::Error;
use url::Url;

use crate::config::ApiConfig;

/// Connection timeout for HTTP requests.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Credential values treated as "not configured".
pub const PLACEHOLDER_API_KEYS: [&str; 3] = ["your_api_key", "changeme", "sk-placeholder"];

/// Errors from API client operations.
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Invalid request URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
    #[error("API request failed: {0}")]
    RequestFailed(String),
    #[error("HTTP {status}: {body}")]
    Status { status: u16, body: String },
    #[error("Failed to parse response: {0}")]
    ParseError(String),
    #[error("API request timed out")]
    Timeout,
    #[error("API request failed after {attempts} attempt(s): {source}")]
    RetriesExhausted {
        attempts: u32,
        #[source]
        source: Box<ApiError>,
    },
}

/// A single HTTP attempt.
#[async_trait]
pub trait Transport: Send + Sync {
    /// POST `payload` as JSON to `url` and decode the JSON response.
    async fn post(
        &self,
        url: &Url,
        api_key: &str,
        payload: &Value,
        timeout: Duration,
    ) -> Result<Value, ApiError>;
}

/// `reqwest`-backed transport.
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: Client,
}

impl ReqwestTransport {
    /// Build a transport with a connect timeout.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::RequestFailed` if the HTTP client cannot be built.
    pub fn new() -> Result<Self, ApiError> {
        let client = Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .build()
            .map_err(|e| ApiError::RequestFailed(e.to_string()))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn post(
        &self,
        url: &Url,
        api_key: &str,
        payload: &Value,
        timeout: Duration,
    ) -> Result<Value, ApiError> {
        let response = self
            .client
            .post(url.clone())
            .bearer_auth(api_key)
            .timeout(timeout)
            .json(payload)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ApiError::Timeout
                } else {
                    ApiError::RequestFailed(e.to_string())
                }
            })?;

        let status = response.status();
        if status.is_success() {
            return response
                .json()
                .await
                .map_err(|e| ApiError::ParseError(e.to_string()));
        }

        let body = response.text().await.unwrap_or_default();
        Err(ApiError::Status {
            status: status.as_u16(),
            body,
        })
    }
}

/// Successful response plus the failures that preceded it.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryOutcome {
    pub value: Value,
    /// Attempt that succeeded, starting at 1.
    pub attempts: u32,
    /// Error text of each failed attempt, in order.
    pub failures: Vec<String>,
}

/// HTTP client with a fixed number of attempts per request.
///
/// Attempts are made back to back without delay. Missing or placeholder
/// credentials short-circuit to a stub reply without any network traffic.
#[derive(Debug, Clone)]
pub struct RetryingClient<T = ReqwestTransport> {
    transport: T,
    base_url: String,
    api_key: Option<String>,
    max_retries: u32,
    timeout: Duration,
}

impl RetryingClient<ReqwestTransport> {
    /// Create a client from configuration.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::RequestFailed` if the HTTP client cannot be built.
    pub fn from_config(config: &ApiConfig) -> Result<Self, ApiError> {
        Ok(Self::with_transport(ReqwestTransport::new()?, config))
    }
}

impl<T: Transport> RetryingClient<T> {
    #[must_use]
    pub fn with_transport(transport: T, config: &ApiConfig) -> Self {
        Self {
            transport,
            base_url: config.base_url.clone(),
            api_key: config.api_key.clone(),
            max_retries: config.max_retries,
            timeout: Duration::from_secs(config.timeout_seconds),
        }
    }

    /// True when requests will be answered with stub replies.
    #[must_use]
    pub fn is_stubbed(&self) -> bool {
        is_placeholder_key(self.api_key.as_deref())
    }

    /// POST `payload` to `path` under the base URL.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::RetriesExhausted` once every attempt has failed.
    pub async fn post(&self, path: &str, payload: &Value) -> Result<Value, ApiError> {
        self.post_detailed(path, payload).await.map(|o| o.value)
    }

    /// Like [`RetryingClient::post`], also reporting failed attempts.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::InvalidUrl` if the URL cannot be built and
    /// `ApiError::RetriesExhausted` once every attempt has failed.
    pub async fn post_detailed(&self, path: &str, payload: &Value) -> Result<RetryOutcome, ApiError> {
        let api_key = match self.api_key.as_deref() {
            Some(key) if !is_placeholder_key(Some(key)) => key,
            _ => {
                tracing::info!(path = %path, "API credentials not configured; returning stub reply");
                return Ok(RetryOutcome {
                    value: stub_reply(path, payload),
                    attempts: 0,
                    failures: Vec::new(),
                });
            }
        };

        let url = endpoint_url(&self.base_url, path)?;
        let attempts = self.max_retries.max(1);
        let mut failures = Vec::new();

        let mut attempt = 0;
        loop {
            attempt += 1;
            match self
                .transport
                .post(&url, api_key, payload, self.timeout)
                .await
            {
                Ok(value) => {
                    return Ok(RetryOutcome {
                        value,
                        attempts: attempt,
                        failures,
                    });
                }
                Err(e) => {
                    tracing::warn!(attempt, max = attempts, url = %url, error = %e, "API request attempt failed");
                    failures.push(e.to_string());
                    if attempt >= attempts {
                        return Err(ApiError::RetriesExhausted {
                            attempts,
                            source: Box::new(e),
                        });
                    }
                }
            }
        }
    }
}

/// True for absent, blank or placeholder credentials.
#[must_use]
pub fn is_placeholder_key(key: Option<&str>) -> bool {
    match key.map(str::trim) {
        None | Some("") => true,
        Some(key) => PLACEHOLDER_API_KEYS
            .iter()
            .any(|p| key.eq_ignore_ascii_case(p)),
    }
}

/// Join a base URL and a request path with exactly one slash between them.
///
/// # Errors
///
/// Returns `ApiError::InvalidUrl` if the result is not an absolute URL.
pub fn endpoint_url(base: &str, path: &str) -> Result<Url, ApiError> {
    let joined = format!(
        "{}/{}",
        base.trim_end_matches('/'),
        path.trim_start_matches('/')
    );
    Ok(Url::parse(&joined)?)
}

fn stub_reply(path: &str, payload: &Value) -> Value {
    serde_json::json!({
        "stub": true,
        "path": path,
        "payload": payload,
        "message": format!("[stub] {path} not called: API credentials are not configured"),
    })
}

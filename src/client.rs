//! HTTP transport for pushing log bodies to the collection backend.
//!
//! One request per push, no retries: a failed push is reported back to the
//! run loop, which backs off the whole cycle instead.

use std::future::Future;
use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderName, HeaderValue, CONTENT_TYPE};
use reqwest::{Client, StatusCode};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::config::Config;

const APP_ID_HEADER: &str = "x-app-id";
const APP_SECRET_HEADER: &str = "x-app-secret";
const REQUEST_ID_HEADER: &str = "x-request-id";

/// Longest response body excerpt kept for diagnostics.
const MAX_DIAGNOSTIC_LEN: usize = 512;

/// Response received from the backend.
#[derive(Debug, Clone)]
pub struct BackendResponse {
    status: StatusCode,
    body: String,
}

impl BackendResponse {
    pub fn new(status: StatusCode, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    pub fn is_http_ok(&self) -> bool {
        self.status.is_success()
    }

    pub fn http_status_code(&self) -> u16 {
        self.status.as_u16()
    }
}

impl std::fmt::Display for BackendResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut excerpt = self.body.trim();
        if excerpt.len() > MAX_DIAGNOSTIC_LEN {
            let mut end = MAX_DIAGNOSTIC_LEN;
            while !excerpt.is_char_boundary(end) {
                end -= 1;
            }
            excerpt = &excerpt[..end];
        }
        write!(f, "status: {}, body: {}", self.status.as_u16(), excerpt)
    }
}

/// Errors that prevent a response from being received.
#[derive(Debug)]
pub enum TransportError {
    /// HTTP request failed
    Request(reqwest::Error),

    /// Request timed out
    Timeout,

    /// Transport configuration error
    Config(String),
}

impl TransportError {
    /// Numeric error class for log output.
    pub fn code(&self) -> u16 {
        match self {
            TransportError::Request(e) if e.is_connect() => 7,
            TransportError::Request(_) => 1,
            TransportError::Timeout => 28,
            TransportError::Config(_) => 3,
        }
    }
}

impl std::fmt::Display for TransportError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TransportError::Request(e) => write!(f, "HTTP request failed: {}", e),
            TransportError::Timeout => write!(f, "Request timed out"),
            TransportError::Config(e) => write!(f, "Transport configuration error: {}", e),
        }
    }
}

impl std::error::Error for TransportError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            TransportError::Request(e) => Some(e),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for TransportError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            TransportError::Timeout
        } else {
            TransportError::Request(err)
        }
    }
}

/// Executes a single POST of a body to a URL.
pub trait Transport {
    fn post<'a>(
        &'a self,
        url: &'a str,
        body: String,
    ) -> impl Future<Output = Result<BackendResponse, TransportError>> + Send + 'a;
}

/// One push, built fresh for every request.
pub struct BackendRequest<'a> {
    client: &'a Client,
    url: &'a str,
    body: String,
    headers: HeaderMap,
}

impl<'a> BackendRequest<'a> {
    fn new(client: &'a Client, url: &'a str, body: String, base: &HeaderMap) -> Self {
        let mut headers = base.clone();
        if let Ok(id) = HeaderValue::from_str(&Uuid::new_v4().to_string()) {
            headers.insert(HeaderName::from_static(REQUEST_ID_HEADER), id);
        }
        Self {
            client,
            url,
            body,
            headers,
        }
    }

    /// Send the request and collect the response body.
    pub async fn perform(self) -> Result<BackendResponse, TransportError> {
        let response = self
            .client
            .post(self.url)
            .headers(self.headers)
            .body(self.body)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        Ok(BackendResponse::new(status, body))
    }
}

/// Transport backed by a shared `reqwest` client.
pub struct HttpTransport {
    /// The underlying HTTP client (reused for connection pooling)
    client: Client,

    /// Headers sent with every push
    headers: HeaderMap,

    timeout: Duration,
}

impl HttpTransport {
    /// Create a transport from the agent configuration.
    ///
    /// # Errors
    ///
    /// Returns `TransportError::Config` if the HTTP client cannot be built or
    /// an auth header value is not a valid header.
    pub fn new(config: &Config) -> Result<Self, TransportError> {
        Self::with_settings(
            config.request_timeout,
            config.app_id.as_deref(),
            config.app_secret.as_deref(),
        )
    }

    pub fn with_settings(
        timeout: Duration,
        app_id: Option<&str>,
        app_secret: Option<&str>,
    ) -> Result<Self, TransportError> {
        let client = Client::builder()
            .timeout(timeout)
            .pool_max_idle_per_host(4)
            .pool_idle_timeout(Duration::from_secs(90))
            .build()
            .map_err(|e| TransportError::Config(e.to_string()))?;

        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        for (name, value) in [(APP_ID_HEADER, app_id), (APP_SECRET_HEADER, app_secret)] {
            if let Some(value) = value {
                let value = HeaderValue::from_str(value)
                    .map_err(|e| TransportError::Config(format!("{}: {}", name, e)))?;
                headers.insert(HeaderName::from_static(name), value);
            }
        }

        Ok(Self {
            client,
            headers,
            timeout,
        })
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }
}

impl Transport for HttpTransport {
    fn post<'a>(
        &'a self,
        url: &'a str,
        body: String,
    ) -> impl Future<Output = Result<BackendResponse, TransportError>> + Send + 'a {
        debug!(url = %url, body = %body, "Posting logs");
        BackendRequest::new(&self.client, url, body, &self.headers).perform()
    }
}

/// Push `body` to `url` and report whether the backend accepted it.
///
/// Failures are logged at warn level with the endpoint URL.
pub async fn push_logs<T: Transport>(transport: &T, url: &str, body: String) -> bool {
    match transport.post(url, body).await {
        Ok(response) => {
            debug!(url = %url, response = %response, "Backend response");
            if response.is_http_ok() {
                true
            } else {
                warn!(
                    url = %url,
                    status = response.http_status_code(),
                    "Unexpected http response code"
                );
                false
            }
        }
        Err(e) => {
            warn!(url = %url, code = e.code(), error = %e, "Log push failed");
            false
        }
    }
}

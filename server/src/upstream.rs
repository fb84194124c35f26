//! Client for the external execution service.
//!
//! Submissions are relayed without interpretation: the body goes out as-is
//! with the caller's id in `X-User-ID`, and the service's status and body
//! come back as-is.

use std::time::Duration;

use axum::body::Bytes;
use axum::http::StatusCode;
use axum::http::header::CONTENT_TYPE;

/// Header carrying the authenticated user's id to the execution service.
pub const USER_ID_HEADER: &str = "X-User-ID";

/// Health probes use a shorter timeout than submissions.
const HEALTH_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug)]
pub enum UpstreamError {
    /// The service could not be reached or did not answer in time.
    Unavailable(String),
    /// The service answered but its body could not be read.
    Body(String),
    /// The HTTP client could not be built.
    Client(String),
}

impl std::fmt::Display for UpstreamError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Unavailable(reason) => write!(f, "execution service unavailable: {reason}"),
            Self::Body(reason) => write!(f, "failed to read execution service response: {reason}"),
            Self::Client(reason) => write!(f, "failed to build HTTP client: {reason}"),
        }
    }
}

impl std::error::Error for UpstreamError {}

/// Result of probing the execution service's health endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpstreamHealth {
    /// Answered 2xx.
    Ok,
    /// Answered with any other status.
    Unhealthy,
    /// Unreachable.
    Down,
}

impl UpstreamHealth {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Ok => "ok",
            Self::Unhealthy => "unhealthy",
            Self::Down => "down",
        }
    }
}

/// A relayed response.
#[derive(Debug)]
pub struct Relayed {
    pub status: StatusCode,
    pub content_type: Option<String>,
    pub body: Bytes,
}

#[derive(Debug, Clone)]
pub struct ExecutionService {
    client: reqwest::Client,
    base_url: String,
}

impl ExecutionService {
    /// # Errors
    /// `UpstreamError::Client` if the TLS backend cannot be initialised.
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, UpstreamError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| UpstreamError::Client(e.to_string()))?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    /// POST `body` to `path` on behalf of `user_id`.
    ///
    /// # Errors
    /// `Unavailable` on connection failure or timeout, `Body` if the
    /// response body cannot be read. Non-2xx answers are not errors.
    pub async fn forward(
        &self,
        path: &str,
        user_id: &str,
        body: Bytes,
    ) -> Result<Relayed, UpstreamError> {
        let url = self.url(path);
        let response = self
            .client
            .post(&url)
            .header(CONTENT_TYPE, "application/json")
            .header(USER_ID_HEADER, user_id)
            .body(body)
            .send()
            .await
            .map_err(|e| {
                tracing::warn!("failed to reach execution service at {url}: {e}");
                UpstreamError::Unavailable(e.to_string())
            })?;

        let status = response.status();
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(ToString::to_string);
        let body = response
            .bytes()
            .await
            .map_err(|e| UpstreamError::Body(e.to_string()))?;

        tracing::debug!("execution service answered {status} for {path}");
        Ok(Relayed {
            status,
            content_type,
            body,
        })
    }

    pub async fn health(&self) -> UpstreamHealth {
        match self
            .client
            .get(self.url("/health"))
            .timeout(HEALTH_TIMEOUT)
            .send()
            .await
        {
            Ok(response) if response.status() == reqwest::StatusCode::OK => UpstreamHealth::Ok,
            Ok(response) => {
                tracing::warn!("execution service health check returned {}", response.status());
                UpstreamHealth::Unhealthy
            }
            Err(e) => {
                tracing::warn!("execution service health check failed: {e}");
                UpstreamHealth::Down
            }
        }
    }
}

//! Document Server HTTP client
//!
//! Thin wrapper over `reqwest` for the three calls this service makes to the
//! external editing server: liveness, server info, and fetching an edited
//! document after a save callback.

use serde_json::Value;
use std::collections::BTreeMap;
use std::time::Duration;
use thiserror::Error;

use docdesk_common::config::DocumentServerConfig;

/// Per-request timeout for fetching edited documents
const DOWNLOAD_TIMEOUT: Duration = Duration::from_secs(120);

/// Document Server client errors
#[derive(Debug, Error)]
pub enum DocServerError {
    /// Connection refused or host unreachable
    #[error("Connection failed: {0}")]
    Unreachable(String),

    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("HTTP {0}: {1}")]
    Status(u16, String),

    #[error("Request failed: {0}")]
    Other(String),
}

impl DocServerError {
    /// Human-readable summary for status endpoints
    pub fn summary(&self) -> &'static str {
        match self {
            DocServerError::Unreachable(_) => "Document Server is not running or cannot be reached",
            DocServerError::Timeout(_) => "Timed out contacting the Document Server",
            DocServerError::Status(..) | DocServerError::Other(_) => {
                "Document Server cannot be accessed"
            }
        }
    }
}

impl From<reqwest::Error> for DocServerError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            DocServerError::Timeout(e.to_string())
        } else if e.is_connect() {
            DocServerError::Unreachable(e.to_string())
        } else if let Some(status) = e.status() {
            DocServerError::Status(status.as_u16(), e.to_string())
        } else {
            DocServerError::Other(e.to_string())
        }
    }
}

/// Response of `GET /` on the Document Server
#[derive(Debug, Clone)]
pub struct ServerInfo {
    pub status: u16,
    pub headers: BTreeMap<String, String>,
}

/// Document Server API client
#[derive(Clone)]
pub struct DocServerClient {
    http_client: reqwest::Client,
    base_url: String,
}

impl DocServerClient {
    pub fn new(config: &DocumentServerConfig) -> Result<Self, DocServerError> {
        let http_client = reqwest::Client::builder()
            .user_agent(config.user_agent.clone())
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()
            .map_err(|e| DocServerError::Other(e.to_string()))?;

        Ok(Self {
            http_client,
            base_url: config.url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// `GET /healthcheck`
    ///
    /// The body is returned as JSON when it parses (the server answers a
    /// bare `true`), otherwise as a JSON string.
    pub async fn healthcheck(&self) -> Result<Value, DocServerError> {
        let url = format!("{}/healthcheck", self.base_url);
        tracing::debug!("Checking Document Server health at {}", url);

        let response = self.http_client.get(&url).send().await?.error_for_status()?;
        let status = response.status();
        let body = response.text().await?;

        tracing::debug!("Document Server health check response: {} {}", status, body);
        Ok(serde_json::from_str(&body).unwrap_or(Value::String(body)))
    }

    /// `GET /`: status code and response headers
    pub async fn info(&self) -> Result<ServerInfo, DocServerError> {
        let url = format!("{}/", self.base_url);
        let response = self.http_client.get(&url).send().await?.error_for_status()?;

        let headers = response
            .headers()
            .iter()
            .map(|(name, value)| {
                (
                    name.as_str().to_string(),
                    String::from_utf8_lossy(value.as_bytes()).into_owned(),
                )
            })
            .collect();

        Ok(ServerInfo {
            status: response.status().as_u16(),
            headers,
        })
    }

    /// Fetch an edited document from the URL given in a save callback
    pub async fn download(&self, url: &str) -> Result<Vec<u8>, DocServerError> {
        let response = self
            .http_client
            .get(url)
            .timeout(DOWNLOAD_TIMEOUT)
            .send()
            .await?
            .error_for_status()?;
        let bytes = response.bytes().await?;
        Ok(bytes.to_vec())
    }
}

//! Signal server REST client.
//!
//! - `POST {base}{report_path}`: fire-and-forget report of a locally resolved signal
//! - `GET {base}{status_path}`: server health / game-feed connectivity
//!
//! Uses a persistent `reqwest::Client`; every call is bounded by a short timeout
//! so a slow server never piles up report tasks.

use std::time::Duration;

use crate::stream::parser::parse_server_status;
use crate::types::config::SessionSettings;
use crate::types::event::ResolutionReport;

// =============================================================================
// API CLIENT STATE
// =============================================================================

/// Persistent REST client. Created once per session.
pub struct SignalApiClient {
    client: reqwest::Client,
    report_url: String,
    status_url: String,
    auth_token: Option<String>,
}

impl SignalApiClient {
    pub fn new(settings: &SessionSettings) -> Result<Self, ApiError> {
        let client = reqwest::Client::builder()
            .tcp_nodelay(true)
            .pool_idle_timeout(Duration::from_secs(25))
            .pool_max_idle_per_host(4)
            .timeout(Duration::from_secs(5))
            .build()
            .map_err(|e| ApiError::Client(e.to_string()))?;

        Ok(Self {
            client,
            report_url: format!("{}{}", settings.base_url, settings.report_path),
            status_url: format!("{}{}", settings.base_url, settings.status_path),
            auth_token: settings.auth_token.clone(),
        })
    }

    /// Report a locally detected resolution so the server can account for it.
    pub async fn report_resolution(&self, report: &ResolutionReport) -> Result<(), ApiError> {
        let mut request = self.client.post(&self.report_url).json(report);
        if let Some(ref token) = self.auth_token {
            request = request.bearer_auth(token);
        }

        let response = request
            .send()
            .await
            .map_err(|e| ApiError::Request(e.to_string()))?;
        let status = response.status();
        if status.is_success() {
            tracing::debug!(signal_id = %report.id, status = %status, "Resolution reported");
            return Ok(());
        }

        let body = response.text().await.unwrap_or_default();
        Err(ApiError::Status {
            status: status.as_u16(),
            body: body.chars().take(500).collect(),
        })
    }

    /// Whether the server is connected to the game feed (`wsConnected`).
    pub async fn fetch_status(&self) -> Result<bool, ApiError> {
        let mut request = self.client.get(&self.status_url);
        if let Some(ref token) = self.auth_token {
            request = request.bearer_auth(token);
        }

        let response = request
            .send()
            .await
            .map_err(|e| ApiError::Request(e.to_string()))?;
        let status = response.status();
        if !status.is_success() {
            return Err(ApiError::Status {
                status: status.as_u16(),
                body: String::new(),
            });
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| ApiError::Request(e.to_string()))?;
        parse_server_status(&bytes).map_err(|e| ApiError::Response(e.to_string()))
    }

    #[cfg(test)]
    pub fn report_url(&self) -> &str {
        &self.report_url
    }

    #[cfg(test)]
    pub fn status_url(&self) -> &str {
        &self.status_url
    }
}

// =============================================================================
// ERROR TYPES
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApiError {
    Client(String),
    Request(String),
    Status { status: u16, body: String },
    Response(String),
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ApiError::Client(msg) => write!(f, "Failed to create HTTP client: {}", msg),
            ApiError::Request(msg) => write!(f, "HTTP request failed: {}", msg),
            ApiError::Status { status, body } => write!(f, "HTTP {}: {}", status, body),
            ApiError::Response(msg) => write!(f, "Failed to parse response: {}", msg),
        }
    }
}

impl std::error::Error for ApiError {}

// =============================================================================
// TESTS
// =============================================================================

//! REST client for the backend job service.
//!
//! Wraps run creation, status queries, result retrieval and markdown
//! export using [`reqwest`]. The progress stream request is exposed
//! here too so that the channel transport shares the same client and
//! base URL.

use std::time::Duration;

use bytes::Bytes;
use ideagen_core::idea::{IdeaDetail, RunIdeas};
use ideagen_core::run::{CreateRunResponse, RunStatus};
use ideagen_core::types::{IdeaId, JobId};
use serde::{Deserialize, Serialize};

use crate::config::SyncConfig;

/// HTTP client for the backend job service.
pub struct JobServiceApi {
    client: reqwest::Client,
    base_url: String,
    request_timeout: Duration,
}

/// Response of `GET /health`.
#[derive(Debug, Deserialize)]
pub struct HealthStatus {
    pub status: String,
    #[serde(default)]
    pub app: Option<String>,
    #[serde(default)]
    pub version: Option<String>,
}

#[derive(Serialize)]
struct CreateRunRequest<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    optional_direction: Option<&'a str>,
}

#[derive(Serialize)]
struct ExportRequest<'a> {
    run_id: &'a JobId,
    #[serde(skip_serializing_if = "Option::is_none")]
    idea_ids: Option<&'a [IdeaId]>,
}

/// Errors from the REST layer.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// The HTTP request itself failed (network, DNS, TLS, timeout).
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The backend returned a non-2xx status code.
    #[error("Backend API error ({status}): {message}")]
    Status {
        /// HTTP status code.
        status: u16,
        /// `detail`/`message` from the error body, or the raw body.
        message: String,
    },

    /// The body was not the expected JSON shape.
    #[error("Unexpected response body: {0}")]
    Decode(#[from] serde_json::Error),

    /// No response headers arrived within the allowed time.
    #[error("No response from backend within {0:?}")]
    Timeout(Duration),
}

impl JobServiceApi {
    /// Build a client from the sync configuration.
    ///
    /// The client only carries a connect timeout; REST calls add
    /// `request_timeout` per request so the long-lived progress stream
    /// is not cut off.
    pub fn new(config: &SyncConfig) -> Result<Self, ApiError> {
        let client = reqwest::Client::builder()
            .connect_timeout(config.request_timeout)
            .user_agent(concat!("ideagen/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self::with_client(client, config))
    }

    /// Create an API client reusing an existing [`reqwest::Client`].
    pub fn with_client(client: reqwest::Client, config: &SyncConfig) -> Self {
        Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            request_timeout: config.request_timeout,
        }
    }

    /// Check that the backend is up.
    pub async fn health(&self) -> Result<HealthStatus, ApiError> {
        let response = self
            .client
            .get(self.url("/health"))
            .timeout(self.request_timeout)
            .send()
            .await?;

        Self::parse_response(response).await
    }

    /// Start a new run.
    ///
    /// A blank direction is sent as absent. Creation is never retried.
    pub async fn create_run(
        &self,
        optional_direction: Option<&str>,
    ) -> Result<CreateRunResponse, ApiError> {
        let body = CreateRunRequest {
            optional_direction: optional_direction
                .map(str::trim)
                .filter(|d| !d.is_empty()),
        };

        let response = self
            .client
            .post(self.url("/api/runs"))
            .timeout(self.request_timeout)
            .json(&body)
            .send()
            .await?;

        Self::parse_response(response).await
    }

    /// Fetch the raw status payload of a run.
    pub async fn get_run_status_value(
        &self,
        job_id: &JobId,
    ) -> Result<serde_json::Value, ApiError> {
        let response = self
            .client
            .get(self.url(&format!("/api/runs/{job_id}")))
            .timeout(self.request_timeout)
            .send()
            .await?;

        Self::parse_response(response).await
    }

    /// Fetch the typed status of a run.
    pub async fn get_run_status(&self, job_id: &JobId) -> Result<RunStatus, ApiError> {
        let value = self.get_run_status_value(job_id).await?;
        Ok(serde_json::from_value(value)?)
    }

    /// List the ideas produced by a completed run.
    pub async fn get_run_ideas(&self, job_id: &JobId) -> Result<RunIdeas, ApiError> {
        let response = self
            .client
            .get(self.url(&format!("/api/runs/{job_id}/ideas")))
            .timeout(self.request_timeout)
            .send()
            .await?;

        Self::parse_response(response).await
    }

    /// Fetch one idea with analogues and plans.
    pub async fn get_idea(&self, idea_id: IdeaId) -> Result<IdeaDetail, ApiError> {
        let response = self
            .client
            .get(self.url(&format!("/api/ideas/{idea_id}")))
            .timeout(self.request_timeout)
            .send()
            .await?;

        Self::parse_response(response).await
    }

    /// Export ideas of a run as a markdown document.
    ///
    /// `idea_ids` limits the export to a subset; `None` exports all.
    pub async fn export_markdown(
        &self,
        job_id: &JobId,
        idea_ids: Option<&[IdeaId]>,
    ) -> Result<Bytes, ApiError> {
        let body = ExportRequest {
            run_id: job_id,
            idea_ids,
        };

        let response = self
            .client
            .post(self.url("/api/export/markdown"))
            .timeout(self.request_timeout)
            .json(&body)
            .send()
            .await?;

        let response = Self::ensure_success(response).await?;
        Ok(response.bytes().await?)
    }

    /// Open the server-sent events stream for a run.
    ///
    /// Returns the response once headers arrived with a success status;
    /// the body is consumed by the channel transport. Only the wait for
    /// headers is bounded by `request_timeout`, never the body.
    pub async fn open_progress_stream(
        &self,
        job_id: &JobId,
    ) -> Result<reqwest::Response, ApiError> {
        let request = self
            .client
            .get(self.url(&format!("/api/runs/{job_id}/progress")))
            .header(reqwest::header::ACCEPT, "text/event-stream")
            .send();

        let response = tokio::time::timeout(self.request_timeout, request)
            .await
            .map_err(|_| ApiError::Timeout(self.request_timeout))??;

        Self::ensure_success(response).await
    }

    // ---- private helpers ----

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Ensure the response has a success status code, turning failures
    /// into [`ApiError::Status`] with the most useful message available.
    async fn ensure_success(
        response: reqwest::Response,
    ) -> Result<reqwest::Response, ApiError> {
        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<unreadable body>".to_string());
            return Err(ApiError::Status {
                status: status.as_u16(),
                message: error_message(&body, status.as_u16()),
            });
        }
        Ok(response)
    }

    /// Parse a successful JSON response body into the expected type.
    async fn parse_response<T: serde::de::DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<T, ApiError> {
        let response = Self::ensure_success(response).await?;
        Ok(response.json::<T>().await?)
    }
}

/// Pull a human-readable message out of an error body.
///
/// The backend answers errors as `{"detail": "..."}`; some proxies use
/// `{"message": "..."}`. Anything else is returned verbatim.
fn error_message(body: &str, status: u16) -> String {
    if let Ok(value) = serde_json::from_str::<serde_json::Value>(body) {
        for key in ["detail", "message"] {
            if let Some(msg) = value.get(key).and_then(|v| v.as_str()) {
                return msg.to_string();
            }
        }
    }
    let trimmed = body.trim();
    if trimmed.is_empty() {
        format!("HTTP {status}")
    } else {
        trimmed.to_string()
    }
}

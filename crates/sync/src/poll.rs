//! Pull-based status transport.
//!
//! Each call is a single, stateless status query. Scheduling, attempt
//! counting and the timeout decision belong to the synchronizer.

use std::sync::Arc;

use async_trait::async_trait;
use ideagen_core::progress::StatusSnapshot;
use ideagen_core::run::RunStatus;
use ideagen_core::types::JobId;

use crate::api::JobServiceApi;

/// One failed poll attempt (network, HTTP status or body shape).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Poll attempt failed: {reason}")]
pub struct PollFailure {
    pub reason: String,
}

pub type PollResult = Result<StatusSnapshot, PollFailure>;

/// Answers "where is this run now?".
#[async_trait]
pub trait PollTransport: Send + Sync {
    async fn poll(&self, job_id: &JobId) -> PollResult;
}

/// Poll transport backed by `GET /api/runs/{id}`.
pub struct HttpPollTransport {
    api: Arc<JobServiceApi>,
}

impl HttpPollTransport {
    pub fn new(api: Arc<JobServiceApi>) -> Self {
        Self { api }
    }
}

#[async_trait]
impl PollTransport for HttpPollTransport {
    async fn poll(&self, job_id: &JobId) -> PollResult {
        let value = self
            .api
            .get_run_status_value(job_id)
            .await
            .map_err(|e| PollFailure {
                reason: e.to_string(),
            })?;

        let status: RunStatus =
            serde_json::from_value(value.clone()).map_err(|e| PollFailure {
                reason: format!("Unexpected status payload: {e}"),
            })?;

        Ok(status.into_status_snapshot(value))
    }
}

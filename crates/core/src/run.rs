//! Run payloads exchanged with the backend job service.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::progress::{JobState, ProgressSnapshot, StatusSnapshot};
use crate::types::JobId;

/// Response of `POST /api/runs`.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateRunResponse {
    pub run_id: JobId,
    pub status: JobState,
    #[serde(default)]
    pub created_at: Option<NaiveDateTime>,
}

/// Status payload shared by the push channel events and the pull
/// status endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunStatus {
    pub run_id: JobId,
    pub status: JobState,
    #[serde(default)]
    pub current_stage: Option<String>,
    #[serde(default)]
    pub progress_percent: Option<f64>,
    #[serde(default)]
    pub optional_direction: Option<String>,
    #[serde(default)]
    pub ideas_count: i64,
    #[serde(default)]
    pub error_message: Option<String>,
    #[serde(default)]
    pub created_at: Option<NaiveDateTime>,
    #[serde(default)]
    pub completed_at: Option<NaiveDateTime>,
}

impl RunStatus {
    /// Normalize into a progress snapshot.
    pub fn progress(&self) -> ProgressSnapshot {
        ProgressSnapshot::new(
            self.current_stage.clone().unwrap_or_default(),
            self.progress_percent.unwrap_or(0.0),
        )
    }

    /// Normalize into a status snapshot, keeping the raw payload.
    pub fn into_status_snapshot(self, raw: serde_json::Value) -> StatusSnapshot {
        StatusSnapshot {
            progress: self.progress().with_raw(raw),
            state: self.status,
            reason: self.error_message,
        }
    }
}

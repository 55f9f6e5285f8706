//! Progress snapshots and job lifecycle states.

use serde::{Deserialize, Serialize};

/// Lifecycle state reported by the pull status endpoint.
///
/// The backend also reports `pending` for runs that have not been
/// picked up by a worker yet; for tracking purposes that is still
/// running.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobState {
    #[serde(alias = "pending")]
    Running,
    Completed,
    Failed,
}

/// Normalized progress update handed to the presentation layer.
///
/// Only the latest snapshot matters. Snapshots are displayed exactly as
/// received, so a lower percentage after a higher one is shown as-is.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProgressSnapshot {
    /// Human-readable stage name (may be empty before the first stage).
    pub stage_label: String,
    /// Completion percentage, always within `0..=100`.
    pub percent_complete: u8,
    /// The backend payload this snapshot was built from, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub raw: Option<serde_json::Value>,
}

impl ProgressSnapshot {
    /// Build a snapshot, clamping the percentage into `0..=100`.
    ///
    /// Non-finite percentages are treated as zero.
    pub fn new(stage_label: impl Into<String>, percent: f64) -> Self {
        let percent_complete = if percent.is_finite() {
            percent.round().clamp(0.0, 100.0) as u8
        } else {
            0
        };
        Self {
            stage_label: stage_label.into(),
            percent_complete,
            raw: None,
        }
    }

    pub fn with_raw(mut self, raw: serde_json::Value) -> Self {
        self.raw = Some(raw);
        self
    }
}

/// One successful answer from the pull status endpoint.
#[derive(Debug, Clone, PartialEq)]
pub struct StatusSnapshot {
    pub progress: ProgressSnapshot,
    pub state: JobState,
    /// Failure reason carried by the backend, if any.
    pub reason: Option<String>,
}

//! The single result of a tracking session.

use serde::Serialize;

/// Reason shown when the backend reports a failure without a message.
pub const DEFAULT_FAILURE_REASON: &str = "Run finished with an error";

/// Message shown when polling gives up.
pub const TIMEOUT_MESSAGE: &str = "Exceeded wait time";

/// How a tracking session ended.
///
/// Exactly one of these is produced per session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum TerminalOutcome {
    /// The run completed and its results are ready.
    Succeeded,
    /// The backend reported that the run itself failed.
    Failed { reason: String },
    /// Polling hit the attempt cap before the run finished.
    TimedOut,
}

impl TerminalOutcome {
    /// Build a failure, falling back to [`DEFAULT_FAILURE_REASON`] when
    /// the backend sent no usable reason.
    pub fn failed(reason: Option<&str>) -> Self {
        let reason = reason
            .map(str::trim)
            .filter(|r| !r.is_empty())
            .unwrap_or(DEFAULT_FAILURE_REASON);
        TerminalOutcome::Failed {
            reason: reason.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_reason_uses_default() {
        assert_eq!(
            TerminalOutcome::failed(Some("  ")),
            TerminalOutcome::Failed {
                reason: DEFAULT_FAILURE_REASON.into()
            }
        );
        assert_eq!(
            TerminalOutcome::failed(None),
            TerminalOutcome::Failed {
                reason: DEFAULT_FAILURE_REASON.into()
            }
        );
    }

    #[test]
    fn carried_reason_is_kept() {
        assert_eq!(
            TerminalOutcome::failed(Some("LLM quota exhausted")),
            TerminalOutcome::Failed {
                reason: "LLM quota exhausted".into()
            }
        );
    }
}

//! Translates the terminal outcome into presentation actions.

use ideagen_core::outcome::{TerminalOutcome, TIMEOUT_MESSAGE};
use ideagen_core::progress::ProgressSnapshot;
use ideagen_core::types::JobId;

/// The UI side of a tracking session.
///
/// Implementations render progress and react to the final outcome;
/// they never see transports or transport-level errors.
pub trait Presentation: Send + Sync {
    /// Render the latest progress snapshot.
    fn show_progress(&self, snapshot: &ProgressSnapshot);

    /// The run succeeded; move on to its results.
    fn navigate_to_results(&self, job_id: &JobId);

    /// Show a user-visible error message.
    fn show_error(&self, message: &str);

    /// Show the "waited too long" message. Defaults to [`show_error`](Self::show_error).
    fn show_timeout(&self, message: &str) {
        self.show_error(message);
    }
}

/// What the dispatcher asked the presentation layer to do.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Dispatched {
    Navigated,
    ShowedError(String),
    ShowedTimeout,
}

/// Delivers at most one terminal outcome per session.
pub struct OutcomeDispatcher<'a, P: Presentation + ?Sized> {
    job_id: JobId,
    presentation: &'a P,
    done: bool,
}

impl<'a, P: Presentation + ?Sized> OutcomeDispatcher<'a, P> {
    pub fn new(job_id: JobId, presentation: &'a P) -> Self {
        Self {
            job_id,
            presentation,
            done: false,
        }
    }

    /// Act on the outcome. A second call is ignored and returns `None`.
    pub fn on_outcome(&mut self, outcome: TerminalOutcome) -> Option<Dispatched> {
        if self.done {
            tracing::warn!(job_id = %self.job_id, ?outcome, "Ignoring duplicate terminal outcome");
            return None;
        }
        self.done = true;

        let dispatched = match outcome {
            TerminalOutcome::Succeeded => {
                self.presentation.navigate_to_results(&self.job_id);
                Dispatched::Navigated
            }
            TerminalOutcome::Failed { reason } => {
                self.presentation.show_error(&reason);
                Dispatched::ShowedError(reason)
            }
            TerminalOutcome::TimedOut => {
                self.presentation.show_timeout(TIMEOUT_MESSAGE);
                Dispatched::ShowedTimeout
            }
        };

        tracing::info!(job_id = %self.job_id, ?dispatched, "Terminal outcome dispatched");
        Some(dispatched)
    }

    pub fn has_dispatched(&self) -> bool {
        self.done
    }
}

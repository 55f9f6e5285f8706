//! Transition table of the progress synchronizer.
//!
//! [`SyncMachine`] is pure: it consumes [`SyncInput`]s and answers with
//! the [`Action`]s the driver must perform. It never touches a
//! transport itself, which keeps every `(state, input)` pair testable
//! without I/O or timers.
//!
//! ```text
//! Idle ──Start──▶ Streaming ──complete──▶ Terminal(Succeeded)
//!                   │  ▲ progress           error ──▶ Terminal(Failed)
//!                   │  └─────┘
//!                   └─transport failure / malformed terminal──▶ Polling
//! Polling ──running / poll failure──▶ Polling (until the attempt cap)
//! Polling ──completed──▶ Terminal(Succeeded)
//! Polling ──failed──▶ Terminal(Failed)
//! Polling ──cap reached──▶ Terminal(TimedOut)
//! any ──Cancel──▶ Discarded
//! ```

use std::fmt;

use ideagen_core::outcome::TerminalOutcome;
use ideagen_core::progress::{JobState, ProgressSnapshot};
use ideagen_core::types::JobId;

use crate::messages::ChannelMessage;
use crate::poll::PollResult;

/// Failure classes seen by the synchronizer, used in structured logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// Connectivity lost; recovered by falling back to polling.
    TransportFailure,
    /// One poll attempt failed; retried until the cap.
    PollAttemptFailure,
    /// The backend says the run failed. Terminal.
    DomainFailure,
    /// Attempt cap exhausted. Terminal.
    Timeout,
    /// Undecodable terminal payload; handled as a transport failure.
    MalformedPayload,
}

impl FailureKind {
    pub fn as_str(self) -> &'static str {
        match self {
            FailureKind::TransportFailure => "transport_failure",
            FailureKind::PollAttemptFailure => "poll_attempt_failure",
            FailureKind::DomainFailure => "domain_failure",
            FailureKind::Timeout => "timeout",
            FailureKind::MalformedPayload => "malformed_payload",
        }
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where a session currently is.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncState {
    Idle,
    Streaming,
    /// `attempts` counts polls whose answer has been observed.
    Polling { attempts: u32 },
    Terminal(TerminalOutcome),
    /// Cancelled from outside; emits nothing further.
    Discarded,
}

impl SyncState {
    pub fn name(&self) -> &'static str {
        match self {
            SyncState::Idle => "idle",
            SyncState::Streaming => "streaming",
            SyncState::Polling { .. } => "polling",
            SyncState::Terminal(_) => "terminal",
            SyncState::Discarded => "discarded",
        }
    }

    pub fn is_finished(&self) -> bool {
        matches!(self, SyncState::Terminal(_) | SyncState::Discarded)
    }
}

/// Everything that can happen to a session.
#[derive(Debug, Clone)]
pub enum SyncInput {
    Start,
    Channel(ChannelMessage),
    Poll(PollResult),
    Cancel,
}

/// Side effects requested by a transition, in execution order.
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    OpenChannel,
    CloseChannel,
    /// Wait one poll interval, then poll once.
    SchedulePoll,
    /// Drop any pending poll tick.
    CancelSchedule,
    EmitProgress(ProgressSnapshot),
    Dispatch(TerminalOutcome),
}

/// The synchronizer state machine for one run.
#[derive(Debug)]
pub struct SyncMachine {
    job_id: JobId,
    max_poll_attempts: u32,
    state: SyncState,
    latest: Option<ProgressSnapshot>,
}

impl SyncMachine {
    pub fn new(job_id: JobId, max_poll_attempts: u32) -> Self {
        Self {
            job_id,
            max_poll_attempts: max_poll_attempts.max(1),
            state: SyncState::Idle,
            latest: None,
        }
    }

    pub fn state(&self) -> &SyncState {
        &self.state
    }

    /// The most recently emitted snapshot.
    pub fn latest_progress(&self) -> Option<&ProgressSnapshot> {
        self.latest.as_ref()
    }

    pub fn is_finished(&self) -> bool {
        self.state.is_finished()
    }

    /// Apply one input and return the actions to perform.
    ///
    /// Inputs that do not apply to the current state (late channel
    /// messages while polling, anything after termination) are
    /// discarded and yield no actions.
    pub fn handle(&mut self, input: SyncInput) -> Vec<Action> {
        let state = std::mem::replace(&mut self.state, SyncState::Discarded);
        let (next, actions) = match (state, input) {
            (SyncState::Idle, SyncInput::Start) => {
                tracing::info!(job_id = %self.job_id, "Tracking started, opening progress channel");
                (SyncState::Streaming, vec![Action::OpenChannel])
            }

            (SyncState::Streaming, SyncInput::Channel(msg)) => self.on_channel(msg),

            (SyncState::Polling { attempts }, SyncInput::Poll(result)) => {
                self.on_poll(attempts + 1, result)
            }

            (SyncState::Idle, SyncInput::Cancel) => {
                tracing::info!(job_id = %self.job_id, "Tracking cancelled before start");
                (SyncState::Discarded, Vec::new())
            }
            (SyncState::Streaming, SyncInput::Cancel) => {
                tracing::info!(job_id = %self.job_id, "Tracking cancelled while streaming");
                (SyncState::Discarded, vec![Action::CloseChannel])
            }
            (SyncState::Polling { attempts }, SyncInput::Cancel) => {
                tracing::info!(job_id = %self.job_id, attempts, "Tracking cancelled while polling");
                (SyncState::Discarded, vec![Action::CancelSchedule])
            }

            (state, input) => {
                tracing::debug!(
                    job_id = %self.job_id,
                    state = state.name(),
                    ?input,
                    "Discarding input not applicable to current state",
                );
                (state, Vec::new())
            }
        };

        self.state = next;
        self.remember_progress(&actions);
        actions
    }

    fn on_channel(&mut self, msg: ChannelMessage) -> (SyncState, Vec<Action>) {
        match msg {
            ChannelMessage::Progress(snapshot) => {
                tracing::debug!(
                    job_id = %self.job_id,
                    stage = %snapshot.stage_label,
                    percent = snapshot.percent_complete,
                    "Run progress",
                );
                (SyncState::Streaming, vec![Action::EmitProgress(snapshot)])
            }
            ChannelMessage::Complete(_) => {
                tracing::info!(job_id = %self.job_id, "Run completed (push channel)");
                let outcome = TerminalOutcome::Succeeded;
                (
                    SyncState::Terminal(outcome.clone()),
                    vec![Action::CloseChannel, Action::Dispatch(outcome)],
                )
            }
            ChannelMessage::ExplicitError { reason } => {
                let outcome = TerminalOutcome::failed(reason.as_deref());
                tracing::warn!(
                    job_id = %self.job_id,
                    kind = %FailureKind::DomainFailure,
                    ?outcome,
                    "Run failed (push channel)",
                );
                (
                    SyncState::Terminal(outcome.clone()),
                    vec![Action::CloseChannel, Action::Dispatch(outcome)],
                )
            }
            ChannelMessage::Malformed { event, detail } => {
                tracing::warn!(
                    job_id = %self.job_id,
                    kind = %FailureKind::MalformedPayload,
                    event = %event,
                    error = %detail,
                    "Undecodable terminal event, falling back to polling",
                );
                self.fall_back()
            }
            ChannelMessage::TransportFailure { detail } => {
                tracing::warn!(
                    job_id = %self.job_id,
                    kind = %FailureKind::TransportFailure,
                    error = %detail,
                    "Progress channel failed, falling back to polling",
                );
                self.fall_back()
            }
        }
    }

    fn fall_back(&self) -> (SyncState, Vec<Action>) {
        (
            SyncState::Polling { attempts: 0 },
            vec![Action::CloseChannel, Action::SchedulePoll],
        )
    }

    fn on_poll(&mut self, attempts: u32, result: PollResult) -> (SyncState, Vec<Action>) {
        let mut actions = Vec::new();

        match result {
            Ok(status) => {
                actions.push(Action::EmitProgress(status.progress));
                match status.state {
                    JobState::Completed => {
                        tracing::info!(job_id = %self.job_id, attempts, "Run completed (polling)");
                        return self.finish(actions, TerminalOutcome::Succeeded);
                    }
                    JobState::Failed => {
                        let outcome = TerminalOutcome::failed(status.reason.as_deref());
                        tracing::warn!(
                            job_id = %self.job_id,
                            kind = %FailureKind::DomainFailure,
                            attempts,
                            ?outcome,
                            "Run failed (polling)",
                        );
                        return self.finish(actions, outcome);
                    }
                    JobState::Running => {
                        tracing::debug!(job_id = %self.job_id, attempts, "Run still in progress");
                    }
                }
            }
            Err(failure) => {
                tracing::warn!(
                    job_id = %self.job_id,
                    kind = %FailureKind::PollAttemptFailure,
                    attempts,
                    error = %failure.reason,
                    "Status poll failed",
                );
            }
        }

        if attempts >= self.max_poll_attempts {
            tracing::warn!(
                job_id = %self.job_id,
                kind = %FailureKind::Timeout,
                attempts,
                "Poll attempt cap reached",
            );
            return self.finish(actions, TerminalOutcome::TimedOut);
        }

        actions.push(Action::SchedulePoll);
        (SyncState::Polling { attempts }, actions)
    }

    fn finish(
        &self,
        mut actions: Vec<Action>,
        outcome: TerminalOutcome,
    ) -> (SyncState, Vec<Action>) {
        actions.push(Action::CancelSchedule);
        actions.push(Action::Dispatch(outcome.clone()));
        (SyncState::Terminal(outcome), actions)
    }

    fn remember_progress(&mut self, actions: &[Action]) {
        for action in actions {
            if let Action::EmitProgress(snapshot) = action {
                self.latest = Some(snapshot.clone());
            }
        }
    }
}

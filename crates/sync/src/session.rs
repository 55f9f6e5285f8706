//! Async driver for one tracking session.
//!
//! [`SyncSession`] feeds transport events into a [`SyncMachine`] and
//! performs the actions it returns. It owns the single active
//! transport slot: at any instant either the push channel or the poll
//! schedule is live, never both, and a closed channel is dropped from
//! the slot before anything else can read from it.

use std::collections::VecDeque;
use std::sync::Arc;

use ideagen_core::outcome::TerminalOutcome;
use ideagen_core::types::JobId;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::channel::{ChannelHandle, ChannelTransport};
use crate::config::SyncConfig;
use crate::dispatcher::{OutcomeDispatcher, Presentation};
use crate::machine::{Action, SyncInput, SyncMachine};
use crate::messages::ChannelMessage;
use crate::poll::{PollResult, PollTransport};

/// The transport currently feeding the session.
enum ActiveTransport {
    None,
    Channel(Box<dyn ChannelHandle>),
    Polling,
}

impl ActiveTransport {
    fn take(&mut self) -> ActiveTransport {
        std::mem::replace(self, ActiveTransport::None)
    }

    fn close_channel(&mut self) {
        if let ActiveTransport::Channel(mut handle) = self.take() {
            handle.close();
        }
    }

    fn cancel_schedule(&mut self) {
        if matches!(self, ActiveTransport::Polling) {
            self.take();
        }
    }
}

/// Tracks one run to a single terminal outcome.
pub struct SyncSession<C, P> {
    job_id: JobId,
    config: SyncConfig,
    channel: C,
    poller: P,
    cancel: CancellationToken,
}

impl<C, P> SyncSession<C, P>
where
    C: ChannelTransport,
    P: PollTransport,
{
    pub fn new(job_id: JobId, config: SyncConfig, channel: C, poller: P) -> Self {
        Self {
            job_id,
            config,
            channel,
            poller,
            cancel: CancellationToken::new(),
        }
    }

    /// Use an externally owned token (e.g. a child of an app-wide one).
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Drive the session to completion.
    ///
    /// Returns the outcome handed to the dispatcher, or `None` when the
    /// session was cancelled first.
    pub async fn run<Pr>(self, presentation: &Pr) -> Option<TerminalOutcome>
    where
        Pr: Presentation + ?Sized,
    {
        let mut machine = SyncMachine::new(self.job_id.clone(), self.config.max_poll_attempts);
        let mut dispatcher = OutcomeDispatcher::new(self.job_id.clone(), presentation);
        let mut slot = ActiveTransport::None;
        let mut outcome = None;
        let mut inputs = VecDeque::from([SyncInput::Start]);

        loop {
            while let Some(input) = inputs.pop_front() {
                for action in machine.handle(input) {
                    match action {
                        Action::OpenChannel => {
                            let opened = tokio::select! {
                                biased;
                                _ = self.cancel.cancelled() => None,
                                res = self.channel.open(&self.job_id) => Some(res),
                            };
                            match opened {
                                None => inputs.push_back(SyncInput::Cancel),
                                Some(Ok(handle)) => slot = ActiveTransport::Channel(handle),
                                Some(Err(e)) => inputs.push_back(SyncInput::Channel(
                                    ChannelMessage::TransportFailure {
                                        detail: e.to_string(),
                                    },
                                )),
                            }
                        }
                        Action::CloseChannel => slot.close_channel(),
                        Action::SchedulePoll => slot = ActiveTransport::Polling,
                        Action::CancelSchedule => slot.cancel_schedule(),
                        Action::EmitProgress(snapshot) => presentation.show_progress(&snapshot),
                        Action::Dispatch(result) => {
                            outcome = Some(result.clone());
                            dispatcher.on_outcome(result);
                        }
                    }
                }
            }

            if machine.is_finished() {
                break;
            }

            let next = match &mut slot {
                ActiveTransport::Channel(handle) => tokio::select! {
                    biased;
                    _ = self.cancel.cancelled() => SyncInput::Cancel,
                    msg = handle.next_message() => SyncInput::Channel(msg.unwrap_or_else(|| {
                        ChannelMessage::TransportFailure {
                            detail: "channel closed".into(),
                        }
                    })),
                },
                ActiveTransport::Polling => tokio::select! {
                    biased;
                    _ = self.cancel.cancelled() => SyncInput::Cancel,
                    result = self.poll_after_interval() => SyncInput::Poll(result),
                },
                ActiveTransport::None => SyncInput::Channel(ChannelMessage::TransportFailure {
                    detail: "no active channel".into(),
                }),
            };
            inputs.push_back(next);
        }

        slot.close_channel();
        tracing::debug!(
            job_id = %self.job_id,
            state = machine.state().name(),
            "Tracking session finished",
        );
        outcome
    }

    /// Wait one interval, then issue exactly one poll.
    ///
    /// The next poll is only scheduled after this one's answer has been
    /// handled, so polls never overlap.
    async fn poll_after_interval(&self) -> PollResult {
        tokio::time::sleep(self.config.poll_interval).await;
        self.poller.poll(&self.job_id).await
    }
}

impl<C, P> SyncSession<C, P>
where
    C: ChannelTransport + 'static,
    P: PollTransport + 'static,
{
    /// Run the session on its own task.
    pub fn spawn<Pr>(self, presentation: Arc<Pr>) -> SessionHandle
    where
        Pr: Presentation + 'static,
    {
        let cancel = self.cancel.clone();
        let task = tokio::spawn(async move { self.run(presentation.as_ref()).await });
        SessionHandle { cancel, task }
    }
}

/// Handle to a session running on its own task.
pub struct SessionHandle {
    cancel: CancellationToken,
    task: JoinHandle<Option<TerminalOutcome>>,
}

impl SessionHandle {
    /// Request cancellation. Idempotent.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Wait for the session to end.
    pub async fn join(self) -> Result<Option<TerminalOutcome>, tokio::task::JoinError> {
        self.task.await
    }
}

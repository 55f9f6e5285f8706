//! Session-level tests against scripted transports.
//!
//! Time is paused, so poll intervals elapse instantly and the number
//! of poll attempts is fully deterministic.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use ideagen_core::outcome::{TerminalOutcome, TIMEOUT_MESSAGE};
use ideagen_core::progress::{JobState, ProgressSnapshot, StatusSnapshot};
use ideagen_core::types::JobId;
use ideagen_sync::channel::{ChannelHandle, ChannelTransport, TransportError};
use ideagen_sync::messages::ChannelMessage;
use ideagen_sync::poll::{PollFailure, PollResult, PollTransport};
use ideagen_sync::{Presentation, SyncConfig, SyncSession};

// ---------------------------------------------------------------------------
// Test doubles
// ---------------------------------------------------------------------------

type Log = Arc<Mutex<Vec<String>>>;

fn entries(log: &Log) -> Vec<String> {
    log.lock().unwrap().clone()
}

/// Channel that replays a fixed script, then stays silent forever.
struct ScriptedChannel {
    script: Mutex<Option<VecDeque<ChannelMessage>>>,
    fail_open: bool,
    log: Log,
}

impl ScriptedChannel {
    fn new(script: Vec<ChannelMessage>, log: &Log) -> Self {
        Self {
            script: Mutex::new(Some(script.into())),
            fail_open: false,
            log: Arc::clone(log),
        }
    }

    fn unreachable(log: &Log) -> Self {
        Self {
            script: Mutex::new(None),
            fail_open: true,
            log: Arc::clone(log),
        }
    }
}

#[async_trait]
impl ChannelTransport for ScriptedChannel {
    async fn open(&self, _job_id: &JobId) -> Result<Box<dyn ChannelHandle>, TransportError> {
        self.log.lock().unwrap().push("open".into());
        if self.fail_open {
            return Err(TransportError::Open("connection refused".into()));
        }
        let messages = self.script.lock().unwrap().take().unwrap_or_default();
        Ok(Box::new(ScriptedHandle {
            messages,
            closed: false,
            log: Arc::clone(&self.log),
        }))
    }
}

struct ScriptedHandle {
    messages: VecDeque<ChannelMessage>,
    closed: bool,
    log: Log,
}

#[async_trait]
impl ChannelHandle for ScriptedHandle {
    async fn next_message(&mut self) -> Option<ChannelMessage> {
        if self.closed {
            return None;
        }
        match self.messages.pop_front() {
            Some(msg) => Some(msg),
            None => futures::future::pending().await,
        }
    }

    fn close(&mut self) {
        if !self.closed {
            self.closed = true;
            self.log.lock().unwrap().push("close".into());
        }
    }
}

/// Poller that answers from a queue, then repeats `fallback` forever.
struct ScriptedPoller {
    responses: Mutex<VecDeque<PollResult>>,
    fallback: PollResult,
    calls: Arc<AtomicU32>,
    in_flight: AtomicU32,
    max_in_flight: Arc<AtomicU32>,
    latency: Duration,
}

impl ScriptedPoller {
    fn new(responses: Vec<PollResult>, fallback: PollResult) -> Self {
        Self {
            responses: Mutex::new(responses.into()),
            fallback,
            calls: Arc::new(AtomicU32::new(0)),
            in_flight: AtomicU32::new(0),
            max_in_flight: Arc::new(AtomicU32::new(0)),
            latency: Duration::ZERO,
        }
    }

    fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }
}

#[async_trait]
impl PollTransport for ScriptedPoller {
    async fn poll(&self, _job_id: &JobId) -> PollResult {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);

        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }

        let next = self.responses.lock().unwrap().pop_front();
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        next.unwrap_or_else(|| self.fallback.clone())
    }
}

struct Recorder {
    log: Log,
    last_percent: Mutex<Option<u8>>,
}

impl Recorder {
    fn new(log: &Log) -> Self {
        Self {
            log: Arc::clone(log),
            last_percent: Mutex::new(None),
        }
    }
}

impl Presentation for Recorder {
    fn show_progress(&self, snapshot: &ProgressSnapshot) {
        *self.last_percent.lock().unwrap() = Some(snapshot.percent_complete);
        self.log
            .lock()
            .unwrap()
            .push(format!("progress {}", snapshot.percent_complete));
    }

    fn navigate_to_results(&self, job_id: &JobId) {
        self.log.lock().unwrap().push(format!("navigate {job_id}"));
    }

    fn show_error(&self, message: &str) {
        self.log.lock().unwrap().push(format!("error {message}"));
    }

    fn show_timeout(&self, message: &str) {
        self.log.lock().unwrap().push(format!("timeout {message}"));
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn job() -> JobId {
    JobId::new("run-42").unwrap()
}

fn config(cap: u32) -> SyncConfig {
    SyncConfig {
        max_poll_attempts: cap,
        ..Default::default()
    }
}

fn progress(percent: f64) -> ChannelMessage {
    ChannelMessage::Progress(ProgressSnapshot::new("Stage", percent))
}

fn status(state: JobState, percent: f64) -> PollResult {
    Ok(StatusSnapshot {
        progress: ProgressSnapshot::new("Stage", percent),
        state,
        reason: None,
    })
}

fn transport_failure() -> ChannelMessage {
    ChannelMessage::TransportFailure {
        detail: "connection reset".into(),
    }
}

// ---------------------------------------------------------------------------
// Streaming
// ---------------------------------------------------------------------------

#[tokio::test(start_paused = true)]
async fn complete_closes_channel_before_navigating() {
    let log = Log::default();
    let channel = ScriptedChannel::new(
        vec![
            progress(20.0),
            progress(60.0),
            ChannelMessage::Complete(serde_json::json!({"run_id": "run-42"})),
        ],
        &log,
    );
    let poller = ScriptedPoller::new(vec![], status(JobState::Running, 0.0));
    let calls = Arc::clone(&poller.calls);

    let outcome = SyncSession::new(job(), config(120), channel, poller)
        .run(&Recorder::new(&log))
        .await;

    assert_eq!(outcome, Some(TerminalOutcome::Succeeded));
    assert_eq!(
        entries(&log),
        vec!["open", "progress 20", "progress 60", "close", "navigate run-42"]
    );
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[tokio::test(start_paused = true)]
async fn displayed_progress_is_always_the_latest_received() {
    let log = Log::default();
    let channel = ScriptedChannel::new(
        vec![
            progress(80.0),
            progress(40.0),
            progress(10.0),
            ChannelMessage::ExplicitError {
                reason: Some("Analyzer crashed".into()),
            },
        ],
        &log,
    );
    let poller = ScriptedPoller::new(vec![], status(JobState::Running, 0.0));
    let recorder = Recorder::new(&log);

    let outcome = SyncSession::new(job(), config(120), channel, poller)
        .run(&recorder)
        .await;

    assert_eq!(*recorder.last_percent.lock().unwrap(), Some(10));
    assert_eq!(
        outcome,
        Some(TerminalOutcome::Failed {
            reason: "Analyzer crashed".into()
        })
    );
    assert_eq!(entries(&log).last().unwrap(), "error Analyzer crashed");
}

// ---------------------------------------------------------------------------
// Fallback to polling
// ---------------------------------------------------------------------------

#[tokio::test(start_paused = true)]
async fn transport_failure_falls_back_to_polling() {
    let log = Log::default();
    let channel = ScriptedChannel::new(vec![progress(20.0), transport_failure()], &log);
    let poller = ScriptedPoller::new(
        vec![
            status(JobState::Running, 40.0),
            Err(PollFailure {
                reason: "502 Bad Gateway".into(),
            }),
            status(JobState::Completed, 100.0),
        ],
        status(JobState::Running, 0.0),
    );
    let calls = Arc::clone(&poller.calls);

    let outcome = SyncSession::new(job(), config(120), channel, poller)
        .run(&Recorder::new(&log))
        .await;

    assert_eq!(outcome, Some(TerminalOutcome::Succeeded));
    assert_eq!(calls.load(Ordering::SeqCst), 3);
    assert_eq!(
        entries(&log),
        vec![
            "open",
            "progress 20",
            "close",
            "progress 40",
            "progress 100",
            "navigate run-42"
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn unreachable_channel_falls_back_to_polling() {
    let log = Log::default();
    let channel = ScriptedChannel::unreachable(&log);
    let poller = ScriptedPoller::new(
        vec![Ok(StatusSnapshot {
            progress: ProgressSnapshot::new("Pain analysis", 40.0),
            state: JobState::Failed,
            reason: Some("Search provider quota exceeded".into()),
        })],
        status(JobState::Running, 0.0),
    );

    let outcome = SyncSession::new(job(), config(120), channel, poller)
        .run(&Recorder::new(&log))
        .await;

    assert_eq!(
        outcome,
        Some(TerminalOutcome::Failed {
            reason: "Search provider quota exceeded".into()
        })
    );
    assert_eq!(entries(&log)[0], "open");
}

#[tokio::test(start_paused = true)]
async fn malformed_error_event_is_confirmed_by_polling() {
    let log = Log::default();
    let channel = ScriptedChannel::new(
        vec![ChannelMessage::Malformed {
            event: "error".into(),
            detail: "expected value at line 1 column 1".into(),
        }],
        &log,
    );
    let poller = ScriptedPoller::new(
        vec![status(JobState::Completed, 100.0)],
        status(JobState::Running, 0.0),
    );

    let outcome = SyncSession::new(job(), config(120), channel, poller)
        .run(&Recorder::new(&log))
        .await;

    assert_eq!(outcome, Some(TerminalOutcome::Succeeded));
    assert!(entries(&log).contains(&"close".to_string()));
}

#[tokio::test(start_paused = true)]
async fn completion_on_tick_120_is_success_not_timeout() {
    let log = Log::default();
    let channel = ScriptedChannel::new(vec![transport_failure()], &log);
    let mut responses: Vec<PollResult> = (0..119).map(|_| status(JobState::Running, 50.0)).collect();
    responses.push(status(JobState::Completed, 100.0));
    let poller = ScriptedPoller::new(responses, status(JobState::Running, 0.0));
    let calls = Arc::clone(&poller.calls);

    let outcome = SyncSession::new(job(), config(120), channel, poller)
        .run(&Recorder::new(&log))
        .await;

    assert_eq!(outcome, Some(TerminalOutcome::Succeeded));
    assert_eq!(calls.load(Ordering::SeqCst), 120);
}

#[tokio::test(start_paused = true)]
async fn cap_exhaustion_times_out_once_and_stops_polling() {
    let log = Log::default();
    let channel = ScriptedChannel::new(vec![transport_failure()], &log);
    let poller = ScriptedPoller::new(vec![], status(JobState::Running, 50.0));
    let calls = Arc::clone(&poller.calls);

    let started = tokio::time::Instant::now();
    let outcome = SyncSession::new(job(), config(120), channel, poller)
        .run(&Recorder::new(&log))
        .await;

    assert_eq!(outcome, Some(TerminalOutcome::TimedOut));
    assert_eq!(calls.load(Ordering::SeqCst), 120);
    assert!(started.elapsed() >= Duration::from_secs(5 * 120));

    tokio::time::sleep(Duration::from_secs(60)).await;
    assert_eq!(calls.load(Ordering::SeqCst), 120);

    let timeouts: Vec<_> = entries(&log)
        .into_iter()
        .filter(|e| e.starts_with("timeout"))
        .collect();
    assert_eq!(timeouts, vec![format!("timeout {TIMEOUT_MESSAGE}")]);
}

#[tokio::test(start_paused = true)]
async fn polls_never_overlap() {
    let log = Log::default();
    let channel = ScriptedChannel::new(vec![transport_failure()], &log);
    let poller = ScriptedPoller::new(vec![], status(JobState::Running, 50.0))
        .with_latency(Duration::from_secs(30));
    let max_in_flight = Arc::clone(&poller.max_in_flight);
    let calls = Arc::clone(&poller.calls);

    let outcome = SyncSession::new(job(), config(5), channel, poller)
        .run(&Recorder::new(&log))
        .await;

    assert_eq!(outcome, Some(TerminalOutcome::TimedOut));
    assert_eq!(calls.load(Ordering::SeqCst), 5);
    assert_eq!(max_in_flight.load(Ordering::SeqCst), 1);
}

// ---------------------------------------------------------------------------
// Cancellation
// ---------------------------------------------------------------------------

#[tokio::test(start_paused = true)]
async fn cancel_while_streaming_closes_channel_without_outcome() {
    let log = Log::default();
    let channel = ScriptedChannel::new(vec![progress(30.0)], &log);
    let poller = ScriptedPoller::new(vec![], status(JobState::Running, 0.0));
    let calls = Arc::clone(&poller.calls);

    let handle = SyncSession::new(job(), config(120), channel, poller)
        .spawn(Arc::new(Recorder::new(&log)));
    tokio::time::sleep(Duration::from_secs(1)).await;
    handle.cancel();
    handle.cancel();

    assert_eq!(handle.join().await.unwrap(), None);
    assert_eq!(entries(&log), vec!["open", "progress 30", "close"]);
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[tokio::test(start_paused = true)]
async fn cancel_while_polling_schedules_nothing_further() {
    let log = Log::default();
    let channel = ScriptedChannel::new(vec![transport_failure()], &log);
    let poller = ScriptedPoller::new(vec![], status(JobState::Running, 50.0));
    let calls = Arc::clone(&poller.calls);

    let handle = SyncSession::new(job(), config(120), channel, poller)
        .spawn(Arc::new(Recorder::new(&log)));
    tokio::time::sleep(Duration::from_millis(12_500)).await;
    handle.cancel();
    assert_eq!(handle.join().await.unwrap(), None);

    let polled = calls.load(Ordering::SeqCst);
    assert_eq!(polled, 2);
    tokio::time::sleep(Duration::from_secs(60)).await;
    assert_eq!(calls.load(Ordering::SeqCst), polled);

    let log = entries(&log);
    assert!(!log.iter().any(|e| e.starts_with("navigate")
        || e.starts_with("error")
        || e.starts_with("timeout")));
}

#[tokio::test(start_paused = true)]
async fn external_token_cancels_before_start() {
    let log = Log::default();
    let channel = ScriptedChannel::new(vec![], &log);
    let poller = ScriptedPoller::new(vec![], status(JobState::Running, 0.0));
    let token = tokio_util::sync::CancellationToken::new();
    token.cancel();

    let outcome = SyncSession::new(job(), config(120), channel, poller)
        .with_cancellation(token)
        .run(&Recorder::new(&log))
        .await;

    assert_eq!(outcome, None);
    assert!(!entries(&log).iter().any(|e| e.starts_with("navigate")));
}

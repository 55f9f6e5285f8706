//! Terminal implementation of the presentation layer.

use std::io::Write;
use std::sync::Mutex;

use ideagen_core::progress::ProgressSnapshot;
use ideagen_core::types::JobId;
use ideagen_sync::Presentation;

/// Writes progress and outcome messages to a terminal stream.
///
/// "Navigating" to the results only records the target; the launcher
/// fetches and prints the idea list once the session has ended.
pub struct TerminalPresenter<W> {
    out: Mutex<W>,
    shown: Mutex<Shown>,
    navigation: Mutex<Option<JobId>>,
}

/// What the progress line currently says.
#[derive(Default)]
struct Shown {
    stage: String,
    line: Option<String>,
}

impl<W: Write + Send> TerminalPresenter<W> {
    pub fn new(out: W) -> Self {
        Self {
            out: Mutex::new(out),
            shown: Mutex::new(Shown::default()),
            navigation: Mutex::new(None),
        }
    }

    /// The run whose results should be shown, if the session succeeded.
    pub fn navigation_target(&self) -> Option<JobId> {
        self.navigation.lock().ok().and_then(|n| n.clone())
    }

    fn write_line(&self, line: &str) {
        if let Ok(mut out) = self.out.lock() {
            let _ = writeln!(out, "{line}");
            let _ = out.flush();
        }
    }
}

/// One progress line, e.g. `[ 60%] Idea generation`.
pub fn progress_line(stage: &str, percent: u8) -> String {
    let stage = if stage.is_empty() { "Working" } else { stage };
    format!("[{percent:>3}%] {stage}")
}

impl<W: Write + Send> Presentation for TerminalPresenter<W> {
    fn show_progress(&self, snapshot: &ProgressSnapshot) {
        let Ok(mut shown) = self.shown.lock() else {
            return;
        };

        // A snapshot without a stage keeps the last one on screen.
        if !snapshot.stage_label.is_empty() {
            shown.stage = snapshot.stage_label.clone();
        }
        let line = progress_line(&shown.stage, snapshot.percent_complete);

        // Polling repeats the same snapshot every few seconds.
        if shown.line.as_deref() == Some(line.as_str()) {
            return;
        }
        shown.line = Some(line.clone());
        drop(shown);
        self.write_line(&line);
    }

    fn navigate_to_results(&self, job_id: &JobId) {
        if let Ok(mut nav) = self.navigation.lock() {
            *nav = Some(job_id.clone());
        }
        self.write_line(&format!("Run {job_id} completed."));
    }

    fn show_error(&self, message: &str) {
        self.write_line(&format!("Run failed: {message}"));
    }

    fn show_timeout(&self, message: &str) {
        self.write_line(&format!("{message}. The run may still finish; try `ideagen track` later."));
    }
}

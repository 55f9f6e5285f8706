//! Typed messages carried by the progress push channel.
//!
//! The backend emits server-sent events named `progress`, `complete`
//! and `error`, each with a run status payload as `data`. This module
//! turns decoded [`SseFrame`]s into [`ChannelMessage`]s.

use ideagen_core::job_events::{EVENT_COMPLETE, EVENT_ERROR, EVENT_PROGRESS};
use ideagen_core::progress::ProgressSnapshot;
use ideagen_core::run::RunStatus;

use crate::sse::SseFrame;

/// Everything the channel transport can deliver to the synchronizer.
#[derive(Debug, Clone, PartialEq)]
pub enum ChannelMessage {
    /// Intermediate progress.
    Progress(ProgressSnapshot),

    /// The run completed. Carries the payload as a result reference.
    Complete(serde_json::Value),

    /// The backend reported a failure. `reason` is `None` when the
    /// payload had no usable message.
    ExplicitError { reason: Option<String> },

    /// A terminal event whose payload could not be decoded.
    Malformed { event: String, detail: String },

    /// The connection was lost or could not be used.
    TransportFailure { detail: String },
}

/// Why a frame could not be turned into a message.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    #[error("`{event}` payload is not valid JSON: {source}")]
    Json {
        event: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("`{event}` payload is not a JSON object")]
    NotAnObject { event: String },
}

/// Parse a decoded frame.
///
/// Returns `Ok(None)` for events this client does not track. Callers
/// decide how to treat an `Err`: a broken progress frame can be
/// skipped, a broken terminal frame must not be.
pub fn parse_frame(frame: &SseFrame) -> Result<Option<ChannelMessage>, FrameError> {
    match frame.event.as_str() {
        EVENT_PROGRESS => {
            let value = parse_object(frame)?;
            let status: RunStatus =
                serde_json::from_value(value.clone()).map_err(|source| FrameError::Json {
                    event: frame.event.clone(),
                    source,
                })?;
            Ok(Some(ChannelMessage::Progress(
                status.progress().with_raw(value),
            )))
        }
        EVENT_COMPLETE => {
            let value = parse_object(frame)?;
            Ok(Some(ChannelMessage::Complete(value)))
        }
        EVENT_ERROR => {
            let value = parse_object(frame)?;
            let reason = value
                .get("error_message")
                .and_then(|v| v.as_str())
                .map(str::to_string);
            Ok(Some(ChannelMessage::ExplicitError { reason }))
        }
        _ => Ok(None),
    }
}

fn parse_object(frame: &SseFrame) -> Result<serde_json::Value, FrameError> {
    let value: serde_json::Value =
        serde_json::from_str(&frame.data).map_err(|source| FrameError::Json {
            event: frame.event.clone(),
            source,
        })?;
    if !value.is_object() {
        return Err(FrameError::NotAnObject {
            event: frame.event.clone(),
        });
    }
    Ok(value)
}

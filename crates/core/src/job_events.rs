//! Event names used on the run progress push channel.
//!
//! The backend streams `text/event-stream` frames whose `event:` field
//! is one of these constants and whose `data:` field is a run status
//! payload.

/// Intermediate progress update (stage label + percentage).
pub const EVENT_PROGRESS: &str = "progress";

/// The run finished and its results can be fetched.
pub const EVENT_COMPLETE: &str = "complete";

/// The backend reports that the run failed.
pub const EVENT_ERROR: &str = "error";

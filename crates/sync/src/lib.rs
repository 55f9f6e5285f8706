//! Job-progress synchronization client for the ideagen backend.
//!
//! Tracks a long-running backend run to exactly one terminal outcome.
//! The push channel (server-sent events) is preferred; when it fails
//! or delivers an ambiguous terminal payload the session falls back to
//! polling the status endpoint until the run finishes or the attempt
//! cap is reached.
//!
//! - [`api`]: REST wrapper for the backend job service.
//! - [`sse`] / [`messages`]: event-stream decoding and typed frames.
//! - [`channel`] / [`poll`]: the two transports behind async traits.
//! - [`machine`]: the pure transition table.
//! - [`session`]: the async driver that owns the active transport.
//! - [`dispatcher`]: turns the terminal outcome into UI actions.

pub mod api;
pub mod channel;
pub mod config;
pub mod dispatcher;
pub mod machine;
pub mod messages;
pub mod poll;
pub mod session;
pub mod sse;

pub use config::SyncConfig;
pub use dispatcher::{OutcomeDispatcher, Presentation};
pub use session::{SessionHandle, SyncSession};

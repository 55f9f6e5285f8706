//! Shared domain types for the ideagen job-tracking client.
//!
//! Everything here is transport-agnostic: identifiers, progress
//! snapshots, terminal outcomes and the result DTOs returned by the
//! backend once a run has finished.

pub mod error;
pub mod idea;
pub mod job_events;
pub mod outcome;
pub mod progress;
pub mod run;
pub mod types;

//! Ferry - Protocol
//!
//! Core data model shared by every ferry crate: jobs, job statuses and the
//! per-job state machine.
//!
//! # Overview
//!
//! A [`Job`] is an immutable unit of work created by the ingest side. The
//! router never mutates a job; all progress is recorded by appending
//! [`JobStatus`] rows. The highest status row per job id is the job's
//! current state.
//!
//! # State machine
//!
//! ```text
//! NotPicked → Executing → { Succeeded | Failed | Aborted | Waiting | Throttled }
//! ```
//!
//! `Failed`, `Waiting` and `Throttled` re-enter the pickup pool.
//! `Succeeded` and `Aborted` are terminal.

mod error;
mod job;
mod status;

pub use error::ProtocolError;
pub use job::{Job, JobId, JobParameters};
pub use status::{JobState, JobStatus, FIRST_ATTEMPTED_AT_KEY};

/// Result type for protocol operations
pub type Result<T> = std::result::Result<T, ProtocolError>;

//! Protocol error types

use thiserror::Error;

/// Errors from parsing or validating protocol types
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// Job parameters are not valid JSON or miss required fields
    #[error("invalid job parameters: {0}")]
    InvalidParameters(#[from] serde_json::Error),

    /// Unknown job state string
    #[error("unknown job state: {0}")]
    UnknownState(String),

    /// A status row that would move a job out of a terminal state
    #[error("illegal transition from terminal state {from} for job {job_id}")]
    TerminalTransition { job_id: i64, from: &'static str },
}

//! Store error types

use thiserror::Error;

/// Errors from job store operations
#[derive(Debug, Error)]
pub enum StoreError {
    /// Underlying store rejected the query or command
    #[error("store query failed: {0}")]
    Query(String),

    /// Transaction could not be committed
    #[error("store transaction failed: {0}")]
    Tx(String),

    /// A status row violated the state machine
    #[error(transparent)]
    Protocol(#[from] ferry_protocol::ProtocolError),

    /// The call did not finish within its timeout
    #[error("store call timed out after {0:?}")]
    Timeout(std::time::Duration),

    /// All retry attempts exhausted
    #[error("store call failed after {attempts} attempts: {last_error}")]
    RetriesExhausted { attempts: u32, last_error: String },
}

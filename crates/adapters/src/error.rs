//! Adapter error types
//!
//! Delivery outcomes travel as [`DeliveryResponse`](crate::DeliveryResponse)
//! status codes; this error type covers construction and object-store
//! failures, where a structured error is more useful than a code.

use thiserror::Error;

/// Errors from adapter construction and object-store operations
#[derive(Debug, Error)]
pub enum AdapterError {
    /// Invalid adapter configuration, raised at construction
    #[error("invalid adapter configuration: {0}")]
    Config(String),

    /// No factory registered for a destination definition name
    #[error("unknown destination definition: {0}")]
    UnknownDefinition(String),

    /// Transport failure talking to the destination
    #[error("transport error: {0}")]
    Transport(String),

    /// The operation did not finish within its timeout
    #[error("operation timed out")]
    Timeout,

    /// I/O failure on a local object store
    #[error("object store I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl AdapterError {
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    pub fn transport(msg: impl Into<String>) -> Self {
        Self::Transport(msg.into())
    }
}

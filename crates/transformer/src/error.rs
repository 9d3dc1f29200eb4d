//! Transformer client error types

use thiserror::Error;

/// Errors from transformer calls
///
/// `is_transient` separates transport problems (worth retrying) from
/// semantic ones (the batch fails).
#[derive(Debug, Error)]
pub enum TransformerError {
    /// Could not reach the transformer
    #[error("transformer transport error: {0}")]
    Transport(String),

    /// The call did not finish within its timeout
    #[error("transformer call timed out")]
    Timeout,

    /// Transformer answered with a non-2xx status
    #[error("transformer returned status {status}: {body}")]
    Status { status: u16, body: String },

    /// Response body did not parse as a destination-job array
    #[error("invalid transformer output: {0}")]
    InvalidOutput(String),

    /// Batched output does not cover the inputs one-for-one
    #[error("batched output references {output} jobs for {input} inputs")]
    BatchCountMismatch { input: usize, output: usize },

    /// All transport retries exhausted
    #[error("transformer unreachable after {attempts} attempts: {last_error}")]
    RetriesExhausted { attempts: u32, last_error: String },
}

impl TransformerError {
    /// Whether retrying the same call could help
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            TransformerError::Transport(_)
                | TransformerError::Timeout
                | TransformerError::RetriesExhausted { .. }
        )
    }
}

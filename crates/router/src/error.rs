//! Router error types

use thiserror::Error;

/// Errors from router construction and lifecycle
#[derive(Debug, Error)]
pub enum RouterError {
    /// Adapter could not be built for the destination
    #[error(transparent)]
    Adapter(#[from] ferry_adapters::AdapterError),

    /// Transformer client could not be built
    #[error("transformer setup failed: {0}")]
    Transformer(#[from] ferry_transformer::TransformerError),

    /// Store failure outside the panicking status-writer path
    #[error(transparent)]
    Store(#[from] ferry_jobstore::StoreError),

    /// Destination configuration the router cannot serve
    #[error("unsupported destination: {0}")]
    UnsupportedDestination(String),
}

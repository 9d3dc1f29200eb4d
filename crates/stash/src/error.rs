//! Stash error types

use thiserror::Error;

/// Errors from stash operations
#[derive(Debug, Error)]
pub enum StashError {
    /// Archive could not be serialized or compressed
    #[error("archive build failed: {0}")]
    Archive(#[from] std::io::Error),

    /// Upload to the object store failed
    #[error(transparent)]
    Upload(#[from] ferry_adapters::AdapterError),

    /// Error store read or write failed
    #[error(transparent)]
    Store(#[from] ferry_jobstore::StoreError),
}

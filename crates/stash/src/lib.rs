//! Ferry - Error Stash
//!
//! Background drain for the error job store: jobs the router aborted are
//! serialized into gzipped archives and uploaded to object storage for
//! offline reprocessing, with their own bounded retry loop.
//!
//! # Flow
//!
//! 1. read failed error-jobs first, then unprocessed ones while the read
//!    budgets allow
//! 2. jobs from transient sources are aborted outright, never uploaded
//! 3. with backup disabled or unconfigured, everything drains to Aborted
//! 4. otherwise jobs are marked Executing and handed to upload workers
//! 5. upload success writes Succeeded; failure writes Failed with an
//!    attempt bump, or Aborted once attempts run out

mod archive;
mod error;
mod stash;

pub use archive::{build_archive, Archive};
pub use error::StashError;
pub use stash::ErrorStash;

/// Result type for stash operations
pub type Result<T> = std::result::Result<T, StashError>;

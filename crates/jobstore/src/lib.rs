//! Ferry - Job Store Interface
//!
//! The router's view of the durable job store. The store itself
//! (partitioned tables, backups, vacuuming) is an external component;
//! this crate defines the narrow trait the router consumes, the query
//! parameter/result types, bounded-retry call helpers, and an in-memory
//! implementation used by tests and the dev daemon.
//!
//! # Contract highlights
//!
//! - Queries return jobs in FIFO `JobId` order and honor both a row limit
//!   and a cumulative payload-size limit, reporting `limits_reached`.
//! - `update_job_status` appends rows transactionally; a job already in a
//!   terminal state rejects further rows.
//! - `delete_executing` removes `Executing` rows so crashed-over jobs
//!   revert to their prior state and become pickable again.

mod error;
mod memory;
mod query;
mod retry;
mod store;

pub use error::StoreError;
pub use memory::MemoryJobStore;
pub use query::{GetQueryParams, JobsResult, ParameterFilter};
pub use retry::{call_with_retries, RetrySettings};
pub use store::{JobStore, TxFn, UpdateSafeTx};

/// Result type for store operations
pub type Result<T> = std::result::Result<T, StoreError>;

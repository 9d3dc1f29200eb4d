//! The job store trait consumed by the router
//!
//! Implementations must be safe to call concurrently; the router issues
//! reads from the generator while the status writer commits updates.

use std::collections::HashMap;

use async_trait::async_trait;
use ferry_protocol::{Job, JobId, JobStatus};

use crate::query::{GetQueryParams, JobsResult};
use crate::Result;

/// Scoped view of an update-safe transaction
///
/// Statuses staged through the transaction are committed together when
/// the closure passed to [`JobStore::with_update_safe_tx`] returns `Ok`,
/// and discarded when it returns `Err`.
pub trait UpdateSafeTx: Send {
    /// Stage status rows; `custom_val_filters` narrows the status tables
    /// the store has to touch
    fn update_job_status(
        &mut self,
        statuses: Vec<JobStatus>,
        custom_val_filters: &[String],
    ) -> Result<()>;
}

/// Closure run inside an update-safe transaction
pub type TxFn<'a> = Box<dyn FnOnce(&mut dyn UpdateSafeTx) -> Result<()> + Send + 'a>;

/// Durable job store operations used by the router and the error stash
#[async_trait]
pub trait JobStore: Send + Sync {
    /// Pickup read honoring a per-workspace quota, FIFO by `JobId`
    ///
    /// Returns every non-terminal pickable job (not picked, failed past its
    /// retry time, waiting, throttled past its retry time) matching the
    /// filters, up to the quota, row and payload budgets. An empty quota
    /// map means "no per-workspace restriction" (cold-start pickup).
    async fn get_all_jobs(
        &self,
        workspace_quota: &HashMap<String, usize>,
        params: GetQueryParams,
    ) -> Result<JobsResult>;

    /// Jobs whose current state is `Failed` and whose retry time has passed
    async fn get_to_retry(&self, params: GetQueryParams) -> Result<JobsResult>;

    /// Jobs with no status rows yet
    async fn get_unprocessed(&self, params: GetQueryParams) -> Result<JobsResult>;

    /// Jobs whose current state is `Throttled` and whose retry time has passed
    async fn get_throttled(&self, params: GetQueryParams) -> Result<JobsResult>;

    /// Jobs whose current state is `Waiting`
    async fn get_waiting(&self, params: GetQueryParams) -> Result<JobsResult>;

    /// Append status rows in one transaction
    async fn update_job_status(
        &self,
        statuses: Vec<JobStatus>,
        custom_val_filters: &[String],
    ) -> Result<()>;

    /// Run `f` inside an update-safe transaction; staged writes commit
    /// atomically when `f` returns `Ok`
    async fn with_update_safe_tx(&self, f: TxFn<'_>) -> Result<()>;

    /// Crash recovery: drop `Executing` rows so in-flight jobs revert to
    /// their prior state
    async fn delete_executing(&self) -> Result<()>;

    /// Append new jobs (error-stash drain path)
    async fn store(&self, jobs: Vec<Job>) -> Result<()>;

    /// Append jobs one by one, returning per-job error messages for the
    /// ones that failed
    async fn store_with_retry_each(&self, jobs: Vec<Job>) -> HashMap<JobId, String>;
}

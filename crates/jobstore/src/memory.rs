//! In-memory job store
//!
//! Backs tests and the dev daemon. Implements the full [`JobStore`]
//! contract, including per-workspace quotas, payload budgets,
//! `limits_reached` reporting and the crash-recovery sweep, over a pair
//! of id-ordered maps.

use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;

use ferry_protocol::{Job, JobId, JobState, JobStatus};

use crate::query::{GetQueryParams, JobsResult, ParameterFilter};
use crate::store::{JobStore, TxFn, UpdateSafeTx};
use crate::Result;

#[derive(Default)]
struct Inner {
    jobs: BTreeMap<JobId, Job>,
    statuses: BTreeMap<JobId, Vec<JobStatus>>,
    next_id: i64,
}

impl Inner {
    fn current_status(&self, job: &Job) -> JobStatus {
        self.statuses
            .get(&job.id)
            .and_then(|rows| rows.last())
            .cloned()
            .unwrap_or_else(|| JobStatus::initial(job.id, job.workspace_id.clone()))
    }

    fn append_status(&mut self, status: JobStatus) -> Result<()> {
        let rows = self.statuses.entry(status.job_id).or_default();
        if let Some(last) = rows.last() {
            last.check_transition(&status)?;
        }
        rows.push(status);
        Ok(())
    }

    fn collect(
        &self,
        params: &GetQueryParams,
        mut quota: Option<HashMap<String, usize>>,
        accept: impl Fn(&JobStatus) -> bool,
    ) -> JobsResult {
        let mut result = JobsResult::default();

        for job in self.jobs.values() {
            if !params.custom_val_filters.is_empty()
                && !params.custom_val_filters.contains(&job.custom_val)
            {
                continue;
            }
            if !matches_parameters(job, &params.parameter_filters) {
                continue;
            }

            let current = self.current_status(job);
            if !accept(&current) {
                continue;
            }

            if let Some(quota) = quota.as_mut() {
                match quota.get_mut(&job.workspace_id) {
                    Some(remaining) if *remaining > 0 => *remaining -= 1,
                    _ => continue,
                }
            }

            if params.jobs_limit > 0 && result.jobs.len() >= params.jobs_limit {
                result.limits_reached = true;
                break;
            }
            let size = job.payload_size() as i64;
            if params.payload_size_limit > 0
                && result.payload_size + size > params.payload_size_limit
            {
                result.limits_reached = true;
                break;
            }

            let mut picked = job.clone();
            picked.last_status = current;
            result.payload_size += size;
            result.jobs.push(picked);
        }

        result
    }
}

fn matches_parameters(job: &Job, filters: &[ParameterFilter]) -> bool {
    filters.iter().all(|f| match f.name.as_str() {
        "destination_id" => job.parameters.destination_id == f.value,
        "source_id" => job.parameters.source_id == f.value,
        _ => false,
    })
}

fn pickable(status: &JobStatus) -> bool {
    let now = Utc::now();
    match status.state {
        JobState::NotPicked | JobState::Waiting => true,
        JobState::Failed | JobState::Throttled => status.retry_time <= now,
        _ => false,
    }
}

/// In-memory [`JobStore`] implementation
#[derive(Default)]
pub struct MemoryJobStore {
    inner: Mutex<Inner>,
}

impl MemoryJobStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert jobs directly, assigning ids to jobs whose id is 0
    ///
    /// A job carrying a non-initial `last_status` gets that row recorded,
    /// so re-seeded retry state is visible to queries.
    pub fn seed(&self, jobs: impl IntoIterator<Item = Job>) {
        let mut inner = self.inner.lock();
        for mut job in jobs {
            if job.id.as_i64() == 0 {
                inner.next_id += 1;
                job.id = JobId(inner.next_id);
            } else {
                inner.next_id = inner.next_id.max(job.id.as_i64());
            }
            if job.last_status.state != JobState::NotPicked {
                let mut status = job.last_status.clone();
                status.job_id = job.id;
                inner.statuses.entry(job.id).or_default().push(status);
            }
            inner.jobs.insert(job.id, job);
        }
    }

    /// All status rows recorded for a job, oldest first
    pub fn status_history(&self, job_id: JobId) -> Vec<JobStatus> {
        self.inner.lock().statuses.get(&job_id).cloned().unwrap_or_default()
    }

    /// The job's current state
    pub fn current_state(&self, job_id: JobId) -> JobState {
        let inner = self.inner.lock();
        inner
            .statuses
            .get(&job_id)
            .and_then(|rows| rows.last())
            .map(|s| s.state)
            .unwrap_or(JobState::NotPicked)
    }

    /// Number of stored jobs
    pub fn job_count(&self) -> usize {
        self.inner.lock().jobs.len()
    }

    /// Stored jobs in id order (test helper)
    pub fn all_jobs(&self) -> Vec<Job> {
        self.inner.lock().jobs.values().cloned().collect()
    }
}

struct MemTx {
    staged: Vec<JobStatus>,
}

impl UpdateSafeTx for MemTx {
    fn update_job_status(
        &mut self,
        statuses: Vec<JobStatus>,
        _custom_val_filters: &[String],
    ) -> Result<()> {
        self.staged.extend(statuses);
        Ok(())
    }
}

#[async_trait]
impl JobStore for MemoryJobStore {
    async fn get_all_jobs(
        &self,
        workspace_quota: &HashMap<String, usize>,
        params: GetQueryParams,
    ) -> Result<JobsResult> {
        // an empty quota map means "no per-workspace restriction"
        let quota = (!workspace_quota.is_empty()).then(|| workspace_quota.clone());
        let inner = self.inner.lock();
        Ok(inner.collect(&params, quota, pickable))
    }

    async fn get_to_retry(&self, params: GetQueryParams) -> Result<JobsResult> {
        let inner = self.inner.lock();
        Ok(inner.collect(&params, None, |s| {
            s.state == JobState::Failed && s.retry_time <= Utc::now()
        }))
    }

    async fn get_unprocessed(&self, params: GetQueryParams) -> Result<JobsResult> {
        let inner = self.inner.lock();
        Ok(inner.collect(&params, None, |s| s.state == JobState::NotPicked))
    }

    async fn get_throttled(&self, params: GetQueryParams) -> Result<JobsResult> {
        let inner = self.inner.lock();
        Ok(inner.collect(&params, None, |s| {
            s.state == JobState::Throttled && s.retry_time <= Utc::now()
        }))
    }

    async fn get_waiting(&self, params: GetQueryParams) -> Result<JobsResult> {
        let inner = self.inner.lock();
        Ok(inner.collect(&params, None, |s| s.state == JobState::Waiting))
    }

    async fn update_job_status(
        &self,
        statuses: Vec<JobStatus>,
        _custom_val_filters: &[String],
    ) -> Result<()> {
        let mut inner = self.inner.lock();
        for status in statuses {
            inner.append_status(status)?;
        }
        Ok(())
    }

    async fn with_update_safe_tx(&self, f: TxFn<'_>) -> Result<()> {
        let mut tx = MemTx { staged: Vec::new() };
        f(&mut tx)?;

        let mut inner = self.inner.lock();
        for status in tx.staged {
            inner.append_status(status)?;
        }
        Ok(())
    }

    async fn delete_executing(&self) -> Result<()> {
        let mut inner = self.inner.lock();
        for rows in inner.statuses.values_mut() {
            while rows.last().is_some_and(|s| s.state == JobState::Executing) {
                rows.pop();
            }
        }
        inner.statuses.retain(|_, rows| !rows.is_empty());
        Ok(())
    }

    async fn store(&self, jobs: Vec<Job>) -> Result<()> {
        self.seed(jobs);
        Ok(())
    }

    async fn store_with_retry_each(&self, jobs: Vec<Job>) -> HashMap<JobId, String> {
        // individual inserts cannot fail in memory; keep the error-map shape
        let failed = HashMap::new();
        self.seed(jobs);
        failed
    }
}

impl std::fmt::Debug for MemoryJobStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.inner.lock();
        f.debug_struct("MemoryJobStore")
            .field("jobs", &inner.jobs.len())
            .field("with_statuses", &inner.statuses.len())
            .finish()
    }
}

#[cfg(test)]
#[path = "memory_test.rs"]
mod memory_test;

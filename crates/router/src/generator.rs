//! Generator loop - pickup and fan-out
//!
//! One loop per destination router:
//!
//! 1. wait until the worker pool has enough free slots (or a tick fires)
//! 2. ask tenant stats for a per-workspace quota over those slots
//! 3. read jobs from the store under the quota and the payload budget
//! 4. mark them `Executing` in one command, attempt counters untouched
//! 5. push each job onto the worker owning its user; full channels block,
//!    which is the backpressure from workers to pickup
//!
//! An empty pickup sleeps `read_sleep` before the next cycle. A read that
//! hit its limits is not followed by a second read in the same cycle.

use std::collections::hash_map::DefaultHasher;
use std::collections::HashMap;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use chrono::Utc;
use ferry_jobstore::{call_with_retries, GetQueryParams, ParameterFilter, RetrySettings};
use ferry_protocol::{Job, JobState, JobStatus};
use ferry_tenants::QuotaParams;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::types::{RouterContext, RouterJob};

pub(crate) struct Generator {
    ctx: Arc<RouterContext>,
    workers: Vec<mpsc::Sender<RouterJob>>,
    retry_settings: RetrySettings,

    /// Round-robin cursor used when ordering is off or the user id is empty
    rr_cursor: usize,
}

impl Generator {
    pub(crate) fn new(ctx: Arc<RouterContext>, workers: Vec<mpsc::Sender<RouterJob>>) -> Self {
        let retry_settings = RetrySettings {
            call_timeout: std::time::Duration::from_secs(60),
            max_retries: 3,
            base_delay: std::time::Duration::from_millis(250),
        };
        Self {
            ctx,
            workers,
            retry_settings,
            rr_cursor: 0,
        }
    }

    pub(crate) async fn run(mut self, cancel: CancellationToken) {
        info!(
            dest_type = %self.ctx.dest_type,
            destination = %self.ctx.destination.id,
            workers = self.workers.len(),
            "generator starting"
        );

        loop {
            if cancel.is_cancelled() {
                break;
            }

            let picked = self.pickup_once().await;

            if picked == 0 {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = tokio::time::sleep(self.ctx.config.read_sleep()) => {}
                }
            }
        }

        info!(dest_type = %self.ctx.dest_type, "generator stopping");
        // dropping the worker senders closes the pool
    }

    /// One pickup cycle; returns the number of jobs handed to workers
    pub(crate) async fn pickup_once(&mut self) -> usize {
        let free_slots: usize = self.workers.iter().map(|tx| tx.capacity()).sum();
        if free_slots < self.ctx.config.pickup_flush_threshold {
            debug!(
                dest_type = %self.ctx.dest_type,
                free_slots,
                "worker pool busy, skipping pickup"
            );
            return 0;
        }

        let quota = self.ctx.tenants.router_pickup_quota(&QuotaParams {
            total_capacity: free_slots,
            time_window: self.ctx.config.read_sleep(),
            db_batch_size: self.ctx.config.db_read_batch_size,
            throttle_factor: self.ctx.config.throttle_factor,
            legacy: self.ctx.config.legacy_pickup,
        });

        let params = GetQueryParams {
            custom_val_filters: vec![self.ctx.dest_type.clone()],
            parameter_filters: vec![ParameterFilter::new(
                "destination_id",
                self.ctx.destination.id.clone(),
            )],
            jobs_limit: free_slots.min(self.ctx.config.db_read_batch_size),
            payload_size_limit: self.ctx.config.payload_limit_bytes,
        };

        let store = Arc::clone(&self.ctx.store);
        let quota_map = quota.per_workspace;
        let result = call_with_retries(self.retry_settings, "get_all_jobs", || {
            store.get_all_jobs(&quota_map, params.clone())
        })
        .await;

        let result = match result {
            Ok(result) => result,
            Err(e) => {
                error!(dest_type = %self.ctx.dest_type, error = %e, "pickup read failed");
                return 0;
            }
        };

        if result.jobs.is_empty() {
            self.ctx.metrics.record_pickup(0);
            return 0;
        }
        if result.limits_reached {
            debug!(
                dest_type = %self.ctx.dest_type,
                jobs = result.jobs.len(),
                payload_bytes = result.payload_size,
                "pickup cut short by limits"
            );
        }

        self.mark_executing(&result.jobs).await;

        let mut per_workspace: HashMap<&str, usize> = HashMap::new();
        for job in &result.jobs {
            *per_workspace.entry(job.workspace_id.as_str()).or_default() += 1;
        }
        for (workspace, count) in per_workspace {
            self.ctx.tenants.add_pending(workspace, count);
        }

        let count = result.jobs.len();
        self.ctx.metrics.record_pickup(count as u64);

        for job in result.jobs {
            let index = self.worker_index(&job);
            // blocking send: backpressure from a full worker queue
            if self.workers[index].send(RouterJob::new(job)).await.is_err() {
                error!(dest_type = %self.ctx.dest_type, worker = index, "worker channel closed");
            }
        }

        count
    }

    /// Write `Executing` rows for the picked jobs in one command
    ///
    /// Selection and the `Executing` mark travel together; a failure here
    /// after retries leaves job ownership unknown, so the process restarts
    /// into crash recovery.
    async fn mark_executing(&self, jobs: &[Job]) {
        let now = Utc::now();
        let statuses: Vec<JobStatus> = jobs
            .iter()
            .map(|job| {
                let mut status = JobStatus {
                    job_id: job.id,
                    attempt: job.attempt(),
                    state: JobState::Executing,
                    exec_time: now,
                    retry_time: now,
                    error_code: String::new(),
                    error_response: serde_json::json!({}),
                    parameters: serde_json::json!({}),
                    workspace_id: job.workspace_id.clone(),
                };
                if let Some(first) = job.last_status.first_attempted_at() {
                    status.set_first_attempted_at(first);
                }
                status
            })
            .collect();

        let store = Arc::clone(&self.ctx.store);
        let filters = vec![self.ctx.dest_type.clone()];
        let result = call_with_retries(self.retry_settings, "mark_executing", || {
            store.update_job_status(statuses.clone(), &filters)
        })
        .await;

        if let Err(e) = result {
            error!(dest_type = %self.ctx.dest_type, error = %e, "failed to mark jobs executing");
            panic!("failed to mark picked jobs executing: {e}");
        }
    }

    /// Deterministic user → worker partition; same user, same worker, for
    /// the router's whole lifetime
    fn worker_index(&mut self, job: &Job) -> usize {
        if self.ctx.ordered() && !job.user_id.is_empty() {
            let mut hasher = DefaultHasher::new();
            job.user_id.hash(&mut hasher);
            (hasher.finish() as usize) % self.workers.len()
        } else {
            self.rr_cursor = self.rr_cursor.wrapping_add(1);
            self.rr_cursor % self.workers.len()
        }
    }
}

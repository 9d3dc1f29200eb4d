//! Status writer - coalesced terminal status commits
//!
//! Fed by a channel from all workers. Coalesces entries up to
//! `max_status_update_wait` or `update_status_batch_size`, whichever comes
//! first, and commits them in one update-safe transaction. The reporting
//! record flushes with every successful commit.
//!
//! Commit failures are retried with backoff; on exhaustion the loop
//! panics. Crash recovery (`delete_executing` at startup) then reclaims
//! the jobs whose statuses never landed - the at-least-once half of the
//! delivery contract.
//!
//! Coalescing preserves per-job order: entries are committed in arrival
//! order, so the last status sent for a job is the last one written.

use std::sync::Arc;

use ferry_jobstore::{call_with_retries, RetrySettings};
use ferry_protocol::JobStatus;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tracing::{debug, info};

use crate::reporting::{bucket_statuses, Reporter};
use crate::types::{RouterContext, StatusEntry};

pub(crate) struct StatusWriter {
    ctx: Arc<RouterContext>,
    reporter: Arc<dyn Reporter>,
    rx: mpsc::Receiver<StatusEntry>,
    retry_settings: RetrySettings,
}

impl StatusWriter {
    pub(crate) fn new(
        ctx: Arc<RouterContext>,
        reporter: Arc<dyn Reporter>,
        rx: mpsc::Receiver<StatusEntry>,
    ) -> Self {
        let retry_settings = RetrySettings {
            call_timeout: std::time::Duration::from_secs(90),
            max_retries: 3,
            base_delay: std::time::Duration::from_millis(250),
        };
        Self {
            ctx,
            reporter,
            rx,
            retry_settings,
        }
    }

    /// Runs until every worker sender is dropped, then flushes and exits
    pub(crate) async fn run(mut self) {
        info!(dest_type = %self.ctx.dest_type, "status writer starting");

        loop {
            // block for the first entry of the next batch
            let first = match self.rx.recv().await {
                Some(entry) => entry,
                None => break,
            };

            let mut batch = vec![first];
            let deadline = Instant::now() + self.ctx.config.max_status_update_wait();
            let mut closed = false;

            while batch.len() < self.ctx.config.update_status_batch_size {
                tokio::select! {
                    _ = tokio::time::sleep_until(deadline) => break,
                    entry = self.rx.recv() => match entry {
                        Some(entry) => batch.push(entry),
                        None => {
                            closed = true;
                            break;
                        }
                    }
                }
            }

            self.commit(batch).await;

            if closed {
                break;
            }
        }

        info!(dest_type = %self.ctx.dest_type, "status writer stopping");
    }

    /// Commit one batch transactionally, then emit the reporting record
    async fn commit(&self, batch: Vec<StatusEntry>) {
        let statuses: Vec<JobStatus> = batch.iter().map(|e| e.status.clone()).collect();
        let report = bucket_statuses(&self.ctx.dest_type, &batch);
        let filters = vec![self.ctx.dest_type.clone()];
        let store = Arc::clone(&self.ctx.store);

        debug!(
            dest_type = %self.ctx.dest_type,
            statuses = statuses.len(),
            "committing status batch"
        );

        let result = call_with_retries(self.retry_settings, "update_status_tx", || {
            let statuses = statuses.clone();
            let filters = filters.clone();
            store.with_update_safe_tx(Box::new(move |tx| {
                tx.update_job_status(statuses, &filters)
            }))
        })
        .await;

        match result {
            Ok(()) => {
                self.ctx.metrics.record_statuses_written(statuses.len() as u64);
                self.reporter.report(report);
            }
            Err(e) => {
                // crash recovery resets the jobs these statuses belong to
                panic!("status write failed after retries: {e}");
            }
        }
    }
}

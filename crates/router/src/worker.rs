//! Worker - per-destination, per-slot execution unit
//!
//! Drains an ordered queue of jobs, assembles batches, applies the
//! optional remote transform, dispatches through the adapter and decides
//! every job's next state with the retry/abort policy.
//!
//! # Batching
//!
//! A batch closes when `batch_size` is reached or `batch_timeout` elapses
//! since its first job. If the batch has been open longer than
//! `router_timeout` at flush time it is failed outright, without dispatch,
//! so the generator retries it.
//!
//! # Per-user ordering
//!
//! Users are hash-partitioned onto workers, so one worker sees all jobs
//! of a user in store order. A job whose user still has an earlier
//! unfinished job is finalized `Waiting` with no attempt counted; the
//! blocking entry clears when the earlier job reaches a terminal state.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use ferry_adapters::DeliveryResponse;
use ferry_protocol::{JobId, JobState, JobStatus};
use ferry_transformer::{DestinationJob, TransformerJob};
use tokio::sync::mpsc;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, warn};

use crate::policy::Decision;
use crate::types::{DispatchMode, RouterContext, RouterJob, StatusEntry};

pub(crate) struct Worker {
    id: usize,
    ctx: Arc<RouterContext>,
    rx: mpsc::Receiver<RouterJob>,
    status_tx: mpsc::Sender<StatusEntry>,

    /// user → id of the earlier job blocking that user
    blocked_users: HashMap<String, JobId>,

    buffer: Vec<RouterJob>,
    buffer_opened_at: Option<Instant>,
}

impl Worker {
    pub(crate) fn new(
        id: usize,
        ctx: Arc<RouterContext>,
        rx: mpsc::Receiver<RouterJob>,
        status_tx: mpsc::Sender<StatusEntry>,
    ) -> Self {
        Self {
            id,
            ctx,
            rx,
            status_tx,
            blocked_users: HashMap::new(),
            buffer: Vec::new(),
            buffer_opened_at: None,
        }
    }

    pub(crate) async fn run(mut self, cancel: CancellationToken) {
        debug!(worker = self.id, dest_type = %self.ctx.dest_type, "worker starting");

        loop {
            let deadline = self
                .buffer_opened_at
                .map(|opened| opened + self.ctx.config.batch_timeout());

            tokio::select! {
                _ = cancel.cancelled() => {
                    // finish the batch in hand; queued jobs stay Executing
                    // and are reclaimed by the next crash-recovery sweep
                    self.flush().await;
                    break;
                }
                job = self.rx.recv() => match job {
                    Some(job) => {
                        if self.buffer.is_empty() {
                            self.buffer_opened_at = Some(Instant::now());
                        }
                        self.buffer.push(job);
                        if self.buffer.len() >= self.ctx.config.batch_size {
                            self.flush().await;
                        }
                    }
                    None => {
                        self.flush().await;
                        break;
                    }
                },
                _ = tokio::time::sleep_until(deadline.unwrap_or_else(Instant::now)),
                        if deadline.is_some() => {
                    self.flush().await;
                }
            }
        }

        debug!(worker = self.id, dest_type = %self.ctx.dest_type, "worker stopping");
    }

    async fn flush(&mut self) {
        if self.buffer.is_empty() {
            return;
        }
        let batch = std::mem::take(&mut self.buffer);
        let opened_at = self.buffer_opened_at.take();
        self.ctx.metrics.record_batch();

        // the batch waited too long: fail it without dispatch
        if let Some(opened_at) = opened_at {
            if opened_at.elapsed() > self.ctx.config.router_timeout() {
                warn!(
                    worker = self.id,
                    jobs = batch.len(),
                    "batch exceeded router timeout, failing without dispatch"
                );
                let now = Utc::now();
                for rj in batch {
                    let decision = self.ctx.policy.transform_failure(
                        504,
                        rj.job.attempt(),
                        rj.job.last_status.first_attempted_at(),
                        now,
                    );
                    self.finalize(rj, decision, None).await;
                }
                return;
            }
        }

        // expiry and per-user ordering before any network call
        let now = Utc::now();
        let mut eligible = Vec::with_capacity(batch.len());
        for rj in batch {
            if self.ctx.policy.is_expired(&rj.job, now) {
                self.ctx.metrics.record_expired();
                let decision = self.ctx.policy.expired(rj.job.attempt(), now);
                self.finalize(rj, decision, None).await;
            } else if self.user_blocked(&rj) {
                let decision = self.ctx.policy.blocked(rj.job.attempt(), now);
                self.finalize(rj, decision, None).await;
            } else {
                eligible.push(rj);
            }
        }
        if eligible.is_empty() {
            return;
        }

        match self.ctx.mode {
            DispatchMode::Raw => self.dispatch_raw(eligible).await,
            DispatchMode::RouterTransform | DispatchMode::Batch => {
                self.dispatch_transformed(eligible).await
            }
            DispatchMode::BatchUpload => self.dispatch_batch_upload(eligible).await,
        }
    }

    /// One adapter call per job, in store order
    async fn dispatch_raw(&mut self, jobs: Vec<RouterJob>) {
        let timeout = self.ctx.config.delivery_timeout();
        for rj in jobs {
            if self.user_blocked(&rj) {
                let decision = self.ctx.policy.blocked(rj.job.attempt(), Utc::now());
                self.finalize(rj, decision, None).await;
                continue;
            }
            let response = self.ctx.adapter.send(&rj.job.payload, timeout).await;
            self.apply_response(rj, &response).await;
        }
    }

    /// Remote transform, then one adapter call per output
    async fn dispatch_transformed(&mut self, jobs: Vec<RouterJob>) {
        let transformer = match &self.ctx.transformer {
            Some(t) => t,
            None => {
                // misconfiguration surfaces as a transform failure, not a hang
                error!(worker = self.id, "dispatch mode requires a transformer");
                self.fail_batch_as_transform_failure(jobs, 500).await;
                return;
            }
        };

        let inputs: Vec<TransformerJob> = jobs.iter().map(|rj| rj.transformer_job()).collect();
        let result = match self.ctx.mode {
            DispatchMode::RouterTransform => {
                transformer
                    .router_transform(&inputs, &self.ctx.destination_value)
                    .await
            }
            _ => {
                transformer
                    .batch_transform(&inputs, &self.ctx.destination_value)
                    .await
            }
        };

        let outputs = match result {
            Ok(outputs) => outputs,
            Err(e) => {
                warn!(worker = self.id, error = %e, "transformer call failed, failing batch");
                self.ctx.metrics.record_transform_failure();
                self.fail_batch_as_transform_failure(jobs, 500).await;
                return;
            }
        };

        let mut remaining: HashMap<i64, RouterJob> =
            jobs.into_iter().map(|rj| (rj.job.id.as_i64(), rj)).collect();
        let timeout = self.ctx.config.delivery_timeout();

        for output in outputs {
            let mut refs: Vec<RouterJob> = output
                .metadata
                .iter()
                .filter_map(|m| remaining.remove(&m.job_id))
                .collect();
            refs.sort_by_key(|rj| rj.job.id);
            if refs.is_empty() {
                continue;
            }

            if output.transform_succeeded() {
                let payload = output.payload_bytes();
                let response = self.ctx.adapter.send(&payload, timeout).await;
                for rj in refs {
                    self.apply_response_or_wait(rj, &response).await;
                }
            } else {
                self.ctx.metrics.record_transform_failure();
                self.fail_output_jobs(refs, &output).await;
            }
        }

        // inputs the transformer dropped were filtered on purpose
        let mut filtered: Vec<RouterJob> = remaining.into_values().collect();
        filtered.sort_by_key(|rj| rj.job.id);
        for rj in filtered {
            let response = DeliveryResponse::new(298, "filtered by transformer", "text/plain");
            self.apply_response_or_wait(rj, &response).await;
        }
    }

    /// Raw payloads accumulated into one object-store upload
    async fn dispatch_batch_upload(&mut self, jobs: Vec<RouterJob>) {
        let timeout = self.ctx.config.delivery_timeout();
        let payloads: Vec<&[u8]> = jobs.iter().map(|rj| rj.job.payload.as_ref()).collect();
        let response = self.ctx.adapter.send_batch(&payloads, timeout).await;
        for rj in jobs {
            self.apply_response_or_wait(rj, &response).await;
        }
    }

    /// The whole batch failed before dispatch (transformer down or broken)
    async fn fail_batch_as_transform_failure(&mut self, jobs: Vec<RouterJob>, status_code: u16) {
        let now = Utc::now();
        for rj in jobs {
            if self.user_blocked(&rj) {
                let decision = self.ctx.policy.blocked(rj.job.attempt(), now);
                self.finalize(rj, decision, None).await;
                continue;
            }
            let decision = self.ctx.policy.transform_failure(
                status_code,
                rj.job.attempt(),
                rj.job.last_status.first_attempted_at(),
                now,
            );
            self.finalize(rj, decision, None).await;
        }
    }

    /// One transformer output failed: its jobs share the transform fate
    async fn fail_output_jobs(&mut self, refs: Vec<RouterJob>, output: &DestinationJob) {
        let now = Utc::now();
        for rj in refs {
            if self.user_blocked(&rj) {
                let decision = self.ctx.policy.blocked(rj.job.attempt(), now);
                self.finalize(rj, decision, None).await;
                continue;
            }
            let mut decision = self.ctx.policy.transform_failure(
                output.status_code,
                rj.job.attempt(),
                rj.job.last_status.first_attempted_at(),
                now,
            );
            if !output.error.is_empty() {
                decision.reason = output.error.clone();
            }
            self.finalize(rj, decision, None).await;
        }
    }

    /// Apply a delivery response, downgrading to Waiting for blocked users
    async fn apply_response_or_wait(&mut self, rj: RouterJob, response: &DeliveryResponse) {
        if self.user_blocked(&rj) {
            let decision = self.ctx.policy.blocked(rj.job.attempt(), Utc::now());
            self.finalize(rj, decision, None).await;
        } else {
            self.apply_response(rj, response).await;
        }
    }

    async fn apply_response(&mut self, rj: RouterJob, response: &DeliveryResponse) {
        let decision = self.ctx.policy.decide(
            response,
            rj.job.attempt(),
            rj.job.last_status.first_attempted_at(),
            Utc::now(),
        );
        self.finalize(rj, decision, Some(response)).await;
    }

    /// Whether an earlier job of this user is still unfinished
    fn user_blocked(&self, rj: &RouterJob) -> bool {
        if !self.ctx.ordered() || rj.job.user_id.is_empty() {
            return false;
        }
        self.blocked_users
            .get(&rj.job.user_id)
            .is_some_and(|blocking| *blocking < rj.job.id)
    }

    fn update_blocking(&mut self, rj: &RouterJob, state: JobState) {
        if !self.ctx.ordered() || rj.job.user_id.is_empty() {
            return;
        }
        match state {
            JobState::Failed | JobState::Throttled => {
                // keep the earliest blocking job
                let entry = self
                    .blocked_users
                    .entry(rj.job.user_id.clone())
                    .or_insert(rj.job.id);
                if rj.job.id < *entry {
                    *entry = rj.job.id;
                }
            }
            JobState::Succeeded | JobState::Aborted => {
                if self.blocked_users.get(&rj.job.user_id) == Some(&rj.job.id) {
                    self.blocked_users.remove(&rj.job.user_id);
                }
            }
            _ => {}
        }
    }

    /// Record the decision: status row, stats, blocking, error-store drain
    async fn finalize(
        &mut self,
        rj: RouterJob,
        decision: Decision,
        response: Option<&DeliveryResponse>,
    ) {
        let now = Utc::now();

        let mut error_response = match response {
            Some(r) => serde_json::json!({
                "content-type": r.content_type,
                "response": r.body,
            }),
            None => serde_json::json!({}),
        };
        if decision.state == JobState::Aborted && decision.error_code == crate::policy::EXPIRED_ERROR_CODE
        {
            error_response = serde_json::json!({ "reason": decision.reason });
        }

        let mut status = JobStatus {
            job_id: rj.job.id,
            attempt: decision.attempt,
            state: decision.state,
            exec_time: now,
            retry_time: decision.retry_time,
            error_code: decision.error_code.clone(),
            error_response,
            parameters: serde_json::json!({}),
            workspace_id: rj.job.workspace_id.clone(),
        };

        // anchor the retry window at the first real attempt
        if decision.counted_attempt(rj.job.attempt()) {
            let first = rj.job.last_status.first_attempted_at().unwrap_or(now);
            status.set_first_attempted_at(first);
        } else if let Some(first) = rj.job.last_status.first_attempted_at() {
            status.set_first_attempted_at(first);
        }

        self.ctx.metrics.record_state(decision.state);
        self.ctx.tenants.remove_pending(&rj.job.workspace_id, 1);
        match decision.state {
            JobState::Succeeded => {
                self.ctx.tenants.record_outcome(&rj.job.workspace_id, true);
                let latency = (now - rj.job.created_at)
                    .to_std()
                    .unwrap_or_default();
                self.ctx.tenants.update_latency(&rj.job.workspace_id, latency);
            }
            JobState::Failed | JobState::Aborted => {
                self.ctx.tenants.record_outcome(&rj.job.workspace_id, false);
            }
            _ => {}
        }

        self.update_blocking(&rj, decision.state);

        if decision.state == JobState::Aborted {
            self.drain_to_error_store(&rj).await;
        }

        let entry = StatusEntry {
            status,
            reason: decision.reason,
        };
        if self.status_tx.send(entry).await.is_err() {
            error!(worker = self.id, "status channel closed, dropping status");
        }
    }

    /// Copy an aborted job to the error store for offline reprocessing
    async fn drain_to_error_store(&self, rj: &RouterJob) {
        let mut job = rj.job.clone();
        job.parameters.stage = Some("router".to_string());
        // the copy starts fresh in the error store
        job.last_status = JobStatus::initial(job.id, job.workspace_id.clone());

        let failed = self.ctx.error_store.store_with_retry_each(vec![job]).await;
        for (job_id, message) in failed {
            error!(
                worker = self.id,
                job_id = %job_id,
                error = %message,
                "failed to drain aborted job to error store"
            );
        }
    }
}

#[cfg(test)]
#[path = "worker_test.rs"]
mod worker_test;

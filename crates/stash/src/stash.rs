//! The stash loop and its upload workers

use std::collections::HashSet;
use std::sync::Arc;

use bytes::Bytes;
use chrono::Utc;
use ferry_adapters::{build_object_store, ObjectStore};
use ferry_config::StashConfig;
use ferry_jobstore::{
    call_with_retries, GetQueryParams, JobStore, JobsResult, RetrySettings,
};
use ferry_protocol::{Job, JobState, JobStatus};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::archive::{build_archive, object_key};
use crate::Result;

/// Error-stash engine over the error job store
pub struct ErrorStash {
    store: Arc<dyn JobStore>,
    object_store: Option<Arc<dyn ObjectStore>>,
    config: StashConfig,
    instance_id: String,

    /// Sources whose jobs are aborted instead of uploaded
    transient_sources: HashSet<String>,

    retry_settings: RetrySettings,
}

impl ErrorStash {
    /// Build the stash; the object store comes up only when backup is
    /// enabled and configured
    pub fn new(
        store: Arc<dyn JobStore>,
        config: StashConfig,
        instance_id: impl Into<String>,
        transient_sources: HashSet<String>,
    ) -> Result<Self> {
        let object_store = if config.backup_enabled() {
            Some(build_object_store(
                &config.backup.provider,
                &config.backup.endpoint,
            )?)
        } else {
            None
        };

        Ok(Self {
            store,
            object_store,
            config,
            instance_id: instance_id.into(),
            transient_sources,
            retry_settings: RetrySettings::default(),
        })
    }

    /// Object store override (test seam)
    pub fn with_object_store(mut self, object_store: Arc<dyn ObjectStore>) -> Self {
        self.object_store = Some(object_store);
        self
    }

    /// Run the read loop and upload workers until cancelled
    pub async fn run(self, cancel: CancellationToken) {
        info!(
            workers = self.config.num_workers,
            backup = self.object_store.is_some(),
            "error stash starting"
        );

        let stash = Arc::new(self);
        let (upload_tx, upload_rx) = mpsc::channel::<Vec<Job>>(stash.config.num_workers * 2);
        let upload_rx = Arc::new(tokio::sync::Mutex::new(upload_rx));

        let mut tasks = Vec::new();
        for worker_id in 0..stash.config.num_workers {
            let stash = Arc::clone(&stash);
            let upload_rx = Arc::clone(&upload_rx);
            tasks.push(tokio::spawn(async move {
                loop {
                    let batch = {
                        let mut rx = upload_rx.lock().await;
                        rx.recv().await
                    };
                    match batch {
                        Some(jobs) => stash.upload_batch(worker_id, jobs).await,
                        None => break,
                    }
                }
            }));
        }

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep(stash.config.read_sleep()) => {
                    if let Err(e) = stash.read_once(&upload_tx).await {
                        error!(error = %e, "error stash read failed");
                    }
                }
            }
        }

        drop(upload_tx);
        for task in tasks {
            let _ = task.await;
        }
        info!("error stash stopped");
    }

    /// One read cycle: failed first, then unprocessed under what is left
    /// of the budgets
    pub(crate) async fn read_once(&self, upload_tx: &mpsc::Sender<Vec<Job>>) -> Result<()> {
        let mut params = GetQueryParams {
            custom_val_filters: Vec::new(),
            parameter_filters: Vec::new(),
            jobs_limit: self.config.db_read_batch_size,
            payload_size_limit: self.config.payload_limit_bytes,
        };

        let store = Arc::clone(&self.store);
        let retry_params = params.clone();
        let to_retry: JobsResult =
            call_with_retries(self.retry_settings, "stash_get_to_retry", || {
                store.get_to_retry(retry_params.clone())
            })
            .await?;

        let mut combined = to_retry.jobs.clone();
        if !to_retry.limits_reached {
            to_retry.consume_budget(&mut params);
            let store = Arc::clone(&self.store);
            let unprocessed_params = params.clone();
            let unprocessed: JobsResult =
                call_with_retries(self.retry_settings, "stash_get_unprocessed", || {
                    store.get_unprocessed(unprocessed_params.clone())
                })
                .await?;
            combined.extend(unprocessed.jobs);
        }

        if combined.is_empty() {
            debug!("no error jobs to stash");
            return Ok(());
        }

        let can_upload = self.object_store.is_some();
        let now = Utc::now();
        let mut statuses = Vec::with_capacity(combined.len());
        let mut upload_list = Vec::new();

        for job in combined {
            let mut state = if can_upload {
                JobState::Executing
            } else {
                JobState::Aborted
            };

            if can_upload {
                if self.transient_sources.contains(&job.parameters.source_id) {
                    // transient sources are never backed up
                    state = JobState::Aborted;
                } else {
                    upload_list.push(job.clone());
                }
            }

            statuses.push(JobStatus {
                job_id: job.id,
                attempt: job.attempt() + 1,
                state,
                exec_time: now,
                retry_time: now,
                error_code: String::new(),
                error_response: serde_json::json!({}),
                parameters: serde_json::json!({}),
                workspace_id: job.workspace_id.clone(),
            });
        }

        self.write_statuses(statuses).await;

        if !upload_list.is_empty() && upload_tx.send(upload_list).await.is_err() {
            warn!("upload workers gone, dropping stash batch");
        }
        Ok(())
    }

    /// Serialize, compress and upload one batch, then settle its statuses
    pub(crate) async fn upload_batch(&self, worker_id: usize, jobs: Vec<Job>) {
        let object_store = match &self.object_store {
            Some(store) => store,
            None => return,
        };

        let outcome = match build_archive(&jobs, &self.instance_id) {
            Ok(archive) => {
                let key = object_key(&self.config.backup.bucket, &archive.filename);
                object_store
                    .put(&key, Bytes::from(archive.content))
                    .await
                    .map(|location| {
                        debug!(worker = worker_id, location = %location, jobs = jobs.len(), "stash upload complete");
                    })
                    .map_err(|e| e.to_string())
            }
            Err(e) => Err(e.to_string()),
        };

        let now = Utc::now();
        let statuses: Vec<JobStatus> = jobs
            .iter()
            .map(|job| {
                let (state, error_response) = match &outcome {
                    Ok(()) => (JobState::Succeeded, serde_json::json!({"success": "OK"})),
                    Err(message) => {
                        let state = if job.attempt() >= self.config.max_failed_count {
                            JobState::Aborted
                        } else {
                            JobState::Failed
                        };
                        (state, serde_json::json!({"error": message}))
                    }
                };
                JobStatus {
                    job_id: job.id,
                    attempt: job.attempt() + 1,
                    state,
                    exec_time: now,
                    retry_time: now,
                    error_code: String::new(),
                    error_response,
                    parameters: serde_json::json!({}),
                    workspace_id: job.workspace_id.clone(),
                }
            })
            .collect();

        if let Err(ref e) = outcome {
            warn!(worker = worker_id, error = %e, jobs = jobs.len(), "stash upload failed");
        }
        self.write_statuses(statuses).await;
    }

    /// Commit status rows; exhaustion panics into crash recovery, like
    /// the router's status writer
    async fn write_statuses(&self, statuses: Vec<JobStatus>) {
        let store = Arc::clone(&self.store);
        let result = call_with_retries(self.retry_settings, "stash_update_status", || {
            store.update_job_status(statuses.clone(), &[])
        })
        .await;

        if let Err(e) = result {
            panic!("stash status write failed after retries: {e}");
        }
    }
}

impl std::fmt::Debug for ErrorStash {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ErrorStash")
            .field("backup", &self.object_store.is_some())
            .field("workers", &self.config.num_workers)
            .finish()
    }
}

#[cfg(test)]
#[path = "stash_test.rs"]
mod stash_test;

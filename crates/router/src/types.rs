//! In-flight types and the per-router context record
//!
//! `RouterContext` is the injected dependency record: workers and the
//! generator see exactly the capabilities they use (store handles, stats,
//! adapter, transformer, tuning) and never a back-pointer to the router.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use ferry_adapters::SharedAdapter;
use ferry_config::{DestinationConfig, RouterConfig};
use ferry_jobstore::JobStore;
use ferry_protocol::{Job, JobState, JobStatus};
use ferry_tenants::TenantStats;
use ferry_transformer::{JobMetadata, TransformerClient, TransformerJob};

use crate::metrics::RouterMetrics;
use crate::policy::RetryPolicy;

/// How a worker turns its batch into destination calls
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchMode {
    /// Send each payload as-is, one adapter call per job
    Raw,

    /// `ROUTER_TRANSFORM` the batch, then one adapter call per output
    RouterTransform,

    /// `BATCH`-transform the batch, then one adapter call per aggregate
    Batch,

    /// Accumulate raw payloads into one object-store upload (batch flavor)
    BatchUpload,
}

/// A source job in flight through a worker
#[derive(Debug, Clone)]
pub struct RouterJob {
    pub job: Job,

    /// When the generator handed the job to the pipeline
    pub picked_at: DateTime<Utc>,
}

impl RouterJob {
    pub fn new(job: Job) -> Self {
        Self {
            job,
            picked_at: Utc::now(),
        }
    }

    /// Attempt context for the transformer
    pub fn metadata(&self) -> JobMetadata {
        JobMetadata {
            job_id: self.job.id.as_i64(),
            attempt_num: self.job.attempt(),
            user_id: self.job.user_id.clone(),
            workspace_id: self.job.workspace_id.clone(),
            source_id: self.job.parameters.source_id.clone(),
            destination_id: self.job.parameters.destination_id.clone(),
            message_id: self.job.parameters.message_id.clone(),
            first_attempted_at: self
                .job
                .last_status
                .first_attempted_at()
                .map(|t| t.to_rfc3339()),
        }
    }

    /// Wire form handed to the transformer
    pub fn transformer_job(&self) -> TransformerJob {
        let message = serde_json::from_slice(&self.job.payload)
            .unwrap_or(serde_json::Value::Null);
        TransformerJob {
            message,
            metadata: self.metadata(),
        }
    }
}

/// A finalized status on its way to the status writer
#[derive(Debug, Clone)]
pub struct StatusEntry {
    pub status: JobStatus,

    /// Reporting bucket (error reason or "success")
    pub reason: String,
}

impl StatusEntry {
    /// Whether this entry finishes the job for the router
    #[inline]
    pub fn is_terminal(&self) -> bool {
        self.status.state.is_terminal()
    }

    #[inline]
    pub fn state(&self) -> JobState {
        self.status.state
    }
}

/// Dependency record shared by one router's loops
///
/// Built once by the manager per destination; everything in here is
/// either immutable configuration or internally synchronized.
pub struct RouterContext {
    /// Destination type tag, also the pickup custom-val filter
    pub dest_type: String,

    /// The destination this router serves
    pub destination: DestinationConfig,

    /// Destination config as the transformer sees it
    pub destination_value: serde_json::Value,

    pub mode: DispatchMode,

    pub adapter: SharedAdapter,

    /// Present when `mode` involves a remote transform
    pub transformer: Option<TransformerClient>,

    pub policy: RetryPolicy,

    pub store: Arc<dyn JobStore>,

    /// Error store feeding the stash loop
    pub error_store: Arc<dyn JobStore>,

    pub tenants: Arc<TenantStats>,

    pub metrics: Arc<RouterMetrics>,

    pub config: RouterConfig,
}

impl RouterContext {
    /// Strict per-user ordering is active for this router
    #[inline]
    pub fn ordered(&self) -> bool {
        self.config.guarantee_user_event_order
    }
}

impl std::fmt::Debug for RouterContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RouterContext")
            .field("dest_type", &self.dest_type)
            .field("destination", &self.destination.id)
            .field("mode", &self.mode)
            .finish()
    }
}

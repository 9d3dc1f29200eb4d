//! Router tuning knobs
//!
//! One `RouterConfig` is shared by every destination router; the manager
//! clones a snapshot into each router it starts. Durations are expressed
//! in seconds or milliseconds in the file and exposed as `Duration`s.

use std::time::Duration;

use serde::Deserialize;

/// Tuning knobs for destination routers
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RouterConfig {
    /// Worker loops per destination router; fixed for the router's lifetime
    pub num_workers: usize,

    /// Bounded capacity of each worker's input channel
    pub worker_queue_size: usize,

    /// Jobs assembled into one transformer/dispatch batch
    pub batch_size: usize,

    /// How long a partial batch may wait for more jobs (ms)
    pub batch_timeout_ms: u64,

    /// Overall deadline for a batch from its first job (ms); on expiry the
    /// batch is failed without dispatch so the generator retries it
    pub router_timeout_ms: u64,

    /// Attempts after which a transiently failing job is aborted
    pub max_failed_count: u32,

    /// Window from the first attempt within which transient retries happen (s)
    pub retry_time_window_secs: u64,

    /// Age beyond which a job is aborted as expired (s)
    pub job_retention_secs: u64,

    /// Minimum exponential backoff between retries (s)
    pub min_retry_backoff_secs: u64,

    /// Maximum exponential backoff between retries (s)
    pub max_retry_backoff_secs: u64,

    /// Delay applied when a destination signals throttling (s)
    pub throttle_delay_secs: u64,

    /// Sleep between generator iterations when the pickup came back empty (ms)
    pub read_sleep_ms: u64,

    /// Free worker slots required before a pickup is attempted
    pub pickup_flush_threshold: usize,

    /// Cumulative payload byte budget for a single pickup
    pub payload_limit_bytes: i64,

    /// Upper bound on rows per store read
    pub db_read_batch_size: usize,

    /// Statuses coalesced per status-writer flush
    pub update_status_batch_size: usize,

    /// Max wait before a partial status batch is flushed (ms)
    pub max_status_update_wait_ms: u64,

    /// Per-destination delivery timeout (s)
    pub delivery_timeout_secs: u64,

    /// Enforce strict per-user ordering; must be disabled when sources may
    /// send empty user ids
    pub guarantee_user_event_order: bool,

    /// Scale factor applied to throttled workspaces in pickup quotas
    pub throttle_factor: f64,

    /// Use the legacy no-fairness pickup (whole capacity to every workspace)
    pub legacy_pickup: bool,

    /// Remote user-transformer endpoint
    pub transformer: TransformerConfig,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            num_workers: 8,
            worker_queue_size: 1000,
            batch_size: 20,
            batch_timeout_ms: 2_000,
            router_timeout_ms: 3_600_000,
            max_failed_count: 3,
            retry_time_window_secs: 3_600,
            job_retention_secs: 86_400,
            min_retry_backoff_secs: 10,
            max_retry_backoff_secs: 300,
            throttle_delay_secs: 30,
            read_sleep_ms: 1_000,
            pickup_flush_threshold: 2,
            payload_limit_bytes: 100 * 1024 * 1024,
            db_read_batch_size: 10_000,
            update_status_batch_size: 1_000,
            max_status_update_wait_ms: 2_000,
            delivery_timeout_secs: 30,
            guarantee_user_event_order: true,
            throttle_factor: 0.5,
            legacy_pickup: false,
            transformer: TransformerConfig::default(),
        }
    }
}

impl RouterConfig {
    #[inline]
    pub fn batch_timeout(&self) -> Duration {
        Duration::from_millis(self.batch_timeout_ms)
    }

    #[inline]
    pub fn router_timeout(&self) -> Duration {
        Duration::from_millis(self.router_timeout_ms)
    }

    #[inline]
    pub fn retry_time_window(&self) -> Duration {
        Duration::from_secs(self.retry_time_window_secs)
    }

    #[inline]
    pub fn job_retention(&self) -> Duration {
        Duration::from_secs(self.job_retention_secs)
    }

    #[inline]
    pub fn read_sleep(&self) -> Duration {
        Duration::from_millis(self.read_sleep_ms)
    }

    #[inline]
    pub fn max_status_update_wait(&self) -> Duration {
        Duration::from_millis(self.max_status_update_wait_ms)
    }

    #[inline]
    pub fn delivery_timeout(&self) -> Duration {
        Duration::from_secs(self.delivery_timeout_secs)
    }

    #[inline]
    pub fn throttle_delay(&self) -> Duration {
        Duration::from_secs(self.throttle_delay_secs)
    }

    #[inline]
    pub fn min_retry_backoff(&self) -> Duration {
        Duration::from_secs(self.min_retry_backoff_secs)
    }

    #[inline]
    pub fn max_retry_backoff(&self) -> Duration {
        Duration::from_secs(self.max_retry_backoff_secs)
    }
}

/// Remote transformer endpoint configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TransformerConfig {
    /// Base URL of the transformer service
    pub url: String,

    /// Per-call timeout (s)
    pub timeout_secs: u64,

    /// Bounded transport retries before the call is failed
    pub max_retries: u32,
}

impl Default for TransformerConfig {
    fn default() -> Self {
        Self {
            url: "http://localhost:9090".to_string(),
            timeout_secs: 30,
            max_retries: 3,
        }
    }
}

impl TransformerConfig {
    #[inline]
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

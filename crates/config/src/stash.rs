//! Error stash configuration

use std::time::Duration;

use serde::Deserialize;

/// Error stash tuning
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StashConfig {
    /// Master switch; disabled stashes abort every drained job
    pub enabled: bool,

    /// Sleep between error-store reads (s)
    pub read_sleep_secs: u64,

    /// Upper bound on rows per error-store read
    pub db_read_batch_size: usize,

    /// Upload worker count
    pub num_workers: usize,

    /// Upload attempts before an error job is aborted
    pub max_failed_count: u32,

    /// Cumulative payload byte budget per read
    pub payload_limit_bytes: i64,

    /// Backup target; empty provider/bucket disables uploads
    pub backup: BackupConfig,
}

impl Default for StashConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            read_sleep_secs: 30,
            db_read_batch_size: 1_000,
            num_workers: 2,
            max_failed_count: 3,
            payload_limit_bytes: 100 * 1024 * 1024,
            backup: BackupConfig::default(),
        }
    }
}

impl StashConfig {
    #[inline]
    pub fn read_sleep(&self) -> Duration {
        Duration::from_secs(self.read_sleep_secs)
    }

    /// Uploads happen only when the stash is enabled and a target is set
    pub fn backup_enabled(&self) -> bool {
        self.enabled && !self.backup.provider.is_empty() && !self.backup.bucket.is_empty()
    }
}

/// Object-store backup target for stashed jobs
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct BackupConfig {
    /// "local" or "http"; usually set via JOBS_BACKUP_STORAGE_PROVIDER
    pub provider: String,

    /// Bucket or directory; usually set via JOBS_BACKUP_BUCKET
    pub bucket: String,

    /// Filesystem root (local) or base URL (http)
    pub endpoint: String,
}

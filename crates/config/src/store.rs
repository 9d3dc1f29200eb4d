//! Job store call tuning

use std::time::Duration;

use serde::Deserialize;

/// Tuning for calls against the durable job store
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Bounded retries for store queries and commands
    pub max_retries: u32,

    /// Per-query timeout (s)
    pub query_timeout_secs: u64,

    /// Per-command timeout (s)
    pub command_timeout_secs: u64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            query_timeout_secs: 60,
            command_timeout_secs: 90,
        }
    }
}

impl StoreConfig {
    #[inline]
    pub fn query_timeout(&self) -> Duration {
        Duration::from_secs(self.query_timeout_secs)
    }

    #[inline]
    pub fn command_timeout(&self) -> Duration {
        Duration::from_secs(self.command_timeout_secs)
    }
}

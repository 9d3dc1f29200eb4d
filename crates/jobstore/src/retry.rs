//! Bounded-retry helpers for store calls
//!
//! Every router call into the store goes through these helpers: per-call
//! timeout, bounded attempts, exponential backoff. Callers decide what to
//! do on exhaustion; the status writer escalates to a panic so crash
//! recovery can reclaim in-flight jobs.

use std::future::Future;
use std::time::Duration;

use tokio::time::timeout;
use tracing::debug;

use crate::{Result, StoreError};

/// Retry tuning for store calls
#[derive(Debug, Clone, Copy)]
pub struct RetrySettings {
    /// Per-attempt timeout
    pub call_timeout: Duration,

    /// Attempts beyond the first
    pub max_retries: u32,

    /// Base delay, doubled each retry and capped at 64x
    pub base_delay: Duration,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            call_timeout: Duration::from_secs(60),
            max_retries: 3,
            base_delay: Duration::from_millis(250),
        }
    }
}

impl RetrySettings {
    pub fn new(call_timeout: Duration, max_retries: u32) -> Self {
        Self {
            call_timeout,
            max_retries,
            ..Self::default()
        }
    }

    fn delay(&self, attempt: u32) -> Duration {
        self.base_delay * (1 << attempt.min(6))
    }
}

/// Run a store call with timeout and bounded retries
///
/// `operation_name` only feeds logging.
pub async fn call_with_retries<T, F, Fut>(
    settings: RetrySettings,
    operation_name: &str,
    mut operation: F,
) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut last_error = String::new();

    for attempt in 0..=settings.max_retries {
        if attempt > 0 {
            let delay = settings.delay(attempt - 1);
            debug!(
                operation = operation_name,
                attempt,
                delay_ms = delay.as_millis() as u64,
                "retrying store call after delay"
            );
            tokio::time::sleep(delay).await;
        }

        match timeout(settings.call_timeout, operation()).await {
            Ok(Ok(value)) => return Ok(value),
            Ok(Err(e)) => {
                last_error = e.to_string();
                debug!(
                    operation = operation_name,
                    attempt,
                    error = %e,
                    "store call failed"
                );
            }
            Err(_) => {
                last_error = StoreError::Timeout(settings.call_timeout).to_string();
                debug!(
                    operation = operation_name,
                    attempt,
                    timeout_ms = settings.call_timeout.as_millis() as u64,
                    "store call timed out"
                );
            }
        }
    }

    Err(StoreError::RetriesExhausted {
        attempts: settings.max_retries + 1,
        last_error,
    })
}

#[cfg(test)]
#[path = "retry_test.rs"]
mod retry_test;

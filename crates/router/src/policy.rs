//! Retry/abort policy - the per-job state machine's decision table
//!
//! Given a delivery outcome and the job's attempt history, decides the
//! next state:
//!
//! | condition | next state |
//! |---|---|
//! | 2xx | Succeeded |
//! | job older than retention | Aborted ("job expired", 410, no attempt) |
//! | transient, within attempts and retry window | Failed, backoff sets retry time |
//! | transient, attempts or window exhausted | Aborted |
//! | permanent 4xx | Aborted, response preserved |
//! | throttle signal | Throttled, retry time = now + throttle delay |
//! | earlier job of same user unfinished | Waiting, no attempt |

use std::time::Duration;

use chrono::{DateTime, Utc};
use ferry_adapters::{DeliveryResponse, ResponseClass};
use ferry_config::RouterConfig;
use ferry_protocol::{Job, JobState};

/// Error code recorded for expired jobs
pub const EXPIRED_ERROR_CODE: &str = "410";

/// Reason string recorded for expired jobs
pub const EXPIRED_REASON: &str = "job expired";

/// Tunable inputs of the decision table
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_failed_count: u32,
    pub retry_time_window: Duration,
    pub job_retention: Duration,
    pub min_backoff: Duration,
    pub max_backoff: Duration,
    pub throttle_delay: Duration,
}

impl RetryPolicy {
    pub fn from_config(config: &RouterConfig) -> Self {
        Self {
            max_failed_count: config.max_failed_count,
            retry_time_window: config.retry_time_window(),
            job_retention: config.job_retention(),
            min_backoff: config.min_retry_backoff(),
            max_backoff: config.max_retry_backoff(),
            throttle_delay: config.throttle_delay(),
        }
    }

    /// Whether the job outlived the retention window
    pub fn is_expired(&self, job: &Job, now: DateTime<Utc>) -> bool {
        let retention = chrono::Duration::from_std(self.job_retention)
            .unwrap_or_else(|_| chrono::Duration::hours(24));
        job.is_expired(retention, now)
    }

    /// Decision for a job that must not be dispatched anymore
    pub fn expired(&self, attempt: u32, now: DateTime<Utc>) -> Decision {
        Decision {
            state: JobState::Aborted,
            attempt,
            retry_time: now,
            error_code: EXPIRED_ERROR_CODE.to_string(),
            reason: EXPIRED_REASON.to_string(),
        }
    }

    /// Decision for a job skipped because of per-user ordering
    pub fn blocked(&self, attempt: u32, now: DateTime<Utc>) -> Decision {
        Decision {
            state: JobState::Waiting,
            attempt,
            retry_time: now,
            error_code: String::new(),
            reason: "waiting for earlier job of same user".to_string(),
        }
    }

    /// Decision for a delivery outcome
    ///
    /// `attempt` is the job's attempt count before this delivery;
    /// `first_attempted_at` anchors the retry window.
    pub fn decide(
        &self,
        response: &DeliveryResponse,
        attempt: u32,
        first_attempted_at: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
    ) -> Decision {
        match response.class() {
            ResponseClass::Success => Decision {
                state: JobState::Succeeded,
                attempt: attempt + 1,
                retry_time: now,
                error_code: response.status_code.to_string(),
                reason: "success".to_string(),
            },
            ResponseClass::Throttle => Decision {
                state: JobState::Throttled,
                attempt: attempt + 1,
                retry_time: now + chrono::Duration::from_std(self.throttle_delay).unwrap_or_default(),
                error_code: response.status_code.to_string(),
                reason: "throttled by destination".to_string(),
            },
            ResponseClass::Permanent => Decision {
                state: JobState::Aborted,
                attempt: attempt + 1,
                retry_time: now,
                error_code: response.status_code.to_string(),
                reason: format!("destination rejected with {}", response.status_code),
            },
            ResponseClass::Transient => self.transient(response, attempt, first_attempted_at, now),
        }
    }

    /// Decision for a transformer failure
    ///
    /// Non-2xx transformer outcomes get the transient treatment regardless
    /// of their code class, counted separately by the metrics.
    pub fn transform_failure(
        &self,
        status_code: u16,
        attempt: u32,
        first_attempted_at: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
    ) -> Decision {
        let response = DeliveryResponse::new(status_code, "", "");
        let mut decision = self.transient(&response, attempt, first_attempted_at, now);
        decision.reason = format!("transform failure {status_code}");
        decision
    }

    fn transient(
        &self,
        response: &DeliveryResponse,
        attempt: u32,
        first_attempted_at: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
    ) -> Decision {
        let window = chrono::Duration::from_std(self.retry_time_window).unwrap_or_default();
        let window_exceeded = first_attempted_at.is_some_and(|first| now - first > window);
        let attempts_exhausted = attempt >= self.max_failed_count;

        if attempts_exhausted || window_exceeded {
            return Decision {
                state: JobState::Aborted,
                attempt: attempt + 1,
                retry_time: now,
                error_code: response.status_code.to_string(),
                reason: if attempts_exhausted {
                    "retries exhausted".to_string()
                } else {
                    "retry window exceeded".to_string()
                },
            };
        }

        Decision {
            state: JobState::Failed,
            attempt: attempt + 1,
            retry_time: now
                + chrono::Duration::from_std(self.backoff(attempt)).unwrap_or_default(),
            error_code: response.status_code.to_string(),
            reason: format!("transient failure {}", response.status_code),
        }
    }

    /// Exponential backoff from the attempt count
    pub fn backoff(&self, attempt: u32) -> Duration {
        let exp = self.min_backoff.saturating_mul(1 << attempt.min(16));
        exp.min(self.max_backoff)
    }
}

/// One state-machine decision
#[derive(Debug, Clone)]
pub struct Decision {
    pub state: JobState,

    /// Attempt number to record on the status row
    pub attempt: u32,

    /// Earliest re-pickup time for Failed/Throttled
    pub retry_time: DateTime<Utc>,

    /// HTTP-like code recorded on the row
    pub error_code: String,

    /// Reporting bucket
    pub reason: String,
}

impl Decision {
    /// Whether this decision counted a delivery attempt
    #[inline]
    pub fn counted_attempt(&self, previous_attempt: u32) -> bool {
        self.attempt > previous_attempt
    }
}

#[cfg(test)]
#[path = "policy_test.rs"]
mod policy_test;

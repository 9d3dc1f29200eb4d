//! Job status rows and the per-job state machine
//!
//! Status rows are append-only. The row with the highest attempt/exec time
//! per job id is the job's current state; the store enforces that only one
//! row is "current".

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ProtocolError;
use crate::job::JobId;

/// Key under which the first delivery attempt timestamp is carried inside
/// `error_response`, preserved across retries of the same job.
pub const FIRST_ATTEMPTED_AT_KEY: &str = "firstAttemptedAt";

/// Per-job delivery state
///
/// `NotPicked` is the implicit state of a job with no status rows yet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobState {
    NotPicked,
    Executing,
    Succeeded,
    Failed,
    Aborted,
    Waiting,
    Throttled,
}

impl JobState {
    /// Terminal states never transition again
    #[inline]
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobState::Succeeded | JobState::Aborted)
    }

    /// States that make the job eligible for a later pickup
    #[inline]
    pub fn reenters_pool(&self) -> bool {
        matches!(
            self,
            JobState::NotPicked | JobState::Failed | JobState::Waiting | JobState::Throttled
        )
    }

    /// Stable string form used in store rows and logs
    pub fn as_str(&self) -> &'static str {
        match self {
            JobState::NotPicked => "not_picked",
            JobState::Executing => "executing",
            JobState::Succeeded => "succeeded",
            JobState::Failed => "failed",
            JobState::Aborted => "aborted",
            JobState::Waiting => "waiting",
            JobState::Throttled => "throttled",
        }
    }
}

impl std::fmt::Display for JobState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for JobState {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "not_picked" => Ok(JobState::NotPicked),
            "executing" => Ok(JobState::Executing),
            "succeeded" => Ok(JobState::Succeeded),
            "failed" => Ok(JobState::Failed),
            "aborted" => Ok(JobState::Aborted),
            "waiting" => Ok(JobState::Waiting),
            "throttled" => Ok(JobState::Throttled),
            other => Err(ProtocolError::UnknownState(other.to_string())),
        }
    }
}

/// An append-only row describing a job's most recent outcome
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobStatus {
    pub job_id: JobId,

    /// Monotonically non-decreasing per job
    pub attempt: u32,

    pub state: JobState,

    /// When this outcome was recorded
    pub exec_time: DateTime<Utc>,

    /// Earliest time the job may be picked up again (Failed/Throttled)
    pub retry_time: DateTime<Utc>,

    /// HTTP-like outcome code as a string ("200", "400", "410", ...)
    pub error_code: String,

    /// Destination/transformer response context; also carries
    /// `firstAttemptedAt` across retries
    pub error_response: serde_json::Value,

    pub parameters: serde_json::Value,

    pub workspace_id: String,
}

impl JobStatus {
    /// The implicit status of a never-picked job
    pub fn initial(job_id: JobId, workspace_id: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            job_id,
            attempt: 0,
            state: JobState::NotPicked,
            exec_time: now,
            retry_time: now,
            error_code: String::new(),
            error_response: serde_json::json!({}),
            parameters: serde_json::json!({}),
            workspace_id: workspace_id.into(),
        }
    }

    /// Timestamp of the job's first delivery attempt, if one was recorded
    pub fn first_attempted_at(&self) -> Option<DateTime<Utc>> {
        self.error_response
            .get(FIRST_ATTEMPTED_AT_KEY)
            .and_then(|v| v.as_str())
            .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
            .map(|t| t.with_timezone(&Utc))
    }

    /// Record the first-attempt timestamp inside `error_response`,
    /// keeping an already-present value
    pub fn set_first_attempted_at(&mut self, at: DateTime<Utc>) {
        if self.first_attempted_at().is_some() {
            return;
        }
        if let Some(map) = self.error_response.as_object_mut() {
            map.insert(
                FIRST_ATTEMPTED_AT_KEY.to_string(),
                serde_json::Value::String(at.to_rfc3339()),
            );
        } else {
            self.error_response = serde_json::json!({ FIRST_ATTEMPTED_AT_KEY: at.to_rfc3339() });
        }
    }

    /// Validate that `next` is a legal successor of this row
    pub fn check_transition(&self, next: &JobStatus) -> crate::Result<()> {
        if self.state.is_terminal() {
            return Err(ProtocolError::TerminalTransition {
                job_id: self.job_id.as_i64(),
                from: self.state.as_str(),
            });
        }
        debug_assert!(next.attempt >= self.attempt, "attempt numbers must not regress");
        Ok(())
    }
}

#[cfg(test)]
#[path = "status_test.rs"]
mod status_test;

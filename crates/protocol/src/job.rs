//! Job - the immutable unit of work
//!
//! Jobs are created by the ingest side and only ever read by the router.
//! Progress is recorded through appended [`JobStatus`](crate::JobStatus)
//! rows, never by mutating the job row itself.

use bytes::Bytes;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::status::JobStatus;

/// 64-bit job identifier, monotonically increasing in store order
///
/// Store order equals creation order, which is what per-user ordering
/// guarantees are defined against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(pub i64);

impl JobId {
    /// Raw id value
    #[inline]
    pub fn as_i64(&self) -> i64 {
        self.0
    }
}

impl std::fmt::Display for JobId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for JobId {
    fn from(v: i64) -> Self {
        Self(v)
    }
}

/// Routing parameters attached to a job by the ingest side
///
/// Serialized as JSON in the store. `stage` is absent on ingest and set to
/// `"router"` when an aborted job is drained to the error store.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct JobParameters {
    #[serde(default)]
    pub source_id: String,

    #[serde(default)]
    pub destination_id: String,

    #[serde(default)]
    pub message_id: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub received_at: Option<DateTime<Utc>>,

    /// Where the user transform ran or should run ("processor" / "router" / "none")
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transform_at: Option<String>,

    /// Pipeline stage that diverted this job, set on error-stash drain
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stage: Option<String>,
}

impl JobParameters {
    /// Parse parameters from their stored JSON form
    pub fn from_json(raw: &[u8]) -> crate::Result<Self> {
        Ok(serde_json::from_slice(raw)?)
    }

    /// Serialize to the stored JSON form
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_else(|_| serde_json::json!({}))
    }
}

/// An immutable unit of work
///
/// `custom_val` carries the destination-type tag used as a coarse pickup
/// filter, so each destination router only sees its own jobs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub id: JobId,
    pub uuid: Uuid,

    /// Stable end-user id; may be empty when the source opts out of ordering
    pub user_id: String,

    /// Multi-tenant partition this job belongs to
    pub workspace_id: String,

    /// Destination-type tag (e.g. "WEBHOOK", "KAFKA")
    pub custom_val: String,

    pub created_at: DateTime<Utc>,
    pub expire_at: DateTime<Utc>,

    /// Opaque event payload, typically JSON
    #[serde(with = "payload_bytes")]
    pub payload: Bytes,

    pub parameters: JobParameters,

    /// Most recent status row at pickup time
    pub last_status: JobStatus,
}

impl Job {
    /// Payload size in bytes, used for pickup payload budgeting
    #[inline]
    pub fn payload_size(&self) -> usize {
        self.payload.len()
    }

    /// Whether the job has outlived the configured retention window
    #[inline]
    pub fn is_expired(&self, retention: Duration, now: DateTime<Utc>) -> bool {
        now - self.created_at > retention
    }

    /// Attempt number recorded by the most recent status row
    #[inline]
    pub fn attempt(&self) -> u32 {
        self.last_status.attempt
    }
}

/// Bytes payload serialized as a JSON string (the payload is JSON text)
mod payload_bytes {
    use bytes::Bytes;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(payload: &Bytes, ser: S) -> Result<S::Ok, S::Error> {
        ser.serialize_str(&String::from_utf8_lossy(payload))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(de: D) -> Result<Bytes, D::Error> {
        let s = String::deserialize(de)?;
        Ok(Bytes::from(s))
    }
}

#[cfg(test)]
#[path = "job_test.rs"]
mod job_test;

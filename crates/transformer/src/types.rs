//! Transformer wire types
//!
//! The request carries the router's in-flight jobs plus the destination
//! config; the response is an array of destination jobs, each pointing
//! back at its constituent inputs through [`JobMetadata`].

use serde::{Deserialize, Serialize};

/// Transformer operation selector
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransformMode {
    #[serde(rename = "ROUTER_TRANSFORM")]
    RouterTransform,
    #[serde(rename = "BATCH")]
    Batch,
}

impl std::fmt::Display for TransformMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TransformMode::RouterTransform => f.write_str("ROUTER_TRANSFORM"),
            TransformMode::Batch => f.write_str("BATCH"),
        }
    }
}

/// Attempt context travelling with a job through the transformer
///
/// Everything the worker needs to map an output back onto source jobs
/// and their retry accounting.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct JobMetadata {
    pub job_id: i64,
    pub attempt_num: u32,
    pub user_id: String,
    pub workspace_id: String,
    #[serde(default)]
    pub source_id: String,
    #[serde(default)]
    pub destination_id: String,
    #[serde(default)]
    pub message_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub first_attempted_at: Option<String>,
}

/// One input job as the transformer sees it
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransformerJob {
    /// The event payload
    pub message: serde_json::Value,

    pub metadata: JobMetadata,
}

/// One transformer output
///
/// May aggregate several inputs (`metadata` has one entry per constituent
/// job). The status code drives the worker: 2xx means "deliver this
/// payload", anything else fails the referenced jobs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DestinationJob {
    /// Payload to hand to the destination adapter
    #[serde(default)]
    pub payload: serde_json::Value,

    /// Constituent source jobs
    #[serde(default)]
    pub metadata: Vec<JobMetadata>,

    /// True when this output aggregates the whole input batch
    #[serde(default)]
    pub batched: bool,

    #[serde(default = "default_status")]
    pub status_code: u16,

    #[serde(default)]
    pub error: String,
}

fn default_status() -> u16 {
    200
}

impl DestinationJob {
    /// Whether the transform step itself succeeded for this output
    #[inline]
    pub fn transform_succeeded(&self) -> bool {
        (200..300).contains(&self.status_code)
    }

    /// Serialized payload bytes for the adapter
    pub fn payload_bytes(&self) -> Vec<u8> {
        serde_json::to_vec(&self.payload).unwrap_or_default()
    }
}

/// Request body for one transformer call
#[derive(Debug, Serialize)]
pub(crate) struct TransformRequest<'a> {
    pub operation: TransformMode,
    pub input: &'a [TransformerJob],
    pub destination: &'a serde_json::Value,
}

/// Response body of one transformer call
#[derive(Debug, Deserialize)]
pub(crate) struct TransformResponse {
    #[serde(default)]
    pub output: Vec<DestinationJob>,
}

#[cfg(test)]
#[path = "types_test.rs"]
mod types_test;

//! Wire type tests

use serde_json::json;

use crate::types::{DestinationJob, TransformMode};

#[test]
fn test_mode_serializes_to_operation_names() {
    assert_eq!(
        serde_json::to_string(&TransformMode::RouterTransform).unwrap(),
        "\"ROUTER_TRANSFORM\""
    );
    assert_eq!(serde_json::to_string(&TransformMode::Batch).unwrap(), "\"BATCH\"");
}

#[test]
fn test_destination_job_defaults() {
    // a minimal transformer answer still parses
    let job: DestinationJob = serde_json::from_value(json!({
        "payload": {"type": "track"},
        "metadata": [{"job_id": 12, "attempt_num": 1, "user_id": "u1", "workspace_id": "ws-1"}]
    }))
    .unwrap();

    assert_eq!(job.status_code, 200);
    assert!(!job.batched);
    assert!(job.error.is_empty());
    assert!(job.transform_succeeded());
    assert_eq!(job.metadata[0].job_id, 12);
}

#[test]
fn test_destination_job_failure_status() {
    let job: DestinationJob = serde_json::from_value(json!({
        "metadata": [{"job_id": 1, "attempt_num": 0, "user_id": "u1", "workspace_id": "ws-1"}],
        "status_code": 500,
        "error": "transformation failed"
    }))
    .unwrap();

    assert!(!job.transform_succeeded());
    assert_eq!(job.error, "transformation failed");
}

#[test]
fn test_payload_bytes_round_trip() {
    let job = DestinationJob {
        payload: json!({"endpoint": "https://x", "body": {"k": 1}}),
        metadata: vec![],
        batched: false,
        status_code: 200,
        error: String::new(),
    };
    let bytes = job.payload_bytes();
    let parsed: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(parsed["body"]["k"], 1);
}

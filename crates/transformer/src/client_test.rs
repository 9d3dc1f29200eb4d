//! Transformer client tests
//!
//! Output validation is tested directly; the HTTP path is covered by a
//! minimal in-process server speaking just enough HTTP/1.1.

use serde_json::json;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

use ferry_config::TransformerConfig;

use crate::client::{validate_batch_output, validate_router_output, TransformerClient};
use crate::types::{DestinationJob, JobMetadata, TransformerJob};
use crate::TransformerError;

fn input(job_id: i64, user: &str) -> TransformerJob {
    TransformerJob {
        message: json!({"type": "track"}),
        metadata: JobMetadata {
            job_id,
            attempt_num: 0,
            user_id: user.to_string(),
            workspace_id: "ws-1".to_string(),
            ..Default::default()
        },
    }
}

fn output(job_ids: &[i64], status_code: u16, batched: bool) -> DestinationJob {
    DestinationJob {
        payload: json!({"forwarded": true}),
        metadata: job_ids
            .iter()
            .map(|id| JobMetadata {
                job_id: *id,
                ..Default::default()
            })
            .collect(),
        batched,
        status_code,
        error: String::new(),
    }
}

// ============================================================================
// Output validation
// ============================================================================

#[test]
fn test_router_output_must_reference_inputs() {
    let inputs = vec![input(1, "u1")];
    let valid = vec![output(&[1], 200, false)];
    assert!(validate_router_output(&inputs, &valid).is_ok());

    let orphan = vec![output(&[], 200, false)];
    assert!(validate_router_output(&inputs, &orphan).is_err());
}

#[test]
fn test_router_output_may_be_empty() {
    // 1:N with N = 0 is legal (transformer dropped everything)
    let inputs = vec![input(1, "u1")];
    assert!(validate_router_output(&inputs, &[]).is_ok());
}

#[test]
fn test_batched_count_mismatch_fails_whole_batch() {
    let inputs = vec![input(1, "u1"), input(2, "u1"), input(3, "u2")];

    // covers all three inputs: fine
    let covering = vec![output(&[1, 2], 200, true), output(&[3], 200, true)];
    assert!(validate_batch_output(&inputs, &covering).is_ok());

    // drops one input: whole batch is a transform failure
    let partial = vec![output(&[1, 2], 200, true)];
    match validate_batch_output(&inputs, &partial) {
        Err(TransformerError::BatchCountMismatch { input, output }) => {
            assert_eq!(input, 3);
            assert_eq!(output, 2);
        }
        other => panic!("unexpected: {other:?}"),
    }
}

#[test]
fn test_unbatched_outputs_skip_count_check() {
    let inputs = vec![input(1, "u1"), input(2, "u1")];
    let outputs = vec![output(&[1], 200, false)];
    assert!(validate_batch_output(&inputs, &outputs).is_ok());
}

// ============================================================================
// HTTP path
// ============================================================================

/// Accept one request and answer with the canned JSON body.
async fn serve_once(listener: TcpListener, status_line: &'static str, body: String) {
    let (mut stream, _) = listener.accept().await.unwrap();
    let mut buf = vec![0u8; 64 * 1024];
    let mut read = 0;
    // read until the headers and the announced body arrived
    loop {
        let n = stream.read(&mut buf[read..]).await.unwrap();
        read += n;
        let text = String::from_utf8_lossy(&buf[..read]);
        if let Some(header_end) = text.find("\r\n\r\n") {
            let content_length = text
                .lines()
                .find_map(|l| l.to_ascii_lowercase().strip_prefix("content-length:").map(|v| v.trim().parse::<usize>().unwrap()))
                .unwrap_or(0);
            if read >= header_end + 4 + content_length {
                break;
            }
        }
        if n == 0 {
            break;
        }
    }

    let response = format!(
        "HTTP/1.1 {status_line}\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{body}",
        body.len()
    );
    stream.write_all(response.as_bytes()).await.unwrap();
    stream.flush().await.unwrap();
}

fn client_for(url: String) -> TransformerClient {
    TransformerClient::new(&TransformerConfig {
        url,
        timeout_secs: 2,
        max_retries: 0,
    })
    .unwrap()
}

#[tokio::test]
async fn test_router_transform_round_trip() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let url = format!("http://{}", listener.local_addr().unwrap());

    let body = json!({
        "output": [{
            "payload": {"rewritten": true},
            "metadata": [{"job_id": 42, "attempt_num": 1, "user_id": "u1", "workspace_id": "ws-1"}],
            "status_code": 200
        }]
    })
    .to_string();
    let server = tokio::spawn(serve_once(listener, "200 OK", body));

    let client = client_for(url);
    let outputs = client
        .router_transform(&[input(42, "u1")], &json!({"destination_id": "dst-1"}))
        .await
        .unwrap();

    assert_eq!(outputs.len(), 1);
    assert_eq!(outputs[0].metadata[0].job_id, 42);
    assert_eq!(outputs[0].payload["rewritten"], true);
    server.await.unwrap();
}

#[tokio::test]
async fn test_non_2xx_is_semantic_failure() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let url = format!("http://{}", listener.local_addr().unwrap());
    let server = tokio::spawn(serve_once(listener, "400 Bad Request", "bad input".to_string()));

    let client = client_for(url);
    let result = client.router_transform(&[input(1, "u1")], &json!({})).await;

    match result {
        Err(TransformerError::Status { status, body }) => {
            assert_eq!(status, 400);
            assert_eq!(body, "bad input");
        }
        other => panic!("unexpected: {other:?}"),
    }
    server.await.unwrap();
}

#[tokio::test]
async fn test_unreachable_transformer_is_transient() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let url = format!("http://{}", listener.local_addr().unwrap());
    drop(listener);

    let client = client_for(url);
    let result = client.batch_transform(&[input(1, "u1")], &json!({})).await;

    let err = result.unwrap_err();
    assert!(err.is_transient(), "expected transient error, got {err:?}");
}

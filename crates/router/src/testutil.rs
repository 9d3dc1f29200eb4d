//! Shared test helpers: scripted adapter, job builders, fast configs and
//! a minimal transformer stub.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{Duration as ChronoDuration, Utc};
use ferry_adapters::{DeliveryResponse, DestinationAdapter};
use ferry_config::{DestinationConfig, DestinationDefinition, RouterConfig, WebhookSettings};
use ferry_jobstore::MemoryJobStore;
use ferry_protocol::{Job, JobId, JobParameters, JobStatus};
use ferry_tenants::TenantStats;
use parking_lot::Mutex;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use uuid::Uuid;

use crate::metrics::RouterMetrics;
use crate::policy::RetryPolicy;
use crate::types::{DispatchMode, RouterContext};

pub(crate) const DEST_ID: &str = "dst-1";
pub(crate) const DEST_TYPE: &str = "WEBHOOK";

/// Adapter answering from a scripted response queue
///
/// Responses pop in order; when the script runs dry the default response
/// (200) answers. Every payload is recorded for assertions.
#[derive(Debug)]
pub(crate) struct MockAdapter {
    responses: Mutex<VecDeque<DeliveryResponse>>,
    sent: Mutex<Vec<Vec<u8>>>,
}

impl MockAdapter {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self {
            responses: Mutex::new(VecDeque::new()),
            sent: Mutex::new(Vec::new()),
        })
    }

    pub(crate) fn push_response(&self, response: DeliveryResponse) {
        self.responses.lock().push_back(response);
    }

    pub(crate) fn push_status(&self, status_code: u16) {
        self.push_response(DeliveryResponse::new(status_code, "", ""));
    }

    /// Payloads handed to the adapter, in call order
    pub(crate) fn sent(&self) -> Vec<Vec<u8>> {
        self.sent.lock().clone()
    }

    pub(crate) fn send_count(&self) -> usize {
        self.sent.lock().len()
    }
}

#[async_trait]
impl DestinationAdapter for MockAdapter {
    fn name(&self) -> &'static str {
        "mock"
    }

    async fn send(&self, payload: &[u8], _timeout: Duration) -> DeliveryResponse {
        self.sent.lock().push(payload.to_vec());
        self.responses
            .lock()
            .pop_front()
            .unwrap_or_else(DeliveryResponse::success)
    }
}

/// Router config with test-friendly timings
pub(crate) fn test_config() -> RouterConfig {
    RouterConfig {
        num_workers: 1,
        worker_queue_size: 100,
        batch_size: 20,
        batch_timeout_ms: 10,
        router_timeout_ms: 3_600_000,
        max_failed_count: 3,
        retry_time_window_secs: 3_600,
        job_retention_secs: 86_400,
        min_retry_backoff_secs: 0,
        max_retry_backoff_secs: 300,
        throttle_delay_secs: 30,
        read_sleep_ms: 20,
        pickup_flush_threshold: 1,
        max_status_update_wait_ms: 20,
        ..RouterConfig::default()
    }
}

pub(crate) fn test_destination() -> DestinationConfig {
    DestinationConfig {
        id: DEST_ID.to_string(),
        name: "test destination".to_string(),
        enabled: true,
        transform_mode: None,
        definition: DestinationDefinition::Webhook(WebhookSettings {
            endpoint: "https://events.example.com".to_string(),
            ..Default::default()
        }),
    }
}

/// A webhook job ready for pickup
pub(crate) fn make_job(id: i64, user: &str, workspace: &str) -> Job {
    let created = Utc::now();
    Job {
        id: JobId(id),
        uuid: Uuid::new_v4(),
        user_id: user.to_string(),
        workspace_id: workspace.to_string(),
        custom_val: DEST_TYPE.to_string(),
        created_at: created,
        expire_at: created,
        payload: Bytes::from(format!("{{\"job\":{id}}}")),
        parameters: JobParameters {
            source_id: "src-1".to_string(),
            destination_id: DEST_ID.to_string(),
            message_id: format!("m-{id}"),
            ..Default::default()
        },
        last_status: JobStatus::initial(JobId(id), workspace),
    }
}

/// Same job, created in the past
pub(crate) fn make_job_aged(id: i64, user: &str, workspace: &str, age_hours: i64) -> Job {
    let mut job = make_job(id, user, workspace);
    job.created_at = Utc::now() - ChronoDuration::hours(age_hours);
    job
}

pub(crate) struct ContextBuilder {
    pub adapter: Arc<MockAdapter>,
    pub store: Arc<MemoryJobStore>,
    pub error_store: Arc<MemoryJobStore>,
    pub config: RouterConfig,
    pub mode: DispatchMode,
    pub transformer_url: Option<String>,
}

impl ContextBuilder {
    pub(crate) fn new() -> Self {
        Self {
            adapter: MockAdapter::new(),
            store: Arc::new(MemoryJobStore::new()),
            error_store: Arc::new(MemoryJobStore::new()),
            config: test_config(),
            mode: DispatchMode::Raw,
            transformer_url: None,
        }
    }

    pub(crate) fn build(&self) -> Arc<RouterContext> {
        let transformer = self.transformer_url.as_ref().map(|url| {
            ferry_transformer::TransformerClient::new(&ferry_config::TransformerConfig {
                url: url.clone(),
                timeout_secs: 2,
                max_retries: 0,
            })
            .unwrap()
        });

        Arc::new(RouterContext {
            dest_type: DEST_TYPE.to_string(),
            destination: test_destination(),
            destination_value: serde_json::json!({"id": DEST_ID}),
            mode: self.mode,
            adapter: self.adapter.clone(),
            transformer,
            policy: RetryPolicy::from_config(&self.config),
            store: self.store.clone(),
            error_store: self.error_store.clone(),
            tenants: Arc::new(TenantStats::new(DEST_TYPE)),
            metrics: Arc::new(RouterMetrics::new()),
            config: self.config.clone(),
        })
    }
}

/// Minimal transformer stub: answers every request with the same body
pub(crate) async fn spawn_transformer_stub(body: String) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let url = format!("http://{}", listener.local_addr().unwrap());

    tokio::spawn(async move {
        loop {
            let Ok((mut stream, _)) = listener.accept().await else {
                break;
            };
            let body = body.clone();
            tokio::spawn(async move {
                let mut buf = vec![0u8; 64 * 1024];
                let mut read = 0;
                loop {
                    let Ok(n) = stream.read(&mut buf[read..]).await else {
                        return;
                    };
                    read += n;
                    let text = String::from_utf8_lossy(&buf[..read]);
                    if let Some(header_end) = text.find("\r\n\r\n") {
                        let content_length = text
                            .lines()
                            .find_map(|l| {
                                l.to_ascii_lowercase()
                                    .strip_prefix("content-length:")
                                    .map(|v| v.trim().parse::<usize>().unwrap_or(0))
                            })
                            .unwrap_or(0);
                        if read >= header_end + 4 + content_length {
                            break;
                        }
                    }
                    if n == 0 {
                        return;
                    }
                }
                let response = format!(
                    "HTTP/1.1 200 OK\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{}",
                    body.len(),
                    body
                );
                let _ = stream.write_all(response.as_bytes()).await;
                let _ = stream.flush().await;
            });
        }
    });

    url
}

/// Poll until `predicate` holds or the timeout expires
pub(crate) async fn wait_for<F>(timeout: Duration, mut predicate: F)
where
    F: FnMut() -> bool,
{
    let deadline = tokio::time::Instant::now() + timeout;
    loop {
        if predicate() {
            return;
        }
        if tokio::time::Instant::now() >= deadline {
            panic!("condition not reached within {timeout:?}");
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

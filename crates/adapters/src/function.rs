//! Function adapter - serverless function invocation over HTTP
//!
//! Wraps each payload (or batch of payloads) in an invocation envelope and
//! posts it to the function gateway. When `batched` is set the whole batch
//! travels as one invocation, matching destinations that bill per call.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;

use ferry_config::FunctionSettings;

use crate::common::{AdapterMetrics, DeliveryResponse};
use crate::error::AdapterError;
use crate::{DestinationAdapter, Result};

/// Function-invoke destination adapter
pub struct FunctionAdapter {
    client: reqwest::Client,
    url: String,
    function_name: String,
    batched: bool,
    metrics: AdapterMetrics,
}


impl FunctionAdapter {
    /// Build the adapter, validating the gateway URL
    pub fn new(settings: &FunctionSettings) -> Result<Self> {
        reqwest::Url::parse(&settings.url)
            .map_err(|e| AdapterError::config(format!("function url: {e}")))?;

        let client = reqwest::Client::builder()
            .pool_idle_timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| AdapterError::config(e.to_string()))?;

        Ok(Self {
            client,
            url: settings.url.clone(),
            function_name: settings.function_name.clone(),
            batched: settings.batched,
            metrics: AdapterMetrics::new(),
        })
    }

    /// Whether this destination invokes batches rather than single events
    #[inline]
    pub fn is_batched(&self) -> bool {
        self.batched
    }

    /// Delivery counters
    pub fn metrics(&self) -> &AdapterMetrics {
        &self.metrics
    }

    async fn invoke(&self, envelope: serde_json::Value, timeout: Duration) -> DeliveryResponse {
        let request = self
            .client
            .post(&self.url)
            .timeout(timeout)
            .json(&envelope);

        let response = match request.send().await {
            Ok(r) => r,
            Err(e) if e.is_timeout() => return DeliveryResponse::timeout(),
            Err(e) => return DeliveryResponse::transport_error(e.to_string()),
        };

        let status = response.status().as_u16();
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("")
            .to_string();
        let body = response.text().await.unwrap_or_default();
        DeliveryResponse::new(status, body, content_type)
    }

    fn payload_value(payload: &[u8]) -> serde_json::Value {
        serde_json::from_slice(payload)
            .unwrap_or_else(|_| serde_json::Value::String(String::from_utf8_lossy(payload).into()))
    }
}

#[async_trait]
impl DestinationAdapter for FunctionAdapter {
    fn name(&self) -> &'static str {
        "function"
    }

    async fn send(&self, payload: &[u8], timeout: Duration) -> DeliveryResponse {
        self.metrics.record_attempt(payload.len() as u64);

        let envelope = serde_json::json!({
            "function": self.function_name,
            "event": Self::payload_value(payload),
        });
        let response = self.invoke(envelope, timeout).await;
        self.metrics.record_outcome(response.is_success());
        response
    }

    async fn send_batch(&self, payloads: &[&[u8]], timeout: Duration) -> DeliveryResponse {
        if !self.batched {
            // fall back to one invocation per payload
            for payload in payloads {
                let response = self.send(payload, timeout).await;
                if !response.is_success() {
                    return response;
                }
            }
            return DeliveryResponse::success();
        }

        let total: u64 = payloads.iter().map(|p| p.len() as u64).sum();
        self.metrics.record_attempt(total);

        let events: Vec<serde_json::Value> =
            payloads.iter().map(|p| Self::payload_value(p)).collect();
        let envelope = serde_json::json!({
            "function": self.function_name,
            "events": events,
        });
        let response = self.invoke(envelope, timeout).await;
        self.metrics.record_outcome(response.is_success());
        response
    }
}

impl std::fmt::Debug for FunctionAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FunctionAdapter")
            .field("url", &self.url)
            .field("function_name", &self.function_name)
            .field("batched", &self.batched)
            .finish()
    }
}

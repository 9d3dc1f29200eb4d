//! Webhook adapter - plain HTTP/REST delivery
//!
//! Owns a pooled `reqwest` client. Each send is one request; retries are
//! the router's business, not the adapter's.

use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use reqwest::Method;

use ferry_config::WebhookSettings;

use crate::common::{AdapterMetrics, DeliveryResponse};
use crate::error::AdapterError;
use crate::{DestinationAdapter, Result};

/// HTTP/REST destination adapter
pub struct WebhookAdapter {
    client: reqwest::Client,
    endpoint: String,
    method: Method,
    headers: HeaderMap,
    metrics: AdapterMetrics,
}

impl WebhookAdapter {
    /// Build the adapter, validating endpoint, method and headers
    pub fn new(settings: &WebhookSettings) -> Result<Self> {
        reqwest::Url::parse(&settings.endpoint)
            .map_err(|e| AdapterError::config(format!("webhook endpoint: {e}")))?;

        let method = match &settings.method {
            Some(m) => Method::from_str(m)
                .map_err(|_| AdapterError::config(format!("webhook method: {m}")))?,
            None => Method::POST,
        };

        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        for (name, value) in &settings.headers {
            let name = HeaderName::from_str(name)
                .map_err(|_| AdapterError::config(format!("webhook header name: {name}")))?;
            let value = HeaderValue::from_str(value)
                .map_err(|_| AdapterError::config(format!("webhook header value for {name}")))?;
            headers.insert(name, value);
        }
        if let Some(token) = &settings.auth_token {
            let value = HeaderValue::from_str(&format!("Bearer {token}"))
                .map_err(|_| AdapterError::config("webhook auth token"))?;
            headers.insert(AUTHORIZATION, value);
        }

        let client = reqwest::Client::builder()
            .pool_idle_timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| AdapterError::config(e.to_string()))?;

        Ok(Self {
            client,
            endpoint: settings.endpoint.clone(),
            method,
            headers,
            metrics: AdapterMetrics::new(),
        })
    }

    /// Delivery counters
    pub fn metrics(&self) -> &AdapterMetrics {
        &self.metrics
    }
}

#[async_trait]
impl DestinationAdapter for WebhookAdapter {
    fn name(&self) -> &'static str {
        "webhook"
    }

    async fn send(&self, payload: &[u8], timeout: Duration) -> DeliveryResponse {
        self.metrics.record_attempt(payload.len() as u64);

        let request = self
            .client
            .request(self.method.clone(), &self.endpoint)
            .headers(self.headers.clone())
            .timeout(timeout)
            .body(payload.to_vec());

        let response = match request.send().await {
            Ok(r) => r,
            Err(e) if e.is_timeout() => {
                self.metrics.record_outcome(false);
                return DeliveryResponse::timeout();
            }
            Err(e) => {
                self.metrics.record_outcome(false);
                return DeliveryResponse::transport_error(e.to_string());
            }
        };

        let status = response.status().as_u16();
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("")
            .to_string();
        let body = response.text().await.unwrap_or_default();

        self.metrics.record_outcome((200..300).contains(&status));
        DeliveryResponse::new(status, body, content_type)
    }
}

impl std::fmt::Debug for WebhookAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WebhookAdapter")
            .field("endpoint", &self.endpoint)
            .field("method", &self.method)
            .finish()
    }
}

//! Object stores and the object-store-put adapter
//!
//! [`ObjectStore`] is the seam the batch flavor and the error stash write
//! through. Two implementations: a filesystem store for dev/test and an
//! HTTP store for S3-compatible endpoints.

use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use chrono::Utc;
use uuid::Uuid;

use ferry_config::ObjectStoreSettings;

use crate::common::{AdapterMetrics, DeliveryResponse};
use crate::error::AdapterError;
use crate::{DestinationAdapter, Result};

/// Durable blob storage seam
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Store `data` under `key`, returning the object's location
    async fn put(&self, key: &str, data: Bytes) -> Result<String>;

    /// Provider name for logging
    fn provider(&self) -> &'static str;
}

/// Filesystem-backed object store
///
/// Keys map to paths under `root`; parent directories are created on
/// demand.
pub struct LocalObjectStore {
    root: PathBuf,
}

impl LocalObjectStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

#[async_trait]
impl ObjectStore for LocalObjectStore {
    async fn put(&self, key: &str, data: Bytes) -> Result<String> {
        let path = self.root.join(key);
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&path, &data).await?;
        Ok(path.display().to_string())
    }

    fn provider(&self) -> &'static str {
        "local"
    }
}

/// HTTP PUT object store for S3-compatible endpoints
pub struct HttpObjectStore {
    client: reqwest::Client,
    base_url: String,
}

impl HttpObjectStore {
    pub fn new(base_url: impl Into<String>) -> Result<Self> {
        let base_url = base_url.into();
        reqwest::Url::parse(&base_url)
            .map_err(|e| AdapterError::config(format!("object store endpoint: {e}")))?;
        let client = reqwest::Client::builder()
            .build()
            .map_err(|e| AdapterError::config(e.to_string()))?;
        Ok(Self { client, base_url })
    }
}

#[async_trait]
impl ObjectStore for HttpObjectStore {
    async fn put(&self, key: &str, data: Bytes) -> Result<String> {
        let url = format!("{}/{}", self.base_url.trim_end_matches('/'), key);
        let response = self
            .client
            .put(&url)
            .timeout(Duration::from_secs(60))
            .body(data)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    AdapterError::Timeout
                } else {
                    AdapterError::transport(e.to_string())
                }
            })?;

        if !response.status().is_success() {
            return Err(AdapterError::transport(format!(
                "object store put returned {}",
                response.status()
            )));
        }
        Ok(url)
    }

    fn provider(&self) -> &'static str {
        "http"
    }
}

/// Build an object store from its settings
pub fn build_object_store(
    provider: &str,
    endpoint: &str,
) -> Result<std::sync::Arc<dyn ObjectStore>> {
    match provider {
        "local" => Ok(std::sync::Arc::new(LocalObjectStore::new(endpoint))),
        "http" => Ok(std::sync::Arc::new(HttpObjectStore::new(endpoint)?)),
        other => Err(AdapterError::config(format!(
            "unknown object store provider: {other}"
        ))),
    }
}

/// Destination adapter that uploads payloads as objects
///
/// Used by the batch flavor: each `send_batch` becomes one dated object
/// holding newline-delimited payloads.
pub struct ObjectStorePutAdapter {
    store: std::sync::Arc<dyn ObjectStore>,
    bucket: String,
    prefix: String,
    metrics: AdapterMetrics,
}

impl std::fmt::Debug for ObjectStorePutAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ObjectStorePutAdapter")
            .field("bucket", &self.bucket)
            .field("prefix", &self.prefix)
            .finish()
    }
}

impl ObjectStorePutAdapter {
    /// Build the adapter and its backing store
    pub fn new(settings: &ObjectStoreSettings) -> Result<Self> {
        if settings.bucket.is_empty() {
            return Err(AdapterError::config("object store bucket must not be empty"));
        }
        let store = build_object_store(&settings.provider, &settings.endpoint)?;
        Ok(Self {
            store,
            bucket: settings.bucket.clone(),
            prefix: settings.prefix.clone(),
            metrics: AdapterMetrics::new(),
        })
    }

    /// Adapter over an existing store (test seam)
    pub fn with_store(
        store: std::sync::Arc<dyn ObjectStore>,
        bucket: impl Into<String>,
        prefix: impl Into<String>,
    ) -> Self {
        Self {
            store,
            bucket: bucket.into(),
            prefix: prefix.into(),
            metrics: AdapterMetrics::new(),
        }
    }

    /// Delivery counters
    pub fn metrics(&self) -> &AdapterMetrics {
        &self.metrics
    }

    fn object_key(&self) -> String {
        let date = Utc::now().format("%Y-%m-%d");
        let prefix = if self.prefix.is_empty() {
            String::new()
        } else {
            format!("{}/", self.prefix.trim_matches('/'))
        };
        format!("{}/{}{}/{}.jsonl", self.bucket, prefix, date, Uuid::new_v4())
    }

    async fn upload(&self, body: Vec<u8>, timeout: Duration) -> DeliveryResponse {
        let key = self.object_key();
        let upload = tokio::time::timeout(timeout, self.store.put(&key, Bytes::from(body)));
        match upload.await {
            Ok(Ok(location)) => {
                self.metrics.record_outcome(true);
                DeliveryResponse::new(200, location, "text/plain")
            }
            Ok(Err(AdapterError::Timeout)) | Err(_) => {
                self.metrics.record_outcome(false);
                DeliveryResponse::timeout()
            }
            Ok(Err(e)) => {
                self.metrics.record_outcome(false);
                DeliveryResponse::transport_error(e.to_string())
            }
        }
    }
}

#[async_trait]
impl DestinationAdapter for ObjectStorePutAdapter {
    fn name(&self) -> &'static str {
        "object_store"
    }

    async fn send(&self, payload: &[u8], timeout: Duration) -> DeliveryResponse {
        self.metrics.record_attempt(payload.len() as u64);
        self.upload(payload.to_vec(), timeout).await
    }

    async fn send_batch(&self, payloads: &[&[u8]], timeout: Duration) -> DeliveryResponse {
        let total: u64 = payloads.iter().map(|p| p.len() as u64).sum();
        self.metrics.record_attempt(total);

        let mut body = Vec::with_capacity(total as usize + payloads.len());
        for payload in payloads {
            body.extend_from_slice(payload);
            body.push(b'\n');
        }
        self.upload(body, timeout).await
    }
}

#[cfg(test)]
#[path = "objectstore_test.rs"]
mod objectstore_test;

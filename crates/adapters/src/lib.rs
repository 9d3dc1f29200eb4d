//! Ferry - Destination Adapters
//!
//! Encapsulates per-destination delivery behind one capability set:
//! `send`, `send_batch`, `close`. Workers drive the retry/abort policy off
//! the uniform [`DeliveryResponse`] an adapter returns; transport failures
//! never escape as errors, they are mapped to HTTP-like status codes
//! (connection error → 500, timeout → 504, rate limit → 429).
//!
//! # Variants
//!
//! - [`WebhookAdapter`] - plain HTTP/REST delivery
//! - [`BrokerAdapter`] - streaming broker producer over length-prefixed TCP
//! - [`FunctionAdapter`] - serverless function invocation
//! - [`ObjectStorePutAdapter`] - object-store upload for the batch flavor
//!
//! # Registry
//!
//! [`AdapterRegistry`] maps definition names to factories. Unknown names
//! fail at router startup, not mid-loop.

mod broker;
mod common;
mod error;
mod function;
mod objectstore;
mod registry;
mod webhook;

pub use broker::BrokerAdapter;
pub use common::{AdapterMetrics, DeliveryResponse, ResponseClass};
pub use error::AdapterError;
pub use function::FunctionAdapter;
pub use objectstore::{
    build_object_store, HttpObjectStore, LocalObjectStore, ObjectStore, ObjectStorePutAdapter,
};
pub use registry::{default_registry, AdapterFactory, AdapterRegistry};
pub use webhook::WebhookAdapter;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

/// Result type for adapter operations
pub type Result<T> = std::result::Result<T, AdapterError>;

/// Uniform delivery capability implemented by every adapter
///
/// Implementations must be safe to call concurrently; adapters either
/// share a connection pool or guard a single connection internally.
#[async_trait]
pub trait DestinationAdapter: std::fmt::Debug + Send + Sync {
    /// Adapter kind name for logging and metrics
    fn name(&self) -> &'static str;

    /// Deliver one payload, bounded by `timeout`
    async fn send(&self, payload: &[u8], timeout: Duration) -> DeliveryResponse;

    /// Deliver several payloads in one call
    ///
    /// The default implementation sends sequentially and returns the first
    /// non-success response, so partial batches surface as retryable.
    async fn send_batch(&self, payloads: &[&[u8]], timeout: Duration) -> DeliveryResponse {
        for payload in payloads {
            let response = self.send(payload, timeout).await;
            if !response.is_success() {
                return response;
            }
        }
        DeliveryResponse::success()
    }

    /// Release connections and flush buffered state
    async fn close(&self) {}
}

/// Shared handle to an adapter
pub type SharedAdapter = Arc<dyn DestinationAdapter>;

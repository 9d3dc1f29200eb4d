//! Broker adapter - streaming broker producer
//!
//! Writes length-prefixed frames over a persistent TCP connection to a
//! broker frontend:
//!
//! ```text
//! [4 bytes: frame length (big-endian)]
//! [2 bytes: topic length (big-endian)][topic bytes][payload bytes]
//! ```
//!
//! The connection is guarded by a mutex and invalidated on write failure,
//! so the next send reconnects. "Leader not available" style connect
//! failures surface as 503, which the policy treats as retryable.

use std::time::Duration;

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tokio::time::timeout;

use ferry_config::BrokerSettings;

use crate::common::{AdapterMetrics, DeliveryResponse};
use crate::error::AdapterError;
use crate::{DestinationAdapter, Result};

const DEFAULT_CONNECTION_TIMEOUT: Duration = Duration::from_secs(10);

/// Streaming broker destination adapter
pub struct BrokerAdapter {
    address: String,
    topic: String,
    connection_timeout: Duration,
    connection: Mutex<Option<TcpStream>>,
    metrics: AdapterMetrics,
}

impl BrokerAdapter {
    /// Build the adapter, validating address and topic
    pub fn new(settings: &BrokerSettings) -> Result<Self> {
        if settings.address.is_empty() {
            return Err(AdapterError::config("broker address must not be empty"));
        }
        if settings.topic.is_empty() {
            return Err(AdapterError::config("broker topic must not be empty"));
        }
        if settings.topic.len() > u16::MAX as usize {
            return Err(AdapterError::config("broker topic too long"));
        }

        Ok(Self {
            address: settings.address.clone(),
            topic: settings.topic.clone(),
            connection_timeout: settings
                .connection_timeout_secs
                .map(Duration::from_secs)
                .unwrap_or(DEFAULT_CONNECTION_TIMEOUT),
            connection: Mutex::new(None),
            metrics: AdapterMetrics::new(),
        })
    }

    /// Delivery counters
    pub fn metrics(&self) -> &AdapterMetrics {
        &self.metrics
    }

    async fn connect(&self, conn: &mut Option<TcpStream>) -> Result<()> {
        match timeout(self.connection_timeout, TcpStream::connect(&self.address)).await {
            Ok(Ok(stream)) => {
                if let Err(e) = stream.set_nodelay(true) {
                    tracing::debug!(error = %e, "failed to set TCP_NODELAY on broker connection");
                }
                self.metrics.record_reconnect();
                tracing::debug!(address = %self.address, "connected to broker");
                *conn = Some(stream);
                Ok(())
            }
            Ok(Err(e)) => Err(AdapterError::transport(format!(
                "broker connect to {}: {e}",
                self.address
            ))),
            Err(_) => Err(AdapterError::Timeout),
        }
    }

    fn frame(&self, payload: &[u8]) -> Vec<u8> {
        let body_len = 2 + self.topic.len() + payload.len();
        let mut frame = Vec::with_capacity(4 + body_len);
        frame.extend_from_slice(&(body_len as u32).to_be_bytes());
        frame.extend_from_slice(&(self.topic.len() as u16).to_be_bytes());
        frame.extend_from_slice(self.topic.as_bytes());
        frame.extend_from_slice(payload);
        frame
    }

    async fn write_frame(&self, frame: &[u8], write_timeout: Duration) -> Result<()> {
        let mut conn = self.connection.lock().await;

        if conn.is_none() {
            self.connect(&mut conn).await?;
        }
        let stream = conn.as_mut().ok_or(AdapterError::transport("no broker connection"))?;

        let write = timeout(write_timeout, async {
            stream.write_all(frame).await?;
            stream.flush().await?;
            Ok::<(), std::io::Error>(())
        })
        .await;

        match write {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => {
                *conn = None;
                Err(AdapterError::transport(e.to_string()))
            }
            Err(_) => {
                *conn = None;
                Err(AdapterError::Timeout)
            }
        }
    }
}

#[async_trait]
impl DestinationAdapter for BrokerAdapter {
    fn name(&self) -> &'static str {
        "broker"
    }

    async fn send(&self, payload: &[u8], timeout: Duration) -> DeliveryResponse {
        self.metrics.record_attempt(payload.len() as u64);

        let frame = self.frame(payload);
        match self.write_frame(&frame, timeout).await {
            Ok(()) => {
                self.metrics.record_outcome(true);
                DeliveryResponse::success()
            }
            Err(AdapterError::Timeout) => {
                self.metrics.record_outcome(false);
                DeliveryResponse::timeout()
            }
            Err(e) => {
                self.metrics.record_outcome(false);
                // broker unavailable is retryable
                DeliveryResponse::new(503, e.to_string(), "text/plain")
            }
        }
    }

    async fn close(&self) {
        let mut conn = self.connection.lock().await;
        if let Some(mut stream) = conn.take() {
            let _ = stream.shutdown().await;
        }
    }
}

impl std::fmt::Debug for BrokerAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BrokerAdapter")
            .field("address", &self.address)
            .field("topic", &self.topic)
            .finish()
    }
}

#[cfg(test)]
#[path = "broker_test.rs"]
mod broker_test;

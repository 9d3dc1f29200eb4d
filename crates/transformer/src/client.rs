//! Transformer HTTP client
//!
//! Owns a pooled client against the single transformer endpoint. Transport
//! errors are retried with exponential backoff up to the configured limit;
//! semantic errors return immediately.

use std::time::Duration;

use ferry_config::TransformerConfig;
use tracing::debug;

use crate::error::TransformerError;
use crate::types::{
    DestinationJob, TransformMode, TransformRequest, TransformResponse, TransformerJob,
};
use crate::Result;

const RETRY_BASE_DELAY: Duration = Duration::from_millis(500);

/// Client for the remote user-code transformer
pub struct TransformerClient {
    client: reqwest::Client,
    url: String,
    timeout: Duration,
    max_retries: u32,
}

impl TransformerClient {
    /// Build the client, validating the endpoint URL
    pub fn new(config: &TransformerConfig) -> Result<Self> {
        reqwest::Url::parse(&config.url)
            .map_err(|e| TransformerError::Transport(format!("transformer url: {e}")))?;

        let client = reqwest::Client::builder()
            .pool_idle_timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| TransformerError::Transport(e.to_string()))?;

        Ok(Self {
            client,
            url: config.url.clone(),
            timeout: config.timeout(),
            max_retries: config.max_retries,
        })
    }

    /// `ROUTER_TRANSFORM`: N inputs → M ≥ 0 outputs
    pub async fn router_transform(
        &self,
        jobs: &[TransformerJob],
        destination: &serde_json::Value,
    ) -> Result<Vec<DestinationJob>> {
        let outputs = self.call(TransformMode::RouterTransform, jobs, destination).await?;
        validate_router_output(jobs, &outputs)?;
        Ok(outputs)
    }

    /// `BATCH`: N inputs → aggregated outputs fanning back out to inputs
    pub async fn batch_transform(
        &self,
        jobs: &[TransformerJob],
        destination: &serde_json::Value,
    ) -> Result<Vec<DestinationJob>> {
        let outputs = self.call(TransformMode::Batch, jobs, destination).await?;
        validate_batch_output(jobs, &outputs)?;
        Ok(outputs)
    }

    async fn call(
        &self,
        operation: TransformMode,
        jobs: &[TransformerJob],
        destination: &serde_json::Value,
    ) -> Result<Vec<DestinationJob>> {
        let request = TransformRequest {
            operation,
            input: jobs,
            destination,
        };

        let mut last_error = String::new();
        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                let delay = RETRY_BASE_DELAY * (1 << (attempt - 1).min(6));
                debug!(
                    operation = %operation,
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    "retrying transformer call"
                );
                tokio::time::sleep(delay).await;
            }

            match self.call_once(&request).await {
                Ok(outputs) => return Ok(outputs),
                Err(e) if e.is_transient() => {
                    last_error = e.to_string();
                    debug!(operation = %operation, attempt, error = %e, "transformer call failed");
                }
                Err(e) => return Err(e),
            }
        }

        Err(TransformerError::RetriesExhausted {
            attempts: self.max_retries + 1,
            last_error,
        })
    }

    async fn call_once(&self, request: &TransformRequest<'_>) -> Result<Vec<DestinationJob>> {
        let response = self
            .client
            .post(&self.url)
            .timeout(self.timeout)
            .json(request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    TransformerError::Timeout
                } else {
                    TransformerError::Transport(e.to_string())
                }
            })?;

        let status = response.status().as_u16();
        if !(200..300).contains(&status) {
            let body = response.text().await.unwrap_or_default();
            return Err(TransformerError::Status { status, body });
        }

        let parsed: TransformResponse = response
            .json()
            .await
            .map_err(|e| TransformerError::InvalidOutput(e.to_string()))?;
        Ok(parsed.output)
    }
}

/// Every router-transform output must reference at least one input
pub(crate) fn validate_router_output(
    _inputs: &[TransformerJob],
    outputs: &[DestinationJob],
) -> Result<()> {
    for output in outputs {
        if output.metadata.is_empty() {
            return Err(TransformerError::InvalidOutput(
                "output references no input jobs".to_string(),
            ));
        }
    }
    Ok(())
}

/// Batched outputs must cover the inputs exactly once
pub(crate) fn validate_batch_output(
    inputs: &[TransformerJob],
    outputs: &[DestinationJob],
) -> Result<()> {
    for output in outputs {
        if output.metadata.is_empty() {
            return Err(TransformerError::InvalidOutput(
                "output references no input jobs".to_string(),
            ));
        }
    }
    if outputs.iter().any(|o| o.batched) {
        let referenced: usize = outputs.iter().map(|o| o.metadata.len()).sum();
        if referenced != inputs.len() {
            return Err(TransformerError::BatchCountMismatch {
                input: inputs.len(),
                output: referenced,
            });
        }
    }
    Ok(())
}

impl std::fmt::Debug for TransformerClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransformerClient")
            .field("url", &self.url)
            .field("timeout", &self.timeout)
            .field("max_retries", &self.max_retries)
            .finish()
    }
}

#[cfg(test)]
#[path = "client_test.rs"]
mod client_test;

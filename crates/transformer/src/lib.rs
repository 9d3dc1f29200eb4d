//! Ferry - Transformer Client
//!
//! Remote RPC to the user-code transformer. One endpoint, two operations
//! selected in the request body:
//!
//! - `ROUTER_TRANSFORM` - N input jobs in, M ≥ 0 [`DestinationJob`]s out,
//!   each referencing one or more inputs with their attempt context.
//! - `BATCH` - N inputs aggregated into outputs that typically fan back
//!   out to all inputs; every referenced job shares the output's fate.
//!
//! The client owns its HTTP pool and retries transport failures a bounded
//! number of times. Semantic failures (non-2xx, malformed output, batched
//! count mismatch) are not retried; the worker maps them to a transform
//! failure for the whole batch.

mod client;
mod error;
mod types;

pub use client::TransformerClient;
pub use error::TransformerError;
pub use types::{DestinationJob, JobMetadata, TransformMode, TransformerJob};

/// Result type for transformer operations
pub type Result<T> = std::result::Result<T, TransformerError>;

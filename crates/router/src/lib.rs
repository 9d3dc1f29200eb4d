//! Ferry - Router
//!
//! The delivery engine. Per destination, a router runs:
//!
//! ```text
//!            ┌─> worker 0 ─┐
//! generator ─┼─> worker 1 ─┼─> status writer ─> job store
//!            └─> worker N ─┘         │
//!                  │                 └─> reporter
//!                  └─> transformer ─> adapter
//! ```
//!
//! - The **generator** drains the job store under per-tenant quotas,
//!   marks jobs `Executing` and hash-partitions them to workers by user
//!   id. Bounded worker channels push backpressure onto pickup.
//! - **Workers** assemble batches, call the optional remote transformer,
//!   dispatch through the destination adapter and decide each job's next
//!   state with the retry/abort policy, honoring strict per-user order.
//! - The **status writer** coalesces terminal statuses and commits them
//!   in one update-safe transaction, flushing the reporting record with
//!   each commit.
//! - The **manager** owns one router per enabled destination, classifies
//!   flavors (streaming / batch / warehouse) and runs crash recovery
//!   before anything else starts.
//!
//! Delivery is at-least-once: crash recovery resets `Executing` rows, so
//! a job delivered right before a crash may be delivered again.

mod error;
mod generator;
mod handle;
mod manager;
mod metrics;
mod policy;
mod reporting;
mod status_writer;
mod types;
mod worker;

#[cfg(test)]
pub(crate) mod testutil;

pub use error::RouterError;
pub use handle::{Router, RouterDeps, RouterHandle};
pub use manager::{classify_destination, RouterFlavor, RouterManager, TopologyEvent};
pub use metrics::{RouterMetrics, RouterMetricsSnapshot};
pub use policy::{Decision, RetryPolicy};
pub use reporting::{MemoryReporter, NoopReporter, ReportEntry, Reporter};
pub use types::{DispatchMode, RouterContext, RouterJob, StatusEntry};

/// Result type for router operations
pub type Result<T> = std::result::Result<T, RouterError>;

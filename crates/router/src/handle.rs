//! Router - one delivery engine per destination
//!
//! Wires the generator, workers and status writer for a single
//! destination and owns their lifecycle. Construction resolves the
//! adapter through the registry and builds the transformer client when
//! the destination demands one - both fail fast, before any loop starts.

use std::sync::Arc;

use ferry_adapters::AdapterRegistry;
use ferry_config::{DestinationConfig, DestinationDefinition, RouterConfig};
use ferry_jobstore::JobStore;
use ferry_tenants::TenantStats;
use ferry_transformer::TransformerClient;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::error::RouterError;
use crate::generator::Generator;
use crate::metrics::RouterMetrics;
use crate::policy::RetryPolicy;
use crate::reporting::Reporter;
use crate::status_writer::StatusWriter;
use crate::types::{DispatchMode, RouterContext};
use crate::worker::Worker;
use crate::Result;

/// Shared dependencies the manager hands to every router it builds
#[derive(Clone)]
pub struct RouterDeps {
    pub store: Arc<dyn JobStore>,
    pub error_store: Arc<dyn JobStore>,
    pub reporter: Arc<dyn Reporter>,
    pub registry: Arc<AdapterRegistry>,
    pub config: RouterConfig,
}

/// One destination's delivery engine
pub struct Router {
    ctx: Arc<RouterContext>,
    reporter: Arc<dyn Reporter>,
}

impl Router {
    /// Build a router for one destination
    ///
    /// Fails when the adapter registry does not know the definition, the
    /// adapter settings are invalid, or the transformer endpoint cannot be
    /// configured.
    pub fn new(destination: DestinationConfig, deps: RouterDeps) -> Result<Self> {
        let adapter = deps.registry.create(&destination)?;
        let mode = resolve_mode(&destination)?;

        let transformer = match mode {
            DispatchMode::RouterTransform | DispatchMode::Batch => {
                Some(TransformerClient::new(&deps.config.transformer)?)
            }
            _ => None,
        };

        let dest_type = destination.definition_name().to_string();
        let destination_value = serde_json::json!({
            "id": destination.id,
            "name": destination.name,
            "definition_name": dest_type,
        });

        let ctx = Arc::new(RouterContext {
            dest_type: dest_type.clone(),
            destination_value,
            mode,
            adapter,
            transformer,
            policy: RetryPolicy::from_config(&deps.config),
            store: deps.store,
            error_store: deps.error_store,
            tenants: Arc::new(TenantStats::new(dest_type)),
            metrics: Arc::new(RouterMetrics::new()),
            config: deps.config,
            destination,
        });

        Ok(Self {
            ctx,
            reporter: deps.reporter,
        })
    }

    /// Router over a pre-built context (test seam)
    #[cfg(test)]
    pub(crate) fn with_context(ctx: Arc<RouterContext>, reporter: Arc<dyn Reporter>) -> Self {
        Self { ctx, reporter }
    }

    /// The router's shared context (stats, metrics, config)
    pub fn context(&self) -> &Arc<RouterContext> {
        &self.ctx
    }

    /// Dispatch mode resolved for this destination
    pub fn mode(&self) -> DispatchMode {
        self.ctx.mode
    }

    /// Start the loops; the returned handle owns their lifetime
    ///
    /// Shutdown order on cancel: the generator stops picking and drops the
    /// worker senders, workers flush their batch in hand and drop the
    /// status senders, the status writer flushes and exits.
    pub fn spawn(self, cancel: CancellationToken) -> RouterHandle {
        let config = &self.ctx.config;
        info!(
            dest_type = %self.ctx.dest_type,
            destination = %self.ctx.destination.id,
            mode = ?self.ctx.mode,
            num_workers = config.num_workers,
            "router starting"
        );

        let (status_tx, status_rx) = mpsc::channel(config.worker_queue_size);

        let mut worker_txs = Vec::with_capacity(config.num_workers);
        let mut tasks = Vec::with_capacity(config.num_workers + 2);

        for id in 0..config.num_workers {
            let (tx, rx) = mpsc::channel(config.worker_queue_size);
            worker_txs.push(tx);
            let worker = Worker::new(id, Arc::clone(&self.ctx), rx, status_tx.clone());
            tasks.push(tokio::spawn(worker.run(cancel.child_token())));
        }
        // workers hold the only senders after this drop
        drop(status_tx);

        let writer = StatusWriter::new(Arc::clone(&self.ctx), Arc::clone(&self.reporter), status_rx);
        tasks.push(tokio::spawn(writer.run()));

        let generator = Generator::new(Arc::clone(&self.ctx), worker_txs);
        tasks.push(tokio::spawn(generator.run(cancel.child_token())));

        RouterHandle {
            ctx: self.ctx,
            cancel,
            tasks,
        }
    }
}

/// Handle to a running router
pub struct RouterHandle {
    ctx: Arc<RouterContext>,
    cancel: CancellationToken,
    tasks: Vec<JoinHandle<()>>,
}

impl RouterHandle {
    /// The running router's shared context
    pub fn context(&self) -> &Arc<RouterContext> {
        &self.ctx
    }

    /// Cancel the loops and wait for them to drain
    pub async fn shutdown(self) {
        self.cancel.cancel();
        for task in self.tasks {
            let _ = task.await;
        }
        self.ctx.adapter.close().await;

        let snapshot = self.ctx.metrics.snapshot();
        info!(
            dest_type = %self.ctx.dest_type,
            destination = %self.ctx.destination.id,
            picked_up = snapshot.picked_up,
            succeeded = snapshot.succeeded,
            failed = snapshot.failed,
            aborted = snapshot.aborted,
            waiting = snapshot.waiting,
            throttled = snapshot.throttled,
            "router shut down"
        );
    }
}

#[cfg(test)]
#[path = "router_test.rs"]
mod router_test;

/// Resolve the dispatch mode from the destination's definition and its
/// transform setting
fn resolve_mode(destination: &DestinationConfig) -> Result<DispatchMode> {
    if matches!(destination.definition, DestinationDefinition::ObjectStore(_)) {
        return Ok(DispatchMode::BatchUpload);
    }
    match destination.transform_mode.as_deref() {
        None => Ok(DispatchMode::Raw),
        Some("router") => Ok(DispatchMode::RouterTransform),
        Some("batch") => Ok(DispatchMode::Batch),
        Some(other) => Err(RouterError::UnsupportedDestination(format!(
            "unknown transform mode: {other}"
        ))),
    }
}

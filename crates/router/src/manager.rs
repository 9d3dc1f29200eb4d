//! Router manager - destination lifecycle
//!
//! Subscribes to topology events and keeps exactly one running router per
//! enabled destination. Before anything starts, crash recovery resets
//! `Executing` rows on both stores so in-flight jobs from a previous run
//! become pickable again.
//!
//! Destinations are classified by definition name: object-store and async
//! kinds get the batch flavor, warehouse kinds are acknowledged and left
//! to the warehouse engine, everything else gets a streaming router.
//! Definitions the adapter registry does not know are ignored with a
//! warning.

use std::collections::HashMap;

use ferry_config::SourceConfig;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::handle::{Router, RouterDeps, RouterHandle};
use crate::Result;

/// Destination kinds served by the batch flavor
const BATCH_DESTINATIONS: &[&str] = &["OBJECT_STORE"];

/// Destination kinds owned by the warehouse engine
const WAREHOUSE_DESTINATIONS: &[&str] = &["WAREHOUSE"];

/// Router flavor for a destination definition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouterFlavor {
    /// Per-request delivery with worker pool and transformer
    Streaming,

    /// Object-store accumulation and upload
    Batch,

    /// Out of scope here; the warehouse engine owns these
    Warehouse,
}

/// Classify a destination definition name into its router flavor
pub fn classify_destination(definition_name: &str) -> RouterFlavor {
    if WAREHOUSE_DESTINATIONS.contains(&definition_name) {
        RouterFlavor::Warehouse
    } else if BATCH_DESTINATIONS.contains(&definition_name) {
        RouterFlavor::Batch
    } else {
        RouterFlavor::Streaming
    }
}

/// One topology snapshot from the backend-config stream
#[derive(Debug, Clone, Default)]
pub struct TopologyEvent {
    pub sources: Vec<SourceConfig>,
}

impl TopologyEvent {
    pub fn new(sources: Vec<SourceConfig>) -> Self {
        Self { sources }
    }
}

/// Owns the set of destination routers
pub struct RouterManager {
    deps: RouterDeps,
}

impl RouterManager {
    pub fn new(deps: RouterDeps) -> Self {
        Self { deps }
    }

    /// Run until cancelled or the config stream closes
    ///
    /// Blocking call; routers started along the way are shut down before
    /// it returns.
    pub async fn run(
        self,
        mut topology: mpsc::Receiver<TopologyEvent>,
        cancel: CancellationToken,
    ) -> Result<()> {
        // crash recovery before any pickup can run
        self.deps.store.delete_executing().await?;
        self.deps.error_store.delete_executing().await?;
        info!("crash recovery complete, executing rows reset");

        let mut running: HashMap<String, RouterHandle> = HashMap::new();

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    info!("router manager stopping: cancelled");
                    break;
                }
                event = topology.recv() => match event {
                    Some(event) => self.reconcile(event, &mut running, &cancel),
                    None => {
                        info!("router manager stopping: config stream closed");
                        break;
                    }
                }
            }
        }

        for (destination_id, handle) in running {
            info!(destination = %destination_id, "shutting down router");
            handle.shutdown().await;
        }
        Ok(())
    }

    /// Bring the running set in line with one topology snapshot
    fn reconcile(
        &self,
        event: TopologyEvent,
        running: &mut HashMap<String, RouterHandle>,
        cancel: &CancellationToken,
    ) {
        let mut enabled: HashMap<String, ferry_config::DestinationConfig> = HashMap::new();
        for source in event.sources.iter().filter(|s| s.enabled) {
            for destination in source.destinations.iter().filter(|d| d.enabled) {
                enabled
                    .entry(destination.id.clone())
                    .or_insert_with(|| destination.clone());
            }
        }

        // spin down routers whose destination disappeared or was disabled
        let stale: Vec<String> = running
            .keys()
            .filter(|id| !enabled.contains_key(*id))
            .cloned()
            .collect();
        for destination_id in stale {
            if let Some(handle) = running.remove(&destination_id) {
                info!(destination = %destination_id, "destination disabled, stopping its router");
                tokio::spawn(handle.shutdown());
            }
        }

        // spin up routers for new destinations
        for (destination_id, destination) in enabled {
            if running.contains_key(&destination_id) {
                continue;
            }

            let definition_name = destination.definition_name();
            let flavor = classify_destination(definition_name);
            if flavor == RouterFlavor::Warehouse {
                info!(
                    destination = %destination_id,
                    definition = definition_name,
                    "warehouse destination, leaving it to the warehouse engine"
                );
                continue;
            }

            match Router::new(destination, self.deps.clone()) {
                Ok(router) => {
                    info!(
                        destination = %destination_id,
                        definition = definition_name,
                        flavor = ?flavor,
                        "starting destination router"
                    );
                    let handle = router.spawn(cancel.child_token());
                    running.insert(destination_id, handle);
                }
                Err(e) => {
                    warn!(
                        destination = %destination_id,
                        definition = definition_name,
                        error = %e,
                        "ignoring destination, router could not be built"
                    );
                }
            }
        }
    }
}

#[cfg(test)]
#[path = "manager_test.rs"]
mod manager_test;

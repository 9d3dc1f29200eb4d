//! Per-workspace delivery stats

use std::collections::HashMap;
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use tracing::debug;

use crate::moving_average::MovingAverage;
use crate::quota::{compute_quota, PickupQuota, QuotaParams};

#[derive(Debug, Default)]
pub(crate) struct WorkspaceEntry {
    /// Pending-jobs approximation (+n on pickup, -1 on terminal status)
    pub pending: i64,

    /// When the oldest still-pending work was first seen; quota tie-break
    pub pending_since: Option<DateTime<Utc>>,

    pub success: u64,
    pub failure: u64,

    /// End-to-end per-job latency in seconds
    pub latency: MovingAverage,
}

/// Per-workspace stats for one destination type
///
/// Updated concurrently by the generator (pickup counts) and the status
/// writer (outcomes, latency); reads take a consistent snapshot under the
/// same lock.
pub struct TenantStats {
    dest_type: String,
    workspaces: RwLock<HashMap<String, WorkspaceEntry>>,
}

impl TenantStats {
    pub fn new(dest_type: impl Into<String>) -> Self {
        Self {
            dest_type: dest_type.into(),
            workspaces: RwLock::new(HashMap::new()),
        }
    }

    /// Destination type these stats belong to
    pub fn dest_type(&self) -> &str {
        &self.dest_type
    }

    /// Record `n` jobs entering the in-memory pipeline for `workspace`
    pub fn add_pending(&self, workspace: &str, n: usize) {
        let mut map = self.workspaces.write();
        let entry = map.entry(workspace.to_string()).or_default();
        entry.pending += n as i64;
        if entry.pending_since.is_none() && entry.pending > 0 {
            entry.pending_since = Some(Utc::now());
        }
    }

    /// Record one job leaving the pipeline with a terminal or re-queued state
    pub fn remove_pending(&self, workspace: &str, n: usize) {
        let mut map = self.workspaces.write();
        if let Some(entry) = map.get_mut(workspace) {
            entry.pending = (entry.pending - n as i64).max(0);
            if entry.pending == 0 {
                entry.pending_since = None;
            }
        }
    }

    /// Fold a delivery outcome into the success/failure counters
    pub fn record_outcome(&self, workspace: &str, success: bool) {
        let mut map = self.workspaces.write();
        let entry = map.entry(workspace.to_string()).or_default();
        if success {
            entry.success += 1;
        } else {
            entry.failure += 1;
        }
    }

    /// Fold one job's end-to-end duration into the latency average
    pub fn update_latency(&self, workspace: &str, duration: Duration) {
        let mut map = self.workspaces.write();
        let entry = map.entry(workspace.to_string()).or_default();
        entry.latency.observe(duration.as_secs_f64());
    }

    /// Current pending approximation for a workspace
    pub fn pending(&self, workspace: &str) -> i64 {
        self.workspaces.read().get(workspace).map_or(0, |e| e.pending)
    }

    /// Current latency average for a workspace, in seconds
    pub fn latency_secs(&self, workspace: &str) -> f64 {
        self.workspaces
            .read()
            .get(workspace)
            .map_or(0.0, |e| e.latency.value())
    }

    /// Answer "given capacity C, how many jobs per workspace?"
    ///
    /// See [`QuotaParams`] for the knobs. Workspaces absent from the result
    /// get nothing this pickup.
    pub fn router_pickup_quota(&self, params: &QuotaParams) -> PickupQuota {
        let map = self.workspaces.read();
        let quota = compute_quota(&map, params);
        debug!(
            dest_type = %self.dest_type,
            capacity = params.total_capacity,
            workspaces = quota.per_workspace.len(),
            allocated = quota.per_workspace.values().sum::<usize>(),
            "computed pickup quota"
        );
        quota
    }
}

impl std::fmt::Debug for TenantStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let map = self.workspaces.read();
        f.debug_struct("TenantStats")
            .field("dest_type", &self.dest_type)
            .field("workspaces", &map.len())
            .finish()
    }
}

#[cfg(test)]
#[path = "stats_test.rs"]
mod stats_test;

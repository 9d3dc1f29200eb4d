//! Fair-share pickup quota
//!
//! Allocation, per pickup:
//!
//! 1. per-workspace throughput estimate = 1 / max(latency, ε)
//! 2. desired share = throughput × time window, clamped by pending count
//! 3. proportional allocation, then round-robin for the remainder,
//!    subject to capacity and the db read batch size
//! 4. ties broken oldest-pending-first
//!
//! Workspaces doing mostly failing work are scaled down by the throttle
//! factor so healthy tenants keep their share. A legacy mode hands the
//! whole capacity to every workspace (no fairness), selected by config.

use std::collections::HashMap;
use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::stats::WorkspaceEntry;

/// Latency floor for the throughput estimate
const LATENCY_EPSILON_SECS: f64 = 0.001;

/// Inputs to one quota computation
#[derive(Debug, Clone)]
pub struct QuotaParams {
    /// Free worker slots the generator wants to fill
    pub total_capacity: usize,

    /// Time window the pickup is meant to cover
    pub time_window: Duration,

    /// Upper bound imposed by the store read batch size
    pub db_batch_size: usize,

    /// Scale applied to workspaces whose recent deliveries mostly fail
    pub throttle_factor: f64,

    /// Hand the full capacity to every workspace (no fairness)
    pub legacy: bool,
}

/// One quota computation's result
#[derive(Debug, Clone, Default)]
pub struct PickupQuota {
    /// Allocated jobs per workspace; absent workspaces get 0
    pub per_workspace: HashMap<String, usize>,

    /// Desired-share score per workspace, for observability
    pub scores: HashMap<String, f64>,
}

pub(crate) fn compute_quota(
    workspaces: &HashMap<String, WorkspaceEntry>,
    params: &QuotaParams,
) -> PickupQuota {
    let capacity = params.total_capacity.min(params.db_batch_size);
    if capacity == 0 {
        return PickupQuota::default();
    }

    if params.legacy {
        let per_workspace = workspaces
            .iter()
            .filter(|(_, e)| e.pending > 0)
            .map(|(w, _)| (w.clone(), capacity))
            .collect();
        return PickupQuota {
            per_workspace,
            scores: HashMap::new(),
        };
    }

    struct Candidate<'a> {
        workspace: &'a str,
        desired: f64,
        pending: usize,
        pending_since: Option<DateTime<Utc>>,
        allocated: usize,
    }

    let window_secs = params.time_window.as_secs_f64();
    let mut candidates: Vec<Candidate<'_>> = workspaces
        .iter()
        .filter(|(_, e)| e.pending > 0)
        .map(|(workspace, entry)| {
            let throughput = 1.0 / entry.latency.value().max(LATENCY_EPSILON_SECS);
            let mut desired = (throughput * window_secs).min(entry.pending as f64);
            if mostly_failing(entry) {
                desired *= params.throttle_factor;
            }
            Candidate {
                workspace,
                desired: desired.max(0.0),
                pending: entry.pending as usize,
                pending_since: entry.pending_since,
                allocated: 0,
            }
        })
        .collect();

    // oldest-pending-first is both the remainder order and the tie-break;
    // workspace name keeps the order total
    candidates.sort_by(|a, b| {
        let a_key = a.pending_since.unwrap_or(DateTime::<Utc>::MAX_UTC);
        let b_key = b.pending_since.unwrap_or(DateTime::<Utc>::MAX_UTC);
        a_key.cmp(&b_key).then_with(|| a.workspace.cmp(b.workspace))
    });

    let total_desired: f64 = candidates.iter().map(|c| c.desired).sum();
    let mut remaining = capacity;

    if total_desired > 0.0 {
        for candidate in &mut candidates {
            let share = (capacity as f64 * candidate.desired / total_desired).floor() as usize;
            let take = share.min(candidate.pending).min(remaining);
            candidate.allocated = take;
            remaining -= take;
        }
    }

    // round-robin the remainder over workspaces that can still absorb work
    while remaining > 0 {
        let mut progressed = false;
        for candidate in &mut candidates {
            if remaining == 0 {
                break;
            }
            if candidate.allocated < candidate.pending {
                candidate.allocated += 1;
                remaining -= 1;
                progressed = true;
            }
        }
        if !progressed {
            break;
        }
    }

    let mut quota = PickupQuota::default();
    for candidate in candidates {
        quota
            .scores
            .insert(candidate.workspace.to_string(), candidate.desired);
        if candidate.allocated > 0 {
            quota
                .per_workspace
                .insert(candidate.workspace.to_string(), candidate.allocated);
        }
    }
    quota
}

fn mostly_failing(entry: &WorkspaceEntry) -> bool {
    let total = entry.success + entry.failure;
    total >= 10 && entry.failure * 2 > total
}

#[cfg(test)]
#[path = "quota_test.rs"]
mod quota_test;

//! Pickup quota tests

use std::collections::HashMap;
use std::time::Duration;

use chrono::{Duration as ChronoDuration, Utc};

use crate::quota::{compute_quota, QuotaParams};
use crate::stats::WorkspaceEntry;
use crate::MovingAverage;

fn entry(pending: i64, latency_secs: f64, pending_age_secs: i64) -> WorkspaceEntry {
    let mut latency = MovingAverage::new();
    if latency_secs > 0.0 {
        latency.observe(latency_secs);
    }
    WorkspaceEntry {
        pending,
        pending_since: (pending > 0)
            .then(|| Utc::now() - ChronoDuration::seconds(pending_age_secs)),
        success: 0,
        failure: 0,
        latency,
    }
}

fn params(capacity: usize) -> QuotaParams {
    QuotaParams {
        total_capacity: capacity,
        time_window: Duration::from_secs(1),
        db_batch_size: 10_000,
        throttle_factor: 0.5,
        legacy: false,
    }
}

#[test]
fn test_empty_workspaces_empty_quota() {
    let quota = compute_quota(&HashMap::new(), &params(10));
    assert!(quota.per_workspace.is_empty());
}

#[test]
fn test_idle_workspaces_excluded() {
    let mut workspaces = HashMap::new();
    workspaces.insert("busy".to_string(), entry(5, 0.1, 10));
    workspaces.insert("idle".to_string(), entry(0, 0.1, 0));

    let quota = compute_quota(&workspaces, &params(10));
    assert!(quota.per_workspace.contains_key("busy"));
    assert!(!quota.per_workspace.contains_key("idle"));
}

#[test]
fn test_allocation_never_exceeds_capacity() {
    let mut workspaces = HashMap::new();
    for i in 0..5 {
        workspaces.insert(format!("ws-{i}"), entry(100, 0.05, i));
    }

    let quota = compute_quota(&workspaces, &params(16));
    let total: usize = quota.per_workspace.values().sum();
    assert_eq!(total, 16);
}

#[test]
fn test_allocation_clamped_by_pending() {
    let mut workspaces = HashMap::new();
    workspaces.insert("small".to_string(), entry(3, 0.001, 10));

    let quota = compute_quota(&workspaces, &params(100));
    assert_eq!(quota.per_workspace["small"], 3);
}

#[test]
fn test_db_batch_size_caps_capacity() {
    let mut workspaces = HashMap::new();
    workspaces.insert("ws".to_string(), entry(1_000, 0.001, 10));

    let mut p = params(500);
    p.db_batch_size = 50;
    let quota = compute_quota(&workspaces, &p);
    assert_eq!(quota.per_workspace.values().sum::<usize>(), 50);
}

#[test]
fn test_faster_workspace_gets_larger_share() {
    let mut workspaces = HashMap::new();
    workspaces.insert("fast".to_string(), entry(1_000, 0.01, 10));
    workspaces.insert("slow".to_string(), entry(1_000, 1.0, 10));

    let quota = compute_quota(&workspaces, &params(100));
    let fast = quota.per_workspace.get("fast").copied().unwrap_or(0);
    let slow = quota.per_workspace.get("slow").copied().unwrap_or(0);
    assert!(fast > slow, "fast={fast} slow={slow}");
    assert!(quota.scores["fast"] > quota.scores["slow"]);
}

#[test]
fn test_equal_scores_tie_break_oldest_pending_first() {
    // capacity 1, two identical workspaces: the older pending one wins
    let mut workspaces = HashMap::new();
    workspaces.insert("young".to_string(), entry(10, 0.5, 5));
    workspaces.insert("old".to_string(), entry(10, 0.5, 500));

    let quota = compute_quota(&workspaces, &params(1));
    assert_eq!(quota.per_workspace.get("old").copied(), Some(1));
    assert!(!quota.per_workspace.contains_key("young"));
}

#[test]
fn test_mostly_failing_workspace_scaled_down() {
    let mut healthy = entry(1_000, 0.1, 10);
    healthy.success = 100;

    let mut failing = entry(1_000, 0.1, 10);
    failing.success = 2;
    failing.failure = 98;

    let mut workspaces = HashMap::new();
    workspaces.insert("healthy".to_string(), healthy);
    workspaces.insert("failing".to_string(), failing);

    let quota = compute_quota(&workspaces, &params(30));
    let healthy_share = quota.per_workspace.get("healthy").copied().unwrap_or(0);
    let failing_share = quota.per_workspace.get("failing").copied().unwrap_or(0);
    assert!(healthy_share > failing_share, "healthy={healthy_share} failing={failing_share}");
}

#[test]
fn test_legacy_mode_gives_full_capacity_to_each() {
    let mut workspaces = HashMap::new();
    workspaces.insert("a".to_string(), entry(5, 0.1, 1));
    workspaces.insert("b".to_string(), entry(5, 0.1, 2));

    let mut p = params(40);
    p.legacy = true;
    let quota = compute_quota(&workspaces, &p);
    assert_eq!(quota.per_workspace["a"], 40);
    assert_eq!(quota.per_workspace["b"], 40);
}

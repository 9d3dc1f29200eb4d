//! Tenant stats tests

use std::time::Duration;

use crate::quota::QuotaParams;
use crate::TenantStats;

fn quota_params() -> QuotaParams {
    QuotaParams {
        total_capacity: 10,
        time_window: Duration::from_secs(1),
        db_batch_size: 1_000,
        throttle_factor: 0.5,
        legacy: false,
    }
}

#[test]
fn test_pending_tracks_pickup_and_completion() {
    let stats = TenantStats::new("WEBHOOK");

    stats.add_pending("ws-1", 5);
    assert_eq!(stats.pending("ws-1"), 5);

    stats.remove_pending("ws-1", 2);
    assert_eq!(stats.pending("ws-1"), 3);

    // never goes negative; the count is an approximation
    stats.remove_pending("ws-1", 10);
    assert_eq!(stats.pending("ws-1"), 0);
}

#[test]
fn test_unknown_workspace_defaults() {
    let stats = TenantStats::new("WEBHOOK");
    assert_eq!(stats.pending("nope"), 0);
    assert_eq!(stats.latency_secs("nope"), 0.0);
}

#[test]
fn test_latency_feeds_quota() {
    let stats = TenantStats::new("WEBHOOK");
    stats.add_pending("ws-1", 100);
    stats.update_latency("ws-1", Duration::from_millis(100));
    assert!((stats.latency_secs("ws-1") - 0.1).abs() < 1e-9);

    let quota = stats.router_pickup_quota(&quota_params());
    assert_eq!(quota.per_workspace.values().sum::<usize>(), 10);
}

#[test]
fn test_quota_only_covers_pending_workspaces() {
    let stats = TenantStats::new("WEBHOOK");
    stats.add_pending("active", 4);
    stats.record_outcome("finished", true);

    let quota = stats.router_pickup_quota(&quota_params());
    assert!(quota.per_workspace.contains_key("active"));
    assert!(!quota.per_workspace.contains_key("finished"));
    assert_eq!(quota.per_workspace["active"], 4);
}

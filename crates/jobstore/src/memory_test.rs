//! In-memory store tests
//!
//! Exercises the store contract the router depends on: FIFO order,
//! quotas, payload budgets, transition enforcement and crash recovery.

use std::collections::HashMap;

use bytes::Bytes;
use chrono::{Duration, Utc};
use uuid::Uuid;

use ferry_protocol::{Job, JobId, JobParameters, JobState, JobStatus};

use crate::store::JobStore;
use crate::{GetQueryParams, MemoryJobStore};

fn make_job(id: i64, workspace: &str, payload_len: usize) -> Job {
    let created = Utc::now();
    Job {
        id: JobId(id),
        uuid: Uuid::new_v4(),
        user_id: "u1".to_string(),
        workspace_id: workspace.to_string(),
        custom_val: "WEBHOOK".to_string(),
        created_at: created,
        expire_at: created,
        payload: Bytes::from(vec![b'x'; payload_len]),
        parameters: JobParameters::default(),
        last_status: JobStatus::initial(JobId(id), workspace),
    }
}

fn status(job_id: i64, workspace: &str, state: JobState, attempt: u32) -> JobStatus {
    let mut s = JobStatus::initial(JobId(job_id), workspace);
    s.state = state;
    s.attempt = attempt;
    s
}

fn quota(entries: &[(&str, usize)]) -> HashMap<String, usize> {
    entries.iter().map(|(w, n)| (w.to_string(), *n)).collect()
}

#[tokio::test]
async fn test_unprocessed_fifo_order() {
    let store = MemoryJobStore::new();
    store.seed([make_job(30, "ws-1", 8), make_job(2, "ws-1", 8), make_job(11, "ws-1", 8)]);

    let result = store
        .get_unprocessed(GetQueryParams::for_custom_val("WEBHOOK", 10))
        .await
        .unwrap();

    let ids: Vec<i64> = result.jobs.iter().map(|j| j.id.as_i64()).collect();
    assert_eq!(ids, vec![2, 11, 30]);
    assert!(!result.limits_reached);
}

#[tokio::test]
async fn test_custom_val_filter() {
    let store = MemoryJobStore::new();
    let mut broker = make_job(1, "ws-1", 8);
    broker.custom_val = "BROKER".to_string();
    store.seed([broker, make_job(2, "ws-1", 8)]);

    let result = store
        .get_unprocessed(GetQueryParams::for_custom_val("WEBHOOK", 10))
        .await
        .unwrap();
    assert_eq!(result.jobs.len(), 1);
    assert_eq!(result.jobs[0].id, JobId(2));
}

#[tokio::test]
async fn test_workspace_quota_respected() {
    let store = MemoryJobStore::new();
    store.seed([
        make_job(1, "ws-a", 8),
        make_job(2, "ws-a", 8),
        make_job(3, "ws-a", 8),
        make_job(4, "ws-b", 8),
    ]);

    let result = store
        .get_all_jobs(
            &quota(&[("ws-a", 2), ("ws-b", 1)]),
            GetQueryParams::for_custom_val("WEBHOOK", 10),
        )
        .await
        .unwrap();

    let from_a = result.jobs.iter().filter(|j| j.workspace_id == "ws-a").count();
    assert_eq!(from_a, 2);
    assert_eq!(result.jobs.len(), 3);
}

#[tokio::test]
async fn test_workspace_without_quota_excluded() {
    let store = MemoryJobStore::new();
    store.seed([make_job(1, "ws-a", 8), make_job(2, "ws-b", 8)]);

    let result = store
        .get_all_jobs(&quota(&[("ws-a", 5)]), GetQueryParams::for_custom_val("WEBHOOK", 10))
        .await
        .unwrap();

    assert_eq!(result.jobs.len(), 1);
    assert_eq!(result.jobs[0].workspace_id, "ws-a");
}

#[tokio::test]
async fn test_empty_quota_means_unrestricted() {
    let store = MemoryJobStore::new();
    store.seed([make_job(1, "ws-a", 8), make_job(2, "ws-b", 8)]);

    let result = store
        .get_all_jobs(&HashMap::new(), GetQueryParams::for_custom_val("WEBHOOK", 10))
        .await
        .unwrap();
    assert_eq!(result.jobs.len(), 2);
}

#[tokio::test]
async fn test_payload_budget_cuts_read_short() {
    let store = MemoryJobStore::new();
    store.seed([make_job(1, "ws-1", 40), make_job(2, "ws-1", 40), make_job(3, "ws-1", 40)]);

    let mut params = GetQueryParams::for_custom_val("WEBHOOK", 10);
    params.payload_size_limit = 100;

    let result = store
        .get_all_jobs(&quota(&[("ws-1", 10)]), params)
        .await
        .unwrap();

    assert_eq!(result.jobs.len(), 2);
    assert!(result.limits_reached);
    assert!(result.payload_size <= 100);
}

#[tokio::test]
async fn test_jobs_limit_sets_limits_reached() {
    let store = MemoryJobStore::new();
    store.seed((1..=5).map(|i| make_job(i, "ws-1", 8)));

    let result = store
        .get_unprocessed(GetQueryParams::for_custom_val("WEBHOOK", 3))
        .await
        .unwrap();
    assert_eq!(result.jobs.len(), 3);
    assert!(result.limits_reached);
}

#[tokio::test]
async fn test_failed_pickable_only_after_retry_time() {
    let store = MemoryJobStore::new();
    store.seed([make_job(1, "ws-1", 8), make_job(2, "ws-1", 8)]);

    let mut due = status(1, "ws-1", JobState::Failed, 1);
    due.retry_time = Utc::now() - Duration::seconds(5);
    let mut not_due = status(2, "ws-1", JobState::Failed, 1);
    not_due.retry_time = Utc::now() + Duration::hours(1);
    store.update_job_status(vec![due, not_due], &[]).await.unwrap();

    let result = store
        .get_to_retry(GetQueryParams::for_custom_val("WEBHOOK", 10))
        .await
        .unwrap();
    assert_eq!(result.jobs.len(), 1);
    assert_eq!(result.jobs[0].id, JobId(1));

    // the pickup read applies the same rule
    let all = store
        .get_all_jobs(&quota(&[("ws-1", 10)]), GetQueryParams::for_custom_val("WEBHOOK", 10))
        .await
        .unwrap();
    assert_eq!(all.jobs.len(), 1);
}

#[tokio::test]
async fn test_throttled_and_waiting_filters() {
    let store = MemoryJobStore::new();
    store.seed([make_job(1, "ws-1", 8), make_job(2, "ws-1", 8), make_job(3, "ws-1", 8)]);

    let mut throttled = status(1, "ws-1", JobState::Throttled, 1);
    throttled.retry_time = Utc::now() - Duration::seconds(1);
    let waiting = status(2, "ws-1", JobState::Waiting, 0);
    store
        .update_job_status(vec![throttled, waiting], &[])
        .await
        .unwrap();

    let throttled = store
        .get_throttled(GetQueryParams::for_custom_val("WEBHOOK", 10))
        .await
        .unwrap();
    assert_eq!(throttled.jobs.len(), 1);
    assert_eq!(throttled.jobs[0].id, JobId(1));

    let waiting = store
        .get_waiting(GetQueryParams::for_custom_val("WEBHOOK", 10))
        .await
        .unwrap();
    assert_eq!(waiting.jobs.len(), 1);
    assert_eq!(waiting.jobs[0].id, JobId(2));

    // job 3 is unprocessed, visible only through the unprocessed filter
    let unprocessed = store
        .get_unprocessed(GetQueryParams::for_custom_val("WEBHOOK", 10))
        .await
        .unwrap();
    assert_eq!(unprocessed.jobs.len(), 1);
    assert_eq!(unprocessed.jobs[0].id, JobId(3));
}

#[tokio::test]
async fn test_picked_job_carries_current_status() {
    let store = MemoryJobStore::new();
    store.seed([make_job(1, "ws-1", 8)]);
    store
        .update_job_status(vec![status(1, "ws-1", JobState::Failed, 3)], &[])
        .await
        .unwrap();

    let result = store
        .get_to_retry(GetQueryParams::for_custom_val("WEBHOOK", 10))
        .await
        .unwrap();
    assert_eq!(result.jobs[0].last_status.attempt, 3);
    assert_eq!(result.jobs[0].last_status.state, JobState::Failed);
}

#[tokio::test]
async fn test_terminal_state_rejects_updates() {
    let store = MemoryJobStore::new();
    store.seed([make_job(1, "ws-1", 8)]);
    store
        .update_job_status(vec![status(1, "ws-1", JobState::Succeeded, 1)], &[])
        .await
        .unwrap();

    let err = store
        .update_job_status(vec![status(1, "ws-1", JobState::Executing, 1)], &[])
        .await;
    assert!(err.is_err());
    assert_eq!(store.current_state(JobId(1)), JobState::Succeeded);
}

#[tokio::test]
async fn test_update_safe_tx_commits_together() {
    let store = MemoryJobStore::new();
    store.seed([make_job(1, "ws-1", 8), make_job(2, "ws-1", 8)]);

    store
        .with_update_safe_tx(Box::new(|tx| {
            tx.update_job_status(vec![status(1, "ws-1", JobState::Succeeded, 1)], &[])?;
            tx.update_job_status(vec![status(2, "ws-1", JobState::Aborted, 1)], &[])?;
            Ok(())
        }))
        .await
        .unwrap();

    assert_eq!(store.current_state(JobId(1)), JobState::Succeeded);
    assert_eq!(store.current_state(JobId(2)), JobState::Aborted);
}

#[tokio::test]
async fn test_update_safe_tx_rolls_back_on_error() {
    let store = MemoryJobStore::new();
    store.seed([make_job(1, "ws-1", 8)]);

    let result = store
        .with_update_safe_tx(Box::new(|tx| {
            tx.update_job_status(vec![status(1, "ws-1", JobState::Succeeded, 1)], &[])?;
            Err(crate::StoreError::Tx("forced".into()))
        }))
        .await;

    assert!(result.is_err());
    assert_eq!(store.current_state(JobId(1)), JobState::NotPicked);
}

#[tokio::test]
async fn test_delete_executing_restores_prior_state() {
    let store = MemoryJobStore::new();
    store.seed([make_job(1, "ws-1", 8), make_job(2, "ws-1", 8)]);

    // job 1: failed, then picked up again (executing)
    store
        .update_job_status(vec![status(1, "ws-1", JobState::Failed, 1)], &[])
        .await
        .unwrap();
    store
        .update_job_status(vec![status(1, "ws-1", JobState::Executing, 1)], &[])
        .await
        .unwrap();
    // job 2: picked up for the first time
    store
        .update_job_status(vec![status(2, "ws-1", JobState::Executing, 0)], &[])
        .await
        .unwrap();

    store.delete_executing().await.unwrap();

    assert_eq!(store.current_state(JobId(1)), JobState::Failed);
    assert_eq!(store.current_state(JobId(2)), JobState::NotPicked);
}

#[tokio::test]
async fn test_store_assigns_ids_when_missing() {
    let store = MemoryJobStore::new();
    store.store(vec![make_job(0, "ws-1", 8), make_job(0, "ws-1", 8)]).await.unwrap();

    let ids: Vec<i64> = store.all_jobs().iter().map(|j| j.id.as_i64()).collect();
    assert_eq!(ids, vec![1, 2]);
}

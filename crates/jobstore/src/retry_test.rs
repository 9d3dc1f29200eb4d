//! Retry helper tests

use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use crate::{call_with_retries, RetrySettings, StoreError};

fn fast_settings(max_retries: u32) -> RetrySettings {
    RetrySettings {
        call_timeout: Duration::from_millis(200),
        max_retries,
        base_delay: Duration::from_millis(1),
    }
}

#[tokio::test]
async fn test_success_first_try() {
    let calls = AtomicU32::new(0);
    let result = call_with_retries(fast_settings(3), "read", || async {
        calls.fetch_add(1, Ordering::SeqCst);
        Ok::<_, StoreError>(42)
    })
    .await;

    assert_eq!(result.unwrap(), 42);
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_recovers_after_transient_failures() {
    let calls = AtomicU32::new(0);
    let result = call_with_retries(fast_settings(3), "read", || {
        let n = calls.fetch_add(1, Ordering::SeqCst);
        async move {
            if n < 2 {
                Err(StoreError::Query("connection reset".into()))
            } else {
                Ok(7)
            }
        }
    })
    .await;

    assert_eq!(result.unwrap(), 7);
    assert_eq!(calls.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn test_exhaustion_reports_attempts_and_last_error() {
    let result: Result<(), _> = call_with_retries(fast_settings(2), "write", || async {
        Err(StoreError::Query("still down".into()))
    })
    .await;

    match result {
        Err(StoreError::RetriesExhausted { attempts, last_error }) => {
            assert_eq!(attempts, 3);
            assert!(last_error.contains("still down"));
        }
        other => panic!("unexpected result: {other:?}"),
    }
}

#[tokio::test]
async fn test_timeout_counts_as_attempt() {
    let settings = RetrySettings {
        call_timeout: Duration::from_millis(10),
        max_retries: 1,
        base_delay: Duration::from_millis(1),
    };

    let result: Result<(), _> = call_with_retries(settings, "slow", || async {
        tokio::time::sleep(Duration::from_secs(5)).await;
        Ok(())
    })
    .await;

    match result {
        Err(StoreError::RetriesExhausted { attempts, last_error }) => {
            assert_eq!(attempts, 2);
            assert!(last_error.contains("timed out"));
        }
        other => panic!("unexpected result: {other:?}"),
    }
}

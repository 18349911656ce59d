//! Integration coverage for the concurrency/retry collaborator (spec §4.3): permit gating under
//! real contention and the retry/backoff loop driving an error classification it doesn't own.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use paperpost::error::{ErrorKind, OrchestratorError};
use paperpost::governor::{ConcurrencyGovernor, RetryPolicy};

/// Five tasks race for `MAX_CONCURRENT_GENERATIONS=2` permits; at no point should more than two
/// be held at once (P3).
#[tokio::test]
async fn concurrency_governor_bounds_five_racing_tasks_to_two_permits() {
    let governor = Arc::new(ConcurrencyGovernor::new(2, 5));
    let cancel = CancellationToken::new();
    let in_flight = Arc::new(AtomicUsize::new(0));
    let max_observed = Arc::new(AtomicUsize::new(0));

    let mut handles = Vec::new();
    for _ in 0..5 {
        let governor = governor.clone();
        let cancel = cancel.clone();
        let in_flight = in_flight.clone();
        let max_observed = max_observed.clone();
        handles.push(tokio::spawn(async move {
            let _permit = governor.acquire_generation(&cancel).await.unwrap();
            let now = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            max_observed.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(20)).await;
            in_flight.fetch_sub(1, Ordering::SeqCst);
        }));
    }

    for handle in handles {
        handle.await.unwrap();
    }

    assert!(max_observed.load(Ordering::SeqCst) <= 2, "observed more than 2 concurrent generation permits held");
}

/// Verification permits are a separate pool from generation permits — exhausting one never
/// blocks the other.
#[tokio::test]
async fn verification_and_generation_permits_are_independent_pools() {
    let governor = Arc::new(ConcurrencyGovernor::new(1, 1));
    let cancel = CancellationToken::new();

    let generation_permit = governor.acquire_generation(&cancel).await.unwrap();
    let verification_permit = tokio::time::timeout(Duration::from_millis(200), governor.acquire_verification(&cancel))
        .await
        .expect("verification permit must not be blocked by an outstanding generation permit")
        .unwrap();

    drop(generation_permit);
    drop(verification_permit);
}

/// The call times out twice, then succeeds on the third attempt — exactly `max_retries = 2`
/// retries observed before success.
#[tokio::test]
async fn retry_policy_recovers_after_exactly_two_retries() {
    let policy = RetryPolicy { max_retries: 2, base_delay: Duration::from_millis(1), factor: 1.0, jitter: 0.0 };
    let cancel = CancellationToken::new();
    let attempts = AtomicUsize::new(0);

    let result: Result<&'static str, OrchestratorError> = policy
        .run(&cancel, || {
            let attempt = attempts.fetch_add(1, Ordering::SeqCst);
            async move {
                if attempt < 2 {
                    Err(OrchestratorError::timeout("llm call timed out"))
                } else {
                    Ok("recovered")
                }
            }
        })
        .await;

    assert_eq!(result.unwrap(), "recovered");
    assert_eq!(attempts.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn non_retryable_errors_are_not_classified_as_retryable() {
    let err = OrchestratorError::not_found("no such task");
    assert!(!err.is_retryable());
    assert_eq!(err.kind, ErrorKind::NotFound);
}

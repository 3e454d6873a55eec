//! Unit tests for retry helper

use super::*;

use std::sync::atomic::{AtomicU32, Ordering};
use tokio::time::Instant;

fn assert_waited(start: Instant, expected: Duration) {
    let elapsed = start.elapsed();
    assert!(
        elapsed >= expected && elapsed < expected + Duration::from_millis(50),
        "waited {:?}, expected {:?}",
        elapsed,
        expected
    );
}

#[test]
fn test_retry_policy_default() {
    let policy = RetryPolicy::default();
    assert_eq!(policy.max_attempts, 3);
    assert_eq!(policy.base_delay, Duration::from_millis(1000));
    assert_eq!(policy.max_delay, Duration::MAX);
    assert_eq!(policy.multiplier, 2.0);
}

#[test]
fn test_delay_for() {
    let policy = RetryPolicy::new(5, Duration::from_millis(100));
    assert_eq!(policy.delay_for(0), Duration::from_millis(100));
    assert_eq!(policy.delay_for(1), Duration::from_millis(200));
    assert_eq!(policy.delay_for(3), Duration::from_millis(800));

    // No cap unless the caller sets one
    let policy = RetryPolicy::new(10, Duration::from_millis(1000));
    assert_eq!(policy.delay_for(6), Duration::from_secs(64));
    assert_eq!(policy.delay_for(9), Duration::from_secs(512));

    let capped = RetryPolicy {
        max_delay: Duration::from_millis(500),
        ..policy
    };
    assert_eq!(capped.delay_for(10), Duration::from_millis(500));
}

#[tokio::test(start_paused = true)]
async fn test_succeeds_after_two_failures() {
    let attempts = AtomicU32::new(0);
    let policy = RetryPolicy::new(3, Duration::from_millis(1000));
    let start = Instant::now();

    let result: Result<&str, String> = retry(&policy, || {
        let attempt = attempts.fetch_add(1, Ordering::SeqCst);
        async move {
            if attempt < 2 {
                Err(format!("failure {}", attempt))
            } else {
                Ok("stored")
            }
        }
    })
    .await;

    assert_eq!(result, Ok("stored"));
    assert_eq!(attempts.load(Ordering::SeqCst), 3);
    // delay + 2 * delay, no wait after the successful attempt
    assert_waited(start, Duration::from_millis(3000));
}

#[tokio::test(start_paused = true)]
async fn test_always_failing_returns_last_error() {
    let attempts = AtomicU32::new(0);
    let policy = RetryPolicy::new(3, Duration::from_millis(1000));
    let start = Instant::now();

    let result: Result<(), String> = retry(&policy, || {
        let attempt = attempts.fetch_add(1, Ordering::SeqCst);
        async move { Err(format!("failure {}", attempt)) }
    })
    .await;

    assert_eq!(result, Err("failure 2".to_string()));
    assert_eq!(attempts.load(Ordering::SeqCst), 3);
    // no backoff after the final attempt
    assert_waited(start, Duration::from_millis(3000));
}

#[tokio::test(start_paused = true)]
async fn test_first_success_does_not_wait() {
    let policy = RetryPolicy::default();
    let start = Instant::now();

    let result: Result<u32, String> = retry(&policy, || async { Ok(7) }).await;

    assert_eq!(result, Ok(7));
    assert_eq!(start.elapsed(), Duration::ZERO);
}

#[tokio::test(start_paused = true)]
async fn test_retry_if_stops_on_rejected_error() {
    let attempts = AtomicU32::new(0);
    let policy = RetryPolicy::new(5, Duration::from_millis(10));

    let result: Result<(), String> = retry_if(
        &policy,
        || {
            attempts.fetch_add(1, Ordering::SeqCst);
            async { Err("fatal".to_string()) }
        },
        |error: &String| error != "fatal",
    )
    .await;

    assert_eq!(result, Err("fatal".to_string()));
    assert_eq!(attempts.load(Ordering::SeqCst), 1);
}

#[tokio::test(start_paused = true)]
async fn test_zero_attempts_runs_once() {
    let attempts = AtomicU32::new(0);
    let policy = RetryPolicy::new(0, Duration::from_millis(10));

    let result: Result<(), String> = retry(&policy, || {
        attempts.fetch_add(1, Ordering::SeqCst);
        async { Err("nope".to_string()) }
    })
    .await;

    assert!(result.is_err());
    assert_eq!(attempts.load(Ordering::SeqCst), 1);
}

//! Integration tests for the request executor
//!
//! Backoff tests run with paused tokio time, so sleeps complete instantly and
//! elapsed durations are exact.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde_json::{json, Value};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use ub_client::envelope::ResponseEnvelope;
use ub_client::error::{advice_for, ErrorKind, OperationError};
use ub_client::executor::{execute, RetryPolicy};

/// Records the instant of every attempt and replays a fixed envelope.
fn recording_attempts(
    envelope: ResponseEnvelope<Value>,
) -> (
    Arc<Mutex<Vec<Instant>>>,
    impl FnMut(u32) -> std::future::Ready<ub_client::Result<ResponseEnvelope<Value>>>,
) {
    let log = Arc::new(Mutex::new(Vec::new()));
    let recorder = Arc::clone(&log);
    let attempt = move |_: u32| {
        recorder.lock().unwrap().push(Instant::now());
        std::future::ready(Ok(envelope.clone()))
    };
    (log, attempt)
}

#[tokio::test(start_paused = true)]
async fn test_rate_limited_is_retried_with_exponential_delays() {
    let (log, attempt) =
        recording_attempts(ResponseEnvelope::failure("RATE_LIMITED", "slow down"));
    let policy = RetryPolicy::new().with_max_attempts(3);

    let err = execute(attempt, &policy, None).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::RateLimited);

    let instants = log.lock().unwrap().clone();
    assert_eq!(instants.len(), 3);
    assert_eq!(instants[1] - instants[0], Duration::from_millis(2000));
    assert_eq!(instants[2] - instants[1], Duration::from_millis(4000));
}

#[tokio::test(start_paused = true)]
async fn test_backoff_is_capped_at_max_delay() {
    let (log, attempt) =
        recording_attempts(ResponseEnvelope::failure("SERVICE_UNAVAILABLE", "down"));
    let policy = RetryPolicy::new().with_max_attempts(7);

    execute(attempt, &policy, None).await.unwrap_err();

    let instants = log.lock().unwrap().clone();
    let gaps: Vec<u64> = instants
        .windows(2)
        .map(|pair| (pair[1] - pair[0]).as_millis() as u64)
        .collect();
    assert_eq!(gaps, vec![2000, 4000, 8000, 16000, 30000, 30000]);
}

#[tokio::test(start_paused = true)]
async fn test_invalid_api_key_is_not_retried() {
    let (log, attempt) = recording_attempts(ResponseEnvelope::failure(
        "INVALID_API_KEY",
        "key rejected",
    ));

    let err = execute(attempt, &RetryPolicy::default(), None)
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::InvalidApiKey);
    assert_eq!(err.message(), "key rejected");
    assert_eq!(log.lock().unwrap().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_service_reported_abort_is_retried() {
    let (log, attempt) = recording_attempts(ResponseEnvelope::failure(
        "REQUEST_ABORTED",
        "upstream aborted",
    ));

    let err = execute(attempt, &RetryPolicy::new().with_max_attempts(3), None)
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::RequestAborted);
    assert_eq!(err.message(), "upstream aborted");
    assert_eq!(log.lock().unwrap().len(), 3);
}

#[tokio::test(start_paused = true)]
async fn test_retry_disabled_makes_one_attempt() {
    let (log, attempt) =
        recording_attempts(ResponseEnvelope::failure("INTERNAL_ERROR", "boom"));
    let policy = RetryPolicy::new().with_retry(false).with_max_attempts(5);

    let err = execute(attempt, &policy, None).await.unwrap_err();

    assert_eq!(err.kind(), ErrorKind::InternalError);
    assert_eq!(log.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn test_data_is_returned_unchanged() {
    let payload = json!({"items": [1, 2, 3], "nested": {"ok": true}, "none": null});
    let (_, attempt) = recording_attempts(ResponseEnvelope::ok(payload.clone()));

    let data = execute(attempt, &RetryPolicy::default(), None).await.unwrap();
    assert_eq!(data, payload);
}

#[tokio::test(start_paused = true)]
async fn test_slow_attempt_times_out() {
    let policy = RetryPolicy::new()
        .with_timeout(Duration::from_millis(100))
        .with_retry(false);

    let err = execute(
        |_| async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok::<_, OperationError>(ResponseEnvelope::ok(json!(1)))
        },
        &policy,
        None,
    )
    .await
    .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Timeout);
    assert_eq!(err.message(), "request timed out after 100ms");
}

#[tokio::test(start_paused = true)]
async fn test_timeouts_are_retried() {
    let started = Instant::now();
    let policy = RetryPolicy::new()
        .with_timeout(Duration::from_millis(100))
        .with_max_attempts(2);

    let data = execute(
        |attempt| async move {
            if attempt == 1 {
                tokio::time::sleep(Duration::from_secs(5)).await;
            }
            Ok::<_, OperationError>(ResponseEnvelope::ok(json!(attempt)))
        },
        &policy,
        None,
    )
    .await
    .unwrap();

    assert_eq!(data, json!(2));
    assert_eq!(started.elapsed(), Duration::from_millis(2100));
}

#[tokio::test(start_paused = true)]
async fn test_cancellation_aborts_without_retry() {
    let token = CancellationToken::new();
    let attempts = Arc::new(Mutex::new(0u32));
    let counter = Arc::clone(&attempts);

    let canceller = token.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        canceller.cancel();
    });

    let err = execute(
        move |_| {
            *counter.lock().unwrap() += 1;
            async {
                tokio::time::sleep(Duration::from_secs(10)).await;
                Ok::<_, OperationError>(ResponseEnvelope::ok(json!(null)))
            }
        },
        &RetryPolicy::default(),
        Some(&token),
    )
    .await
    .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::RequestAborted);
    assert!(!err.is_retryable());
    assert_eq!(*attempts.lock().unwrap(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_cancellation_during_backoff() {
    let token = CancellationToken::new();
    let canceller = token.clone();
    let started = Instant::now();

    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(500)).await;
        canceller.cancel();
    });

    let err = execute(
        |_| async {
            Err::<ResponseEnvelope<Value>, _>(OperationError::new(
                ErrorKind::NetworkError,
                "connection reset",
            ))
        },
        &RetryPolicy::default(),
        Some(&token),
    )
    .await
    .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::RequestAborted);
    assert_eq!(started.elapsed(), Duration::from_millis(500));
}

#[tokio::test]
async fn test_already_cancelled_token_aborts_immediately() {
    let token = CancellationToken::new();
    token.cancel();

    let err = execute(
        |_| async { Ok::<_, OperationError>(ResponseEnvelope::ok(json!("never"))) },
        &RetryPolicy::default(),
        Some(&token),
    )
    .await
    .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::RequestAborted);
}

#[tokio::test(start_paused = true)]
async fn test_last_error_is_returned_after_exhaustion() {
    let err = execute(
        |attempt| async move {
            let code = if attempt < 3 { "NETWORK_ERROR" } else { "SERVICE_UNAVAILABLE" };
            Ok::<_, OperationError>(ResponseEnvelope::<Value>::failure(code, format!("attempt {attempt}")))
        },
        &RetryPolicy::new().with_max_attempts(3),
        None,
    )
    .await
    .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::ServiceUnavailable);
    assert_eq!(err.message(), "attempt 3");
}

#[tokio::test]
async fn test_success_without_data_is_unknown() {
    let envelope: ResponseEnvelope<Value> = serde_json::from_str(r#"{"success": true}"#).unwrap();
    let (log, attempt) = recording_attempts(envelope);

    let err = execute(attempt, &RetryPolicy::new().with_retry(false), None)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Unknown);
    assert_eq!(log.lock().unwrap().len(), 1);
}

#[test]
fn test_advice_is_total_and_idempotent() {
    for kind in ErrorKind::ALL {
        let first = advice_for(kind);
        let second = advice_for(kind);
        assert_eq!(first, second, "advice for {kind} changed between calls");
        assert!(!first.suggestion.is_empty(), "{kind} has no suggestion");
    }
}

#[test]
fn test_rate_limit_advice() {
    let advice = advice_for(ErrorKind::RateLimited);
    assert!(advice.can_retry);
    assert_eq!(advice.retry_after, Some(Duration::from_secs(60)));
}

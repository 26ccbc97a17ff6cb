//! Request executor: one logical operation as a bounded series of attempts.
//!
//! Each attempt is a single physical call run under its own timeout and raced
//! against the caller's cancellation token. Attempts never overlap. Between
//! failed attempts the executor sleeps for an exponential, capped backoff,
//! unless the failure can never be fixed by retrying (bad credentials,
//! malformed requests) or the caller cancelled.
//!
//! # Example
//!
//! ```no_run
//! use serde_json::Value;
//! use ub_client::envelope::ResponseEnvelope;
//! use ub_client::error::OperationError;
//! use ub_client::executor::{execute, RetryPolicy};
//!
//! # async fn run() -> ub_client::error::Result<()> {
//! let policy = RetryPolicy::new().with_max_attempts(3);
//! let data: Value = execute(
//!     |_attempt| async { Ok::<_, OperationError>(ResponseEnvelope::ok(Value::Bool(true))) },
//!     &policy,
//!     None,
//! )
//! .await?;
//! # Ok(())
//! # }
//! ```

pub mod policy;

use std::future::Future;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::envelope::ResponseEnvelope;
use crate::error::{ErrorKind, OperationError, Result};

pub use policy::RetryPolicy;

/// Kinds the executor never retries.
pub const NON_RETRYABLE: [ErrorKind; 6] = [
    ErrorKind::Unauthorized,
    ErrorKind::Forbidden,
    ErrorKind::InvalidRequest,
    ErrorKind::InvalidUrl,
    ErrorKind::MissingApiKey,
    ErrorKind::InvalidApiKey,
];

/// Returns true if `kind` is in the non-retryable set.
pub fn is_non_retryable(kind: ErrorKind) -> bool {
    NON_RETRYABLE.contains(&kind)
}

/// Runs `attempt_fn` until it yields a successful envelope or the policy is
/// exhausted, and returns the envelope's `data` unchanged.
///
/// `attempt_fn` receives the 1-based attempt number and must perform exactly
/// one physical call. Transport failures are reported as `Err`; service
/// failures as an envelope with `success: false`.
///
/// # Errors
///
/// * `REQUEST_ABORTED` as soon as `cancel` fires, never retried.
/// * The first error whose kind is in [`NON_RETRYABLE`], without retrying.
/// * Otherwise the error of the last attempt once all attempts are used.
pub async fn execute<T, F, Fut>(
    mut attempt_fn: F,
    policy: &RetryPolicy,
    cancel: Option<&CancellationToken>,
) -> Result<T>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<ResponseEnvelope<T>>>,
{
    let attempts = policy.attempts();
    let mut last_error: Option<OperationError> = None;

    for attempt in 1..=attempts {
        tracing::debug!(attempt, attempts, "starting attempt");

        let outcome = match run_attempt(attempt_fn(attempt), policy.timeout, cancel).await {
            Attempt::Finished(outcome) => outcome.and_then(ResponseEnvelope::into_result),
            Attempt::Cancelled => {
                tracing::debug!(attempt, "request aborted by caller");
                return Err(OperationError::aborted());
            }
        };

        let error = match outcome {
            Ok(data) => return Ok(data),
            Err(error) => error,
        };

        if is_non_retryable(error.kind()) {
            tracing::debug!(attempt, kind = %error.kind(), "error is not retryable");
            return Err(error);
        }

        if attempt < attempts {
            let delay = policy.delay_for_attempt(attempt);
            tracing::warn!(
                attempt,
                attempts,
                kind = %error.kind(),
                delay_ms = delay.as_millis() as u64,
                "attempt failed, retrying"
            );
            if !backoff(delay, cancel).await {
                return Err(OperationError::aborted());
            }
        }

        last_error = Some(error);
    }

    let error = last_error.unwrap_or_else(|| {
        OperationError::new(ErrorKind::Unknown, "request finished without any attempt")
    });
    tracing::error!(attempts, kind = %error.kind(), error = %error, "request failed");
    Err(error)
}

/// How a single attempt ended.
enum Attempt<T> {
    /// The call returned, failed or timed out.
    Finished(Result<ResponseEnvelope<T>>),
    /// The caller's token fired first.
    Cancelled,
}

/// Runs one physical call bounded by `timeout` and the caller's token.
async fn run_attempt<T, Fut>(
    call: Fut,
    timeout: Duration,
    cancel: Option<&CancellationToken>,
) -> Attempt<T>
where
    Fut: Future<Output = Result<ResponseEnvelope<T>>>,
{
    let bounded = tokio::time::timeout(timeout, call);
    let outcome = match cancel {
        Some(token) => {
            tokio::select! {
                biased;
                _ = token.cancelled() => return Attempt::Cancelled,
                outcome = bounded => outcome,
            }
        }
        None => bounded.await,
    };

    match outcome {
        Ok(result) => Attempt::Finished(result),
        Err(_) => Attempt::Finished(Err(OperationError::timed_out(timeout))),
    }
}

/// Sleeps for `delay`; returns false if the caller cancelled meanwhile.
async fn backoff(delay: Duration, cancel: Option<&CancellationToken>) -> bool {
    match cancel {
        Some(token) => {
            tokio::select! {
                biased;
                _ = token.cancelled() => false,
                _ = tokio::time::sleep(delay) => true,
            }
        }
        None => {
            tokio::time::sleep(delay).await;
            true
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    #[test]
    fn test_non_retryable_set() {
        assert!(is_non_retryable(ErrorKind::InvalidApiKey));
        assert!(is_non_retryable(ErrorKind::Forbidden));
        assert!(!is_non_retryable(ErrorKind::RateLimited));
        assert!(!is_non_retryable(ErrorKind::Timeout));
        assert!(!is_non_retryable(ErrorKind::Unknown));
    }

    #[tokio::test]
    async fn test_success_on_first_attempt() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = Arc::clone(&calls);
        let data: u32 = execute(
            move |_| {
                counter.fetch_add(1, Ordering::SeqCst);
                async { Ok::<_, OperationError>(ResponseEnvelope::ok(42)) }
            },
            &RetryPolicy::default(),
            None,
        )
        .await
        .unwrap();

        assert_eq!(data, 42);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_recovers_after_transient_failure() {
        let data: &str = execute(
            |attempt| async move {
                if attempt == 1 {
                    Err(OperationError::new(ErrorKind::NetworkError, "reset"))
                } else {
                    Ok::<_, OperationError>(ResponseEnvelope::ok("done"))
                }
            },
            &RetryPolicy::default(),
            None,
        )
        .await
        .unwrap();
        assert_eq!(data, "done");
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_max_attempts_still_runs_once() {
        let err = execute(
            |_| async { Err::<ResponseEnvelope<()>, _>(OperationError::new(ErrorKind::InternalError, "boom")) },
            &RetryPolicy::new().with_max_attempts(0),
            None,
        )
        .await
        .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InternalError);
    }
}

//! Recovery advice attached to every error kind.
//!
//! The table is authored data: each [`ErrorKind`] maps to one explicit
//! [`RecoveryAdvice`] record in [`advice_for`]. The match has no wildcard arm,
//! so adding a kind without advice fails to compile.

use std::time::Duration;

use super::ErrorKind;

/// Guidance on how to recover from an error.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RecoveryAdvice {
    /// Whether retrying the same operation can succeed.
    pub can_retry: bool,
    /// Suggested minimum wait before retrying.
    pub retry_after: Option<Duration>,
    /// Other things the caller can try, most useful first.
    pub alternatives: Vec<String>,
    /// One-line human-readable suggestion.
    pub suggestion: String,
}

impl RecoveryAdvice {
    fn new(
        can_retry: bool,
        retry_after_ms: Option<u64>,
        suggestion: &str,
        alternatives: &[&str],
    ) -> Self {
        Self {
            can_retry,
            retry_after: retry_after_ms.map(Duration::from_millis),
            alternatives: alternatives.iter().map(|a| a.to_string()).collect(),
            suggestion: suggestion.to_string(),
        }
    }

    /// Returns a copy with the fields set in `overrides` replaced.
    ///
    /// Fields left as `None` keep their current value.
    pub fn merged(mut self, overrides: AdviceOverride) -> Self {
        if let Some(can_retry) = overrides.can_retry {
            self.can_retry = can_retry;
        }
        if let Some(retry_after) = overrides.retry_after {
            self.retry_after = Some(retry_after);
        }
        if let Some(alternatives) = overrides.alternatives {
            self.alternatives = alternatives;
        }
        if let Some(suggestion) = overrides.suggestion {
            self.suggestion = suggestion;
        }
        self
    }
}

/// Per-instance replacement for parts of a [`RecoveryAdvice`].
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct AdviceOverride {
    pub can_retry: Option<bool>,
    pub retry_after: Option<Duration>,
    pub alternatives: Option<Vec<String>>,
    pub suggestion: Option<String>,
}

impl AdviceOverride {
    /// An override that only replaces the retry delay.
    pub fn retry_after(delay: Duration) -> Self {
        Self {
            retry_after: Some(delay),
            ..Self::default()
        }
    }

    /// Returns true if no field is set.
    pub fn is_empty(&self) -> bool {
        self.can_retry.is_none()
            && self.retry_after.is_none()
            && self.alternatives.is_none()
            && self.suggestion.is_none()
    }
}

/// Returns the recovery advice for `kind`.
pub fn advice_for(kind: ErrorKind) -> RecoveryAdvice {
    match kind {
        ErrorKind::MissingApiKey => RecoveryAdvice::new(
            false,
            None,
            "Set an API key (ub_live_... or ub_test_...) before making requests",
            &["Set the UB_API_KEY environment variable", "Pass api_key in the client config"],
        ),
        ErrorKind::InvalidApiKey => RecoveryAdvice::new(
            false,
            None,
            "Check that the API key is complete and starts with ub_live_ or ub_test_",
            &["Copy the key again from the dashboard", "Generate a new API key"],
        ),
        ErrorKind::ExpiredApiKey => RecoveryAdvice::new(
            false,
            None,
            "The API key has expired; rotate it and retry",
            &["Generate a new API key"],
        ),
        ErrorKind::Unauthorized => RecoveryAdvice::new(
            false,
            None,
            "The service rejected the credentials",
            &["Verify the API key belongs to this environment", "Generate a new API key"],
        ),
        ErrorKind::Forbidden => RecoveryAdvice::new(
            false,
            None,
            "The API key is not allowed to perform this operation",
            &["Check the plan or permissions attached to the key"],
        ),
        ErrorKind::InvalidRequest => RecoveryAdvice::new(
            false,
            None,
            "Fix the request parameters; retrying the same request will fail again",
            &["Check required fields and their types"],
        ),
        ErrorKind::InvalidUrl => RecoveryAdvice::new(
            false,
            None,
            "Provide an absolute http(s) URL",
            &["Include the scheme, e.g. https://"],
        ),
        ErrorKind::UrlBlocked => RecoveryAdvice::new(
            false,
            None,
            "The target URL is blocked by policy",
            &["Use a different URL", "Contact support if the block looks wrong"],
        ),
        ErrorKind::Timeout => RecoveryAdvice::new(
            true,
            Some(2_000),
            "The request timed out; retry, possibly with a longer timeout",
            &["Increase timeout_ms", "Use the streaming variant for long operations"],
        ),
        ErrorKind::RequestAborted => RecoveryAdvice::new(
            false,
            None,
            "The request was cancelled by the caller",
            &["Issue the request again if it is still needed"],
        ),
        ErrorKind::RateLimited => RecoveryAdvice::new(
            true,
            Some(60_000),
            "Too many requests; wait before retrying",
            &["Reduce request concurrency", "Spread requests over time"],
        ),
        ErrorKind::QuotaExceeded => RecoveryAdvice::new(
            false,
            None,
            "The usage quota for this billing period is exhausted",
            &["Upgrade the plan", "Wait for the quota to reset"],
        ),
        ErrorKind::NotFound => RecoveryAdvice::new(
            false,
            None,
            "The requested resource does not exist",
            &["Check the path and identifiers"],
        ),
        ErrorKind::ContentBlocked => RecoveryAdvice::new(
            true,
            Some(5_000),
            "The target site blocked access to the content",
            &["Retry later", "Try a different rendering tier"],
        ),
        ErrorKind::CaptchaRequired => RecoveryAdvice::new(
            true,
            Some(10_000),
            "The target site presented a captcha",
            &["Retry later", "Try a different rendering tier"],
        ),
        ErrorKind::BotDetected => RecoveryAdvice::new(
            true,
            Some(10_000),
            "The target site detected automated access",
            &["Retry later", "Reduce request rate against this site"],
        ),
        ErrorKind::NetworkError => RecoveryAdvice::new(
            true,
            Some(1_000),
            "A network error occurred; retry shortly",
            &["Check network connectivity"],
        ),
        ErrorKind::DnsError => RecoveryAdvice::new(
            true,
            Some(5_000),
            "The host name could not be resolved",
            &["Check the base URL", "Check DNS configuration"],
        ),
        ErrorKind::TlsError => RecoveryAdvice::new(
            false,
            None,
            "The TLS handshake failed",
            &["Check the base URL scheme", "Check system certificates or proxy settings"],
        ),
        ErrorKind::ConnectionRefused => RecoveryAdvice::new(
            true,
            Some(5_000),
            "The service refused the connection",
            &["Check that the base URL and port are correct", "Check service status"],
        ),
        ErrorKind::InternalError => RecoveryAdvice::new(
            true,
            Some(2_000),
            "The service hit an internal error; retry shortly",
            &["Contact support if the error persists"],
        ),
        ErrorKind::ServiceUnavailable => RecoveryAdvice::new(
            true,
            Some(5_000),
            "The service is temporarily unavailable",
            &["Retry later", "Check service status"],
        ),
        ErrorKind::SseError => RecoveryAdvice::new(
            true,
            Some(1_000),
            "The event stream ended without a valid result",
            &["Retry the streaming request", "Use the non-streaming variant"],
        ),
        ErrorKind::HealthCheckFailed => RecoveryAdvice::new(
            true,
            Some(5_000),
            "The service health check failed",
            &["Check service status", "Verify the base URL"],
        ),
        ErrorKind::VerificationFailed => RecoveryAdvice::new(
            true,
            None,
            "The result could not be verified",
            &["Retry the operation", "Inspect the returned data manually"],
        ),
        ErrorKind::VerificationMismatch => RecoveryAdvice::new(
            false,
            None,
            "The result did not match the expected shape",
            &["Adjust the expected schema", "Inspect the returned data manually"],
        ),
        ErrorKind::Unknown => RecoveryAdvice::new(
            true,
            Some(1_000),
            "An unexpected error occurred",
            &["Retry the operation", "Enable debug logging and contact support"],
        ),
    }
}

//! The error value returned by every fallible operation in this crate.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use super::{advice_for, classify, AdviceOverride, ErrorKind, RecoveryAdvice};

/// Shared, thread-safe underlying cause of an [`OperationError`].
pub type ErrorCause = Arc<dyn std::error::Error + Send + Sync + 'static>;

/// A classified failure with recovery advice.
///
/// Built once through [`OperationError::new`] or [`OperationError::from_wire`]
/// plus the `with_*` constructors, then only read.
#[derive(Clone, Debug)]
pub struct OperationError {
    kind: ErrorKind,
    message: String,
    http_status: Option<u16>,
    advice: RecoveryAdvice,
    cause: Option<ErrorCause>,
    context: BTreeMap<String, String>,
}

impl OperationError {
    /// Creates an error of `kind` with the table advice for that kind.
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            http_status: None,
            advice: advice_for(kind),
            cause: None,
            context: BTreeMap::new(),
        }
    }

    /// Creates an error from a wire `error.code` / `error.message` pair.
    pub fn from_wire(code: &str, message: impl Into<String>) -> Self {
        let kind = classify(code);
        let error = Self::new(kind, message);
        if kind == ErrorKind::Unknown && !code.trim().is_empty() {
            error.with_context("code", code.trim())
        } else {
            error
        }
    }

    /// The error a cancelled operation resolves to.
    pub fn aborted() -> Self {
        Self::new(ErrorKind::RequestAborted, "request aborted by caller")
    }

    /// The error a timed-out attempt resolves to.
    pub fn timed_out(after: std::time::Duration) -> Self {
        Self::new(
            ErrorKind::Timeout,
            format!("request timed out after {}ms", after.as_millis()),
        )
    }

    pub fn with_http_status(mut self, status: u16) -> Self {
        self.http_status = Some(status);
        self
    }

    pub fn with_cause<E>(mut self, cause: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        self.cause = Some(Arc::new(cause));
        self
    }

    pub fn with_shared_cause(mut self, cause: ErrorCause) -> Self {
        self.cause = Some(cause);
        self
    }

    pub fn with_context(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.context.insert(key.into(), value.into());
        self
    }

    /// Replaces the parts of the table advice that `overrides` sets.
    pub fn with_advice_override(mut self, overrides: AdviceOverride) -> Self {
        self.advice = self.advice.merged(overrides);
        self
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn http_status(&self) -> Option<u16> {
        self.http_status
    }

    pub fn advice(&self) -> &RecoveryAdvice {
        &self.advice
    }

    pub fn cause(&self) -> Option<&ErrorCause> {
        self.cause.as_ref()
    }

    pub fn context(&self) -> &BTreeMap<String, String> {
        &self.context
    }

    pub fn suggestion(&self) -> &str {
        &self.advice.suggestion
    }

    pub fn alternatives(&self) -> &[String] {
        &self.advice.alternatives
    }

    /// Returns true if the attached advice says a retry can succeed.
    pub fn is_retryable(&self) -> bool {
        self.advice.can_retry
    }
}

impl fmt::Display for OperationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)
    }
}

impl std::error::Error for OperationError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.cause
            .as_deref()
            .map(|cause| cause as &(dyn std::error::Error + 'static))
    }
}

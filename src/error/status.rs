//! Classification of HTTP statuses and transport failures.
//!
//! Used when the service did not answer with an envelope carrying its own
//! `error.code`, e.g. a proxy error page, or when the request never reached
//! the service at all.

use std::sync::OnceLock;
use std::time::Duration;

use regex::Regex;

use super::{ErrorKind, OperationError};

/// Maps an HTTP status code to the closest [`ErrorKind`].
pub fn kind_for_status(status: u16) -> ErrorKind {
    match status {
        400 | 422 => ErrorKind::InvalidRequest,
        401 => ErrorKind::Unauthorized,
        403 => ErrorKind::Forbidden,
        404 | 410 => ErrorKind::NotFound,
        408 | 504 => ErrorKind::Timeout,
        429 => ErrorKind::RateLimited,
        503 => ErrorKind::ServiceUnavailable,
        500..=599 => ErrorKind::InternalError,
        _ => ErrorKind::Unknown,
    }
}

/// Parses a `Retry-After` header in its delta-seconds form.
///
/// HTTP-date values are not supported and yield `None`.
pub fn parse_retry_after(value: &str) -> Option<Duration> {
    value.trim().parse::<u64>().ok().map(Duration::from_secs)
}

/// A pattern matched against the text of a transport error chain.
struct TransportPattern {
    regex: Regex,
    kind: ErrorKind,
}

fn transport_patterns() -> &'static [TransportPattern] {
    static PATTERNS: OnceLock<Vec<TransportPattern>> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        [
            (
                r"(?i)dns|failed to lookup address|name or service not known|no such host",
                ErrorKind::DnsError,
            ),
            (r"(?i)\btls\b|certificate|handshake", ErrorKind::TlsError),
            (r"(?i)connection refused", ErrorKind::ConnectionRefused),
        ]
        .into_iter()
        .filter_map(|(pattern, kind)| {
            Regex::new(pattern)
                .ok()
                .map(|regex| TransportPattern { regex, kind })
        })
        .collect()
    })
}

/// Joins an error and all of its sources into one line.
fn error_chain_text(err: &(dyn std::error::Error + 'static)) -> String {
    let mut text = err.to_string();
    let mut source = err.source();
    while let Some(inner) = source {
        text.push_str(": ");
        text.push_str(&inner.to_string());
        source = inner.source();
    }
    text
}

/// Classifies a transport failure text, falling back to `NetworkError`.
pub fn kind_for_transport_text(text: &str) -> ErrorKind {
    transport_patterns()
        .iter()
        .find(|pattern| pattern.regex.is_match(text))
        .map(|pattern| pattern.kind)
        .unwrap_or(ErrorKind::NetworkError)
}

/// Converts a `reqwest` failure into an [`OperationError`].
pub fn from_transport_error(err: reqwest::Error) -> OperationError {
    let text = error_chain_text(&err);
    let kind = if err.is_timeout() {
        ErrorKind::Timeout
    } else if err.is_builder() {
        ErrorKind::InvalidUrl
    } else if err.is_decode() || err.is_body() {
        ErrorKind::SseError
    } else {
        kind_for_transport_text(&text)
    };

    let mut error = OperationError::new(kind, text);
    if let Some(status) = err.status() {
        error = error.with_http_status(status.as_u16());
    }
    error.with_cause(err)
}

/// Builds an error from an HTTP status whose body carried no usable envelope.
pub fn from_status(status: u16, body: &str) -> OperationError {
    let snippet: String = body.chars().take(200).collect();
    let message = if snippet.trim().is_empty() {
        format!("HTTP {status}")
    } else {
        format!("HTTP {status}: {}", snippet.trim())
    };
    OperationError::new(kind_for_status(status), message).with_http_status(status)
}

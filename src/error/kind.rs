//! The closed set of error kinds and their wire codes.
//!
//! Every failure surfaced by this crate carries exactly one [`ErrorKind`].
//! Kinds are grouped into an [`ErrorCategory`] for coarse handling, and map
//! one-to-one onto the SCREAMING_SNAKE_CASE codes the service puts in
//! `error.code`.

use std::fmt;

use serde::{Deserialize, Serialize};

/// The group an [`ErrorKind`] belongs to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// Credential problems (missing, invalid, expired key, access denied).
    Authentication,
    /// The request itself was malformed, blocked, timed out or aborted.
    Request,
    /// Rate limits and quota exhaustion.
    RateLimit,
    /// The target content could not be obtained.
    Content,
    /// Connectivity failures below HTTP.
    Network,
    /// Failures reported by, or about, the service itself.
    Server,
    /// Result verification failures.
    Verification,
    /// Anything that could not be classified.
    Unknown,
}

/// Machine-readable classification of a failed operation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorKind {
    // Authentication
    MissingApiKey,
    InvalidApiKey,
    ExpiredApiKey,
    Unauthorized,
    Forbidden,

    // Request validity
    InvalidRequest,
    InvalidUrl,
    UrlBlocked,
    Timeout,
    RequestAborted,

    // Rate limiting
    RateLimited,
    QuotaExceeded,

    // Content
    NotFound,
    ContentBlocked,
    CaptchaRequired,
    BotDetected,

    // Network
    NetworkError,
    DnsError,
    TlsError,
    ConnectionRefused,

    // Server
    InternalError,
    ServiceUnavailable,
    SseError,
    HealthCheckFailed,

    // Verification
    VerificationFailed,
    VerificationMismatch,

    Unknown,
}

impl ErrorKind {
    /// Every kind, in declaration order.
    pub const ALL: [ErrorKind; 27] = [
        ErrorKind::MissingApiKey,
        ErrorKind::InvalidApiKey,
        ErrorKind::ExpiredApiKey,
        ErrorKind::Unauthorized,
        ErrorKind::Forbidden,
        ErrorKind::InvalidRequest,
        ErrorKind::InvalidUrl,
        ErrorKind::UrlBlocked,
        ErrorKind::Timeout,
        ErrorKind::RequestAborted,
        ErrorKind::RateLimited,
        ErrorKind::QuotaExceeded,
        ErrorKind::NotFound,
        ErrorKind::ContentBlocked,
        ErrorKind::CaptchaRequired,
        ErrorKind::BotDetected,
        ErrorKind::NetworkError,
        ErrorKind::DnsError,
        ErrorKind::TlsError,
        ErrorKind::ConnectionRefused,
        ErrorKind::InternalError,
        ErrorKind::ServiceUnavailable,
        ErrorKind::SseError,
        ErrorKind::HealthCheckFailed,
        ErrorKind::VerificationFailed,
        ErrorKind::VerificationMismatch,
        ErrorKind::Unknown,
    ];

    /// The wire code for this kind, as found in `error.code`.
    pub fn code(self) -> &'static str {
        match self {
            ErrorKind::MissingApiKey => "MISSING_API_KEY",
            ErrorKind::InvalidApiKey => "INVALID_API_KEY",
            ErrorKind::ExpiredApiKey => "EXPIRED_API_KEY",
            ErrorKind::Unauthorized => "UNAUTHORIZED",
            ErrorKind::Forbidden => "FORBIDDEN",
            ErrorKind::InvalidRequest => "INVALID_REQUEST",
            ErrorKind::InvalidUrl => "INVALID_URL",
            ErrorKind::UrlBlocked => "URL_BLOCKED",
            ErrorKind::Timeout => "TIMEOUT",
            ErrorKind::RequestAborted => "REQUEST_ABORTED",
            ErrorKind::RateLimited => "RATE_LIMITED",
            ErrorKind::QuotaExceeded => "QUOTA_EXCEEDED",
            ErrorKind::NotFound => "NOT_FOUND",
            ErrorKind::ContentBlocked => "CONTENT_BLOCKED",
            ErrorKind::CaptchaRequired => "CAPTCHA_REQUIRED",
            ErrorKind::BotDetected => "BOT_DETECTED",
            ErrorKind::NetworkError => "NETWORK_ERROR",
            ErrorKind::DnsError => "DNS_ERROR",
            ErrorKind::TlsError => "TLS_ERROR",
            ErrorKind::ConnectionRefused => "CONNECTION_REFUSED",
            ErrorKind::InternalError => "INTERNAL_ERROR",
            ErrorKind::ServiceUnavailable => "SERVICE_UNAVAILABLE",
            ErrorKind::SseError => "SSE_ERROR",
            ErrorKind::HealthCheckFailed => "HEALTH_CHECK_FAILED",
            ErrorKind::VerificationFailed => "VERIFICATION_FAILED",
            ErrorKind::VerificationMismatch => "VERIFICATION_MISMATCH",
            ErrorKind::Unknown => "UNKNOWN",
        }
    }

    /// The category this kind belongs to.
    pub fn category(self) -> ErrorCategory {
        match self {
            ErrorKind::MissingApiKey
            | ErrorKind::InvalidApiKey
            | ErrorKind::ExpiredApiKey
            | ErrorKind::Unauthorized
            | ErrorKind::Forbidden => ErrorCategory::Authentication,
            ErrorKind::InvalidRequest
            | ErrorKind::InvalidUrl
            | ErrorKind::UrlBlocked
            | ErrorKind::Timeout
            | ErrorKind::RequestAborted => ErrorCategory::Request,
            ErrorKind::RateLimited | ErrorKind::QuotaExceeded => ErrorCategory::RateLimit,
            ErrorKind::NotFound
            | ErrorKind::ContentBlocked
            | ErrorKind::CaptchaRequired
            | ErrorKind::BotDetected => ErrorCategory::Content,
            ErrorKind::NetworkError
            | ErrorKind::DnsError
            | ErrorKind::TlsError
            | ErrorKind::ConnectionRefused => ErrorCategory::Network,
            ErrorKind::InternalError
            | ErrorKind::ServiceUnavailable
            | ErrorKind::SseError
            | ErrorKind::HealthCheckFailed => ErrorCategory::Server,
            ErrorKind::VerificationFailed | ErrorKind::VerificationMismatch => {
                ErrorCategory::Verification
            }
            ErrorKind::Unknown => ErrorCategory::Unknown,
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// Maps an opaque wire error code to an [`ErrorKind`].
///
/// Matching ignores surrounding whitespace and case, and treats `-` as `_`.
/// Unrecognized codes map to [`ErrorKind::Unknown`]; this never fails.
pub fn classify(raw_code: &str) -> ErrorKind {
    let normalized = raw_code.trim().to_ascii_uppercase().replace('-', "_");
    ErrorKind::ALL
        .iter()
        .copied()
        .find(|kind| kind.code() == normalized)
        .unwrap_or(ErrorKind::Unknown)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_known_codes() {
        assert_eq!(classify("RATE_LIMITED"), ErrorKind::RateLimited);
        assert_eq!(classify("INVALID_API_KEY"), ErrorKind::InvalidApiKey);
        assert_eq!(classify("SSE_ERROR"), ErrorKind::SseError);
    }

    #[test]
    fn test_classify_is_lenient_about_case_and_separators() {
        assert_eq!(classify("  rate_limited "), ErrorKind::RateLimited);
        assert_eq!(classify("not-found"), ErrorKind::NotFound);
    }

    #[test]
    fn test_classify_unknown_code() {
        assert_eq!(classify("SOMETHING_NEW"), ErrorKind::Unknown);
        assert_eq!(classify(""), ErrorKind::Unknown);
    }

    #[test]
    fn test_every_code_round_trips_through_classify() {
        for kind in ErrorKind::ALL {
            assert_eq!(classify(kind.code()), kind, "code {}", kind.code());
        }
    }

    #[test]
    fn test_serde_uses_wire_codes() {
        let json = serde_json::to_string(&ErrorKind::CaptchaRequired).unwrap();
        assert_eq!(json, "\"CAPTCHA_REQUIRED\"");
        let kind: ErrorKind = serde_json::from_str("\"HEALTH_CHECK_FAILED\"").unwrap();
        assert_eq!(kind, ErrorKind::HealthCheckFailed);
    }

    #[test]
    fn test_categories() {
        assert_eq!(ErrorKind::ExpiredApiKey.category(), ErrorCategory::Authentication);
        assert_eq!(ErrorKind::Timeout.category(), ErrorCategory::Request);
        assert_eq!(ErrorKind::QuotaExceeded.category(), ErrorCategory::RateLimit);
        assert_eq!(ErrorKind::BotDetected.category(), ErrorCategory::Content);
        assert_eq!(ErrorKind::DnsError.category(), ErrorCategory::Network);
        assert_eq!(ErrorKind::SseError.category(), ErrorCategory::Server);
        assert_eq!(ErrorKind::VerificationMismatch.category(), ErrorCategory::Verification);
        assert_eq!(ErrorKind::Unknown.category(), ErrorCategory::Unknown);
    }

    #[test]
    fn test_display_is_wire_code() {
        assert_eq!(ErrorKind::UrlBlocked.to_string(), "URL_BLOCKED");
    }
}

//! `reqwest`-backed transport
//!
//! Sends bearer-authenticated JSON requests to the service and hands back
//! the decoded envelope, or the raw body stream for SSE endpoints.

use std::fmt;
use std::sync::OnceLock;
use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use regex::Regex;
use reqwest::header::{ACCEPT, RETRY_AFTER};
use reqwest::{Client, RequestBuilder, Response, Url};
use serde_json::Value;

use super::{ApiRequest, ByteStream, Method, Transport};
use crate::envelope::ResponseEnvelope;
use crate::error::status::{from_status, from_transport_error, parse_retry_after};
use crate::error::{AdviceOverride, ErrorKind, OperationError, Result};

const USER_AGENT: &str = concat!("ub-client/", env!("CARGO_PKG_VERSION"));

fn api_key_pattern() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN
        .get_or_init(|| Regex::new(r"^ub_(live|test)_[A-Za-z0-9_-]+$").ok())
        .as_ref()
}

/// Checks that `api_key` is present and has the `ub_live_` / `ub_test_` shape.
pub fn validate_api_key(api_key: &str) -> Result<()> {
    if api_key.trim().is_empty() {
        return Err(OperationError::new(
            ErrorKind::MissingApiKey,
            "no API key configured",
        ));
    }

    let well_formed = match api_key_pattern() {
        Some(pattern) => pattern.is_match(api_key),
        None => api_key.starts_with("ub_live_") || api_key.starts_with("ub_test_"),
    };
    if well_formed {
        Ok(())
    } else {
        Err(OperationError::new(
            ErrorKind::InvalidApiKey,
            format!("malformed API key {}", redact_api_key(api_key)),
        ))
    }
}

/// Shortens an API key for logs: the environment prefix and last 4 characters.
pub fn redact_api_key(api_key: &str) -> String {
    let prefix = ["ub_live_", "ub_test_"]
        .into_iter()
        .find(|prefix| api_key.starts_with(prefix))
        .unwrap_or("");
    let chars: Vec<char> = api_key.chars().collect();
    if chars.len() <= prefix.len() + 4 {
        return format!("{prefix}****");
    }
    let tail: String = chars[chars.len() - 4..].iter().collect();
    format!("{prefix}****{tail}")
}

/// HTTP transport for the service API.
#[derive(Clone)]
pub struct HttpTransport {
    client: Client,
    base_url: Url,
    api_key: String,
}

impl fmt::Debug for HttpTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpTransport")
            .field("base_url", &self.base_url.as_str())
            .field("api_key", &redact_api_key(&self.api_key))
            .finish()
    }
}

impl HttpTransport {
    /// Creates a transport for `base_url` authenticated with `api_key`.
    ///
    /// `connect_timeout` bounds connection setup only; per-attempt timeouts
    /// are enforced by the executor.
    pub fn new(base_url: &str, api_key: &str, connect_timeout: Duration) -> Result<Self> {
        validate_api_key(api_key)?;
        let base_url = parse_base_url(base_url)?;

        let client = Client::builder()
            .user_agent(USER_AGENT)
            .connect_timeout(connect_timeout)
            .build()
            .map_err(from_transport_error)?;

        Ok(Self {
            client,
            base_url,
            api_key: api_key.to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        self.base_url.as_str()
    }

    /// Joins `path` onto the base URL, tolerating stray slashes on either side.
    pub fn url_for(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.base_url.as_str().trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }

    fn builder(&self, request: &ApiRequest, accept: &str) -> RequestBuilder {
        let method = match request.method {
            Method::Get => reqwest::Method::GET,
            Method::Post => reqwest::Method::POST,
            Method::Put => reqwest::Method::PUT,
            Method::Patch => reqwest::Method::PATCH,
            Method::Delete => reqwest::Method::DELETE,
        };
        let url = self.url_for(&request.path);
        tracing::debug!(method = %request.method, url = %url, "sending request");

        let builder = self
            .client
            .request(method, url)
            .bearer_auth(&self.api_key)
            .header(ACCEPT, accept);
        match &request.body {
            Some(body) => builder.json(body),
            None => builder,
        }
    }
}

fn parse_base_url(base_url: &str) -> Result<Url> {
    let url = Url::parse(base_url.trim()).map_err(|err| {
        OperationError::new(ErrorKind::InvalidUrl, format!("invalid base URL {base_url:?}"))
            .with_cause(err)
    })?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(OperationError::new(
            ErrorKind::InvalidUrl,
            format!("base URL must be http or https, got {}", url.scheme()),
        ));
    }
    Ok(url)
}

fn retry_after_of(response: &Response) -> Option<Duration> {
    response
        .headers()
        .get(RETRY_AFTER)
        .and_then(|value| value.to_str().ok())
        .and_then(parse_retry_after)
}

/// Builds the error for a failed response body.
///
/// Prefers the envelope's own error code; falls back to the HTTP status.
fn error_from_body(status: u16, body: &str, retry_after: Option<Duration>) -> OperationError {
    if let Ok(envelope) = serde_json::from_str::<ResponseEnvelope<Value>>(body) {
        if let Err(error) = envelope
            .with_http_status(status)
            .with_retry_after(retry_after)
            .into_result()
        {
            return error;
        }
    }

    let error = from_status(status, body);
    match retry_after {
        Some(delay) => error.with_advice_override(AdviceOverride::retry_after(delay)),
        None => error,
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(&self, request: &ApiRequest) -> Result<ResponseEnvelope<Value>> {
        let response = self
            .builder(request, "application/json")
            .send()
            .await
            .map_err(from_transport_error)?;

        let status = response.status().as_u16();
        let retry_after = retry_after_of(&response);
        let body = response.text().await.map_err(from_transport_error)?;

        match serde_json::from_str::<ResponseEnvelope<Value>>(&body) {
            Ok(envelope) => Ok(envelope
                .with_http_status(status)
                .with_retry_after(retry_after)),
            Err(err) if (200..300).contains(&status) => Err(OperationError::new(
                ErrorKind::Unknown,
                format!("response body is not a valid envelope: {err}"),
            )
            .with_http_status(status)
            .with_cause(err)),
            Err(_) => Err(error_from_body(status, &body, retry_after)),
        }
    }

    async fn open_stream(&self, request: &ApiRequest) -> Result<ByteStream> {
        let response = self
            .builder(request, "text/event-stream")
            .send()
            .await
            .map_err(from_transport_error)?;

        let status = response.status();
        if !status.is_success() {
            let retry_after = retry_after_of(&response);
            let body = response.text().await.unwrap_or_default();
            return Err(error_from_body(status.as_u16(), &body, retry_after));
        }

        tracing::debug!(status = status.as_u16(), "stream opened");
        let stream = response
            .bytes_stream()
            .map(|chunk| chunk.map_err(from_transport_error));
        Ok(Box::pin(stream))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_api_key() {
        assert!(validate_api_key("ub_live_abc123").is_ok());
        assert!(validate_api_key("ub_test_A-b_c").is_ok());
        assert_eq!(
            validate_api_key("").unwrap_err().kind(),
            ErrorKind::MissingApiKey
        );
        assert_eq!(
            validate_api_key("sk_live_abc").unwrap_err().kind(),
            ErrorKind::InvalidApiKey
        );
        assert_eq!(
            validate_api_key("ub_prod_abc").unwrap_err().kind(),
            ErrorKind::InvalidApiKey
        );
    }

    #[test]
    fn test_redact_api_key() {
        assert_eq!(redact_api_key("ub_live_0123456789"), "ub_live_****6789");
        assert_eq!(redact_api_key("ub_test_ab"), "ub_test_****");
        assert_eq!(redact_api_key("whatever-secret"), "****cret");
    }

    #[test]
    fn test_invalid_key_message_does_not_leak_key() {
        let err = validate_api_key("ub_live_has spaces_secret").unwrap_err();
        assert!(!err.message().contains("has spaces"));
    }

    #[test]
    fn test_url_for_joins_slashes() {
        let transport =
            HttpTransport::new("https://api.test.local/", "ub_test_key", Duration::from_secs(1))
                .unwrap();
        assert_eq!(transport.url_for("/v1/health"), "https://api.test.local/v1/health");
        assert_eq!(transport.url_for("v1/health"), "https://api.test.local/v1/health");
    }

    #[test]
    fn test_rejects_bad_base_url() {
        let err = HttpTransport::new("ftp://x", "ub_test_key", Duration::from_secs(1)).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidUrl);
        let err = HttpTransport::new("not a url", "ub_test_key", Duration::from_secs(1)).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidUrl);
    }

    #[test]
    fn test_rejects_bad_key_before_url() {
        let err = HttpTransport::new("https://x", "", Duration::from_secs(1)).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MissingApiKey);
    }

    #[test]
    fn test_debug_redacts_key() {
        let transport =
            HttpTransport::new("https://api.test.local", "ub_test_secret1234", Duration::from_secs(1))
                .unwrap();
        let debug = format!("{transport:?}");
        assert!(!debug.contains("secret"));
        assert!(debug.contains("ub_test_****1234"));
    }

    #[test]
    fn test_error_from_body_prefers_envelope_code() {
        let body = r#"{"success":false,"error":{"code":"QUOTA_EXCEEDED","message":"out of credits"}}"#;
        let err = error_from_body(402, body, None);
        assert_eq!(err.kind(), ErrorKind::QuotaExceeded);
        assert_eq!(err.http_status(), Some(402));
    }

    #[test]
    fn test_error_from_body_falls_back_to_status() {
        let err = error_from_body(503, "upstream down", Some(Duration::from_secs(9)));
        assert_eq!(err.kind(), ErrorKind::ServiceUnavailable);
        assert_eq!(err.advice().retry_after, Some(Duration::from_secs(9)));
    }
}

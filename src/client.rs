//! Client facade over the executor and the stream decoder.

use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio_util::sync::CancellationToken;

use crate::config::ClientConfig;
use crate::error::{ErrorKind, OperationError, Result};
use crate::executor::{execute, RetryPolicy};
use crate::stream::{SseDecoder, StreamEvent};
use crate::transport::{ApiRequest, HttpTransport, Transport};

/// Per-call overrides of the client's default policy.
#[derive(Clone, Debug, Default)]
pub struct RequestOptions {
    pub timeout: Option<Duration>,
    pub retry: Option<bool>,
    pub max_attempts: Option<u32>,
    /// Caller cancellation; firing it aborts the call without retrying.
    pub cancel: Option<CancellationToken>,
}

impl RequestOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn with_retry(mut self, retry: bool) -> Self {
        self.retry = Some(retry);
        self
    }

    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = Some(max_attempts);
        self
    }

    pub fn with_cancel(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }

    /// `base` with every override applied.
    pub fn policy(&self, base: &RetryPolicy) -> RetryPolicy {
        let mut policy = base.clone();
        if let Some(timeout) = self.timeout {
            policy.timeout = timeout;
        }
        if let Some(retry) = self.retry {
            policy.retry = retry;
        }
        if let Some(max_attempts) = self.max_attempts {
            policy.max_attempts = max_attempts;
        }
        policy
    }
}

/// Client for the service API.
///
/// Cheap to clone; clones share the underlying transport. Concurrent calls
/// share no mutable state.
#[derive(Clone)]
pub struct Client {
    transport: Arc<dyn Transport>,
    policy: RetryPolicy,
}

impl Client {
    /// Creates an HTTP client from `config`.
    pub fn new(config: &ClientConfig) -> Result<Self> {
        let transport = HttpTransport::new(
            &config.base_url,
            &config.api_key,
            config.connect_timeout(),
        )?;
        Ok(Self::with_transport(Arc::new(transport), config.retry_policy()))
    }

    /// Creates a client over any transport.
    pub fn with_transport(transport: Arc<dyn Transport>, policy: RetryPolicy) -> Self {
        Self { transport, policy }
    }

    /// Default policy applied to every request.
    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Sends `request` through the executor and decodes the envelope data.
    pub async fn request<T: DeserializeOwned>(
        &self,
        request: ApiRequest,
        options: &RequestOptions,
    ) -> Result<T> {
        let policy = options.policy(&self.policy);
        let data = execute(
            |_| self.transport.send(&request),
            &policy,
            options.cancel.as_ref(),
        )
        .await?;
        decode_data(data)
    }

    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        self.request(ApiRequest::get(path), &RequestOptions::default())
            .await
    }

    pub async fn post<T: DeserializeOwned>(&self, path: &str, body: Value) -> Result<T> {
        self.request(ApiRequest::post(path, body), &RequestOptions::default())
            .await
    }

    /// Checks service health with a single, unretried `GET /health`.
    ///
    /// Any failure is reported as `HEALTH_CHECK_FAILED`, with the original
    /// error as its cause.
    pub async fn health(&self) -> Result<Value> {
        let options = RequestOptions::default().with_retry(false);
        self.request(ApiRequest::get("/health"), &options)
            .await
            .map_err(|error| {
                let mut failed = OperationError::new(
                    ErrorKind::HealthCheckFailed,
                    format!("health check failed: {}", error.message()),
                );
                if let Some(status) = error.http_status() {
                    failed = failed.with_http_status(status);
                }
                failed.with_cause(error)
            })
    }

    /// Runs a streaming request.
    ///
    /// Each progress event is handed to `on_progress` in arrival order; the
    /// returned value is the stream's single terminal outcome. The stream is
    /// opened once and never retried. Opening is bounded by the policy
    /// timeout; after that the stream runs until it ends, a terminal record
    /// arrives, or the caller cancels.
    pub async fn stream<F>(
        &self,
        request: ApiRequest,
        mut on_progress: F,
        options: &RequestOptions,
    ) -> Result<Value>
    where
        F: FnMut(StreamEvent),
    {
        let timeout = options.timeout.unwrap_or(self.policy.timeout);
        let cancel = options.cancel.as_ref();

        let open = tokio::time::timeout(timeout, self.transport.open_stream(&request));
        let opened = match cancel {
            Some(token) => {
                tokio::select! {
                    biased;
                    _ = token.cancelled() => return Err(OperationError::aborted()),
                    opened = open => opened,
                }
            }
            None => open.await,
        };
        let mut body = opened.map_err(|_| OperationError::timed_out(timeout))??;

        let mut decoder = SseDecoder::new();
        loop {
            let next = match cancel {
                Some(token) => {
                    tokio::select! {
                        biased;
                        _ = token.cancelled() => {
                            tracing::debug!("stream cancelled by caller");
                            decoder.cancel();
                            break;
                        }
                        next = body.next() => next,
                    }
                }
                None => body.next().await,
            };

            match next {
                Some(Ok(chunk)) => {
                    for event in decoder.feed(&chunk) {
                        on_progress(event);
                    }
                    if decoder.is_terminated() {
                        break;
                    }
                }
                Some(Err(error)) => {
                    if decoder.is_terminated() {
                        break;
                    }
                    tracing::warn!(kind = %error.kind(), error = %error, "stream read failed");
                    return Err(error);
                }
                None => break,
            }
        }

        let outcome = decoder.finish();
        if let Err(error) = &outcome {
            tracing::debug!(kind = %error.kind(), "stream resolved to error");
        }
        outcome
    }
}

fn decode_data<T: DeserializeOwned>(data: Value) -> Result<T> {
    serde_json::from_value(data).map_err(|err| {
        OperationError::new(
            ErrorKind::Unknown,
            format!("response data has an unexpected shape: {err}"),
        )
        .with_cause(err)
    })
}

//! The `{success, data, error}` wrapper around every non-streaming response.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{AdviceOverride, ErrorKind, OperationError};

/// Error object carried by a failed envelope.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct WireError {
    #[serde(default)]
    pub code: String,
    #[serde(default)]
    pub message: String,
}

/// A single request/response exchange as sent by the service.
///
/// `http_status` and `retry_after` are filled in by the transport from the
/// HTTP response and are not part of the JSON body.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ResponseEnvelope<T> {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<WireError>,
    #[serde(skip)]
    pub http_status: Option<u16>,
    #[serde(skip)]
    pub retry_after: Option<Duration>,
}

impl<T> ResponseEnvelope<T> {
    /// A successful envelope wrapping `data`.
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
            http_status: None,
            retry_after: None,
        }
    }

    /// A failed envelope with the given wire code and message.
    pub fn failure(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(WireError {
                code: code.into(),
                message: message.into(),
            }),
            http_status: None,
            retry_after: None,
        }
    }

    pub fn with_http_status(mut self, status: u16) -> Self {
        self.http_status = Some(status);
        self
    }

    pub fn with_retry_after(mut self, retry_after: Option<Duration>) -> Self {
        self.retry_after = retry_after;
        self
    }

    /// Unwraps the envelope into its data or a classified error.
    ///
    /// `success: true` without `data` is a protocol violation and yields an
    /// [`ErrorKind::Unknown`] error.
    pub fn into_result(self) -> Result<T, OperationError> {
        if self.success {
            return match self.data {
                Some(data) => Ok(data),
                None => {
                    let error = OperationError::new(
                        ErrorKind::Unknown,
                        "response reported success but carried no data",
                    );
                    Err(attach_status(error, self.http_status))
                }
            };
        }

        let error = match self.error {
            Some(wire) => {
                let message = if wire.message.is_empty() {
                    format!("request failed with {}", wire.code)
                } else {
                    wire.message
                };
                OperationError::from_wire(&wire.code, message)
            }
            None => OperationError::new(
                ErrorKind::Unknown,
                "response reported failure without an error object",
            ),
        };

        let error = match self.retry_after {
            Some(delay) => error.with_advice_override(AdviceOverride::retry_after(delay)),
            None => error,
        };
        Err(attach_status(error, self.http_status))
    }
}

fn attach_status(error: OperationError, status: Option<u16>) -> OperationError {
    match status {
        Some(status) => error.with_http_status(status),
        None => error,
    }
}

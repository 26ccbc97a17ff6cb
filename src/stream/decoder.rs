//! Incremental decoder for the service's Server-Sent Events stream.
//!
//! Records are pairs of adjacent lines, `event: <type>` then `data: <json>`.
//! The decoder is a synchronous state machine: bytes go in through
//! [`SseDecoder::feed`] in arrival order, progress events come out, and the
//! single terminal outcome is resolved by [`SseDecoder::finish`].

use serde_json::Value;

use super::utf8::Utf8Accumulator;
use super::StreamEvent;
use crate::envelope::WireError;
use crate::error::{ErrorKind, OperationError, Result};

/// Decoder state for one stream.
#[derive(Debug, Default)]
pub struct SseDecoder {
    utf8: Utf8Accumulator,
    buffer: String,
    pending_event: Option<String>,
    result: Option<Value>,
    error: Option<OperationError>,
    cancelled: bool,
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feeds a chunk of bytes and returns the progress events it completed.
    ///
    /// Terminal `result` and `error` records are kept internally and surface
    /// through [`SseDecoder::finish`].
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<StreamEvent> {
        let text = self.utf8.decode(chunk);
        self.buffer.push_str(&text);

        let mut events = Vec::new();
        let Some(last_newline) = self.buffer.rfind('\n') else {
            return events;
        };

        let partial = self.buffer.split_off(last_newline + 1);
        let complete = std::mem::replace(&mut self.buffer, partial);
        for line in complete.lines() {
            if let Some(event) = self.process_line(line) {
                events.push(event);
            }
        }
        events
    }

    /// Marks the stream as cancelled by the caller.
    pub fn cancel(&mut self) {
        self.cancelled = true;
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled
    }

    /// Returns true once a terminal result or error has been recorded.
    pub fn is_terminated(&self) -> bool {
        self.result.is_some() || self.error.is_some()
    }

    /// Resolves the stream to its single terminal outcome.
    ///
    /// A recorded error wins over a recorded result. Without either, the
    /// outcome is `REQUEST_ABORTED` for a cancelled stream and `SSE_ERROR`
    /// otherwise. An unterminated final line is decoded only if the stream
    /// was not cancelled.
    pub fn finish(mut self) -> Result<Value> {
        // A cancelled stream may stop mid-record; its partial tail is dropped.
        if !self.cancelled {
            self.process_tail();
        }

        if let Some(error) = self.error {
            return Err(error);
        }
        if let Some(result) = self.result {
            return Ok(result);
        }
        if self.cancelled {
            return Err(OperationError::aborted());
        }
        Err(OperationError::new(ErrorKind::SseError, "no result received"))
    }

    fn process_tail(&mut self) {
        if !self.utf8.is_empty() {
            let tail = self.utf8.finish();
            self.buffer.push_str(&tail);
        }
        if !self.buffer.is_empty() {
            let line = std::mem::take(&mut self.buffer);
            // Progress on an unterminated final line has no one left to receive it.
            let _ = self.process_line(line.trim_end_matches('\r'));
        }
    }

    fn process_line(&mut self, line: &str) -> Option<StreamEvent> {
        if let Some(event_type) = field_value(line, "event") {
            self.pending_event = Some(event_type.trim().to_string());
            return None;
        }

        // Pairing is positional: whatever follows an `event:` line consumes it.
        let event_type = self.pending_event.take();
        let data = field_value(line, "data")?;
        match event_type {
            Some(event_type) => self.dispatch(&event_type, data),
            None => {
                tracing::trace!("ignoring data line without a preceding event line");
                None
            }
        }
    }

    fn dispatch(&mut self, event_type: &str, data: &str) -> Option<StreamEvent> {
        if !matches!(event_type, "progress" | "result" | "error") {
            tracing::trace!(event_type, "ignoring unknown event type");
            return None;
        }

        let payload: Value = match serde_json::from_str(data) {
            Ok(payload) => payload,
            Err(err) => {
                tracing::debug!(event_type, error = %err, "malformed event payload");
                self.record_error(
                    OperationError::new(
                        ErrorKind::SseError,
                        format!("malformed {event_type} payload: {err}"),
                    )
                    .with_cause(err),
                );
                return None;
            }
        };

        match event_type {
            "progress" => Some(StreamEvent::Progress(payload)),
            "result" => {
                match result_data(payload) {
                    Some(data) => {
                        self.result = Some(data);
                    }
                    None => self.record_error(OperationError::new(
                        ErrorKind::SseError,
                        "result event carried no data",
                    )),
                }
                None
            }
            _ => {
                self.record_error(error_from_payload(payload));
                None
            }
        }
    }

    /// Keeps the first terminal error; later ones are only logged.
    fn record_error(&mut self, error: OperationError) {
        if self.error.is_none() {
            self.error = Some(error);
        } else {
            tracing::debug!(error = %error, "ignoring error after terminal error");
        }
    }
}

/// Returns the value of `name: value`, with at most one leading space removed.
fn field_value<'a>(line: &'a str, name: &str) -> Option<&'a str> {
    let value = line.strip_prefix(name)?.strip_prefix(':')?;
    Some(value.strip_prefix(' ').unwrap_or(value))
}

fn result_data(payload: Value) -> Option<Value> {
    match payload {
        Value::Object(mut map) => map.remove("data"),
        _ => None,
    }
}

fn error_from_payload(payload: Value) -> OperationError {
    let wire = match payload {
        Value::Object(mut map) => match map.remove("error") {
            Some(error) => serde_json::from_value::<WireError>(error).ok(),
            None => serde_json::from_value::<WireError>(Value::Object(map)).ok(),
        },
        _ => None,
    };

    match wire {
        Some(wire) if !wire.code.is_empty() || !wire.message.is_empty() => {
            let message = if wire.message.is_empty() {
                format!("stream failed with {}", wire.code)
            } else {
                wire.message
            };
            OperationError::from_wire(&wire.code, message)
        }
        _ => OperationError::new(ErrorKind::SseError, "error event carried no error object"),
    }
}

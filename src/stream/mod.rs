//! Streaming support: event types and the incremental SSE decoder.

pub mod decoder;
pub mod utf8;

use serde::Deserialize;
use serde_json::{Map, Value};

use crate::error::OperationError;

pub use decoder::SseDecoder;
pub use utf8::Utf8Accumulator;

/// One typed event reconstructed from the stream.
#[derive(Clone, Debug)]
pub enum StreamEvent {
    /// Intermediate progress; any number may precede the terminal event.
    Progress(Value),
    /// Terminal success payload.
    Result(Value),
    /// Terminal failure.
    Error(OperationError),
}

impl StreamEvent {
    /// Returns true for `Result` and `Error`.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, StreamEvent::Progress(_))
    }

    /// Typed view of a progress payload, if this is a progress event.
    pub fn as_progress(&self) -> Option<ProgressUpdate> {
        match self {
            StreamEvent::Progress(payload) => ProgressUpdate::from_value(payload),
            _ => None,
        }
    }
}

impl PartialEq for StreamEvent {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (StreamEvent::Progress(a), StreamEvent::Progress(b)) => a == b,
            (StreamEvent::Result(a), StreamEvent::Result(b)) => a == b,
            (StreamEvent::Error(a), StreamEvent::Error(b)) => {
                a.kind() == b.kind() && a.message() == b.message()
            }
            _ => false,
        }
    }
}


/// The common fields of a progress payload.
#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
pub struct ProgressUpdate {
    /// Name of the stage the service is in.
    #[serde(default)]
    pub stage: Option<String>,
    /// Milliseconds elapsed since the operation started.
    #[serde(default)]
    pub elapsed: Option<u64>,
    /// Any other fields.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ProgressUpdate {
    pub fn from_value(value: &Value) -> Option<Self> {
        serde_json::from_value(value.clone()).ok()
    }
}

//! ub-client - resilient client for the UB service API
//!
//! The crate is layered bottom-up:
//!
//! - [`error`]: the closed error taxonomy and per-kind recovery advice
//! - [`envelope`]: the `{success, data, error}` response wrapper
//! - [`executor`]: timeout, cancellation and bounded exponential-backoff retry
//!   around a single request attempt
//! - [`stream`]: incremental decoding of server-sent progress/result/error events
//! - [`transport`]: the boundary to the network, with a `reqwest` implementation
//! - [`client`]: the facade tying those together
//!
//! [`config`] and [`logging`] provide the settings and `tracing` setup used by
//! the `ub` binary.

pub mod client;
pub mod config;
pub mod envelope;
pub mod error;
pub mod executor;
pub mod logging;
pub mod stream;
pub mod transport;

pub use client::{Client, RequestOptions};
pub use config::{ClientConfig, ConfigError};
pub use envelope::ResponseEnvelope;
pub use error::{ErrorKind, OperationError, RecoveryAdvice, Result};
pub use executor::{execute, RetryPolicy};
pub use stream::{SseDecoder, StreamEvent};
pub use transport::{ApiRequest, HttpTransport, Method, Transport};

//! Boundary transport traits
//!
//! The executor and the stream decoder never touch the network directly.
//! They go through a [`Transport`], which turns an [`ApiRequest`] into either
//! a response envelope or a raw byte stream. [`HttpTransport`] is the
//! `reqwest`-backed implementation; tests supply in-memory ones.

pub mod http;

use std::fmt;
use std::pin::Pin;

use async_trait::async_trait;
use bytes::Bytes;
use futures::Stream;
use serde_json::Value;

use crate::envelope::ResponseEnvelope;
use crate::error::Result;

pub use http::{validate_api_key, HttpTransport};

/// HTTP method of an [`ApiRequest`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
    Put,
    Patch,
    Delete,
}

impl Method {
    pub fn as_str(self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Patch => "PATCH",
            Method::Delete => "DELETE",
        }
    }

    /// Parses a method name, ignoring case.
    pub fn parse(name: &str) -> Option<Self> {
        match name.to_ascii_uppercase().as_str() {
            "GET" => Some(Method::Get),
            "POST" => Some(Method::Post),
            "PUT" => Some(Method::Put),
            "PATCH" => Some(Method::Patch),
            "DELETE" => Some(Method::Delete),
            _ => None,
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One call to the service, independent of how it is carried.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiRequest {
    pub method: Method,
    /// Path relative to the service base URL, e.g. `/v1/resolve`.
    pub path: String,
    /// Optional JSON body.
    pub body: Option<Value>,
}

impl ApiRequest {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            body: None,
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::Get, path)
    }

    pub fn post(path: impl Into<String>, body: Value) -> Self {
        Self::new(Method::Post, path).with_body(body)
    }

    pub fn with_body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }
}

/// Chunks of a streaming response body, in arrival order.
pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes>> + Send>>;

/// The boundary between this crate and the network.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Performs exactly one request/response exchange.
    ///
    /// Returns the decoded envelope even when it reports failure; `Err` is
    /// reserved for failures that produced no envelope at all.
    async fn send(&self, request: &ApiRequest) -> Result<ResponseEnvelope<Value>>;

    /// Opens a streaming request and returns its body as a byte stream.
    async fn open_stream(&self, request: &ApiRequest) -> Result<ByteStream>;
}

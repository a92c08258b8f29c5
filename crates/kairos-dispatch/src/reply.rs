//! Method results.
//!
//! A service method returns a [`Reply`]. The response stage turns it into an
//! HTTP response; this crate only carries it.

use std::fmt;
use std::io;
use std::pin::Pin;

use bytes::Bytes;
use futures_util::future::BoxFuture;
use futures_util::Stream;
use kairos_core::{KairosError, KairosResult};
use serde::Serialize;
use serde_json::Value;

/// A stream of body chunks.
pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes, io::Error>> + Send>>;

/// The value produced by a service method.
pub enum Reply {
    /// No value.
    Empty,
    /// A text value, sent as `text/plain`.
    Text(String),
    /// Raw bytes, sent as `application/octet-stream`.
    Bytes(Bytes),
    /// A byte stream, collected and sent as `application/octet-stream`.
    Stream(ByteStream),
    /// Any other value, sent as JSON.
    Json(Value),
    /// A value that is still being computed.
    Deferred(BoxFuture<'static, KairosResult<Reply>>),
}

impl Reply {
    /// Serializes `value` into a JSON reply.
    pub fn json<T: Serialize>(value: &T) -> KairosResult<Self> {
        serde_json::to_value(value)
            .map(Self::Json)
            .map_err(|e| KairosError::internal_with_source("failed to serialize result", e))
    }

    /// Creates a text reply.
    pub fn text(value: impl Into<String>) -> Self {
        Self::Text(value.into())
    }

    /// Creates a binary reply.
    pub fn bytes(value: impl Into<Bytes>) -> Self {
        Self::Bytes(value.into())
    }

    /// Creates a streaming reply.
    pub fn stream<S>(stream: S) -> Self
    where
        S: Stream<Item = Result<Bytes, io::Error>> + Send + 'static,
    {
        Self::Stream(Box::pin(stream))
    }

    /// Wraps a future whose output is the real reply.
    pub fn deferred<F>(future: F) -> Self
    where
        F: std::future::Future<Output = KairosResult<Reply>> + Send + 'static,
    {
        Self::Deferred(Box::pin(future))
    }

    /// Returns `true` for replies that produce no body.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        matches!(self, Self::Empty | Self::Json(Value::Null))
    }

    /// Short name of the variant, for logs.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Empty => "empty",
            Self::Text(_) => "text",
            Self::Bytes(_) => "bytes",
            Self::Stream(_) => "stream",
            Self::Json(_) => "json",
            Self::Deferred(_) => "deferred",
        }
    }
}

impl fmt::Debug for Reply {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Text(text) => f.debug_tuple("Text").field(text).finish(),
            Self::Bytes(bytes) => f.debug_tuple("Bytes").field(&bytes.len()).finish(),
            Self::Json(value) => f.debug_tuple("Json").field(value).finish(),
            Self::Empty => f.write_str("Empty"),
            Self::Stream(_) => f.write_str("Stream(..)"),
            Self::Deferred(_) => f.write_str("Deferred(..)"),
        }
    }
}

impl From<()> for Reply {
    fn from((): ()) -> Self {
        Self::Empty
    }
}

impl From<String> for Reply {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<&str> for Reply {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<Vec<u8>> for Reply {
    fn from(value: Vec<u8>) -> Self {
        Self::Bytes(Bytes::from(value))
    }
}

impl From<Bytes> for Reply {
    fn from(value: Bytes) -> Self {
        Self::Bytes(value)
    }
}

impl From<Value> for Reply {
    fn from(value: Value) -> Self {
        Self::Json(value)
    }
}

impl<T: Into<Reply>> From<Option<T>> for Reply {
    fn from(value: Option<T>) -> Self {
        value.map_or(Self::Empty, Into::into)
    }
}

//! Response serialization stage.
//!
//! Turns the [`Reply`] stashed by the dispatch stage into an HTTP response.
//! The wire format is chosen from the shape of the value:
//!
//! | Reply                       | Status | Content-Type               |
//! |-----------------------------|--------|----------------------------|
//! | `Deferred`                  | awaited, then re-examined           |
//! | `Empty`, `Json(null)`       | 204    | none                       |
//! | `Text`                      | 200    | `text/plain`               |
//! | `Bytes`                     | 200    | `application/octet-stream` |
//! | `Stream`                    | 200    | `application/octet-stream` |
//! | `Json`                      | 200    | `application/json`         |
//!
//! Streams are collected before the response is written, up to
//! [`DEFAULT_MAX_STREAM_BYTES`] unless configured otherwise. A longer stream
//! is an internal fault.
//!
//! Requests with no stashed reply continue down the pipeline unchanged.

use bytes::BytesMut;
use futures_util::StreamExt;
use http::StatusCode;
use kairos_core::KairosError;
use kairos_dispatch::{Reply, ServiceMethodKey};
use serde_json::Value;

use crate::context::MiddlewareContext;
use crate::middleware::{BoxFuture, Middleware, Next};
use crate::stages::dispatch::{fault_response, invoke_guarded, DispatchOutcome};
use crate::types::{Request, Response, ResponseExt, APPLICATION_JSON, OCTET_STREAM, TEXT_PLAIN};

/// Largest stream reply collected by default (16 MiB).
pub const DEFAULT_MAX_STREAM_BYTES: usize = 16 * 1024 * 1024;

/// Serializes stashed method results.
#[derive(Debug, Clone)]
pub struct ResponseMiddleware {
    expose_error_details: bool,
    max_stream_bytes: usize,
}

impl Default for ResponseMiddleware {
    fn default() -> Self {
        Self::new()
    }
}

impl ResponseMiddleware {
    /// Creates the stage.
    #[must_use]
    pub fn new() -> Self {
        Self {
            expose_error_details: true,
            max_stream_bytes: DEFAULT_MAX_STREAM_BYTES,
        }
    }

    /// Controls whether 5xx bodies carry the underlying message.
    #[must_use]
    pub fn expose_error_details(mut self, expose: bool) -> Self {
        self.expose_error_details = expose;
        self
    }

    /// Caps how many bytes a stream reply may produce.
    #[must_use]
    pub fn with_max_stream_bytes(mut self, limit: usize) -> Self {
        self.max_stream_bytes = limit;
        self
    }

    /// Renders a reply, awaiting deferred values first.
    pub async fn render(&self, reply: Reply) -> Result<Response, KairosError> {
        let mut reply = reply;
        loop {
            reply = match reply {
                Reply::Deferred(pending) => invoke_guarded(pending).await?,
                Reply::Empty | Reply::Json(Value::Null) => {
                    return Ok(Response::empty(StatusCode::NO_CONTENT));
                }
                Reply::Text(text) => return Ok(Response::with_body(StatusCode::OK, TEXT_PLAIN, text)),
                Reply::Bytes(bytes) => {
                    return Ok(Response::with_body(StatusCode::OK, OCTET_STREAM, bytes));
                }
                Reply::Stream(mut stream) => {
                    let mut buf = BytesMut::new();
                    while let Some(chunk) = stream.next().await {
                        let chunk = chunk.map_err(|e| {
                            KairosError::internal_with_source("failed to read result stream", e)
                        })?;
                        if buf.len() + chunk.len() > self.max_stream_bytes {
                            return Err(KairosError::internal(format!(
                                "result stream exceeds {} bytes",
                                self.max_stream_bytes
                            )));
                        }
                        buf.extend_from_slice(&chunk);
                    }
                    return Ok(Response::with_body(StatusCode::OK, OCTET_STREAM, buf.freeze()));
                }
                Reply::Json(value) => {
                    let body = serde_json::to_vec(&value).map_err(|e| {
                        KairosError::internal_with_source("failed to serialize result", e)
                    })?;
                    return Ok(Response::with_body(StatusCode::OK, APPLICATION_JSON, body));
                }
            };
        }
    }
}

impl Middleware for ResponseMiddleware {
    fn name(&self) -> &'static str {
        "response"
    }

    fn process<'a>(
        &'a self,
        ctx: &'a mut MiddlewareContext,
        request: Request,
        next: Next<'a>,
    ) -> BoxFuture<'a, Response> {
        Box::pin(async move {
            let Some(reply) = ctx.take_reply() else {
                return next.run(ctx, request).await;
            };

            match self.render(reply).await {
                Ok(response) => response,
                Err(err) => {
                    ctx.set_extension(DispatchOutcome::InvocationFaulted);
                    let key = ctx
                        .operation()
                        .cloned()
                        .unwrap_or_else(|| ServiceMethodKey::new("-", "-"));
                    fault_response(&key, &err, self.expose_error_details)
                }
            }
        })
    }
}

//! Access log stage.
//!
//! Emits one `info` line per request once the response is known. The line
//! carries the request id, method, path, status, latency and, for dispatch
//! requests, the invoked operation.

use crate::context::MiddlewareContext;
use crate::middleware::{BoxFuture, Middleware, Next};
use crate::types::{Request, Response};

/// Summary of a finished request, also left in the context for inspection.
#[derive(Debug, Clone, PartialEq)]
pub struct AccessRecord {
    /// HTTP method.
    pub method: String,
    /// Request path.
    pub path: String,
    /// Response status.
    pub status: u16,
    /// Latency in milliseconds.
    pub duration_ms: f64,
    /// Dispatched operation, as `Service.Method`.
    pub operation: Option<String>,
}

/// Logs every request.
#[derive(Debug, Clone, Default)]
pub struct AccessLogMiddleware;

impl AccessLogMiddleware {
    /// Creates the stage.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl Middleware for AccessLogMiddleware {
    fn name(&self) -> &'static str {
        "access_log"
    }

    fn process<'a>(
        &'a self,
        ctx: &'a mut MiddlewareContext,
        request: Request,
        next: Next<'a>,
    ) -> BoxFuture<'a, Response> {
        Box::pin(async move {
            let method = request.method().to_string();
            let path = request.uri().path().to_string();

            let response = next.run(ctx, request).await;

            let record = AccessRecord {
                method,
                path,
                status: response.status().as_u16(),
                duration_ms: ctx.elapsed().as_secs_f64() * 1000.0,
                operation: ctx.operation().map(ToString::to_string),
            };

            tracing::info!(
                request_id = %ctx.request_id(),
                method = %record.method,
                path = %record.path,
                status = record.status,
                duration_ms = record.duration_ms,
                operation = record.operation.as_deref().unwrap_or("-"),
                caller = %ctx.identity().log_id(),
                "request completed"
            );

            ctx.set_extension(record);
            response
        })
    }
}

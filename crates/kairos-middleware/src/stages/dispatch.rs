//! Dynamic dispatch stage.
//!
//! Requests whose path ends in `{prefix}/{Service}/{Method}` are handled here;
//! every other request passes through untouched. A dispatch request goes
//! through these steps:
//!
//! ```text
//! ParsePath -> PolicyGate -> Resolve -> Bind -> Invoke -> Stash -> Continue
//!                  |            |         |        |
//!                 401          404       400   403/4xx/5xx
//! ```
//!
//! The policy gate runs before resolution, so an anonymous caller probing an
//! unknown service sees the same 401 as for a real protected method.
//!
//! On success the method's [`Reply`] is stashed in the context and the
//! request continues to the response stage. Every failure writes an error
//! response here and stops the pipeline.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures_util::FutureExt;
use http::StatusCode;
use http_body_util::{BodyExt, Full};
use kairos_core::{ErrorBody, KairosError};
use kairos_dispatch::{
    bind, parse_body, Decision, Invocation, PolicyEvaluator, Reply, ServiceMethodKey,
    ServiceRegistry, DEFAULT_DISPATCH_PREFIX,
};

use crate::context::MiddlewareContext;
use crate::middleware::{BoxFuture, Middleware, Next};
use crate::types::{Request, Response, ResponseExt};

/// Terminal state of a dispatch request, left in the context.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// The policy gate rejected the caller.
    Denied,
    /// No such service or method.
    NotFound,
    /// The body could not be bound to the method's parameters.
    BindingFailed,
    /// The method returned an error or panicked.
    InvocationFaulted,
    /// The method returned a result, handed to the response stage.
    Completed,
}

/// Routes `.../{prefix}/{Service}/{Method}` requests to registered services.
pub struct DispatchMiddleware {
    registry: Arc<ServiceRegistry>,
    policy: Option<Arc<dyn PolicyEvaluator>>,
    prefix: String,
    expose_error_details: bool,
}

impl std::fmt::Debug for DispatchMiddleware {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DispatchMiddleware")
            .field("registry", &self.registry)
            .field("prefix", &self.prefix)
            .field("expose_error_details", &self.expose_error_details)
            .finish_non_exhaustive()
    }
}

impl DispatchMiddleware {
    /// Creates the stage over a finished registry.
    ///
    /// Access levels come from the registry unless a policy is supplied with
    /// [`with_policy`](Self::with_policy).
    #[must_use]
    pub fn new(registry: Arc<ServiceRegistry>) -> Self {
        Self {
            registry,
            policy: None,
            prefix: DEFAULT_DISPATCH_PREFIX.to_string(),
            expose_error_details: true,
        }
    }

    /// Sets the path segment that marks dispatch requests.
    #[must_use]
    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }

    /// Replaces the access policy.
    #[must_use]
    pub fn with_policy(mut self, policy: Arc<dyn PolicyEvaluator>) -> Self {
        self.policy = Some(policy);
        self
    }

    /// Controls whether 404 and 5xx bodies carry the underlying message.
    #[must_use]
    pub fn expose_error_details(mut self, expose: bool) -> Self {
        self.expose_error_details = expose;
        self
    }

    fn evaluate(&self, key: &ServiceMethodKey, ctx: &MiddlewareContext) -> Decision {
        match &self.policy {
            Some(policy) => policy.evaluate(key, ctx.identity()),
            None => self.registry.access().evaluate(key, ctx.identity()),
        }
    }

    fn not_found(&self, err: &KairosError) -> Response {
        if self.expose_error_details {
            Response::from_error(err, true)
        } else {
            Response::error_body(StatusCode::NOT_FOUND, &ErrorBody::new(err.generic_message()))
        }
    }
}

impl Middleware for DispatchMiddleware {
    fn name(&self) -> &'static str {
        "dispatch"
    }

    fn process<'a>(
        &'a self,
        ctx: &'a mut MiddlewareContext,
        request: Request,
        next: Next<'a>,
    ) -> BoxFuture<'a, Response> {
        Box::pin(async move {
            // ParsePath
            let Some(key) = ServiceMethodKey::from_path(request.uri().path(), &self.prefix) else {
                return next.run(ctx, request).await;
            };
            ctx.set_operation(key.clone());

            // PolicyGate
            if let Decision::Deny { reason } = self.evaluate(&key, ctx) {
                tracing::warn!(
                    service = key.service(),
                    method = key.method(),
                    caller = %ctx.identity().log_id(),
                    %reason,
                    "dispatch denied"
                );
                ctx.set_extension(DispatchOutcome::Denied);
                return Response::from_error(&KairosError::authentication(reason), true);
            }

            // Resolve
            let method = match self.registry.resolve(key.service(), key.method()) {
                Ok(method) => method,
                Err(e) => {
                    tracing::warn!(service = key.service(), method = key.method(), error = %e, "dispatch target not found");
                    ctx.set_extension(DispatchOutcome::NotFound);
                    return self.not_found(&KairosError::from(e));
                }
            };

            // Bind
            let (parts, body) = request.into_parts();
            let raw = match body.collect().await {
                Ok(collected) => collected.to_bytes(),
                Err(never) => match never {},
            };
            let args = match parse_body(&raw).and_then(|body| bind(method.params(), &body)) {
                Ok(args) => args,
                Err(e) => {
                    tracing::warn!(
                        service = key.service(),
                        method = key.method(),
                        parameters = ?e.parameter_names(),
                        error = %e,
                        "parameter binding failed"
                    );
                    ctx.set_extension(DispatchOutcome::BindingFailed);
                    return Response::from_error(&KairosError::from(e), true);
                }
            };

            // Invoke
            let invocation = Invocation::new(
                ctx.to_request_context(),
                args,
                Arc::clone(self.registry.container()),
            );
            let reply = match invoke_guarded(method.invoke(invocation)).await {
                Ok(reply) => reply,
                Err(err) => {
                    ctx.set_extension(DispatchOutcome::InvocationFaulted);
                    return fault_response(&key, &err, self.expose_error_details);
                }
            };

            // Stash and continue
            tracing::debug!(
                service = key.service(),
                method = key.method(),
                reply = reply.kind(),
                "dispatch completed"
            );
            ctx.stash_reply(reply);
            ctx.set_extension(DispatchOutcome::Completed);
            next.run(ctx, Request::from_parts(parts, Full::new(raw))).await
        })
    }
}

/// Awaits a method future, turning a panic into an internal error.
pub(crate) async fn invoke_guarded<F>(future: F) -> Result<Reply, KairosError>
where
    F: std::future::Future<Output = Result<Reply, KairosError>> + Send,
{
    match AssertUnwindSafe(future).catch_unwind().await {
        Ok(result) => result,
        Err(panic) => {
            let message = panic
                .downcast_ref::<&str>()
                .map(ToString::to_string)
                .or_else(|| panic.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "unknown panic".to_string());
            Err(KairosError::internal(format!("service method panicked: {message}")))
        }
    }
}

/// Logs a method fault and builds its response.
///
/// `AccessDenied` maps to 403 and every other domain error keeps its own
/// status; only unexpected faults become 5xx.
pub(crate) fn fault_response(key: &ServiceMethodKey, err: &KairosError, expose_details: bool) -> Response {
    if err.is_client_safe() {
        tracing::warn!(
            service = key.service(),
            method = key.method(),
            status = err.status_code().as_u16(),
            error = %err,
            "service method rejected the call"
        );
    } else {
        tracing::error!(
            service = key.service(),
            method = key.method(),
            status = err.status_code().as_u16(),
            error = ?err,
            "service method failed"
        );
    }

    if err.status_code() == StatusCode::NOT_FOUND && !expose_details {
        return Response::error_body(StatusCode::NOT_FOUND, &ErrorBody::new(err.generic_message()));
    }
    Response::from_error(err, expose_details)
}

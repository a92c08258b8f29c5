//! Middleware context.
//!
//! [`MiddlewareContext`] carries per-request state through the pipeline: the
//! request id, the caller identity, the resolved operation and the reply
//! stashed by the dispatch stage for the response stage.

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::time::Instant;

use kairos_core::{CallerIdentity, RequestContext, RequestId};
use kairos_dispatch::{Reply, ServiceMethodKey};

/// Context that flows through the middleware pipeline.
///
/// Each stage enriches it; when a service method is invoked it is converted
/// into the immutable [`RequestContext`] the method sees.
///
/// # Example
///
/// ```
/// use kairos_core::CallerIdentity;
/// use kairos_middleware::MiddlewareContext;
///
/// let mut ctx = MiddlewareContext::new();
/// ctx.set_identity(CallerIdentity::user("u1", "member"));
///
/// assert!(ctx.identity().is_authenticated());
/// assert!(!ctx.has_reply());
/// ```
#[derive(Debug)]
pub struct MiddlewareContext {
    request_id: RequestId,
    identity: CallerIdentity,
    operation: Option<ServiceMethodKey>,
    started_at: Instant,
    reply: Option<Reply>,
    extensions: HashMap<TypeId, Box<dyn Any + Send + Sync>>,
}

impl MiddlewareContext {
    /// Creates a context with a fresh request id and an anonymous caller.
    #[must_use]
    pub fn new() -> Self {
        Self::with_request_id(RequestId::new())
    }

    /// Creates a context with a specific request id.
    #[must_use]
    pub fn with_request_id(request_id: RequestId) -> Self {
        Self {
            request_id,
            identity: CallerIdentity::anonymous(),
            operation: None,
            started_at: Instant::now(),
            reply: None,
            extensions: HashMap::new(),
        }
    }

    /// Returns the request id.
    #[must_use]
    pub fn request_id(&self) -> RequestId {
        self.request_id
    }

    /// Sets the request id. Only the request id stage calls this.
    pub fn set_request_id(&mut self, request_id: RequestId) {
        self.request_id = request_id;
    }

    /// Returns the caller identity.
    #[must_use]
    pub fn identity(&self) -> &CallerIdentity {
        &self.identity
    }

    /// Sets the caller identity. Only the identity stage calls this.
    pub fn set_identity(&mut self, identity: CallerIdentity) {
        self.identity = identity;
    }

    /// Returns the dispatched operation, once the path has been parsed.
    #[must_use]
    pub fn operation(&self) -> Option<&ServiceMethodKey> {
        self.operation.as_ref()
    }

    /// Records the dispatched operation.
    pub fn set_operation(&mut self, key: ServiceMethodKey) {
        self.operation = Some(key);
    }

    /// Returns the elapsed time since the request started.
    #[must_use]
    pub fn elapsed(&self) -> std::time::Duration {
        self.started_at.elapsed()
    }

    /// Stashes a method result for the response stage.
    ///
    /// A later stash replaces an earlier one.
    pub fn stash_reply(&mut self, reply: Reply) {
        self.reply = Some(reply);
    }

    /// Removes and returns the stashed result.
    pub fn take_reply(&mut self) -> Option<Reply> {
        self.reply.take()
    }

    /// Returns `true` if a result is stashed.
    #[must_use]
    pub fn has_reply(&self) -> bool {
        self.reply.is_some()
    }

    /// Stores a typed extension value.
    pub fn set_extension<T: Send + Sync + 'static>(&mut self, value: T) {
        self.extensions.insert(TypeId::of::<T>(), Box::new(value));
    }

    /// Retrieves a typed extension value.
    #[must_use]
    pub fn get_extension<T: Send + Sync + 'static>(&self) -> Option<&T> {
        self.extensions
            .get(&TypeId::of::<T>())
            .and_then(|v| v.downcast_ref())
    }

    /// Removes and returns a typed extension value.
    pub fn remove_extension<T: Send + Sync + 'static>(&mut self) -> Option<T> {
        self.extensions
            .remove(&TypeId::of::<T>())
            .and_then(|v| v.downcast().ok())
            .map(|b| *b)
    }

    /// Builds the context handed to an invoked method.
    #[must_use]
    pub fn to_request_context(&self) -> RequestContext {
        let ctx = RequestContext::with_request_id(self.request_id).with_identity(self.identity.clone());
        match &self.operation {
            Some(key) => ctx.with_operation(key.to_string()),
            None => ctx,
        }
    }
}

impl Default for MiddlewareContext {
    fn default() -> Self {
        Self::new()
    }
}

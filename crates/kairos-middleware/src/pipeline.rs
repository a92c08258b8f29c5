//! Fixed-order middleware pipeline.
//!
//! Stages always run in [`Stage`] order, whatever order they were added in:
//!
//! 1. **Request ID** - Generate or propagate the request id
//! 2. **Access Log** - One structured log line per request
//! 3. **Identity** - Resolve the caller from a bearer credential
//! 4. **Dispatch** - Gate, resolve, bind and invoke service methods
//! 5. **Response** - Serialize the stashed method result
//!
//! The terminal handler passed to [`Pipeline::process`] receives every
//! request that no stage answered, i.e. every non-dispatch path.

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::context::MiddlewareContext;
use crate::middleware::{BoxFuture, Middleware, Next};
use crate::types::{Request, Response};

/// A type-erased middleware.
pub type BoxedMiddleware = Arc<dyn Middleware>;

/// Position of a stage in the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u8)]
pub enum Stage {
    /// Request id generation and propagation.
    RequestId = 1,
    /// Access logging.
    AccessLog = 2,
    /// Caller identity extraction.
    Identity = 3,
    /// Dynamic service dispatch.
    Dispatch = 4,
    /// Result serialization.
    Response = 5,
}

impl Stage {
    /// Returns the stage name.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::RequestId => "request_id",
            Self::AccessLog => "access_log",
            Self::Identity => "identity",
            Self::Dispatch => "dispatch",
            Self::Response => "response",
        }
    }

    /// Returns all stages in order.
    #[must_use]
    pub const fn all() -> [Stage; 5] {
        [
            Self::RequestId,
            Self::AccessLog,
            Self::Identity,
            Self::Dispatch,
            Self::Response,
        ]
    }
}

/// The middleware pipeline.
///
/// # Example
///
/// ```
/// use kairos_middleware::pipeline::{Pipeline, Stage};
/// use kairos_middleware::stages::{AccessLogMiddleware, RequestIdMiddleware};
///
/// let pipeline = Pipeline::builder()
///     .stage(Stage::AccessLog, AccessLogMiddleware::new())
///     .stage(Stage::RequestId, RequestIdMiddleware::new())
///     .build();
///
/// assert_eq!(pipeline.stage_names(), vec!["request_id", "access_log"]);
/// ```
pub struct Pipeline {
    stages: Vec<(Stage, BoxedMiddleware)>,
}

impl Pipeline {
    /// Creates a new pipeline builder.
    #[must_use]
    pub fn builder() -> PipelineBuilder {
        PipelineBuilder::new()
    }

    /// Runs a request through every stage and, if no stage answers it,
    /// through `handler`.
    pub async fn process<H>(&self, mut ctx: MiddlewareContext, request: Request, handler: H) -> Response
    where
        H: FnOnce(&mut MiddlewareContext, Request) -> BoxFuture<'static, Response> + Send + 'static,
    {
        let next = self.build_chain(handler);
        next.run(&mut ctx, request).await
    }

    fn build_chain<'a, H>(&'a self, handler: H) -> Next<'a>
    where
        H: FnOnce(&mut MiddlewareContext, Request) -> BoxFuture<'static, Response> + Send + 'a,
    {
        let mut next = Next::terminal(handler);
        for (_, middleware) in self.stages.iter().rev() {
            next = Next::new(middleware.as_ref(), next);
        }
        next
    }

    /// Returns the names of the installed middleware in execution order.
    #[must_use]
    pub fn stage_names(&self) -> Vec<&'static str> {
        self.stages.iter().map(|(_, mw)| mw.name()).collect()
    }

    /// Returns the installed stages in execution order.
    #[must_use]
    pub fn stages(&self) -> Vec<Stage> {
        self.stages.iter().map(|(stage, _)| *stage).collect()
    }

    /// Returns the number of installed stages.
    #[must_use]
    pub fn stage_count(&self) -> usize {
        self.stages.len()
    }
}

/// Builder for [`Pipeline`].
#[derive(Default)]
pub struct PipelineBuilder {
    stages: BTreeMap<Stage, BoxedMiddleware>,
}

impl PipelineBuilder {
    /// Creates an empty builder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Installs `middleware` at `stage`, replacing any previous one.
    #[must_use]
    pub fn stage<M: Middleware>(mut self, stage: Stage, middleware: M) -> Self {
        self.stages.insert(stage, Arc::new(middleware));
        self
    }

    /// Builds the pipeline.
    #[must_use]
    pub fn build(self) -> Pipeline {
        Pipeline {
            stages: self.stages.into_iter().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ResponseExt;
    use bytes::Bytes;
    use http::StatusCode;
    use http_body_util::Full;
    use parking_lot::Mutex;

    struct Recorder {
        name: &'static str,
        order: Arc<Mutex<Vec<&'static str>>>,
    }

    impl Middleware for Recorder {
        fn name(&self) -> &'static str {
            self.name
        }

        fn process<'a>(
            &'a self,
            ctx: &'a mut MiddlewareContext,
            request: Request,
            next: Next<'a>,
        ) -> BoxFuture<'a, Response> {
            Box::pin(async move {
                self.order.lock().push(self.name);
                next.run(ctx, request).await
            })
        }
    }

    fn request() -> Request {
        http::Request::builder()
            .uri("/test")
            .body(Full::new(Bytes::new()))
            .unwrap()
    }

    #[tokio::test]
    async fn test_stages_run_in_stage_order() {
        let order = Arc::new(Mutex::new(Vec::new()));
        let recorder = |name| Recorder {
            name,
            order: Arc::clone(&order),
        };

        let pipeline = Pipeline::builder()
            .stage(Stage::Response, recorder("response"))
            .stage(Stage::RequestId, recorder("request_id"))
            .stage(Stage::Dispatch, recorder("dispatch"))
            .build();

        let response = pipeline
            .process(MiddlewareContext::new(), request(), |_ctx, _req| {
                Box::pin(async { Response::empty(StatusCode::OK) })
            })
            .await;

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(*order.lock(), vec!["request_id", "dispatch", "response"]);
        assert_eq!(
            pipeline.stages(),
            vec![Stage::RequestId, Stage::Dispatch, Stage::Response]
        );
    }

    #[tokio::test]
    async fn test_empty_pipeline_reaches_handler() {
        let pipeline = Pipeline::builder().build();
        assert_eq!(pipeline.stage_count(), 0);

        let response = pipeline
            .process(MiddlewareContext::new(), request(), |_ctx, _req| {
                Box::pin(async { Response::empty(StatusCode::ACCEPTED) })
            })
            .await;
        assert_eq!(response.status(), StatusCode::ACCEPTED);
    }

    #[test]
    fn test_stage_order_and_names() {
        let all = Stage::all();
        assert!(all.windows(2).all(|w| w[0] < w[1]));
        assert_eq!(all[0].name(), "request_id");
        assert_eq!(all[4].name(), "response");
    }
}

//! HTTP server implementation.
//!
//! The server is a thin host around a [`Pipeline`]: it accepts HTTP/1.1
//! connections with Hyper, buffers each request body up to a limit, runs the
//! request through the pipeline under a timeout and writes the response.
//!
//! Requests that no stage answers reach the fallback, which serves
//! `/health` and `/ready` and answers everything else with 404.
//!
//! # Example
//!
//! ```rust,ignore
//! use kairos_server::{Server, ServerConfig};
//!
//! let server = Server::new(ServerConfig::default(), pipeline);
//! server.run().await?;
//! ```

use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;

use bytes::Bytes;
use http::{Method, StatusCode};
use http_body_util::{BodyExt, Full, LengthLimitError, Limited};
use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper_util::rt::TokioIo;
use kairos_core::{ErrorBody, KairosError};
use kairos_middleware::types::APPLICATION_JSON;
use kairos_middleware::{BoxFuture, MiddlewareContext, Pipeline, Request, Response, ResponseExt};
use serde::Serialize;
use tokio::net::{TcpListener, TcpStream};

use crate::config::ServerConfig;
use crate::health::Health;
use crate::shutdown::{ConnectionTracker, ShutdownSignal};

/// Errors that stop the server.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    /// The configured address is not a socket address.
    #[error("invalid address '{addr}': {source}")]
    InvalidAddress {
        /// Configured address.
        addr: String,
        /// Parse failure.
        #[source]
        source: std::net::AddrParseError,
    },

    /// Binding the listener failed.
    #[error("failed to bind {addr}: {source}")]
    Bind {
        /// Address that could not be bound.
        addr: SocketAddr,
        /// I/O failure.
        #[source]
        source: std::io::Error,
    },
}

/// The Kairos HTTP server.
pub struct Server {
    config: ServerConfig,
    pipeline: Arc<Pipeline>,
    health: Health,
}

impl std::fmt::Debug for Server {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Server")
            .field("config", &self.config)
            .field("stages", &self.pipeline.stage_names())
            .finish_non_exhaustive()
    }
}

impl Server {
    /// Creates a server hosting `pipeline`.
    #[must_use]
    pub fn new(config: ServerConfig, pipeline: Pipeline) -> Self {
        let health = Health::new(config.service_name(), config.service_version());
        Self {
            config,
            pipeline: Arc::new(pipeline),
            health,
        }
    }

    /// Returns the server configuration.
    #[must_use]
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Returns the hosted pipeline.
    #[must_use]
    pub fn pipeline(&self) -> &Pipeline {
        &self.pipeline
    }

    /// Returns the health state.
    #[must_use]
    pub fn health(&self) -> &Health {
        &self.health
    }

    /// Handles one buffered request without a socket.
    ///
    /// The whole pipeline runs under the configured request timeout; on
    /// expiry the in-flight work is dropped and a 504 is returned.
    pub async fn handle(&self, request: Request) -> Response {
        let method = request.method().clone();
        let path = request.uri().path().to_string();
        let fallback = fallback(self.health.clone());

        let processing = self.pipeline.process(MiddlewareContext::new(), request, fallback);
        match tokio::time::timeout(self.config.request_timeout(), processing).await {
            Ok(response) => response,
            Err(_) => {
                tracing::warn!(%method, %path, timeout = ?self.config.request_timeout(), "request timed out");
                Response::from_error(&KairosError::timeout("request timed out"), true)
            }
        }
    }

    /// Runs until SIGINT or SIGTERM.
    pub async fn run(self) -> Result<(), ServerError> {
        let shutdown = ShutdownSignal::with_os_signals();
        self.run_with_shutdown(shutdown).await
    }

    /// Binds the configured address and serves until `shutdown` fires.
    pub async fn run_with_shutdown(self, shutdown: ShutdownSignal) -> Result<(), ServerError> {
        let addr = self
            .config
            .socket_addr()
            .map_err(|source| ServerError::InvalidAddress {
                addr: self.config.http_addr().to_string(),
                source,
            })?;

        let listener = TcpListener::bind(addr)
            .await
            .map_err(|source| ServerError::Bind { addr, source })?;

        self.serve(listener, shutdown).await;
        Ok(())
    }

    /// Serves connections from an already bound listener until `shutdown`
    /// fires, then waits up to the shutdown timeout for connections to drain.
    pub async fn serve(self, listener: TcpListener, shutdown: ShutdownSignal) {
        match listener.local_addr() {
            Ok(addr) => tracing::info!(%addr, stages = ?self.pipeline.stage_names(), "server listening"),
            Err(e) => tracing::warn!(error = %e, "server listening on unknown address"),
        }

        let server = Arc::new(self);
        let tracker = ConnectionTracker::new();

        loop {
            tokio::select! {
                accepted = listener.accept() => match accepted {
                    Ok((stream, remote_addr)) => {
                        let server = Arc::clone(&server);
                        let token = tracker.acquire();
                        let shutdown = shutdown.clone();

                        tokio::spawn(async move {
                            if let Err(e) = server.handle_connection(stream, shutdown).await {
                                tracing::debug!(%remote_addr, error = %e, "connection error");
                            }
                            drop(token);
                        });
                    }
                    Err(e) => tracing::error!(error = %e, "failed to accept connection"),
                },
                () = shutdown.recv() => {
                    tracing::info!("shutdown signal received, no longer accepting connections");
                    break;
                }
            }
        }

        server.health.set_ready(false);

        let shutdown_timeout = server.config.shutdown_timeout();
        tracing::info!(
            active = tracker.active_connections(),
            timeout = ?shutdown_timeout,
            "draining connections"
        );

        if tokio::time::timeout(shutdown_timeout, tracker.wait_idle()).await.is_err() {
            tracing::warn!(
                active = tracker.active_connections(),
                "shutdown timeout reached with connections still open"
            );
        }

        tracing::info!("server stopped");
    }

    async fn handle_connection(
        self: &Arc<Self>,
        stream: TcpStream,
        shutdown: ShutdownSignal,
    ) -> Result<(), hyper::Error> {
        let server = Arc::clone(self);
        let service = service_fn(move |request: http::Request<Incoming>| {
            let server = Arc::clone(&server);
            async move { Ok::<_, Infallible>(server.handle_incoming(request).await) }
        });

        let conn = http1::Builder::new().serve_connection(TokioIo::new(stream), service);
        tokio::pin!(conn);

        tokio::select! {
            result = conn.as_mut() => result,
            () = shutdown.recv() => {
                conn.as_mut().graceful_shutdown();
                conn.await
            }
        }
    }

    async fn handle_incoming(&self, request: http::Request<Incoming>) -> Response {
        let (parts, body) = request.into_parts();
        let limited = Limited::new(body, self.config.max_body_bytes());

        let bytes = match tokio::time::timeout(self.config.request_timeout(), limited.collect()).await {
            Ok(Ok(collected)) => collected.to_bytes(),
            Ok(Err(e)) if e.downcast_ref::<LengthLimitError>().is_some() => {
                return Response::error_body(
                    StatusCode::PAYLOAD_TOO_LARGE,
                    &ErrorBody::new("request body too large"),
                );
            }
            Ok(Err(e)) => {
                tracing::debug!(error = %e, "failed to read request body");
                return Response::error_body(
                    StatusCode::BAD_REQUEST,
                    &ErrorBody::new("failed to read request body"),
                );
            }
            Err(_) => {
                return Response::error_body(
                    StatusCode::REQUEST_TIMEOUT,
                    &ErrorBody::new("request body timed out"),
                );
            }
        };

        self.handle(http::Request::from_parts(parts, Full::new(bytes))).await
    }
}

/// Terminal handler for requests no stage answered.
fn fallback(
    health: Health,
) -> impl FnOnce(&mut MiddlewareContext, Request) -> BoxFuture<'static, Response> + Send + 'static {
    move |_ctx: &mut MiddlewareContext, request: Request| {
        let response = match (request.method(), request.uri().path()) {
            (&Method::GET, "/health") => json(StatusCode::OK, &health.report()),
            (&Method::GET, "/ready") => {
                let status = if health.is_ready() {
                    StatusCode::OK
                } else {
                    StatusCode::SERVICE_UNAVAILABLE
                };
                json(status, &health.readiness())
            }
            _ => Response::error_body(StatusCode::NOT_FOUND, &ErrorBody::new("not found")),
        };
        Box::pin(async move { response })
    }
}

fn json<T: Serialize>(status: StatusCode, value: &T) -> Response {
    match serde_json::to_vec(value) {
        Ok(body) => Response::with_body(status, APPLICATION_JSON, Bytes::from(body)),
        Err(e) => Response::from_error(&KairosError::internal_with_source("failed to serialize", e), false),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kairos_middleware::pipeline::Stage;
    use kairos_middleware::stages::{RequestIdMiddleware, REQUEST_ID_HEADER};
    use kairos_middleware::{Middleware, Next};
    use std::time::Duration;

    struct Sleepy;

    impl Middleware for Sleepy {
        fn name(&self) -> &'static str {
            "sleepy"
        }

        fn process<'a>(
            &'a self,
            ctx: &'a mut MiddlewareContext,
            request: Request,
            next: Next<'a>,
        ) -> BoxFuture<'a, Response> {
            Box::pin(async move {
                if request.uri().path() == "/slow" {
                    tokio::time::sleep(Duration::from_secs(5)).await;
                }
                next.run(ctx, request).await
            })
        }
    }

    fn server() -> Server {
        let pipeline = Pipeline::builder()
            .stage(Stage::RequestId, RequestIdMiddleware::new())
            .stage(Stage::Dispatch, Sleepy)
            .build();
        let config = ServerConfig::builder()
            .request_timeout(Duration::from_millis(50))
            .service("kairos-test", "1.2.3")
            .build();
        Server::new(config, pipeline)
    }

    fn get(path: &str) -> Request {
        http::Request::builder()
            .uri(path)
            .body(Full::new(Bytes::new()))
            .unwrap()
    }

    async fn body_json(response: Response) -> serde_json::Value {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_health() {
        let response = server().handle(get("/health")).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers().contains_key(REQUEST_ID_HEADER));
        let json = body_json(response).await;
        assert_eq!(json["status"], "healthy");
        assert_eq!(json["service"], "kairos-test");
        assert_eq!(json["version"], "1.2.3");
    }

    #[tokio::test]
    async fn test_ready_flips_when_draining() {
        let server = server();
        assert_eq!(server.handle(get("/ready")).await.status(), StatusCode::OK);

        server.health().set_ready(false);
        let response = server.handle(get("/ready")).await;
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body_json(response).await["ready"], false);
    }

    #[tokio::test]
    async fn test_unknown_path_is_404() {
        let response = server().handle(get("/nowhere")).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(body_json(response).await["error"], "not found");
    }

    #[tokio::test]
    async fn test_request_timeout_is_504() {
        let response = server().handle(get("/slow")).await;
        assert_eq!(response.status(), StatusCode::GATEWAY_TIMEOUT);
        assert_eq!(body_json(response).await["error"], "request timed out");
    }

    #[tokio::test]
    async fn test_invalid_address() {
        let server = Server::new(
            ServerConfig::builder().http_addr("not-an-address").build(),
            Pipeline::builder().build(),
        );
        let err = server.run_with_shutdown(ShutdownSignal::new()).await.unwrap_err();
        assert!(matches!(err, ServerError::InvalidAddress { .. }));
    }
}

//! In-memory client driving a [`Server`].

use std::sync::Arc;

use bytes::Bytes;
use http::Method;
use kairos_middleware::Pipeline;
use kairos_server::{Server, ServerConfig};

use crate::error::TestError;
use crate::request::{TestRequest, TestRequestBuilder};
use crate::response::TestResponse;

/// Default path prefix used by [`TestClient::call`].
pub const DEFAULT_DISPATCH_BASE: &str = "/api/services";

/// Sends requests through the full server path without a socket.
///
/// Every request goes through [`Server::handle`]: the request timeout, every
/// pipeline stage and the fallback all apply.
///
/// ```ignore
/// let client = TestClient::new(server);
/// let response = client
///     .call("TaskService", "GetTaskAsync")
///     .bearer_token(&token)
///     .json(&json!({"taskId": id}))
///     .send()
///     .await;
/// response.assert_status(StatusCode::OK);
/// ```
#[must_use]
#[derive(Clone)]
pub struct TestClient {
    server: Arc<Server>,
    dispatch_base: String,
    default_headers: Vec<(String, String)>,
}

impl std::fmt::Debug for TestClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TestClient")
            .field("dispatch_base", &self.dispatch_base)
            .field("default_headers", &self.default_headers)
            .finish_non_exhaustive()
    }
}

impl TestClient {
    /// Wraps a server.
    pub fn new(server: Server) -> Self {
        Self {
            server: Arc::new(server),
            dispatch_base: DEFAULT_DISPATCH_BASE.to_string(),
            default_headers: Vec::new(),
        }
    }

    /// Wraps a pipeline in a server with default settings.
    pub fn from_pipeline(pipeline: Pipeline) -> Self {
        Self::new(Server::new(ServerConfig::default(), pipeline))
    }

    /// Sets the path prefix [`call`](Self::call) builds on.
    pub fn with_dispatch_base(mut self, base: impl Into<String>) -> Self {
        self.dispatch_base = base.into().trim_end_matches('/').to_string();
        self
    }

    /// Adds a header sent with every request.
    pub fn with_default_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.default_headers.push((name.into(), value.into()));
        self
    }

    /// Returns the wrapped server.
    #[must_use]
    pub fn server(&self) -> &Server {
        &self.server
    }

    /// Starts a GET request.
    pub fn get(&self, uri: impl AsRef<str>) -> TestClientRequest<'_> {
        TestClientRequest::new(self, TestRequest::get(uri))
    }

    /// Starts a POST request.
    pub fn post(&self, uri: impl AsRef<str>) -> TestClientRequest<'_> {
        TestClientRequest::new(self, TestRequest::post(uri))
    }

    /// Starts a request with any method.
    pub fn request(&self, method: Method, uri: impl AsRef<str>) -> TestClientRequest<'_> {
        TestClientRequest::new(self, TestRequestBuilder::new(method, uri))
    }

    /// Starts a POST to `{base}/{service}/{method}`.
    pub fn call(&self, service: &str, method: &str) -> TestClientRequest<'_> {
        self.post(format!("{}/{service}/{method}", self.dispatch_base))
    }

    async fn dispatch(&self, request: TestRequest) -> Result<TestResponse, TestError> {
        let response = self.server.handle(request.into_http_request()).await;
        TestResponse::from_http(response).await
    }
}

/// A request bound to a [`TestClient`].
#[must_use]
pub struct TestClientRequest<'a> {
    client: &'a TestClient,
    builder: TestRequestBuilder,
}

impl<'a> TestClientRequest<'a> {
    fn new(client: &'a TestClient, mut builder: TestRequestBuilder) -> Self {
        for (name, value) in &client.default_headers {
            builder = builder.header(name, value);
        }
        Self { client, builder }
    }

    /// Sets a header.
    pub fn header(mut self, name: impl AsRef<str>, value: impl AsRef<str>) -> Self {
        self.builder = self.builder.header(name, value);
        self
    }

    /// Sets `Authorization: Bearer <token>`.
    pub fn bearer_token(mut self, token: impl AsRef<str>) -> Self {
        self.builder = self.builder.bearer_token(token);
        self
    }

    /// Adds a cookie.
    pub fn cookie(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.builder = self.builder.cookie(name, value);
        self
    }

    /// Appends a query parameter.
    pub fn query(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.builder = self.builder.query(name, value);
        self
    }

    /// Sets the raw body.
    pub fn body(mut self, body: impl Into<Bytes>) -> Self {
        self.builder = self.builder.body(body);
        self
    }

    /// Sets a JSON body.
    pub fn json<T: serde::Serialize>(mut self, value: &T) -> Self {
        self.builder = self.builder.json(value);
        self
    }

    /// Sends the request.
    ///
    /// # Panics
    ///
    /// Panics if the request cannot be built or the body cannot be read.
    /// Use [`try_send`](Self::try_send) to handle those cases.
    pub async fn send(self) -> TestResponse {
        match self.try_send().await {
            Ok(response) => response,
            Err(e) => panic!("test request failed: {e}"),
        }
    }

    /// Sends the request.
    pub async fn try_send(self) -> Result<TestResponse, TestError> {
        let request = self.builder.build()?;
        self.client.dispatch(request).await
    }
}

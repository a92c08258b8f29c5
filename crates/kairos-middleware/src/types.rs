//! Request and response types used throughout the pipeline.

use bytes::Bytes;
use http::{header, HeaderValue, StatusCode};
use http_body_util::Full;
use kairos_core::{ErrorBody, KairosError};

/// The HTTP request type used in the middleware pipeline.
pub type Request = http::Request<Full<Bytes>>;

/// The HTTP response type used in the middleware pipeline.
pub type Response = http::Response<Full<Bytes>>;

/// Content type for JSON bodies.
pub const APPLICATION_JSON: &str = "application/json";

/// Content type for text bodies.
pub const TEXT_PLAIN: &str = "text/plain; charset=utf-8";

/// Content type for binary bodies.
pub const OCTET_STREAM: &str = "application/octet-stream";

/// Constructors for the responses the pipeline writes.
pub trait ResponseExt {
    /// Creates a response with no body.
    fn empty(status: StatusCode) -> Response;

    /// Creates a response with a body and content type.
    fn with_body(status: StatusCode, content_type: &'static str, body: impl Into<Bytes>) -> Response;

    /// Creates a JSON `{error, details?}` response.
    fn error_body(status: StatusCode, body: &ErrorBody) -> Response;

    /// Creates the error response for `err`.
    fn from_error(err: &KairosError, expose_details: bool) -> Response;
}

impl ResponseExt for Response {
    fn empty(status: StatusCode) -> Response {
        let mut response = http::Response::new(Full::new(Bytes::new()));
        *response.status_mut() = status;
        response
    }

    fn with_body(status: StatusCode, content_type: &'static str, body: impl Into<Bytes>) -> Response {
        let mut response = http::Response::new(Full::new(body.into()));
        *response.status_mut() = status;
        response
            .headers_mut()
            .insert(header::CONTENT_TYPE, HeaderValue::from_static(content_type));
        response
    }

    fn error_body(status: StatusCode, body: &ErrorBody) -> Response {
        let json = serde_json::to_vec(body)
            .unwrap_or_else(|_| br#"{"error":"internal server error"}"#.to_vec());
        Self::with_body(status, APPLICATION_JSON, json)
    }

    fn from_error(err: &KairosError, expose_details: bool) -> Response {
        Self::error_body(err.status_code(), &err.to_body(expose_details))
    }
}

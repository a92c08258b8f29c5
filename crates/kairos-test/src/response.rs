//! Test response wrapper.

use std::fmt;

use bytes::Bytes;
use http::{header, HeaderMap, HeaderValue, StatusCode};
use http_body_util::BodyExt;
use serde::de::DeserializeOwned;

use crate::error::TestError;

/// A buffered response with assertion helpers.
pub struct TestResponse {
    status: StatusCode,
    headers: HeaderMap,
    body: Bytes,
}

impl TestResponse {
    /// Buffers an HTTP response.
    pub async fn from_http<B>(response: http::Response<B>) -> Result<Self, TestError>
    where
        B: BodyExt,
        B::Error: fmt::Display,
    {
        let (parts, body) = response.into_parts();
        let body = body
            .collect()
            .await
            .map_err(|e| TestError::BodyRead(e.to_string()))?
            .to_bytes();

        Ok(Self::new(parts.status, parts.headers, body))
    }

    /// Creates a response from raw parts.
    pub fn new(status: StatusCode, headers: HeaderMap, body: Bytes) -> Self {
        Self {
            status,
            headers,
            body,
        }
    }

    /// Returns the status code.
    #[must_use]
    pub fn status(&self) -> StatusCode {
        self.status
    }

    /// Returns the status code as a u16.
    #[must_use]
    pub fn status_code(&self) -> u16 {
        self.status.as_u16()
    }

    /// Returns the headers.
    #[must_use]
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Returns a header value.
    #[must_use]
    pub fn header(&self, name: impl AsRef<str>) -> Option<&HeaderValue> {
        self.headers.get(name.as_ref())
    }

    /// Returns a header value as a string.
    #[must_use]
    pub fn header_str(&self, name: impl AsRef<str>) -> Option<&str> {
        self.header(name).and_then(|v| v.to_str().ok())
    }

    /// Returns the Content-Type.
    #[must_use]
    pub fn content_type(&self) -> Option<&str> {
        self.header_str(header::CONTENT_TYPE.as_str())
    }

    /// Returns the raw body.
    #[must_use]
    pub fn body(&self) -> &Bytes {
        &self.body
    }

    /// Returns the body as UTF-8 text.
    pub fn text(&self) -> Result<String, TestError> {
        String::from_utf8(self.body.to_vec()).map_err(|e| TestError::BodyRead(format!("invalid UTF-8: {e}")))
    }

    /// Deserializes the body as JSON.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, TestError> {
        Ok(serde_json::from_slice(&self.body)?)
    }

    /// Deserializes the body as a JSON value.
    pub fn json_value(&self) -> Result<serde_json::Value, TestError> {
        self.json()
    }

    /// Returns the `error` message of an error body.
    #[must_use]
    pub fn error_message(&self) -> Option<String> {
        self.json_value()
            .ok()?
            .get("error")?
            .as_str()
            .map(ToString::to_string)
    }

    /// Asserts the status code.
    ///
    /// # Panics
    ///
    /// Panics if the status code doesn't match.
    #[track_caller]
    pub fn assert_status(&self, expected: StatusCode) -> &Self {
        assert_eq!(
            self.status,
            expected,
            "expected status {expected}, got {} with body {}",
            self.status,
            String::from_utf8_lossy(&self.body)
        );
        self
    }

    /// Asserts that the Content-Type starts with `expected`.
    ///
    /// # Panics
    ///
    /// Panics if Content-Type is missing or doesn't match.
    #[track_caller]
    pub fn assert_content_type(&self, expected: impl AsRef<str>) -> &Self {
        let expected = expected.as_ref();
        let actual = self.content_type().unwrap_or("<none>");
        assert!(
            actual.starts_with(expected),
            "Content-Type: expected '{expected}', got '{actual}'"
        );
        self
    }

    /// Asserts that the body is empty.
    ///
    /// # Panics
    ///
    /// Panics if the body is not empty.
    #[track_caller]
    pub fn assert_empty(&self) -> &Self {
        assert!(self.body.is_empty(), "expected empty body, got {} bytes", self.body.len());
        self
    }

    /// Asserts that a dotted JSON path (`details.task.title.0`) equals
    /// `expected`.
    ///
    /// # Panics
    ///
    /// Panics if the path doesn't exist or doesn't match.
    #[track_caller]
    pub fn assert_json_field(&self, path: impl AsRef<str>, expected: &serde_json::Value) -> &Self {
        let path = path.as_ref();
        let json = match self.json_value() {
            Ok(json) => json,
            Err(e) => panic!("body is not JSON: {e}"),
        };
        match json_path(&json, path) {
            Some(actual) => assert_eq!(actual, expected, "JSON field '{path}'"),
            None => panic!("JSON path '{path}' not found in: {json}"),
        }
        self
    }
}

impl fmt::Debug for TestResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TestResponse")
            .field("status", &self.status)
            .field("headers", &self.headers)
            .field("body_len", &self.body.len())
            .finish()
    }
}

/// Dotted path lookup. Numeric segments index arrays.
///
/// Field keys can themselves contain dots (`note.text` in field error maps),
/// so a segment that fails to resolve is retried joined with the next one.
fn json_path<'a>(value: &'a serde_json::Value, path: &str) -> Option<&'a serde_json::Value> {
    let segments: Vec<&str> = path.split('.').filter(|s| !s.is_empty()).collect();
    resolve(value, &segments)
}

fn resolve<'a>(value: &'a serde_json::Value, segments: &[&str]) -> Option<&'a serde_json::Value> {
    if segments.is_empty() {
        return Some(value);
    }

    for take in 1..=segments.len() {
        let key = segments[..take].join(".");
        let child = match value {
            serde_json::Value::Array(items) => key.parse::<usize>().ok().and_then(|i| items.get(i)),
            serde_json::Value::Object(map) => map.get(&key),
            _ => None,
        };
        if let Some(found) = child.and_then(|child| resolve(child, &segments[take..])) {
            return Some(found);
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn response(status: StatusCode, body: &str) -> TestResponse {
        let mut headers = HeaderMap::new();
        headers.insert(header::CONTENT_TYPE, HeaderValue::from_static("application/json"));
        TestResponse::new(status, headers, Bytes::from(body.to_string()))
    }

    #[test]
    fn test_json_and_error_message() {
        let r = response(StatusCode::NOT_FOUND, r#"{"error":"task not found: t1"}"#);
        r.assert_status(StatusCode::NOT_FOUND).assert_content_type("application/json");
        assert_eq!(r.error_message().as_deref(), Some("task not found: t1"));
    }

    #[test]
    fn test_json_path_with_dotted_keys() {
        let r = response(
            StatusCode::BAD_REQUEST,
            r#"{"error":"validation failed","details":{"task.title":["is required"],"list":[1,2]}}"#,
        );
        r.assert_json_field("details.task.title.0", &json!("is required"))
            .assert_json_field("details.list.1", &json!(2));
    }

    #[test]
    #[should_panic(expected = "expected status 200 OK")]
    fn test_assert_status_panics() {
        response(StatusCode::CREATED, "{}").assert_status(StatusCode::OK);
    }

    #[test]
    fn test_assert_empty() {
        TestResponse::new(StatusCode::NO_CONTENT, HeaderMap::new(), Bytes::new()).assert_empty();
    }

    #[tokio::test]
    async fn test_from_http() {
        let http = http::Response::builder()
            .status(StatusCode::OK)
            .body(http_body_util::Full::new(Bytes::from_static(b"pong")))
            .unwrap();
        let r = TestResponse::from_http(http).await.unwrap();
        assert_eq!(r.text().unwrap(), "pong");
    }
}

//! End-to-end pipeline tests.
//!
//! Runs requests through all five stages in order with a small notes
//! service registered:
//!
//! 1. Request ID
//! 2. Access Log
//! 3. Identity
//! 4. Dispatch
//! 5. Response

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use bytes::Bytes;
use http::{header, StatusCode};
use http_body_util::{BodyExt, Full};
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use kairos_core::{FieldErrors, KairosError, KairosResult};
use kairos_dispatch::{
    Invocation, MethodTable, ParameterDescriptor, Reply, Service, ServiceRegistry, Validate,
    Validator,
};
use kairos_middleware::pipeline::{Pipeline, Stage};
use kairos_middleware::stages::{
    AccessLogMiddleware, DispatchMiddleware, IdentityMiddleware, IdentitySettings,
    RequestIdMiddleware, ResponseMiddleware, REQUEST_ID_HEADER,
};
use kairos_middleware::{MiddlewareContext, Request, Response, ResponseExt};
use parking_lot::RwLock;
use serde::Deserialize;
use serde_json::{json, Value};

const SECRET: &str = "pipeline-test-secret-with-enough-bytes";

#[derive(Debug, Deserialize)]
struct NewNote {
    text: String,
}

impl Validate for NewNote {
    fn validate(&self) -> Result<(), FieldErrors> {
        let mut v = Validator::new();
        v.required("text", &self.text).length("text", &self.text, 1, 40);
        v.finish()
    }
}

#[derive(Default)]
struct Notes {
    notes: RwLock<BTreeMap<u32, (String, String)>>,
}

impl Notes {
    async fn add(self: Arc<Self>, inv: Invocation) -> KairosResult<Reply> {
        let owner = inv.caller_id()?.to_string();
        let note: NewNote = inv.arg("note")?;
        let mut notes = self.notes.write();
        let id = notes.len() as u32 + 1;
        notes.insert(id, (owner.clone(), note.text.clone()));
        Reply::json(&json!({"id": id, "owner": owner, "text": note.text}))
    }

    async fn clear(self: Arc<Self>, inv: Invocation) -> KairosResult<Reply> {
        if !inv.identity().is_admin() {
            return Err(KairosError::access_denied("admin role required"));
        }
        self.notes.write().clear();
        Ok(Reply::Empty)
    }

    async fn count(self: Arc<Self>, _inv: Invocation) -> KairosResult<Reply> {
        let count = self.notes.read().len();
        Ok(Reply::deferred(async move { Ok(Reply::text(count.to_string())) }))
    }
}

impl Service for Notes {
    const NAME: &'static str = "NoteService";

    fn register(table: &mut MethodTable<Self>) {
        table
            .protected("AddNote", vec![ParameterDescriptor::complex::<NewNote>("note")], Self::add)
            .protected("Clear", Vec::new(), Self::clear)
            .public("Count", Vec::new(), Self::count);
    }
}

struct Fixture {
    notes: Arc<Notes>,
    pipeline: Pipeline,
}

fn fixture() -> Fixture {
    let notes = Arc::new(Notes::default());
    let registry = ServiceRegistry::builder()
        .shared_service(Arc::clone(&notes))
        .build()
        .unwrap();

    let pipeline = Pipeline::builder()
        .stage(Stage::RequestId, RequestIdMiddleware::new())
        .stage(Stage::AccessLog, AccessLogMiddleware::new())
        .stage(Stage::Identity, IdentityMiddleware::new(IdentitySettings::new(SECRET)))
        .stage(Stage::Dispatch, DispatchMiddleware::new(Arc::new(registry)).with_prefix("services"))
        .stage(Stage::Response, ResponseMiddleware::new())
        .build();

    Fixture { notes, pipeline }
}

fn token(sub: &str, role: &str) -> String {
    let exp = SystemTime::now().duration_since(UNIX_EPOCH).unwrap().as_secs() + 600;
    jsonwebtoken::encode(
        &Header::new(Algorithm::HS256),
        &json!({"sub": sub, "role": role, "exp": exp}),
        &EncodingKey::from_secret(SECRET.as_bytes()),
    )
    .unwrap()
}

fn post(path: &str, body: Value, bearer: Option<&str>) -> Request {
    let mut builder = http::Request::builder()
        .method("POST")
        .uri(path)
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(token) = bearer {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    builder.body(Full::new(Bytes::from(body.to_string()))).unwrap()
}

async fn send(fixture: &Fixture, request: Request) -> (StatusCode, http::HeaderMap, Bytes) {
    let response = fixture
        .pipeline
        .process(MiddlewareContext::new(), request, |_ctx, _req| {
            Box::pin(async { Response::empty(StatusCode::NOT_FOUND) })
        })
        .await;
    let status = response.status();
    let headers = response.headers().clone();
    let body = response.into_body().collect().await.unwrap().to_bytes();
    (status, headers, body)
}

#[tokio::test]
async fn test_stage_order() {
    assert_eq!(
        fixture().pipeline.stage_names(),
        vec!["request_id", "access_log", "identity", "dispatch", "response"]
    );
}

#[tokio::test]
async fn test_authenticated_call_returns_json() {
    let f = fixture();
    let token = token("alice", "member");
    let (status, headers, body) = send(
        &f,
        post("/api/services/NoteService/AddNote", json!({"note": {"text": "hello"}}), Some(&token)),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(headers[header::CONTENT_TYPE], "application/json");
    assert!(headers.contains_key(REQUEST_ID_HEADER));
    let json: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["owner"], "alice");
    assert_eq!(json["text"], "hello");
}

#[tokio::test]
async fn test_missing_credential_is_401_without_side_effects() {
    let f = fixture();
    let (status, _, body) = send(
        &f,
        post("/api/services/NoteService/AddNote", json!({"note": {"text": "hello"}}), None),
    )
    .await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    let json: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["error"], "authentication required");
    assert!(f.notes.notes.read().is_empty());
}

#[tokio::test]
async fn test_validation_errors_are_400() {
    let f = fixture();
    let token = token("alice", "member");
    let long = "x".repeat(41);
    let (status, _, body) = send(
        &f,
        post("/api/services/NoteService/AddNote", json!({"note": {"text": long}}), Some(&token)),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    let json: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["details"]["note.text"][0], "must be at most 40 characters");
}

#[tokio::test]
async fn test_admin_check_inside_method_is_403() {
    let f = fixture();
    let member = token("bob", "member");
    let (status, _, _) = send(&f, post("/services/NoteService/Clear", json!({}), Some(&member))).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let admin = token("root", "admin");
    let (status, _, body) = send(&f, post("/services/NoteService/Clear", json!({}), Some(&admin))).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    assert!(body.is_empty());
}

#[tokio::test]
async fn test_deferred_text_reply() {
    let f = fixture();
    let (status, headers, body) = send(&f, post("/services/NoteService/Count", json!({}), None)).await;
    assert_eq!(status, StatusCode::OK);
    assert!(headers[header::CONTENT_TYPE].to_str().unwrap().starts_with("text/plain"));
    assert_eq!(body, Bytes::from_static(b"0"));
}

#[tokio::test]
async fn test_non_dispatch_path_reaches_fallback() {
    let f = fixture();
    let (status, headers, _) = send(&f, post("/health", json!({}), None)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(headers.contains_key(REQUEST_ID_HEADER));
}

//! Shared fixtures for the application tests.

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use http::StatusCode;
use kairos_app::ai::CompletionProvider;
use kairos_app::App;
use kairos_config::KairosConfig;
use kairos_core::KairosResult;
use kairos_test::TestClient;
use serde_json::json;

pub const ADMIN_EMAIL: &str = "admin@example.com";
pub const ADMIN_PASSWORD: &str = "admin-password";

/// Completion provider that answers every prompt with the same text.
#[derive(Debug, Default)]
pub struct ScriptedProvider {
    answer: String,
    calls: AtomicUsize,
}

impl ScriptedProvider {
    pub fn new(answer: impl Into<String>) -> Self {
        Self {
            answer: answer.into(),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CompletionProvider for ScriptedProvider {
    async fn complete(&self, _system: &str, _prompt: &str) -> KairosResult<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.answer.clone())
    }
}

/// Development config with a seeded admin account.
pub fn config() -> KairosConfig {
    let mut config = KairosConfig::default();
    config.auth.admin_email = Some(ADMIN_EMAIL.to_string());
    config.auth.admin_password = Some(ADMIN_PASSWORD.to_string());
    config
}

/// Builds and seeds an app without an AI provider.
pub async fn client_with(config: KairosConfig) -> TestClient {
    kairos_telemetry::init_test_logging();
    let app = App::build(config).unwrap();
    app.seed_admin().await.unwrap();
    TestClient::new(app.into_server())
}

/// Builds and seeds an app around `provider`.
pub async fn client_with_provider(provider: Arc<dyn CompletionProvider>) -> TestClient {
    kairos_telemetry::init_test_logging();
    let app = App::with_provider(config(), provider).unwrap();
    app.seed_admin().await.unwrap();
    TestClient::new(app.into_server())
}

pub async fn client() -> TestClient {
    client_with(config()).await
}

/// Registers `email` and returns a bearer token for it.
pub async fn sign_up(client: &TestClient, email: &str) -> String {
    client
        .call("UserService", "RegisterAsync")
        .json(&json!({
            "registration": {"email": email, "name": "Test User", "password": "correct-horse"}
        }))
        .send()
        .await
        .assert_status(StatusCode::OK);

    login(client, email, "correct-horse").await
}

pub async fn login(client: &TestClient, email: &str, password: &str) -> String {
    let response = client
        .call("UserService", "LoginAsync")
        .json(&json!({"email": email, "password": password}))
        .send()
        .await;
    response.assert_status(StatusCode::OK);
    response.json_value().unwrap()["token"].as_str().unwrap().to_string()
}

pub async fn admin_token(client: &TestClient) -> String {
    login(client, ADMIN_EMAIL, ADMIN_PASSWORD).await
}

/// Creates a task and returns its id.
pub async fn create_task(client: &TestClient, token: &str, title: &str) -> String {
    let response = client
        .call("TaskService", "CreateTaskAsync")
        .bearer_token(token)
        .json(&json!({"task": {"title": title}}))
        .send()
        .await;
    response.assert_status(StatusCode::OK);
    response.json_value().unwrap()["id"].as_str().unwrap().to_string()
}

//! End-to-end dispatch tests.
//!
//! Every request runs through the full server: request id, access log,
//! identity, dispatch and response stages, backed by in-memory storage.

mod common;

use common::{admin_token, client, client_with, config, create_task, sign_up};
use http::StatusCode;
use kairos_app::auth::TokenIssuer;
use kairos_app::models::{Role, User};
use kairos_middleware::types::{APPLICATION_JSON, OCTET_STREAM, TEXT_PLAIN};
use kairos_test::TestClient;
use serde_json::{json, Value};

async fn list_tasks(client: &TestClient, token: &str) -> Vec<Value> {
    let response = client
        .call("TaskService", "ListTasksAsync")
        .bearer_token(token)
        .send()
        .await;
    response.assert_status(StatusCode::OK);
    response.json::<Vec<Value>>().unwrap()
}

// =============================================================================
// Scenarios
// =============================================================================

#[tokio::test]
async fn test_create_task_as_authenticated_caller() {
    let client = client().await;
    let token = sign_up(&client, "ada@example.com").await;

    let profile = client
        .call("UserService", "GetProfileAsync")
        .bearer_token(&token)
        .send()
        .await
        .json_value()
        .unwrap();

    let response = client
        .call("TaskService", "CreateTaskAsync")
        .bearer_token(&token)
        .json(&json!({"task": {"title": "Write report"}}))
        .send()
        .await;

    response
        .assert_status(StatusCode::OK)
        .assert_content_type(APPLICATION_JSON);
    let task = response.json_value().unwrap();
    assert!(!task["id"].as_str().unwrap().is_empty());
    assert_eq!(task["title"], "Write report");
    assert_eq!(task["status"], "todo");
    assert_eq!(task["ownerId"], profile["id"]);
}

#[tokio::test]
async fn test_create_task_without_credentials_is_401_and_writes_nothing() {
    let client = client().await;

    let response = client
        .call("TaskService", "CreateTaskAsync")
        .json(&json!({"task": {"title": "Write report"}}))
        .send()
        .await;

    response.assert_status(StatusCode::UNAUTHORIZED);
    assert_eq!(response.error_message().as_deref(), Some("authentication required"));

    let admin = admin_token(&client).await;
    let purged = client
        .call("TaskService", "PurgeAllTasksAsync")
        .bearer_token(&admin)
        .send()
        .await;
    purged.assert_status(StatusCode::OK);
    assert_eq!(purged.json_value().unwrap()["purged"], 0);
}

#[tokio::test]
async fn test_missing_parameter_is_400_naming_it() {
    let client = client().await;
    let token = sign_up(&client, "ada@example.com").await;

    let response = client
        .call("TaskService", "CreateTaskAsync")
        .bearer_token(&token)
        .json(&json!({}))
        .send()
        .await;

    response.assert_status(StatusCode::BAD_REQUEST);
    let body = response.json_value().unwrap();
    assert_eq!(body["error"], "missing required parameter: task");
    assert_eq!(body["details"]["task"][0], "is required");
}

#[tokio::test]
async fn test_unknown_service_is_404() {
    let client = client().await;
    let token = sign_up(&client, "ada@example.com").await;

    let response = client
        .call("NoSuchService", "Foo")
        .bearer_token(&token)
        .send()
        .await;

    response.assert_status(StatusCode::NOT_FOUND);
    assert_eq!(
        response.error_message().as_deref(),
        Some("service not found: NoSuchService")
    );

    let response = client
        .call("TaskService", "NoSuchMethod")
        .bearer_token(&token)
        .send()
        .await;
    response.assert_status(StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_admin_only_method_rejects_member_with_403() {
    let client = client().await;
    let token = sign_up(&client, "ada@example.com").await;
    create_task(&client, &token, "Keep me").await;

    let response = client
        .call("TaskService", "PurgeAllTasksAsync")
        .bearer_token(&token)
        .send()
        .await;

    response.assert_status(StatusCode::FORBIDDEN);
    assert_eq!(response.error_message().as_deref(), Some("admin role required"));
    assert_eq!(list_tasks(&client, &token).await.len(), 1);

    client
        .call("UserService", "ListUsersAsync")
        .bearer_token(&token)
        .send()
        .await
        .assert_status(StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_admin_purges_every_task() {
    let client = client().await;
    let ada = sign_up(&client, "ada@example.com").await;
    let bob = sign_up(&client, "bob@example.com").await;
    create_task(&client, &ada, "One").await;
    create_task(&client, &bob, "Two").await;

    let admin = admin_token(&client).await;
    let response = client
        .call("TaskService", "PurgeAllTasksAsync")
        .bearer_token(&admin)
        .send()
        .await;

    response.assert_status(StatusCode::OK);
    assert_eq!(response.json_value().unwrap()["purged"], 2);
    assert!(list_tasks(&client, &ada).await.is_empty());
}

// =============================================================================
// Access, binding and reply shapes
// =============================================================================

#[tokio::test]
async fn test_unknown_service_is_denied_to_anonymous_callers() {
    let client = client().await;

    let response = client.call("NoSuchService", "Foo").send().await;

    response.assert_status(StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_public_method_needs_no_token() {
    let client = client().await;

    let response = client.call("UserService", "Ping").send().await;

    response
        .assert_status(StatusCode::OK)
        .assert_content_type(TEXT_PLAIN);
    assert_eq!(response.text().unwrap(), "pong");
}

#[tokio::test]
async fn test_defaults_fill_omitted_paging() {
    let client = client().await;
    let token = sign_up(&client, "ada@example.com").await;
    for n in 0..3 {
        create_task(&client, &token, &format!("Task {n}")).await;
    }

    assert_eq!(list_tasks(&client, &token).await.len(), 3);

    let response = client
        .call("TaskService", "ListTasksAsync")
        .bearer_token(&token)
        .json(&json!({"pageSize": 2}))
        .send()
        .await;
    assert_eq!(response.json::<Vec<Value>>().unwrap().len(), 2);
}

#[tokio::test]
async fn test_injected_parameter_ignores_body_value() {
    let client = client().await;
    let token = sign_up(&client, "ada@example.com").await;

    let response = client
        .call("TaskService", "CreateTaskAsync")
        .bearer_token(&token)
        .json(&json!({"task": {"title": "Mine"}, "caller": "someone-else"}))
        .send()
        .await;

    response.assert_status(StatusCode::OK);
    assert_ne!(response.json_value().unwrap()["ownerId"], "someone-else");
}

#[tokio::test]
async fn test_complex_validation_reports_field_path() {
    let client = client().await;
    let token = sign_up(&client, "ada@example.com").await;

    let response = client
        .call("TaskService", "CreateTaskAsync")
        .bearer_token(&token)
        .json(&json!({"task": {"title": "  ", "priority": 9}}))
        .send()
        .await;

    response.assert_status(StatusCode::BAD_REQUEST);
    let body = response.json_value().unwrap();
    assert_eq!(body["error"], "invalid parameter: task");
    assert!(body["details"]["task.title"].is_array());
    assert!(body["details"]["task.priority"].is_array());
}

#[tokio::test]
async fn test_non_object_body_is_400() {
    let client = client().await;
    let token = sign_up(&client, "ada@example.com").await;

    let response = client
        .call("TaskService", "ListTasksAsync")
        .bearer_token(&token)
        .body("[1, 2]")
        .send()
        .await;

    response.assert_status(StatusCode::BAD_REQUEST);
    assert_eq!(
        response.error_message().as_deref(),
        Some("request body must be a JSON object")
    );
}

#[tokio::test]
async fn test_delete_returns_204_and_hides_foreign_tasks() {
    let client = client().await;
    let ada = sign_up(&client, "ada@example.com").await;
    let bob = sign_up(&client, "bob@example.com").await;
    let id = create_task(&client, &ada, "Private").await;

    client
        .call("TaskService", "DeleteTaskAsync")
        .bearer_token(&bob)
        .json(&json!({"taskId": id}))
        .send()
        .await
        .assert_status(StatusCode::FORBIDDEN);

    client
        .call("TaskService", "DeleteTaskAsync")
        .bearer_token(&ada)
        .json(&json!({"taskId": id}))
        .send()
        .await
        .assert_status(StatusCode::NO_CONTENT)
        .assert_empty();

    client
        .call("TaskService", "GetTaskAsync")
        .bearer_token(&ada)
        .json(&json!({"taskId": id}))
        .send()
        .await
        .assert_status(StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_update_and_complete_task() {
    let client = client().await;
    let token = sign_up(&client, "ada@example.com").await;
    let id = create_task(&client, &token, "Draft").await;

    let response = client
        .call("TaskService", "UpdateTaskAsync")
        .bearer_token(&token)
        .json(&json!({"taskId": id, "changes": {"title": "Final", "priority": 3}}))
        .send()
        .await;
    response.assert_status(StatusCode::OK);
    response.assert_json_field("title", &json!("Final"));
    response.assert_json_field("priority", &json!(3));

    let response = client
        .call("TaskService", "CompleteTaskAsync")
        .bearer_token(&token)
        .json(&json!({"taskId": id}))
        .send()
        .await;
    response.assert_json_field("status", &json!("done"));

    let response = client
        .call("TaskService", "ListTasksAsync")
        .bearer_token(&token)
        .json(&json!({"status": "todo"}))
        .send()
        .await;
    assert!(response.json::<Vec<Value>>().unwrap().is_empty());
}

#[tokio::test]
async fn test_exports_use_text_and_octet_stream() {
    let client = client().await;
    let token = sign_up(&client, "ada@example.com").await;
    create_task(&client, &token, "Buy milk, eggs").await;

    let csv = client
        .call("TaskService", "ExportTasksCsv")
        .bearer_token(&token)
        .send()
        .await;
    csv.assert_status(StatusCode::OK).assert_content_type(TEXT_PLAIN);
    let text = csv.text().unwrap();
    assert!(text.starts_with("id,title,status,priority,dueDate,createdAt\n"));
    assert!(text.contains("\"Buy milk, eggs\",todo,0"));

    let archive = client
        .call("TaskService", "ExportTasksArchive")
        .bearer_token(&token)
        .send()
        .await;
    archive
        .assert_status(StatusCode::OK)
        .assert_content_type(OCTET_STREAM);
    let lines: Vec<Value> = archive
        .text()
        .unwrap()
        .lines()
        .map(|line| serde_json::from_str(line).unwrap())
        .collect();
    assert_eq!(lines.len(), 1);
    assert_eq!(lines[0]["title"], "Buy milk, eggs");
}

// =============================================================================
// Accounts and token sources
// =============================================================================

#[tokio::test]
async fn test_bad_credentials_are_401() {
    let client = client().await;
    sign_up(&client, "ada@example.com").await;

    let response = client
        .call("UserService", "LoginAsync")
        .json(&json!({"email": "ada@example.com", "password": "wrong-password"}))
        .send()
        .await;

    response.assert_status(StatusCode::UNAUTHORIZED);
    assert_eq!(response.error_message().as_deref(), Some("invalid email or password"));
}

#[tokio::test]
async fn test_duplicate_registration_is_409() {
    let client = client().await;
    sign_up(&client, "ada@example.com").await;

    let response = client
        .call("UserService", "RegisterAsync")
        .json(&json!({
            "registration": {"email": "ADA@example.com", "name": "Ada", "password": "another-one"}
        }))
        .send()
        .await;

    response.assert_status(StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_token_from_cookie_and_query() {
    let client = client().await;
    let token = sign_up(&client, "ada@example.com").await;

    client
        .call("UserService", "GetProfileAsync")
        .cookie("access_token", token.clone())
        .send()
        .await
        .assert_status(StatusCode::OK)
        .assert_json_field("email", &json!("ada@example.com"));

    client
        .call("UserService", "GetProfileAsync")
        .query("access_token", token)
        .send()
        .await
        .assert_status(StatusCode::OK);
}

#[tokio::test]
async fn test_foreign_signature_is_anonymous() {
    let client = client().await;
    let issuer = TokenIssuer::new("some-other-secret-that-is-long-enough", Some("kairos".to_string()), 60);
    let forged = issuer
        .issue(&User {
            id: "u-forged".to_string(),
            email: "mallory@example.com".to_string(),
            name: "Mallory".to_string(),
            role: Role::Admin,
            password_hash: String::new(),
            created_at: chrono::Utc::now(),
        })
        .unwrap();

    client
        .call("TaskService", "PurgeAllTasksAsync")
        .bearer_token(&forged.token)
        .send()
        .await
        .assert_status(StatusCode::UNAUTHORIZED);
}

// =============================================================================
// Hardened deployments
// =============================================================================

#[tokio::test]
async fn test_hidden_details_collapse_not_found_message() {
    let mut config = config();
    config.dispatch.expose_error_details = false;
    let client = client_with(config).await;
    let token = sign_up(&client, "ada@example.com").await;

    let response = client
        .call("NoSuchService", "Foo")
        .bearer_token(&token)
        .send()
        .await;

    response.assert_status(StatusCode::NOT_FOUND);
    assert_eq!(response.json_value().unwrap(), json!({"error": "not found"}));

    client
        .call("NoSuchService", "Foo")
        .send()
        .await
        .assert_status(StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_custom_prefix_routes_dispatch() {
    let mut config = config();
    config.dispatch.prefix = "rpc".to_string();
    let client = client_with(config).await.with_dispatch_base("/rpc");

    client
        .call("UserService", "Ping")
        .send()
        .await
        .assert_status(StatusCode::OK);

    client
        .post("/api/services/UserService/Ping")
        .send()
        .await
        .assert_status(StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_health_is_served_next_to_dispatch() {
    let client = client().await;

    let response = client.get("/health").send().await;

    response.assert_status(StatusCode::OK);
    assert_eq!(response.json_value().unwrap()["service"], "kairos");
}

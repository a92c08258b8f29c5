//! # Kairos Test
//!
//! In-memory testing for Kairos servers. Requests are handed straight to
//! [`kairos_server::Server::handle`], so they see the request timeout, every
//! pipeline stage and the health/not-found fallback, without binding a port.
//!
//! ## Example
//!
//! ```ignore
//! use kairos_test::TestClient;
//! use serde_json::json;
//!
//! #[tokio::test]
//! async fn creates_a_task() {
//!     let client = TestClient::new(server);
//!
//!     let response = client
//!         .call("TaskService", "CreateTaskAsync")
//!         .bearer_token(&token)
//!         .json(&json!({"task": {"title": "Write report"}}))
//!         .send()
//!         .await;
//!
//!     response.assert_status(http::StatusCode::OK);
//!     response.assert_json_field("title", &json!("Write report"));
//! }
//! ```

#![doc(html_root_url = "https://docs.rs/kairos-test/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod client;
mod error;
mod request;
mod response;

pub use client::{TestClient, TestClientRequest, DEFAULT_DISPATCH_BASE};
pub use error::TestError;
pub use request::{TestRequest, TestRequestBuilder};
pub use response::TestResponse;

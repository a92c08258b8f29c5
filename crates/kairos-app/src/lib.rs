//! # Kairos
//!
//! A task service whose operations are reached through dynamic dispatch:
//! `POST /services/{Service}/{Method}` with a JSON object body.
//!
//! ```text
//! POST /services/TaskService/CreateTaskAsync
//! Authorization: Bearer <token>
//!
//! {"task": {"title": "Write report"}}
//! ```
//!
//! - [`services`] - `TaskService`, `UserService`, `AiService`
//! - [`repository`] - Storage traits and in-memory implementations
//! - [`auth`] - Token issuance and password hashing
//! - [`ai`] - Chat completion providers
//! - [`app`] - Wiring from configuration to a running server

#![doc(html_root_url = "https://docs.rs/kairos-app/0.1.0")]
#![forbid(unsafe_code)]

pub mod ai;
pub mod app;
pub mod auth;
pub mod models;
pub mod repository;
pub mod services;

pub use app::{build_pipeline, log_config, server_config, App, SERVICE_NAME};

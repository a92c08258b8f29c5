//! # Kairos Server
//!
//! Hyper/Tokio host for the Kairos middleware pipeline.
//!
//! - HTTP/1.1 via Hyper
//! - Per-request timeout (504) and body limit (413)
//! - `/health` and `/ready` on the fallback path
//! - Graceful shutdown on SIGINT/SIGTERM
//!
//! [`Server::handle`] runs a buffered request through the same path a
//! socket request takes, which is what `kairos-test` builds on.
//!
//! ## Example
//!
//! ```rust,ignore
//! use kairos_server::{Server, ServerConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ServerConfig::builder().http_addr("0.0.0.0:8080").build();
//!     Server::new(config, pipeline).run().await?;
//!     Ok(())
//! }
//! ```

#![doc(html_root_url = "https://docs.rs/kairos-server/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod config;
pub mod health;
pub mod server;
pub mod shutdown;

pub use config::{ServerConfig, ServerConfigBuilder};
pub use health::{Health, HealthReport, ReadinessReport};
pub use server::{Server, ServerError};
pub use shutdown::{ConnectionTracker, ConnectionToken, ShutdownSignal};

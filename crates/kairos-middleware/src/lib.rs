//! # Kairos Middleware
//!
//! The request pipeline of the Kairos server.
//!
//! ```text
//! Request -> RequestId -> AccessLog -> Identity -> Dispatch -> Response -> fallback
//! ```
//!
//! | Stage | Middleware  | Purpose                                          |
//! |-------|-------------|--------------------------------------------------|
//! | 1     | Request ID  | Generate/propagate request id (UUID v7)          |
//! | 2     | Access Log  | Structured log line per request                 |
//! | 3     | Identity    | Caller identity from cookie, bearer or query JWT |
//! | 4     | Dispatch    | `.../services/{Service}/{Method}` invocation     |
//! | 5     | Response    | Serialize the method result by its shape         |
//!
//! Requests that are not dispatch requests fall through every stage to the
//! terminal handler supplied by the server.
//!
//! ## Example
//!
//! ```
//! use kairos_middleware::pipeline::Stage;
//!
//! let stages = Stage::all();
//! assert_eq!(stages.len(), 5);
//! assert_eq!(stages[3].name(), "dispatch");
//! ```

#![doc(html_root_url = "https://docs.rs/kairos-middleware/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod context;
pub mod middleware;
pub mod pipeline;
pub mod stages;
pub mod types;

pub use context::MiddlewareContext;
pub use middleware::{BoxFuture, Middleware, Next};
pub use pipeline::{Pipeline, PipelineBuilder, Stage};
pub use types::{Request, Response, ResponseExt};

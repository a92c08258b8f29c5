//! # Kairos Core
//!
//! Core types shared by every Kairos crate.
//!
//! - [`RequestContext`] - Per-request context carrying identity and the invoked operation
//! - [`RequestId`] - UUID v7 request identifier
//! - [`CallerIdentity`] - Authentication outcome of the current request
//! - [`KairosError`] - Standard error type and its HTTP status mapping
//! - [`di::Container`] - Startup-built registry of injectable dependencies

#![doc(html_root_url = "https://docs.rs/kairos-core/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod context;
pub mod di;
mod error;
mod identity;

pub use context::{RequestContext, RequestId};
pub use di::{Container, Inject, InjectionError};
pub use error::{ErrorBody, ErrorCategory, FieldErrors, KairosError, KairosResult};
pub use identity::{CallerIdentity, ADMIN_ROLE};

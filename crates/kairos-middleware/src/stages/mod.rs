//! Pipeline stages, in execution order.
//!
//! 1. [`request_id`] - Generate or propagate the request id
//! 2. [`access_log`] - One log line per request
//! 3. [`identity`] - Resolve the caller from a bearer token
//! 4. [`dispatch`] - Gate, resolve, bind and invoke service methods
//! 5. [`response`] - Serialize the method result

pub mod access_log;
pub mod dispatch;
pub mod identity;
pub mod request_id;
pub mod response;

pub use access_log::{AccessLogMiddleware, AccessRecord};
pub use dispatch::{DispatchMiddleware, DispatchOutcome};
pub use identity::{IdentityMiddleware, IdentitySettings, TokenSource};
pub use request_id::{RequestIdMiddleware, REQUEST_ID_HEADER};
pub use response::{ResponseMiddleware, DEFAULT_MAX_STREAM_BYTES};

//! Logging setup for Kairos services.
//!
//! Every Kairos crate logs through `tracing` macros. This crate owns the
//! one place where those events are turned into output:
//!
//! - [`init_logging`] for binaries (JSON or pretty, `EnvFilter`)
//! - [`init_test_logging`] for tests
//!
//! # Example
//!
//! ```rust,ignore
//! use kairos_telemetry::{init_logging, LogConfig};
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     init_logging(&LogConfig::development())?;
//!     tracing::info!("started");
//!     Ok(())
//! }
//! ```

#![doc(html_root_url = "https://docs.rs/kairos-telemetry/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod error;
pub mod logging;

pub use error::TelemetryError;
pub use logging::{create_env_filter, init_logging, init_test_logging, LogConfig};

/// Result type for telemetry operations.
pub type TelemetryResult<T> = Result<T, TelemetryError>;

//! Typed configuration for Kairos.
//!
//! - TOML and JSON configuration files
//! - `.env` files and `KAIROS__SECTION__KEY` environment overrides
//! - Strict parsing (unknown fields are errors)
//! - Presets for development and production
//!
//! # Example
//!
//! ```no_run
//! use kairos_config::ConfigLoader;
//!
//! # fn main() -> Result<(), kairos_config::ConfigError> {
//! let config = ConfigLoader::new()
//!     .with_defaults()
//!     .with_optional_file("kairos.toml")?
//!     .with_dotenv()?
//!     .with_env_prefix("KAIROS")
//!     .load()?;
//!
//! println!("listening on {}", config.server.http_addr);
//! # Ok(())
//! # }
//! ```
//!
//! # File format
//!
//! ```toml
//! environment = "production"
//!
//! [server]
//! http_addr = "0.0.0.0:8080"
//! request_timeout_ms = 30000
//!
//! [logging]
//! level = "info"
//! format = "json"
//!
//! [auth]
//! jwt_secret = "at-least-32-bytes-of-secret-material"
//! token_ttl_secs = 3600
//!
//! [dispatch]
//! prefix = "services"
//! expose_error_details = false
//!
//! [ai]
//! model = "gpt-4o-mini"
//! ```

#![warn(missing_docs)]

mod config;
mod error;
mod loader;
mod schema;

pub use config::*;
pub use error::ConfigError;
pub use loader::ConfigLoader;
pub use schema::*;

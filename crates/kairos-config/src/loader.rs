//! Configuration loader with layered approach.
//!
//! Layers are applied in call order, later layers overriding earlier ones
//! key by key:
//!
//! 1. Defaults or a preset
//! 2. Configuration files or strings (TOML or JSON)
//! 3. `.env` file (populates the process environment)
//! 4. Environment variables `PREFIX__SECTION__KEY`, applied by [`ConfigLoader::load`]

use std::env;
use std::fs;
use std::path::Path;

use serde_json::Value;

use crate::schema::{Environment, LogFormat};
use crate::{ConfigError, KairosConfig};

/// Configuration loader.
///
/// # Example
///
/// ```no_run
/// use kairos_config::ConfigLoader;
///
/// # fn main() -> Result<(), kairos_config::ConfigError> {
/// let config = ConfigLoader::new()
///     .with_defaults()
///     .with_optional_file("kairos.toml")?
///     .with_dotenv()?
///     .with_env_prefix("KAIROS")
///     .load()?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct ConfigLoader {
    config: KairosConfig,
    env_prefix: Option<String>,
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigLoader {
    /// Creates a loader starting from [`KairosConfig::default`].
    #[must_use]
    pub fn new() -> Self {
        Self {
            config: KairosConfig::default(),
            env_prefix: None,
        }
    }

    /// Resets to default values.
    #[must_use]
    pub fn with_defaults(mut self) -> Self {
        self.config = KairosConfig::default();
        self
    }

    /// Resets to the development preset.
    ///
    /// ```
    /// use kairos_config::{ConfigLoader, LogFormat};
    ///
    /// let config = ConfigLoader::new().with_development().load().unwrap();
    /// assert_eq!(config.logging.format, LogFormat::Pretty);
    /// ```
    #[must_use]
    pub fn with_development(mut self) -> Self {
        self.config = KairosConfig::development();
        self
    }

    /// Resets to the production preset.
    #[must_use]
    pub fn with_production(mut self) -> Self {
        self.config = KairosConfig::production();
        self
    }

    /// Merges a configuration file. The format follows the extension
    /// (`.toml` or `.json`).
    pub fn with_file<P: AsRef<Path>>(self, path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();

        if !path.exists() {
            return Err(ConfigError::file_not_found(path));
        }

        let content = fs::read_to_string(path).map_err(|e| ConfigError::read_error(path, e))?;

        let format = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_lowercase)
            .unwrap_or_default();

        self.with_string(&content, &format)
    }

    /// Merges a configuration file if it exists.
    pub fn with_optional_file<P: AsRef<Path>>(self, path: P) -> Result<Self, ConfigError> {
        if path.as_ref().exists() {
            self.with_file(path)
        } else {
            Ok(self)
        }
    }

    /// Merges configuration content in `format` (`"toml"` or `"json"`).
    ///
    /// ```
    /// use kairos_config::ConfigLoader;
    ///
    /// let config = ConfigLoader::new()
    ///     .with_string("[server]\nhttp_addr = \"127.0.0.1:3000\"", "toml")
    ///     .unwrap()
    ///     .load()
    ///     .unwrap();
    ///
    /// assert_eq!(config.server.http_addr, "127.0.0.1:3000");
    /// assert_eq!(config.server.request_timeout_ms, 30_000);
    /// ```
    pub fn with_string(mut self, content: &str, format: &str) -> Result<Self, ConfigError> {
        let layer: Value = match format.to_lowercase().as_str() {
            "toml" => toml::from_str(content)?,
            "json" => serde_json::from_str(content)?,
            other => return Err(ConfigError::unsupported_format(other)),
        };

        let mut merged = serde_json::to_value(&self.config)?;
        merge(&mut merged, layer);
        self.config = serde_json::from_value(merged)?;
        Ok(self)
    }

    /// Sets the prefix of environment overrides applied by [`load`](Self::load).
    #[must_use]
    pub fn with_env_prefix(mut self, prefix: &str) -> Self {
        self.env_prefix = Some(prefix.to_uppercase());
        self
    }

    /// Loads `.env` from the working directory into the process environment.
    /// A missing file is not an error.
    pub fn with_dotenv(self) -> Result<Self, ConfigError> {
        match dotenvy::dotenv() {
            Ok(_) => Ok(self),
            Err(e) if e.not_found() => Ok(self),
            Err(e) => Err(e.into()),
        }
    }

    /// Applies overrides from an explicit set of variables.
    pub fn with_env_vars<I, K, V>(mut self, prefix: &str, vars: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let prefix = prefix.to_uppercase();
        for (key, value) in vars {
            let key = key.as_ref();
            if key.starts_with(&prefix) {
                self.apply_env_var(key, value.as_ref(), &prefix)?;
            }
        }
        Ok(self)
    }

    /// Applies environment overrides and validates.
    pub fn load(self) -> Result<KairosConfig, ConfigError> {
        let config = self.load_with_env()?;
        config.validate()?;
        Ok(config)
    }

    /// Applies environment overrides without validating.
    pub fn load_unvalidated(self) -> Result<KairosConfig, ConfigError> {
        self.load_with_env()
    }

    fn load_with_env(mut self) -> Result<KairosConfig, ConfigError> {
        if let Some(prefix) = self.env_prefix.take() {
            let vars = env::vars_os()
                .filter_map(|(key, value)| Some((key.into_string().ok()?, value.into_string().ok()?)));
            self = self.with_env_vars(&prefix, vars)?;
        }
        Ok(self.config)
    }

    fn apply_env_var(&mut self, key: &str, value: &str, prefix: &str) -> Result<(), ConfigError> {
        let Some(path) = key.strip_prefix(prefix).and_then(|k| k.strip_prefix("__")) else {
            // KAIROS_FOO shares the prefix but is not ours.
            return Ok(());
        };

        let parts: Vec<&str> = path.split("__").collect();
        let config = &mut self.config;

        match parts.as_slice() {
            ["ENVIRONMENT"] => {
                config.environment = match value.to_lowercase().as_str() {
                    "development" => Environment::Development,
                    "staging" => Environment::Staging,
                    "production" => Environment::Production,
                    _ => {
                        return Err(ConfigError::env_parse_error(
                            key,
                            "expected 'development', 'staging' or 'production'",
                        ))
                    }
                };
            }

            ["SERVER", "HTTP_ADDR"] => config.server.http_addr = value.to_string(),
            ["SERVER", "REQUEST_TIMEOUT_MS"] => config.server.request_timeout_ms = parse_number(key, value)?,
            ["SERVER", "SHUTDOWN_TIMEOUT_SECS"] => {
                config.server.shutdown_timeout_secs = parse_number(key, value)?;
            }
            ["SERVER", "MAX_BODY_BYTES"] => config.server.max_body_bytes = parse_number(key, value)?,

            ["LOGGING", "LEVEL"] => config.logging.level = value.to_string(),
            ["LOGGING", "FORMAT"] => {
                config.logging.format = match value.to_lowercase().as_str() {
                    "json" => LogFormat::Json,
                    "pretty" => LogFormat::Pretty,
                    _ => return Err(ConfigError::env_parse_error(key, "expected 'json' or 'pretty'")),
                };
            }
            ["LOGGING", "ANSI_ENABLED"] => config.logging.ansi_enabled = parse_flag(key, value)?,

            ["AUTH", "JWT_SECRET"] => config.auth.jwt_secret = value.to_string(),
            ["AUTH", "ISSUER"] => config.auth.issuer = optional(value),
            ["AUTH", "TOKEN_TTL_SECS"] => config.auth.token_ttl_secs = parse_number(key, value)?,
            ["AUTH", "COOKIE_NAME"] => config.auth.cookie_name = value.to_string(),
            ["AUTH", "QUERY_PARAM"] => config.auth.query_param = value.to_string(),
            ["AUTH", "LEEWAY_SECS"] => config.auth.leeway_secs = parse_number(key, value)?,
            ["AUTH", "ADMIN_EMAIL"] => config.auth.admin_email = optional(value),
            ["AUTH", "ADMIN_PASSWORD"] => config.auth.admin_password = optional(value),

            ["DISPATCH", "PREFIX"] => config.dispatch.prefix = value.to_string(),
            ["DISPATCH", "EXPOSE_ERROR_DETAILS"] => {
                config.dispatch.expose_error_details = parse_flag(key, value)?;
            }
            ["DISPATCH", "TRUST_REQUEST_ID"] => config.dispatch.trust_request_id = parse_flag(key, value)?,
            ["DISPATCH", "MAX_STREAM_BYTES"] => config.dispatch.max_stream_bytes = parse_number(key, value)?,

            ["AI", "ENDPOINT"] => config.ai.endpoint = value.to_string(),
            ["AI", "MODEL"] => config.ai.model = value.to_string(),
            ["AI", "API_KEY"] => config.ai.api_key = optional(value),
            ["AI", "TIMEOUT_MS"] => config.ai.timeout_ms = parse_number(key, value)?,

            _ => return Err(ConfigError::env_parse_error(key, "unknown configuration key")),
        }

        Ok(())
    }
}

/// Recursively overlays `layer` onto `base`. Objects merge key by key,
/// anything else replaces.
fn merge(base: &mut Value, layer: Value) {
    match (base, layer) {
        (Value::Object(base), Value::Object(layer)) => {
            for (key, value) in layer {
                match base.get_mut(&key) {
                    Some(existing) => merge(existing, value),
                    None => {
                        base.insert(key, value);
                    }
                }
            }
        }
        (base, layer) => *base = layer,
    }
}

fn parse_number<T: std::str::FromStr>(key: &str, value: &str) -> Result<T, ConfigError> {
    value
        .trim()
        .parse()
        .map_err(|_| ConfigError::env_parse_error(key, "expected a non-negative integer"))
}

fn parse_flag(key: &str, value: &str) -> Result<bool, ConfigError> {
    parse_bool(value).ok_or_else(|| ConfigError::env_parse_error(key, "expected boolean"))
}

fn optional(value: &str) -> Option<String> {
    if value.is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}

/// Parse a boolean from a string.
fn parse_bool(s: &str) -> Option<bool> {
    match s.to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}

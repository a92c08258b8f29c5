//! Root configuration type and presets.

use serde::{Deserialize, Serialize};

use crate::schema::{
    AiSection, AuthSection, DispatchSection, Environment, LogFormat, LoggingSection, ServerSection,
};
use crate::ConfigError;

/// Signing secret used when nothing else is configured. Rejected outside
/// development.
pub const DEVELOPMENT_JWT_SECRET: &str = "kairos-development-secret-change-me";

/// Minimum secret length outside development.
pub const MIN_SECRET_BYTES: usize = 32;

/// Complete Kairos configuration.
///
/// # Example
///
/// ```
/// use kairos_config::KairosConfig;
///
/// let config = KairosConfig::default();
/// assert_eq!(config.server.http_addr, "0.0.0.0:8080");
/// assert_eq!(config.dispatch.prefix, "services");
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct KairosConfig {
    /// Deployment environment.
    #[serde(default)]
    pub environment: Environment,

    /// HTTP server settings.
    #[serde(default)]
    pub server: ServerSection,

    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingSection,

    /// Token settings.
    #[serde(default)]
    pub auth: AuthSection,

    /// Dispatch settings.
    #[serde(default)]
    pub dispatch: DispatchSection,

    /// AI provider settings.
    #[serde(default)]
    pub ai: AiSection,
}

impl Default for KairosConfig {
    fn default() -> Self {
        Self {
            environment: Environment::Development,
            server: ServerSection::default(),
            logging: LoggingSection::default(),
            auth: AuthSection {
                jwt_secret: DEVELOPMENT_JWT_SECRET.to_string(),
                ..AuthSection::default()
            },
            dispatch: DispatchSection::default(),
            ai: AiSection::default(),
        }
    }
}

impl KairosConfig {
    /// Development preset: pretty debug logs, loopback address.
    #[must_use]
    pub fn development() -> Self {
        let mut config = Self::default();
        config.server.http_addr = "127.0.0.1:8080".to_string();
        config.logging = LoggingSection {
            level: "debug".to_string(),
            format: LogFormat::Pretty,
            ansi_enabled: true,
        };
        config
    }

    /// Production preset: JSON logs, hidden error details, and no signing
    /// secret, which must then come from a file or the environment.
    #[must_use]
    pub fn production() -> Self {
        let mut config = Self {
            environment: Environment::Production,
            ..Self::default()
        };
        config.auth.jwt_secret = String::new();
        config.dispatch.expose_error_details = false;
        config.logging.format = LogFormat::Json;
        config
    }

    /// Checks cross-field constraints.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.server.http_addr.parse::<std::net::SocketAddr>().is_err() {
            return Err(ConfigError::invalid_value(
                "server.http_addr",
                format!("invalid socket address: {}", self.server.http_addr),
            ));
        }

        if self.server.request_timeout_ms == 0 {
            return Err(ConfigError::invalid_value("server.request_timeout_ms", "must be greater than 0"));
        }

        if self.auth.jwt_secret.is_empty() {
            return Err(ConfigError::invalid_value("auth.jwt_secret", "must not be empty"));
        }

        if self.environment != Environment::Development {
            if self.auth.jwt_secret.len() < MIN_SECRET_BYTES {
                return Err(ConfigError::invalid_value(
                    "auth.jwt_secret",
                    format!("must be at least {MIN_SECRET_BYTES} bytes in {}", self.environment.as_str()),
                ));
            }
            if self.auth.jwt_secret == DEVELOPMENT_JWT_SECRET {
                return Err(ConfigError::invalid_value(
                    "auth.jwt_secret",
                    format!("the development secret cannot be used in {}", self.environment.as_str()),
                ));
            }
        }

        if self.auth.token_ttl_secs == 0 {
            return Err(ConfigError::invalid_value("auth.token_ttl_secs", "must be greater than 0"));
        }

        if self.dispatch.prefix.is_empty() || self.dispatch.prefix.contains('/') {
            return Err(ConfigError::invalid_value(
                "dispatch.prefix",
                "must be a single non-empty path segment",
            ));
        }

        if self.dispatch.max_stream_bytes == 0 {
            return Err(ConfigError::invalid_value("dispatch.max_stream_bytes", "must be greater than 0"));
        }

        if self.ai.api_key.is_some()
            && !(self.ai.endpoint.starts_with("http://") || self.ai.endpoint.starts_with("https://"))
        {
            return Err(ConfigError::invalid_value(
                "ai.endpoint",
                format!("must be an http(s) URL: {}", self.ai.endpoint),
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        assert!(KairosConfig::default().validate().is_ok());
    }

    #[test]
    fn test_development_preset() {
        let config = KairosConfig::development();
        assert_eq!(config.logging.level, "debug");
        assert_eq!(config.logging.format, LogFormat::Pretty);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_production_requires_secret() {
        let mut config = KairosConfig::production();
        assert!(!config.dispatch.expose_error_details);
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("auth.jwt_secret"));

        config.auth.jwt_secret = "short".to_string();
        assert!(config.validate().is_err());

        config.auth.jwt_secret = DEVELOPMENT_JWT_SECRET.to_string();
        assert!(config.validate().is_err());

        config.auth.jwt_secret = "x".repeat(MIN_SECRET_BYTES);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_invalid_address() {
        let mut config = KairosConfig::default();
        config.server.http_addr = "localhost".to_string();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidValue { ref field, .. }) if field == "server.http_addr"
        ));
    }

    #[test]
    fn test_zero_ttl_rejected() {
        let mut config = KairosConfig::default();
        config.auth.token_ttl_secs = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_zero_stream_limit_rejected() {
        let mut config = KairosConfig::default();
        config.dispatch.max_stream_bytes = 0;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidValue { ref field, .. }) if field == "dispatch.max_stream_bytes"
        ));
    }

    #[test]
    fn test_prefix_must_be_one_segment() {
        let mut config = KairosConfig::default();
        config.dispatch.prefix = "api/services".to_string();
        assert!(config.validate().is_err());
        config.dispatch.prefix = String::new();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_ai_endpoint_checked_only_with_key() {
        let mut config = KairosConfig::default();
        config.ai.endpoint = "ftp://models".to_string();
        assert!(config.validate().is_ok());

        config.ai.api_key = Some("sk-test".to_string());
        assert!(config.validate().is_err());
    }
}
